// Construction-time configuration shared by every queue.

use thiserror::Error;

/// Rejected configuration. Fatal to construction, never raised by push/pop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
   #[error("capacity {capacity} must be a power of two and at least 2")]
   InvalidCapacity { capacity: usize },

   #[error("benchmark item count must be greater than zero")]
   ZeroItems,

   #[error("environment variable {name}={value:?} is not valid")]
   InvalidEnv { name: &'static str, value: String },
}

/// A validated ring capacity: a power of two, `>= 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity(usize);

impl Capacity {
   pub fn new(capacity: usize) -> Result<Self, ConfigError> {
      if capacity >= 2 && capacity.is_power_of_two() {
         Ok(Self(capacity))
      } else {
         Err(ConfigError::InvalidCapacity { capacity })
      }
   }

   #[inline]
   pub const fn get(self) -> usize {
      self.0
   }

   /// `capacity - 1`; maps a monotonically increasing cursor onto a slot.
   #[inline]
   pub const fn mask(self) -> usize {
      self.0 - 1
   }
}

impl TryFrom<usize> for Capacity {
   type Error = ConfigError;

   fn try_from(capacity: usize) -> Result<Self, Self::Error> {
      Self::new(capacity)
   }
}
