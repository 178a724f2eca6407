// Mutex-guarded bounded ring – throughput baseline for `LockFreeQueue`.

use crate::config::{Capacity, ConfigError};
use crate::SpscQueue;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Ring<T> {
   buf  : Box<[Option<T>]>,
   read : usize,
   write: usize,
}

/// Same observable behaviour as [`LockFreeQueue`](crate::LockFreeQueue),
/// but every call takes one lock over a plain cursor pair.
#[derive(Debug)]
pub struct LockedQueue<T: Copy + Send> {
   capacity: Capacity,
   ring    : Mutex<Ring<T>>,
}

impl<T: Copy + Send> LockedQueue<T> {
   pub fn new(capacity: Capacity) -> Self {
      Self {
         capacity,
         ring: Mutex::new(Ring {
            buf  : vec![None; capacity.get()].into_boxed_slice(),
            read : 0,
            write: 0,
         }),
      }
   }

   // The ring holds plain integers and copyable slots and every critical
   // section is panic-free, so a poisoned lock still guards a valid ring.
   #[inline]
   fn lock(&self) -> MutexGuard<'_, Ring<T>> {
      self.ring.lock().unwrap_or_else(PoisonError::into_inner)
   }
}

impl<T: Copy + Send + 'static> SpscQueue<T> for LockedQueue<T> {
   const NAME: &'static str = "locked";

   fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
      Ok(Self::new(Capacity::new(capacity)?))
   }

   unsafe fn push(&self, item: T) -> bool {
      let mut ring = self.lock();
      if ring.write.wrapping_sub(ring.read) == self.capacity.get() {
         return false;
      }
      let slot = ring.write & self.capacity.mask();
      ring.buf[slot] = Some(item);
      ring.write = ring.write.wrapping_add(1);
      true
   }

   unsafe fn pop(&self) -> Option<T> {
      let mut ring = self.lock();
      if ring.read == ring.write {
         return None;
      }
      let slot = ring.read & self.capacity.mask();
      let item = ring.buf[slot].take();
      ring.read = ring.read.wrapping_add(1);
      item
   }

   fn capacity(&self) -> usize {
      self.capacity.get()
   }
}
