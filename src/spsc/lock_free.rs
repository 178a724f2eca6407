// Wait-free bounded single-producer / single-consumer ring buffer.
//
// Lamport's ring with acquire/release cursors. Both operations finish in a
// bounded number of steps; the only failure is the `false`/`None` return.

use crate::config::{Capacity, ConfigError};
use crate::spsc::cursor::{Consumer, Cursor, Producer};
use crate::SpscQueue;
use crossbeam::utils::CachePadded;
use std::{cell::UnsafeCell, fmt, mem::MaybeUninit};

/*──────────────────────────────────────────────────────────────────────────*/
/*  Ring header                                                             */
/*──────────────────────────────────────────────────────────────────────────*/

pub struct LockFreeQueue<T: Copy + Send> {
   write   : CachePadded<Cursor<Producer>>,   // producer-owned, own cache line
   read    : CachePadded<Cursor<Consumer>>,   // consumer-owned, own cache line
   capacity: Capacity,
   buf     : Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: `push` and `pop` are unsafe and require one caller per side. Under
// that contract a slot is touched by the producer only while `write - read < N`
// says the consumer is not reading it, and by the consumer only after the
// producer's Release publish of `write` made the slot contents visible.
unsafe impl<T: Copy + Send> Sync for LockFreeQueue<T> {}

impl<T: Copy + Send> LockFreeQueue<T> {
   pub fn new(capacity: Capacity) -> Self {
      let buf = (0..capacity.get())
         .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
         .collect::<Vec<_>>()
         .into_boxed_slice();

      Self {
         write: CachePadded::new(Cursor::new()),
         read : CachePadded::new(Cursor::new()),
         capacity,
         buf,
      }
   }

   #[inline]
   fn slot(&self, cursor: usize) -> &UnsafeCell<MaybeUninit<T>> {
      &self.buf[cursor & self.capacity.mask()]
   }
}

/*──────────────────────────── queue operations ────────────────────────────*/

impl<T: Copy + Send + 'static> SpscQueue<T> for LockFreeQueue<T> {
   const NAME: &'static str = "lock-free";

   fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
      Ok(Self::new(Capacity::new(capacity)?))
   }

   #[inline]
   unsafe fn push(&self, item: T) -> bool {
      let producer = Producer::token();

      let write = self.write.load_owned(producer);
      let read = self.read.observe();
      if write.wrapping_sub(read) == self.capacity.get() {
         return false;
      }

      // SAFETY: the slot is outside [read, write), so the consumer is not
      // reading it and will not until `write` is published below.
      unsafe { (*self.slot(write).get()).write(item) };

      self.write.publish(write.wrapping_add(1), producer);
      true
   }

   #[inline]
   unsafe fn pop(&self) -> Option<T> {
      let consumer = Consumer::token();

      let read = self.read.load_owned(consumer);
      let write = self.write.observe();
      if read == write {
         return None;
      }

      // SAFETY: read < write, and the Acquire on `write` synchronised with
      // the producer's Release, so this slot holds an initialised value the
      // producer will not touch until `read` moves past it.
      let item = unsafe { (*self.slot(read).get()).assume_init_read() };

      self.read.publish(read.wrapping_add(1), consumer);
      Some(item)
   }

   #[inline]
   fn capacity(&self) -> usize {
      self.capacity.get()
   }
}

impl<T: Copy + Send> fmt::Debug for LockFreeQueue<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("LockFreeQueue")
         .field("capacity", &self.capacity.get())
         .field("write", &self.write.observe())
         .field("read", &self.read.observe())
         .finish()
   }
}
