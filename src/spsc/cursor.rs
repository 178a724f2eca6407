// Role-typed ring cursors.
//
// Every cursor has exactly one writer role. The owner loads it Relaxed and
// publishes it Release; the peer role may only observe it with Acquire.
// Owner-only operations demand the role's token, and tokens are minted only
// inside `push` (Producer) and `pop` (Consumer), so a store to the wrong
// cursor does not type-check.

use std::{
   marker::PhantomData,
   sync::atomic::{AtomicUsize, Ordering},
};

/// Token held by the thread inside `push`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Producer(());

/// Token held by the thread inside `pop`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Consumer(());

impl Producer {
   #[inline]
   pub(crate) const fn token() -> Self {
      Self(())
   }
}

impl Consumer {
   #[inline]
   pub(crate) const fn token() -> Self {
      Self(())
   }
}

/// Monotonically increasing index written only by role `R`.
#[derive(Debug)]
pub(crate) struct Cursor<R> {
   value: AtomicUsize,
   _owner: PhantomData<R>,
}

impl<R: Copy> Cursor<R> {
   pub(crate) const fn new() -> Self {
      Self { value: AtomicUsize::new(0), _owner: PhantomData }
   }

   /// Owner's view; nobody else stores here, so Relaxed sees the latest value.
   #[inline]
   pub(crate) fn load_owned(&self, _owner: R) -> usize {
      self.value.load(Ordering::Relaxed)
   }

   /// Publish progress. Pairs with the peer's `observe`: everything written
   /// before this store is visible once the peer sees `next`.
   #[inline]
   pub(crate) fn publish(&self, next: usize, _owner: R) {
      self.value.store(next, Ordering::Release);
   }

   /// Peer's view of the owner's latest published progress.
   #[inline]
   pub(crate) fn observe(&self) -> usize {
      self.value.load(Ordering::Acquire)
   }
}
