pub mod config;
pub mod harness;
pub mod spsc;

pub use config::{Capacity, ConfigError};
pub use harness::{BenchConfig, BenchError, BenchReport, RetryPolicy};
pub use spsc::{split, LockFreeQueue, LockedQueue, QueueConsumer, QueueProducer};

/// Common interface for all bounded queues.
///
/// The raw `push`/`pop` are `unsafe`: the single-producer / single-consumer
/// discipline is not checked at runtime. Use [`split`] for a safe producer
/// and consumer pair.
pub trait SpscQueue<T: Copy + Send>: Send + Sync + 'static {
   /// Short name used in reports and logs.
   const NAME: &'static str;

   /// Build an empty queue holding at most `capacity` items.
   fn with_capacity(capacity: usize) -> Result<Self, ConfigError>
   where
      Self: Sized;

   /// Enqueue `item`. Returns `false` without blocking when the queue is full.
   ///
   /// # Safety
   /// No other thread may be inside `push` on this queue at the same time.
   /// Concurrent `pop` from one other thread is allowed.
   unsafe fn push(&self, item: T) -> bool;

   /// Dequeue the oldest item, or `None` without blocking when empty.
   ///
   /// # Safety
   /// Mirror of [`push`](SpscQueue::push): at most one thread inside `pop`
   /// at a time. Concurrent `push` from one other thread is allowed.
   unsafe fn pop(&self) -> Option<T>;

   fn capacity(&self) -> usize;
}
