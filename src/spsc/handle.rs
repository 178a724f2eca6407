// Producer / consumer handles that make the SPSC discipline a type property.

use crate::SpscQueue;
use std::{marker::PhantomData, sync::Arc};

/// The only push side of a split queue. `Send`, but neither `Clone` nor
/// usable through `&self` from two threads at once.
#[derive(Debug)]
pub struct QueueProducer<T, Q> {
   queue: Arc<Q>,
   _item: PhantomData<fn(T)>,
}

/// The only pop side of a split queue.
#[derive(Debug)]
pub struct QueueConsumer<T, Q> {
   queue: Arc<Q>,
   _item: PhantomData<fn() -> T>,
}

/// Split `queue` into its single producer and single consumer.
pub fn split<T, Q>(queue: Q) -> (QueueProducer<T, Q>, QueueConsumer<T, Q>)
where
   T: Copy + Send,
   Q: SpscQueue<T>,
{
   let queue = Arc::new(queue);
   (
      QueueProducer { queue: Arc::clone(&queue), _item: PhantomData },
      QueueConsumer { queue, _item: PhantomData },
   )
}

impl<T: Copy + Send, Q: SpscQueue<T>> QueueProducer<T, Q> {
   /// See [`SpscQueue::push`]. Taking `&mut self` keeps this handle the
   /// sole pusher even if it is shared by reference.
   #[inline]
   pub fn push(&mut self, item: T) -> bool {
      // SAFETY: `split` creates exactly one producer per queue and it is not
      // `Clone`; `&mut self` keeps it to one caller at a time.
      unsafe { self.queue.push(item) }
   }

   pub fn capacity(&self) -> usize {
      self.queue.capacity()
   }
}

impl<T: Copy + Send, Q: SpscQueue<T>> QueueConsumer<T, Q> {
   #[inline]
   pub fn pop(&mut self) -> Option<T> {
      // SAFETY: as for `QueueProducer::push`, on the consumer side.
      unsafe { self.queue.pop() }
   }

   pub fn capacity(&self) -> usize {
      self.queue.capacity()
   }
}
