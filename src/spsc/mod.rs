mod cursor;
mod handle;
mod lock_free;
mod locked;

pub use handle::{split, QueueConsumer, QueueProducer};
pub use lock_free::LockFreeQueue;
pub use locked::LockedQueue;
