//! Two-thread throughput harness.
//!
//! [`run`] builds a fresh queue, starts one producer and one consumer thread,
//! pushes `0..items` through it and reports wall-clock throughput. It owns
//! no queue logic, only thread lifecycle and measurement.

use crate::config::ConfigError;
use crate::spsc::{split, QueueConsumer, QueueProducer};
use crate::{LockFreeQueue, LockedQueue, SpscQueue};
use crossbeam::utils::Backoff;
use std::{
   env, fmt, io,
   str::FromStr,
   sync::{
      atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
      Arc,
   },
   thread,
   time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_ITEMS: u64 = 1_000_000;
pub const DEFAULT_CAPACITY: usize = 1024;

/// Payload pushed through every queue under test.
pub type Payload = u64;

#[derive(Debug, Error)]
pub enum BenchError {
   #[error(transparent)]
   Config(#[from] ConfigError),

   #[error("failed to spawn {role} thread: {source}")]
   ThreadSpawn {
      role: &'static str,
      #[source]
      source: io::Error,
   },

   #[error("{0} thread panicked")]
   ThreadPanicked(&'static str),

   #[error("consumer expected {expected} but popped {got}")]
   OutOfOrder { expected: Payload, got: Payload },

   #[error("run aborted before the workload completed")]
   Aborted,
}

/// What a thread does after a failed push or pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
   /// Retry immediately with a spin hint, no backoff.
   #[default]
   Spin,
   /// Bounded exponential spinning via `crossbeam::utils::Backoff`.
   Backoff,
}

impl RetryPolicy {
   #[inline]
   fn wait(self, backoff: &Backoff) {
      match self {
         RetryPolicy::Spin => std::hint::spin_loop(),
         RetryPolicy::Backoff => backoff.spin(),
      }
   }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
   pub items: u64,
   pub capacity: usize,
   pub retry: RetryPolicy,
   pub producer_cpu: Option<usize>,
   pub consumer_cpu: Option<usize>,
}

impl Default for BenchConfig {
   fn default() -> Self {
      Self {
         items: DEFAULT_ITEMS,
         capacity: DEFAULT_CAPACITY,
         retry: RetryPolicy::Spin,
         producer_cpu: None,
         consumer_cpu: None,
      }
   }
}

impl BenchConfig {
   pub fn new(items: u64, capacity: usize) -> Self {
      Self { items, capacity, ..Self::default() }
   }

   pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
      self.retry = retry;
      self
   }

   pub fn with_cpus(mut self, producer: Option<usize>, consumer: Option<usize>) -> Self {
      self.producer_cpu = producer;
      self.consumer_cpu = consumer;
      self
   }

   /// Defaults overridden by `QUEUE_BENCH_ITEMS`, `QUEUE_BENCH_CAPACITY`,
   /// `QUEUE_BENCH_BACKOFF`, `PRODUCER_CPU` and `CONSUMER_CPU`.
   pub fn from_env() -> Result<Self, ConfigError> {
      let defaults = Self::default();
      let backoff = env_var::<String>("QUEUE_BENCH_BACKOFF")?
         .map(|v| parse_flag("QUEUE_BENCH_BACKOFF", v))
         .transpose()?
         .unwrap_or(false);

      Ok(Self {
         items: env_var("QUEUE_BENCH_ITEMS")?.unwrap_or(defaults.items),
         capacity: env_var("QUEUE_BENCH_CAPACITY")?.unwrap_or(defaults.capacity),
         retry: if backoff { RetryPolicy::Backoff } else { RetryPolicy::Spin },
         producer_cpu: env_var("PRODUCER_CPU")?,
         consumer_cpu: env_var("CONSUMER_CPU")?,
      })
   }
}

fn env_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
   match env::var(name) {
      Ok(value) => value
         .trim()
         .parse()
         .map(Some)
         .map_err(|_| ConfigError::InvalidEnv { name, value }),
      Err(env::VarError::NotPresent) => Ok(None),
      Err(env::VarError::NotUnicode(raw)) => Err(ConfigError::InvalidEnv {
         name,
         value: raw.to_string_lossy().into_owned(),
      }),
   }
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
   match value.to_ascii_lowercase().as_str() {
      "1" | "true" | "yes" | "on" => Ok(true),
      "" | "0" | "false" | "no" | "off" => Ok(false),
      _ => Err(ConfigError::InvalidEnv { name, value }),
   }
}

/// Outcome of one run against one implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchReport {
   pub name: &'static str,
   pub items: u64,
   pub capacity: usize,
   pub elapsed: Duration,
}

impl BenchReport {
   /// Items per second.
   pub fn throughput(&self) -> f64 {
      self.items as f64 / self.elapsed.as_secs_f64().max(f64::MIN_POSITIVE)
   }

   /// How many times faster this run was than `baseline`.
   pub fn speedup_over(&self, baseline: &BenchReport) -> f64 {
      self.throughput() / baseline.throughput()
   }
}

impl fmt::Display for BenchReport {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(
         f,
         "{:<10} {} items, capacity {}: {:.3} ms, {:.0} items/s",
         self.name,
         self.items,
         self.capacity,
         self.elapsed.as_secs_f64() * 1e3,
         self.throughput(),
      )
   }
}

/*──────────────────────────── start handshake ─────────────────────────────*/

const WAITING: u8 = 0;
const OPEN: u8 = 1;
const ABORTED: u8 = 2;

// Threads wait here until both exist. ABORTED releases a waiting thread,
// or one whose peer failed mid-run.
struct StartGate(AtomicU8);

impl StartGate {
   fn new() -> Self {
      Self(AtomicU8::new(WAITING))
   }

   /// Opens a waiting gate. `false` if a thread already aborted it; an
   /// abort is never overwritten.
   fn open(&self) -> bool {
      self.0
         .compare_exchange(WAITING, OPEN, Ordering::AcqRel, Ordering::Acquire)
         .is_ok()
   }

   fn abort(&self) {
      self.0.store(ABORTED, Ordering::Release);
   }

   fn is_aborted(&self) -> bool {
      self.0.load(Ordering::Acquire) == ABORTED
   }

   /// `true` once opened, `false` if aborted first.
   fn wait(&self) -> bool {
      loop {
         match self.0.load(Ordering::Acquire) {
            WAITING => thread::yield_now(),
            OPEN => return true,
            _ => return false,
         }
      }
   }
}

// Releases the peer if the owning thread unwinds.
struct AbortOnPanic<'a>(&'a StartGate);

impl Drop for AbortOnPanic<'_> {
   fn drop(&mut self) {
      if thread::panicking() {
         self.0.abort();
      }
   }
}

/*──────────────────────────────── harness ─────────────────────────────────*/

/// Run the fixed workload through a freshly built `Q`.
pub fn run<Q: SpscQueue<Payload>>(config: &BenchConfig) -> Result<BenchReport, BenchError> {
   if config.items == 0 {
      return Err(ConfigError::ZeroItems.into());
   }

   let queue = Q::with_capacity(config.capacity)?;
   let capacity = queue.capacity();
   let (mut producer, mut consumer) = split(queue);

   let items = config.items;
   let retry = config.retry;
   let gate = Arc::new(StartGate::new());
   let producer_done = Arc::new(AtomicBool::new(false));
   let consumed = Arc::new(AtomicU64::new(0));

   let consumer_thread = thread::Builder::new()
      .name(format!("{}-consumer", Q::NAME))
      .spawn({
         let gate = Arc::clone(&gate);
         let producer_done = Arc::clone(&producer_done);
         let consumed = Arc::clone(&consumed);
         let cpu = config.consumer_cpu;
         move || {
            let _guard = AbortOnPanic(&gate);
            pin_current(cpu, "consumer");
            if !gate.wait() {
               return Err(BenchError::Aborted);
            }
            let result = consume(&mut consumer, items, retry, &gate, &producer_done, &consumed);
            if result.is_err() {
               gate.abort();
            }
            result
         }
      })
      .map_err(|source| BenchError::ThreadSpawn { role: "consumer", source })?;

   let producer_thread = thread::Builder::new()
      .name(format!("{}-producer", Q::NAME))
      .spawn({
         let gate = Arc::clone(&gate);
         let producer_done = Arc::clone(&producer_done);
         let cpu = config.producer_cpu;
         move || {
            let _guard = AbortOnPanic(&gate);
            pin_current(cpu, "producer");
            if gate.wait() {
               produce(&mut producer, items, retry, &gate, &producer_done);
            }
         }
      });

   let producer_thread = match producer_thread {
      Ok(handle) => handle,
      Err(source) => {
         gate.abort();
         // Released by the abort, the consumer returns `Aborted`; the
         // spawn failure is the error worth reporting.
         let _ = consumer_thread.join();
         return Err(BenchError::ThreadSpawn { role: "producer", source });
      }
   };

   debug!(queue = Q::NAME, items, capacity, "starting run");
   let start = Instant::now();
   if !gate.open() {
      // Both threads were released by the abort; the joins report why.
      debug!(queue = Q::NAME, "run aborted before start");
   }

   let produced = producer_thread.join();
   if produced.is_err() {
      gate.abort();
   }
   let consumer_result = consumer_thread.join();
   let elapsed = start.elapsed();

   produced.map_err(|_| BenchError::ThreadPanicked("producer"))?;
   consumer_result.map_err(|_| BenchError::ThreadPanicked("consumer"))??;

   let report = BenchReport { name: Q::NAME, items, capacity, elapsed };
   info!(
      queue = report.name,
      items,
      capacity,
      elapsed_ms = report.elapsed.as_secs_f64() * 1e3,
      items_per_sec = report.throughput(),
      "run complete"
   );
   Ok(report)
}

/// Run every implementation in turn, each with its own queue and threads.
pub fn run_all(config: &BenchConfig) -> Result<Vec<BenchReport>, BenchError> {
   Ok(vec![
      run::<LockFreeQueue<Payload>>(config)?,
      run::<LockedQueue<Payload>>(config)?,
   ])
}

fn produce<Q: SpscQueue<Payload>>(
   producer: &mut QueueProducer<Payload, Q>,
   items: u64,
   retry: RetryPolicy,
   gate: &StartGate,
   producer_done: &AtomicBool,
) {
   let backoff = Backoff::new();
   for item in 0..items {
      while !producer.push(item) {
         if gate.is_aborted() {
            debug!("producer released by abort");
            return;
         }
         retry.wait(&backoff);
      }
      backoff.reset();
   }
   producer_done.store(true, Ordering::Release);
   debug!(items, "producer done");
}

fn consume<Q: SpscQueue<Payload>>(
   consumer: &mut QueueConsumer<Payload, Q>,
   items: u64,
   retry: RetryPolicy,
   gate: &StartGate,
   producer_done: &AtomicBool,
   consumed: &AtomicU64,
) -> Result<(), BenchError> {
   let backoff = Backoff::new();
   let mut expected: Payload = 0;
   loop {
      if producer_done.load(Ordering::Acquire) && consumed.load(Ordering::Relaxed) >= items {
         debug!(items, "consumer done");
         return Ok(());
      }
      match consumer.pop() {
         Some(got) if got == expected => {
            expected += 1;
            consumed.fetch_add(1, Ordering::Release);
            backoff.reset();
         }
         Some(got) => return Err(BenchError::OutOfOrder { expected, got }),
         None => {
            if gate.is_aborted() {
               return Err(BenchError::Aborted);
            }
            retry.wait(&backoff);
         }
      }
   }
}

#[cfg(target_os = "linux")]
fn pin_current(cpu: Option<usize>, role: &'static str) {
   use nix::{
      sched::{sched_setaffinity, CpuSet},
      unistd::Pid,
   };

   let Some(cpu) = cpu else { return };
   let mut set = CpuSet::new();
   match set.set(cpu).and_then(|()| sched_setaffinity(Pid::from_raw(0), &set)) {
      Ok(()) => debug!(role, cpu, "pinned thread"),
      Err(err) => warn!(role, cpu, %err, "could not pin thread, running unpinned"),
   }
}

#[cfg(not(target_os = "linux"))]
fn pin_current(cpu: Option<usize>, role: &'static str) {
   if let Some(cpu) = cpu {
      warn!(role, cpu, "thread pinning is only supported on Linux, running unpinned");
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn open_never_overwrites_abort() {
      let gate = StartGate::new();
      gate.abort();
      assert!(!gate.open());
      assert!(gate.is_aborted());
      assert!(!gate.wait());
   }

   #[test]
   fn open_releases_waiter() {
      let gate = StartGate::new();
      assert!(gate.open());
      assert!(!gate.is_aborted());
      assert!(gate.wait());
   }

   #[test]
   fn unwinding_thread_aborts_gate() {
      let gate = Arc::new(StartGate::new());
      let worker = thread::spawn({
         let gate = Arc::clone(&gate);
         move || {
            let _guard = AbortOnPanic(&gate);
            panic!("worker failed before start");
         }
      });
      assert!(worker.join().is_err());
      assert!(!gate.open(), "abort from the unwound thread must survive open");
      assert!(gate.is_aborted());
   }
}
