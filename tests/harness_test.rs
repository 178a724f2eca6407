use spsc_bench::{
   harness::{self, Payload},
   BenchConfig, BenchError, ConfigError, LockFreeQueue, LockedQueue, RetryPolicy, SpscQueue,
};

// Queues that misbehave on one value, for driving the harness' failure paths.
// Each wraps a working `LockFreeQueue` and forwards everything else.
macro_rules! faulty_queue {
   ($name:ident, $label:literal, push($pi:ident) $push:block, pop($po:ident) $pop:block) => {
      struct $name(LockFreeQueue<Payload>);

      impl SpscQueue<Payload> for $name {
         const NAME: &'static str = $label;

         fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
            LockFreeQueue::<Payload>::with_capacity(capacity).map($name)
         }

         unsafe fn push(&self, $pi: Payload) -> bool {
            $push;
            unsafe { self.0.push($pi) }
         }

         unsafe fn pop(&self) -> Option<Payload> {
            let $po = unsafe { self.0.pop() };
            $pop
         }

         fn capacity(&self) -> usize {
            self.0.capacity()
         }
      }
   };
}

faulty_queue!(CorruptingQueue, "corrupting",
   push(item) {},
   pop(popped) { popped.map(|v| if v == 5 { 4 } else { v }) });

faulty_queue!(PanickingPopQueue, "panicking-pop",
   push(item) {},
   pop(popped) {
      if popped == Some(100) {
         panic!("consumer side failed");
      }
      popped
   });

faulty_queue!(PanickingPushQueue, "panicking-push",
   push(item) {
      if item == 100 {
         panic!("producer side failed");
      }
   },
   pop(popped) { popped });

#[test]
fn lock_free_run_reports_positive_throughput() {
   let config = BenchConfig::new(50_000, 16);
   let report = harness::run::<LockFreeQueue<Payload>>(&config).unwrap();

   assert_eq!(report.name, "lock-free");
   assert_eq!(report.items, 50_000);
   assert_eq!(report.capacity, 16);
   assert!(report.throughput() > 0.0);
}

#[test]
fn locked_run_reports_positive_throughput() {
   let config = BenchConfig::new(50_000, 16);
   let report = harness::run::<LockedQueue<Payload>>(&config).unwrap();

   assert_eq!(report.name, "locked");
   assert!(report.throughput() > 0.0);
}

#[test]
fn backoff_policy_completes() {
   let config = BenchConfig::new(20_000, 2).with_retry(RetryPolicy::Backoff);
   harness::run::<LockFreeQueue<Payload>>(&config).unwrap();
   harness::run::<LockedQueue<Payload>>(&config).unwrap();
}

#[test]
fn fewer_items_than_capacity() {
   let config = BenchConfig::new(3, 1024);
   let report = harness::run::<LockFreeQueue<Payload>>(&config).unwrap();
   assert_eq!(report.items, 3);
}

#[test]
fn run_all_measures_each_implementation_once() {
   let reports = harness::run_all(&BenchConfig::new(10_000, 64)).unwrap();
   let names: Vec<_> = reports.iter().map(|r| r.name).collect();
   assert_eq!(names, ["lock-free", "locked"]);
   assert!(reports.iter().all(|r| r.throughput() > 0.0));
   assert!(reports[0].speedup_over(&reports[1]) > 0.0);
}

#[test]
fn zero_items_rejected() {
   let err = harness::run::<LockFreeQueue<Payload>>(&BenchConfig::new(0, 1024)).unwrap_err();
   assert!(matches!(err, BenchError::Config(ConfigError::ZeroItems)), "got {err:?}");
}

#[test]
fn invalid_capacity_rejected_before_threads_start() {
   for capacity in [0, 1, 1000] {
      let err = harness::run::<LockedQueue<Payload>>(&BenchConfig::new(10, capacity)).unwrap_err();
      assert!(
         matches!(err, BenchError::Config(ConfigError::InvalidCapacity { capacity: c }) if c == capacity),
         "got {err:?}"
      );
   }
}

#[cfg(target_os = "linux")]
#[test]
fn pinned_run_completes() {
   let config = BenchConfig::new(1_000, 1024).with_cpus(Some(0), Some(0));
   harness::run::<LockFreeQueue<Payload>>(&config).unwrap();
}

#[test]
fn report_display_includes_rate() {
   let report = harness::run::<LockFreeQueue<Payload>>(&BenchConfig::new(1_000, 8)).unwrap();
   let line = report.to_string();
   assert!(line.starts_with("lock-free"), "{line}");
   assert!(line.contains("1000 items"), "{line}");
   assert!(line.ends_with("items/s"), "{line}");
}

// The only test in this binary that touches the process environment.
#[test]
fn config_from_env() {
   let vars = [
      "QUEUE_BENCH_ITEMS",
      "QUEUE_BENCH_CAPACITY",
      "QUEUE_BENCH_BACKOFF",
      "PRODUCER_CPU",
      "CONSUMER_CPU",
   ];
   for var in vars {
      std::env::remove_var(var);
   }
   assert_eq!(BenchConfig::from_env().unwrap(), BenchConfig::default());

   std::env::set_var("QUEUE_BENCH_ITEMS", "5000");
   std::env::set_var("QUEUE_BENCH_CAPACITY", " 256 ");
   std::env::set_var("QUEUE_BENCH_BACKOFF", "true");
   std::env::set_var("PRODUCER_CPU", "1");
   let config = BenchConfig::from_env().unwrap();
   assert_eq!(config.items, 5000);
   assert_eq!(config.capacity, 256);
   assert_eq!(config.retry, RetryPolicy::Backoff);
   assert_eq!(config.producer_cpu, Some(1));
   assert_eq!(config.consumer_cpu, None);

   std::env::set_var("QUEUE_BENCH_CAPACITY", "lots");
   assert_eq!(
      BenchConfig::from_env().unwrap_err(),
      ConfigError::InvalidEnv { name: "QUEUE_BENCH_CAPACITY", value: "lots".into() }
   );

   std::env::set_var("QUEUE_BENCH_CAPACITY", "256");
   std::env::set_var("QUEUE_BENCH_BACKOFF", "maybe");
   assert!(matches!(
      BenchConfig::from_env(),
      Err(ConfigError::InvalidEnv { name: "QUEUE_BENCH_BACKOFF", .. })
   ));

   for var in vars {
      std::env::remove_var(var);
   }
}

#[test]
fn corrupted_value_reported_out_of_order() {
   let err = harness::run::<CorruptingQueue>(&BenchConfig::new(10_000, 16)).unwrap_err();
   assert!(
      matches!(err, BenchError::OutOfOrder { expected: 5, got: 4 }),
      "got {err:?}"
   );
}

// The producer is stuck on a full queue when the consumer dies; the run must
// still return instead of hanging in join.
#[test]
fn consumer_panic_reported_without_hang() {
   let err = harness::run::<PanickingPopQueue>(&BenchConfig::new(10_000, 16)).unwrap_err();
   assert!(matches!(err, BenchError::ThreadPanicked("consumer")), "got {err:?}");
}

#[test]
fn producer_panic_reported_without_hang() {
   let err = harness::run::<PanickingPushQueue>(&BenchConfig::new(10_000, 16)).unwrap_err();
   assert!(matches!(err, BenchError::ThreadPanicked("producer")), "got {err:?}");
}

#[test]
fn failure_paths_also_release_backoff_retries() {
   let config = BenchConfig::new(10_000, 2).with_retry(RetryPolicy::Backoff);
   let err = harness::run::<PanickingPopQueue>(&config).unwrap_err();
   assert!(matches!(err, BenchError::ThreadPanicked("consumer")), "got {err:?}");
}
