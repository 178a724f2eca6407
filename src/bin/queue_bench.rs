//! Lock-free vs. locked SPSC throughput.
//!
//! Usage:
//!     cargo run --release --bin queue_bench
//!
//! Environment variables (also read from `.env`):
//!     QUEUE_BENCH_ITEMS=1000000   items pushed per run
//!     QUEUE_BENCH_CAPACITY=1024   ring capacity, power of two >= 2
//!     QUEUE_BENCH_BACKOFF=0       1 to back off on full/empty instead of spinning
//!     PRODUCER_CPU / CONSUMER_CPU pin the two threads (Linux only)
//!     RUST_LOG=info               log filter

use anyhow::Context;
use dotenv::dotenv;
use spsc_bench::{harness, BenchConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
   dotenv().ok();

   tracing_subscriber::registry()
      .with(
         tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info".into()),
      )
      .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
      .init();

   let config = BenchConfig::from_env().context("invalid benchmark configuration")?;
   tracing::info!(?config, "benchmarking");

   let reports = harness::run_all(&config).context("benchmark run failed")?;
   for report in &reports {
      println!("{report}");
   }

   if let [lock_free, locked] = reports.as_slice() {
      println!(
         "{} / {}: {:.2}x",
         lock_free.name,
         locked.name,
         lock_free.speedup_over(locked)
      );
   }
   Ok(())
}
