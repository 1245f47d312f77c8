pub mod benchmark;
pub mod config;
pub mod data;
pub mod report;

pub use benchmark::{BenchmarkOutcome, BenchmarkPlan, BenchmarkStore, CrawlMode, run_benchmarks};
pub use config::Settings;
pub use data::{RunRecord, SqliteGraphStore};
pub use report::generate_benchmark_report;
