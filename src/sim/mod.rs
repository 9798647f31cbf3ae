/// Fixed-step UTC clock driving sun-position series.
pub mod clock;
/// Analysis engine, worker pool and cancellation.
pub mod engine;

pub use engine::{AnalysisEngine, AnalysisReport, CancellationToken};
