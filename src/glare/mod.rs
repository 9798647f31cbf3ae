//! Glare detection: angular lattices, the batched hit test, period
//! aggregation and statistics.

pub mod detector;
pub mod grid;
pub mod periods;
pub mod stats;

pub use detector::{DetectorSettings, GlareDetector, GlareEvent, ReflectionSeries};
pub use grid::{AngularGrid, AngularGridBuilder, AngularGridPoint};
pub use periods::{GlarePeriod, PeriodAggregator};
pub use stats::{GlareStatistics, GlareSummary};
