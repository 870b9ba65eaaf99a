pub mod aggregator;
pub mod bucket;
pub mod error;
pub mod histogram;
pub mod key;
pub mod sample;
pub mod stats;
pub mod summary;

pub use aggregator::Aggregator;
pub use error::{Error, Result};
pub use histogram::LATENCY_PERCENTILE_RELATIVE_ERROR;
pub use key::KeyId;
pub use sample::SampleResult;
pub use stats::{RunningStats, per_sec};
pub use summary::{
    BucketSummary, CategorySummary, EndpointSummary, LatencySummary, RpsSummary, RunSummary,
    SeriesStats, TargetSummary,
};
