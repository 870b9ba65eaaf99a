pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bucket was observed in a state that a correct `record` can never produce.
    #[error("aggregation consistency violated for bucket ({target}, {category}): {detail}")]
    AggregationConsistency {
        target: String,
        category: String,
        detail: String,
    },
}
