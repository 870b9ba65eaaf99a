pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("target `{0}` is already registered")]
    DuplicateTarget(String),

    #[error("unknown target `{0}`")]
    UnknownTarget(String),

    #[error("invalid base address for target `{name}`: `{address}` (expected an absolute http:// URL)")]
    InvalidTargetAddress { name: String, address: String },

    #[error("no targets registered")]
    NoTargets,

    #[error("workload catalog is empty")]
    EmptyCatalog,

    #[error("workload `{0}` must have a positive weight")]
    InvalidWeight(String),

    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("invalid `executor` (expected `constant-vus` or `ramping-vus`)")]
    InvalidExecutor,

    #[error("`stages` must be a non-empty array of {{ duration, target }} with a non-zero total duration")]
    InvalidStages,

    #[error("preflight failed for {}", .0.join(", "))]
    PreflightFailed(Vec<String>),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Metrics(#[from] rtbench_metrics::Error),
}

impl Error {
    /// `true` for errors raised while validating configuration, before any request is sent.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Join(_) | Self::Metrics(_))
    }
}
