#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more thresholds failed.
    ThresholdsFailed = 11,

    /// Invalid CLI/config input (bad flags, unreadable config, invalid thresholds, failed preflight).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, aggregation inconsistencies, task failures).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_thresholds(thresholds_failed: bool) -> Self {
        if thresholds_failed {
            Self::ThresholdsFailed
        } else {
            Self::Success
        }
    }
}
