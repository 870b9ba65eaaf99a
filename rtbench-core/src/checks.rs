use std::time::Duration;

/// Latency above which a response fails [`ResponseCheck::FastResponse`].
pub const SLOW_RESPONSE_LIMIT: Duration = Duration::from_secs(5);

/// Per-response assertion evaluated by [`crate::HttpExecutor`].
///
/// Unlike `success` (any 2xx), checks encode what a healthy benchmark endpoint must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ResponseCheck {
    /// Status is 200 or 204.
    StatusOk,
    /// Body is non-empty, unless the status is 204.
    HasContent,
    /// Latency stays under [`SLOW_RESPONSE_LIMIT`].
    FastResponse,
}

impl ResponseCheck {
    pub const ALL: [ResponseCheck; 3] = [Self::StatusOk, Self::HasContent, Self::FastResponse];

    pub fn passes(self, status: u16, body_len: u64, latency: Duration) -> bool {
        match self {
            Self::StatusOk => matches!(status, 200 | 204),
            Self::HasContent => body_len > 0 || status == 204,
            Self::FastResponse => latency < SLOW_RESPONSE_LIMIT,
        }
    }
}

/// Names of the checks an exchange fails. A transport failure is passed as status `0`.
pub fn failed_checks(status: u16, body_len: u64, latency: Duration) -> Vec<&'static str> {
    ResponseCheck::ALL
        .into_iter()
        .filter(|c| !c.passes(status, body_len, latency))
        .map(Into::into)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: Duration = Duration::from_millis(3);

    #[test]
    fn ok_and_no_content_responses_pass() {
        assert!(failed_checks(200, 12, FAST).is_empty());
        assert!(failed_checks(204, 0, FAST).is_empty());
    }

    #[test]
    fn empty_ok_body_fails_content_check_only() {
        assert_eq!(failed_checks(200, 0, FAST), ["has_content"]);
    }

    #[test]
    fn other_statuses_fail_even_when_successful() {
        assert_eq!(failed_checks(201, 5, FAST), ["status_ok"]);
        assert_eq!(failed_checks(500, 5, FAST), ["status_ok"]);
    }

    #[test]
    fn transport_failure_fails_status_and_content() {
        assert_eq!(failed_checks(0, 0, FAST), ["status_ok", "has_content"]);
    }

    #[test]
    fn slow_response_fails_at_the_limit() {
        assert_eq!(failed_checks(200, 1, SLOW_RESPONSE_LIMIT), ["fast_response"]);
        assert!(failed_checks(200, 1, SLOW_RESPONSE_LIMIT - Duration::from_nanos(1)).is_empty());
    }
}
