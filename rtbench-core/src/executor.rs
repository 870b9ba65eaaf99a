use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rtbench_metrics::SampleResult;

use crate::catalog::WorkloadDefinition;
use crate::checks::failed_checks;
use crate::http::{Error as HttpError, HttpClient, HttpRequest, estimate_http_request_bytes};
use crate::registry::Target;

/// Performs one (target, workload) exchange and describes its outcome.
///
/// Implementations never touch shared metrics; the caller records the returned sample.
pub trait Executor: Send + Sync + 'static {
    fn execute(
        &self,
        target: &Target,
        workload: &WorkloadDefinition,
    ) -> impl Future<Output = SampleResult> + Send;
}

/// Sample skeleton for `target`/`workload`, filled in by the executor.
///
/// Response checks start out passed; executors that evaluate them fill `failed_checks`.
pub fn blank_sample(target: &Target, workload: &WorkloadDefinition, started: Instant) -> SampleResult {
    SampleResult {
        target: Arc::from(target.name.as_str()),
        workload_path: Arc::from(workload.path.as_str()),
        endpoint: Arc::from(workload.name.as_str()),
        category: Arc::from(workload.category.as_str()),
        started,
        latency: Duration::ZERO,
        http_status: 0,
        success: false,
        body_len: 0,
        bytes_sent: 0,
        bytes_received: 0,
        error: None,
        failed_checks: Vec::new(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpExecutor {
    client: HttpClient,
}

impl HttpExecutor {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn request_for(target: &Target, workload: &WorkloadDefinition) -> HttpRequest {
        HttpRequest {
            method: workload.method.into(),
            url: target.url_for(&workload.path),
            body: workload.body.clone().unwrap_or_default(),
            timeout: Some(workload.timeout),
        }
    }
}

impl Executor for HttpExecutor {
    async fn execute(&self, target: &Target, workload: &WorkloadDefinition) -> SampleResult {
        let req = Self::request_for(target, workload);
        let estimated_sent = estimate_http_request_bytes(&req).unwrap_or(0);

        let started = Instant::now();
        let res = self.client.request(req).await;
        let elapsed = started.elapsed();

        let mut sample = blank_sample(target, workload, started);
        match res {
            Ok(res) => {
                sample.latency = elapsed;
                sample.http_status = res.status;
                sample.success = (200..300).contains(&res.status);
                sample.body_len = res.body.len() as u64;
                sample.bytes_sent = res.bytes_sent;
                sample.bytes_received = res.bytes_received;
            }
            Err(err) => {
                // A timed-out exchange is charged the full deadline.
                sample.latency = match err {
                    HttpError::Timeout(timeout) => timeout,
                    _ => elapsed,
                };
                sample.error = Some(err.transport_error_kind().into());
                if matches!(err, HttpError::Timeout(_)) {
                    sample.bytes_sent = estimated_sent;
                }
                tracing::debug!(
                    target_name = %target.name,
                    path = %workload.path,
                    error = %err,
                    "request failed"
                );
            }
        }
        sample.failed_checks = failed_checks(sample.http_status, sample.body_len, sample.latency);
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtbench_testserver::{PATH_EMPTY, PATH_ERROR, PATH_HEALTH_CHECK, PATH_STATIC, TestServer};

    #[tokio::test]
    async fn connection_refused_is_a_failed_sample() {
        // Bind then drop a listener to get a port nothing is listening on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .map(|a| a.port())
            .unwrap_or_else(|e| panic!("{e}"));

        let target = Target {
            name: "down".to_string(),
            base_address: format!("http://127.0.0.1:{port}"),
        };
        let workload = WorkloadDefinition::get("/api/static", "basic", 1)
            .with_timeout(Duration::from_secs(2));

        let sample = HttpExecutor::default().execute(&target, &workload).await;
        assert!(!sample.success);
        assert_eq!(sample.http_status, 0);
        assert_eq!(sample.error, Some("request"));
        assert_eq!(&*sample.target, "down");
        assert_eq!(&*sample.category, "basic");
        assert_eq!(sample.failed_checks, ["status_ok", "has_content"]);
    }

    async fn fetch(server: &TestServer, path: &str) -> SampleResult {
        let target = Target {
            name: "local".to_string(),
            base_address: server.base_url().to_string(),
        };
        let workload = WorkloadDefinition::get(path, "basic", 1);
        HttpExecutor::default().execute(&target, &workload).await
    }

    #[tokio::test]
    async fn response_checks_flag_empty_bodies_and_bad_statuses() {
        let server = TestServer::start()
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let ok = fetch(&server, PATH_STATIC).await;
        assert!(ok.success);
        assert!(ok.checks_passed());

        let no_content = fetch(&server, PATH_HEALTH_CHECK).await;
        assert_eq!(no_content.http_status, 204);
        assert!(no_content.checks_passed());

        let empty = fetch(&server, PATH_EMPTY).await;
        assert!(empty.success);
        assert_eq!(empty.body_len, 0);
        assert_eq!(empty.failed_checks, ["has_content"]);

        let error = fetch(&server, PATH_ERROR).await;
        assert!(!error.success);
        assert_eq!(error.failed_checks, ["status_ok"]);

        server.shutdown().await;
    }
}
