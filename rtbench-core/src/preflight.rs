use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest};
use crate::registry::TargetRegistry;

pub const DEFAULT_PREFLIGHT_PATH: &str = "/api/health-check";
pub const DEFAULT_PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(5);

/// Health probe sent to every target before load starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
    pub path: String,
    pub timeout: Duration,
    /// Abort the run when any target is unhealthy.
    pub required: bool,
}

impl Default for Preflight {
    fn default() -> Self {
        Self {
            path: DEFAULT_PREFLIGHT_PATH.to_string(),
            timeout: DEFAULT_PREFLIGHT_TIMEOUT,
            required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetHealth {
    pub target: String,
    pub healthy: bool,
    /// HTTP status, or `None` when the probe got no response.
    pub status: Option<u16>,
    pub latency: Duration,
    pub error: Option<String>,
}

/// Probes every target concurrently and reports their health in registration order.
pub async fn check_targets(
    client: &HttpClient,
    targets: &TargetRegistry,
    preflight: &Preflight,
) -> Vec<TargetHealth> {
    let mut set = tokio::task::JoinSet::new();
    for (idx, target) in targets.all().iter().enumerate() {
        let client = client.clone();
        let name = target.name.clone();
        let req = HttpRequest::get(&target.url_for(&preflight.path)).with_timeout(preflight.timeout);
        set.spawn(async move {
            let started = std::time::Instant::now();
            let res = client.request(req).await;
            let latency = started.elapsed();
            let health = match res {
                Ok(res) => TargetHealth {
                    target: name,
                    healthy: (200..300).contains(&res.status),
                    status: Some(res.status),
                    latency,
                    error: None,
                },
                Err(err) => TargetHealth {
                    target: name,
                    healthy: false,
                    status: None,
                    latency,
                    error: Some(err.to_string()),
                },
            };
            (idx, health)
        });
    }

    let mut out: Vec<(usize, TargetHealth)> = Vec::with_capacity(targets.len());
    while let Some(res) = set.join_next().await {
        match res {
            Ok(entry) => out.push(entry),
            Err(err) => tracing::warn!(error = %err, "preflight probe task failed"),
        }
    }
    out.sort_by_key(|(idx, _)| *idx);
    out.into_iter().map(|(_, h)| h).collect()
}

/// Runs the probe, logs each target, and fails when a required probe is unhealthy.
pub async fn run_preflight(
    client: &HttpClient,
    targets: &TargetRegistry,
    preflight: &Preflight,
) -> Result<Vec<TargetHealth>> {
    let report = check_targets(client, targets, preflight).await;

    for h in &report {
        if h.healthy {
            tracing::info!(
                target_name = %h.target,
                status = ?h.status,
                latency_ms = h.latency.as_secs_f64() * 1000.0,
                "target ready"
            );
        } else {
            tracing::warn!(
                target_name = %h.target,
                status = ?h.status,
                error = h.error.as_deref().unwrap_or(""),
                "target not ready"
            );
        }
    }

    let unhealthy: Vec<String> = report
        .iter()
        .filter(|h| !h.healthy)
        .map(|h| h.target.clone())
        .collect();
    if preflight.required && !unhealthy.is_empty() {
        return Err(Error::PreflightFailed(unhealthy));
    }

    Ok(report)
}
