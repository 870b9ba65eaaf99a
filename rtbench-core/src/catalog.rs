use std::time::Duration;

use bytes::Bytes;
use rand::Rng;

use crate::error::{Error, Result};

pub const DEFAULT_WORKLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum WorkloadMethod {
    #[default]
    Get,
    Post,
}

impl From<WorkloadMethod> for http::Method {
    fn from(m: WorkloadMethod) -> Self {
        match m {
            WorkloadMethod::Get => http::Method::GET,
            WorkloadMethod::Post => http::Method::POST,
        }
    }
}

/// A request template exercised against every target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadDefinition {
    pub path: String,
    /// Label used in reports; defaults to `path`.
    pub name: String,
    pub category: String,
    pub weight: u32,
    pub timeout: Duration,
    pub method: WorkloadMethod,
    pub body: Option<Bytes>,
}

impl WorkloadDefinition {
    pub fn get(path: &str, category: &str, weight: u32) -> Self {
        Self {
            path: path.to_string(),
            name: path.to_string(),
            category: category.to_string(),
            weight,
            timeout: DEFAULT_WORKLOAD_TIMEOUT,
            method: WorkloadMethod::Get,
            body: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: WorkloadMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Weighted workloads, grouped by category.
///
/// Selection walks the cumulative weights in registration order, so a given random stream
/// always yields the same sequence of workloads.
#[derive(Debug, Clone, Default)]
pub struct WorkloadCatalog {
    workloads: Vec<WorkloadDefinition>,
    cumulative: Vec<u64>,
    categories: Vec<String>,
}

impl WorkloadCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, workload: WorkloadDefinition) -> Result<()> {
        if workload.weight == 0 {
            return Err(Error::InvalidWeight(workload.name));
        }

        if !self.categories.contains(&workload.category) {
            self.categories.push(workload.category.clone());
        }

        let total = self.total_weight() + u64::from(workload.weight);
        self.cumulative.push(total);
        self.workloads.push(workload);
        Ok(())
    }

    /// Draws one workload with probability proportional to its weight.
    pub fn pick_weighted<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&WorkloadDefinition> {
        let total = self.total_weight();
        if total == 0 {
            return Err(Error::EmptyCatalog);
        }

        let r = rng.gen_range(0..total);
        let idx = self.cumulative.partition_point(|&end| end <= r);
        self.workloads.get(idx).ok_or(Error::EmptyCatalog)
    }

    pub fn total_weight(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Categories in first-registration order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn in_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a WorkloadDefinition> + 'a {
        self.workloads.iter().filter(move |w| w.category == category)
    }

    pub fn all(&self) -> &[WorkloadDefinition] {
        &self.workloads
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}
