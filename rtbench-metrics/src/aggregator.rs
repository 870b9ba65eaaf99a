use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, RwLock};

use crate::bucket::{Bucket, BucketKey, Series};
use crate::error::{Error, Result};
use crate::histogram::LATENCY_PERCENTILE_RELATIVE_ERROR;
use crate::key::{Interner, KeyId};
use crate::sample::SampleResult;
use crate::stats::RunningStats;
use crate::summary::{
    BucketSummary, CategorySummary, EndpointSummary, RpsSummary, RunSummary, TargetSummary,
};

#[derive(Debug, Default, Clone, Copy)]
struct RunWindow {
    started: Option<Instant>,
    finished: Option<Instant>,
}

/// Thread-safe store of per-(target, category) buckets.
///
/// `record` may be called from any number of tasks. Each call updates exactly one bucket
/// under that bucket's mutex while holding the shared side of an aggregator-wide gate.
/// `snapshot` takes the exclusive side of the gate, so it never observes a half-applied
/// sample and the set of buckets it sees is fixed for its duration.
#[derive(Debug)]
pub struct Aggregator {
    interner: Interner,
    gate: RwLock<()>,
    buckets: DashMap<BucketKey, Arc<Mutex<Bucket>>, ahash::RandomState>,
    targets: Mutex<Vec<KeyId>>,
    window: Mutex<RunWindow>,
    rps: Mutex<RunningStats>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            gate: RwLock::new(()),
            buckets: DashMap::with_hasher(ahash::RandomState::new()),
            targets: Mutex::new(Vec::new()),
            window: Mutex::new(RunWindow::default()),
            rps: Mutex::new(RunningStats::default()),
        }
    }

    /// Makes `target` appear in every snapshot, even if it never records a sample.
    pub fn declare_target(&self, target: &str) {
        let id = self.interner.get_or_intern(target);
        self.note_target(id);
    }

    pub fn mark_started(&self) {
        let mut w = self.window.lock();
        w.started.get_or_insert_with(Instant::now);
    }

    pub fn mark_finished(&self) {
        let mut w = self.window.lock();
        w.finished.get_or_insert_with(Instant::now);
    }

    pub fn record_rps_sample(&self, rps: f64) {
        self.rps.lock().push(rps);
    }

    /// Folds one sample into its (target, category) bucket.
    pub fn record(&self, sample: SampleResult) {
        let _gate = self.gate.read();

        let key = BucketKey {
            target: self.interner.get_or_intern(&sample.target),
            category: self.interner.get_or_intern(&sample.category),
        };
        let endpoint = self.interner.get_or_intern(&sample.endpoint);

        let bucket = match self.buckets.get(&key) {
            Some(b) => b.value().clone(),
            None => match self.buckets.entry(key) {
                Entry::Occupied(e) => e.get().clone(),
                Entry::Vacant(e) => {
                    self.note_target(key.target);
                    e.insert(Arc::new(Mutex::new(Bucket::new()))).value().clone()
                }
            },
        };

        bucket.lock().record(endpoint, &sample);
    }

    /// Total samples recorded so far. Cheap enough for once-per-second progress ticks.
    pub fn request_count(&self) -> (u64, u64) {
        let _gate = self.gate.read();
        self.buckets.iter().fold((0, 0), |(req, err), b| {
            let b = b.value().lock();
            (req + b.series.count, err + b.series.errors)
        })
    }

    pub fn snapshot(&self) -> Result<RunSummary> {
        let _gate = self.gate.write();

        let mut entries: Vec<(BucketKey, Arc<Mutex<Bucket>>)> = self
            .buckets
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let target_order: Vec<KeyId> = self.targets.lock().clone();
        let rank: HashMap<KeyId, usize> = target_order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        let category_name = |id: KeyId| self.interner.name(id);
        entries.sort_by(|(a, _), (b, _)| {
            let ra = rank.get(&a.target).copied().unwrap_or(usize::MAX);
            let rb = rank.get(&b.target).copied().unwrap_or(usize::MAX);
            ra.cmp(&rb)
                .then_with(|| category_name(a.category).cmp(&category_name(b.category)))
        });

        let elapsed = self.elapsed(&entries);
        let secs = elapsed.as_secs_f64();

        let mut buckets = Vec::with_capacity(entries.len());
        let mut endpoints = Vec::new();
        let mut per_target: HashMap<KeyId, Series> = HashMap::new();
        let mut per_category: BTreeMap<String, Series> = BTreeMap::new();
        let mut totals = Series::new();

        for (key, bucket) in &entries {
            let b = bucket.lock();
            let target = self.interner.name(key.target);
            let category = self.interner.name(key.category);

            if let Some(detail) = b.inconsistency() {
                return Err(Error::AggregationConsistency {
                    target,
                    category,
                    detail,
                });
            }

            let merge_err = |detail: String| Error::AggregationConsistency {
                target: target.clone(),
                category: category.clone(),
                detail,
            };
            per_target
                .entry(key.target)
                .or_insert_with(Series::new)
                .merge(&b.series)
                .map_err(merge_err)?;
            per_category
                .entry(category.clone())
                .or_insert_with(Series::new)
                .merge(&b.series)
                .map_err(merge_err)?;
            totals.merge(&b.series).map_err(merge_err)?;

            let mut rows: Vec<EndpointSummary> = b
                .endpoints
                .iter()
                .map(|(id, tally)| EndpointSummary {
                    target: target.clone(),
                    category: category.clone(),
                    endpoint: self.interner.name(*id),
                    path: tally.path.to_string(),
                    stats: tally.series.to_stats(secs),
                })
                .collect();
            rows.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
            endpoints.extend(rows);

            buckets.push(BucketSummary {
                target,
                category,
                stats: b.series.to_stats(secs),
            });
        }

        let targets = target_order
            .iter()
            .map(|id| TargetSummary {
                target: self.interner.name(*id),
                stats: per_target
                    .get(id)
                    .map(|s| s.to_stats(secs))
                    .unwrap_or_default(),
            })
            .collect();

        let categories = per_category
            .into_iter()
            .map(|(category, s)| CategorySummary {
                category,
                stats: s.to_stats(secs),
            })
            .collect();

        let rps = {
            let r = self.rps.lock();
            RpsSummary {
                samples: r.count(),
                avg: r.mean(),
                stdev: r.stdev(),
                max: r.max(),
            }
        };

        Ok(RunSummary {
            elapsed,
            latency_error_bound: LATENCY_PERCENTILE_RELATIVE_ERROR,
            buckets,
            targets,
            categories,
            endpoints,
            totals: totals.to_stats(secs),
            rps,
        })
    }

    fn note_target(&self, id: KeyId) {
        let mut targets = self.targets.lock();
        if !targets.contains(&id) {
            targets.push(id);
        }
    }

    /// Run window used for throughput. While the run is live the window ends at the latest
    /// recorded sample, so snapshots taken without new records agree with each other.
    fn elapsed(&self, entries: &[(BucketKey, Arc<Mutex<Bucket>>)]) -> Duration {
        let mut first: Option<Instant> = None;
        let mut last: Option<Instant> = None;
        for (_, bucket) in entries {
            let b = bucket.lock();
            if let Some(t) = b.first_started {
                first = Some(first.map_or(t, |f| f.min(t)));
            }
            if let Some(t) = b.last_finished {
                last = Some(last.map_or(t, |l| l.max(t)));
            }
        }

        let w = *self.window.lock();
        match (w.started, w.finished) {
            (Some(started), Some(finished)) => finished.saturating_duration_since(started),
            (Some(started), None) => {
                last.map_or(Duration::ZERO, |l| l.saturating_duration_since(started))
            }
            (None, _) => match (first, last) {
                (Some(f), Some(l)) => l.saturating_duration_since(f),
                _ => Duration::ZERO,
            },
        }
    }

    #[cfg(test)]
    fn corrupt_bucket_for_test(&self, target: &str, category: &str) {
        let key = BucketKey {
            target: self.interner.get_or_intern(target),
            category: self.interner.get_or_intern(category),
        };
        if let Some(b) = self.buckets.get(&key) {
            let mut b = b.value().lock();
            b.series.errors = b.series.count + 1;
        }
    }
}
