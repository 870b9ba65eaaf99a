use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;

/// Think time inserted after each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    #[default]
    None,
    Fixed(Duration),
    /// Uniformly random in `[min, max]`.
    Uniform { min: Duration, max: Duration },
}

impl Pacing {
    pub fn delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => d,
            Self::Uniform { min, max } => {
                if max <= min {
                    return min;
                }
                let lo = min.as_nanos().min(u64::MAX as u128) as u64;
                let hi = max.as_nanos().min(u64::MAX as u128) as u64;
                Duration::from_nanos(rng.gen_range(lo..=hi))
            }
        }
    }
}

/// Per-category pacing with a fallback for categories that are not listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacingPolicy {
    pub default: Pacing,
    pub per_category: HashMap<String, Pacing>,
}

impl PacingPolicy {
    pub fn uniform(default: Pacing) -> Self {
        Self {
            default,
            per_category: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: &str, pacing: Pacing) -> Self {
        self.per_category.insert(category.to_string(), pacing);
        self
    }

    pub fn delay_for<R: Rng + ?Sized>(&self, category: &str, rng: &mut R) -> Duration {
        self.per_category
            .get(category)
            .unwrap_or(&self.default)
            .delay(rng)
    }
}
