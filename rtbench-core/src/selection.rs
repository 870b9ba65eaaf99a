use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::registry::Target;

/// How each iteration picks its target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum TargetSelection {
    /// Shared cursor across all VUs; every target gets an equal share in order.
    #[default]
    RoundRobin,
    /// Uniform draw from the VU's own random stream.
    Random,
}

/// Run-wide target picker.
#[derive(Debug)]
pub(crate) struct TargetPicker {
    mode: TargetSelection,
    cursor: AtomicUsize,
}

impl TargetPicker {
    pub(crate) fn new(mode: TargetSelection) -> Self {
        Self {
            mode,
            cursor: AtomicUsize::new(0),
        }
    }

    /// `None` only when `targets` is empty.
    pub(crate) fn pick<'a, R: Rng + ?Sized>(
        &self,
        targets: &'a [Target],
        rng: &mut R,
    ) -> Option<&'a Target> {
        if targets.is_empty() {
            return None;
        }
        let idx = match self.mode {
            TargetSelection::RoundRobin => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % targets.len()
            }
            TargetSelection::Random => rng.gen_range(0..targets.len()),
        };
        targets.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn targets() -> Vec<Target> {
        ["swoole", "phpfpm", "frankenphp"]
            .iter()
            .enumerate()
            .map(|(i, name)| Target {
                name: name.to_string(),
                base_address: format!("http://127.0.0.1:{}", 8001 + i),
            })
            .collect()
    }

    #[test]
    fn round_robin_cycles_in_registration_order() {
        let t = targets();
        let picker = TargetPicker::new(TargetSelection::RoundRobin);
        let mut rng = StdRng::seed_from_u64(0);
        let names: Vec<&str> = (0..6)
            .filter_map(|_| picker.pick(&t, &mut rng))
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(
            names,
            ["swoole", "phpfpm", "frankenphp", "swoole", "phpfpm", "frankenphp"]
        );
    }

    #[test]
    fn random_selection_covers_every_target() {
        let t = targets();
        let picker = TargetPicker::new(TargetSelection::Random);
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            let picked = picker
                .pick(&t, &mut rng)
                .unwrap_or_else(|| panic!("expected a target"));
            let idx = t.iter().position(|x| x.name == picked.name).unwrap_or(0);
            seen[idx] += 1;
        }
        assert!(seen.iter().all(|&n| n > 50));
    }

    #[test]
    fn selection_parses_from_kebab_case() {
        let s: TargetSelection = "round-robin".parse().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(s, TargetSelection::RoundRobin);
        assert_eq!(TargetSelection::Random.to_string(), "random");
    }
}
