//! Random unit-mapping used by the widening transform.
//!
//! When a layer grows from `original_width` to `new_width` units, each new
//! index must decide which original unit it replicates. The mapping `g` is
//! the identity on existing indices and uniform-random on indices at or
//! beyond the original width; the replication counts derived from it drive
//! the outgoing-weight rescaling that keeps the composed function unchanged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Builds an RNG from an optional caller-supplied seed.
///
/// Transforms are pure given their inputs; the seed is the only stochastic
/// input, so a fixed seed reproduces a transformation bit for bit.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// The unit-mapping `g` together with its replication counts.
///
/// Generated fresh per widening call, never stored between calls.
#[derive(Debug, Clone)]
pub struct UnitMapping {
    targets: Vec<usize>,
    counts: Vec<usize>,
    original_width: usize,
}

impl UnitMapping {
    /// Generates `g` over `[0, new_width)`.
    ///
    /// Identity below `original_width`; uniform in `[0, original_width)` above.
    /// Callers must guarantee `0 < original_width < new_width`.
    pub fn generate(original_width: usize, new_width: usize, rng: &mut impl Rng) -> Self {
        debug_assert!(original_width > 0 && new_width > original_width);

        let mut targets = Vec::with_capacity(new_width);
        let mut counts = vec![0usize; original_width];

        for i in 0..new_width {
            let target = if i < original_width {
                i
            } else {
                rng.gen_range(0..original_width)
            };
            targets.push(target);
            counts[target] += 1;
        }

        Self {
            targets,
            counts,
            original_width,
        }
    }

    /// The original unit replicated by new index `i`.
    pub fn target(&self, i: usize) -> usize {
        self.targets[i]
    }

    /// All targets, indexed by new-width position.
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// How many new-width indices map onto original unit `unit` (always >= 1).
    pub fn replication(&self, unit: usize) -> usize {
        self.counts[unit]
    }

    pub fn original_width(&self) -> usize {
        self.original_width
    }

    pub fn new_width(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_on_original_indices() {
        let mut rng = StdRng::seed_from_u64(7);
        let mapping = UnitMapping::generate(32, 128, &mut rng);

        for i in 0..32 {
            assert_eq!(mapping.target(i), i);
        }
        for i in 32..128 {
            assert!(mapping.target(i) < 32);
        }
    }

    #[test]
    fn replication_counts_sum_to_new_width() {
        let mut rng = StdRng::seed_from_u64(7);
        let mapping = UnitMapping::generate(32, 128, &mut rng);

        let total: usize = (0..32).map(|u| mapping.replication(u)).sum();
        assert_eq!(total, 128);
        for u in 0..32 {
            assert!(mapping.replication(u) >= 1);
        }
    }

    #[test]
    fn same_seed_same_mapping() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);

        let first = UnitMapping::generate(8, 20, &mut a);
        let second = UnitMapping::generate(8, 20, &mut b);
        assert_eq!(first.targets(), second.targets());
    }
}
