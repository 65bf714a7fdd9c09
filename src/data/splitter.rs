// ============================================================
// Layer 4 — K-Fold Splitter
// ============================================================
// Assigns every sample to one of K folds and, within the
// training pool of a fold, to one of P labelled partitions.
//
//   1. Shuffle the sample indices with a seeded RNG
//   2. Position p of the shuffled order belongs to fold p % K
//   3. Fold k validation = every sample of fold k
//   4. The remaining pool is cut into P contiguous partitions;
//      stage s trains on partitions 0 .. min(s, P)
//
// So each new branch sees one more partition than the previous
// one, and the validation set never changes within a fold.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom with a
// StdRng seeded from the experiment seed, so the assignment is
// identical across runs.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

#[derive(Debug, Clone)]
pub struct KFoldSplitter {
    order:      Vec<usize>,
    num_folds:  usize,
    partitions: usize,
}

impl KFoldSplitter {
    pub fn new(num_samples: usize, num_folds: usize, partitions: usize, seed: u64) -> Self {
        let mut order: Vec<usize> = (0..num_samples).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);
        Self {
            order,
            num_folds:  num_folds.max(1),
            partitions: partitions.max(1),
        }
    }

    pub fn num_folds(&self) -> usize {
        self.num_folds
    }

    /// Sample indices of the validation split of `fold`.
    pub fn validation(&self, fold: usize) -> Vec<usize> {
        self.order
            .iter()
            .enumerate()
            .filter(|(p, _)| p % self.num_folds == fold)
            .map(|(_, &i)| i)
            .collect()
    }

    /// Sample indices of the labelled training split of `fold` at 1-based `stage`.
    pub fn training(&self, fold: usize, stage: usize) -> Vec<usize> {
        let pool: Vec<usize> = self
            .order
            .iter()
            .enumerate()
            .filter(|(p, _)| p % self.num_folds != fold)
            .map(|(_, &i)| i)
            .collect();

        let used = stage.clamp(1, self.partitions);
        let end  = used * pool.len() / self.partitions;

        tracing::debug!(
            "Fold {} stage {}: {} of {} pooled samples labelled ({} / {} partitions)",
            fold + 1,
            stage,
            end,
            pool.len(),
            used,
            self.partitions,
        );

        pool[..end].to_vec()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_validation_folds_cover_everything_once() {
        let s = KFoldSplitter::new(103, 10, 4, 7);
        let mut seen = HashSet::new();
        for fold in 0..10 {
            for i in s.validation(fold) {
                assert!(seen.insert(i), "sample {i} in two folds");
            }
        }
        assert_eq!(seen.len(), 103);
    }

    #[test]
    fn test_training_never_overlaps_validation() {
        let s = KFoldSplitter::new(60, 10, 4, 1);
        for fold in 0..10 {
            let val: HashSet<usize> = s.validation(fold).into_iter().collect();
            for stage in 1..=4 {
                assert!(s.training(fold, stage).iter().all(|i| !val.contains(i)));
            }
        }
    }

    #[test]
    fn test_stages_add_partitions() {
        // 10 folds of 100 → pool of 90 per fold, 4 partitions.
        let s = KFoldSplitter::new(100, 10, 4, 3);
        let sizes: Vec<usize> = (1..=5).map(|stage| s.training(0, stage).len()).collect();
        assert_eq!(sizes, vec![22, 45, 67, 90, 90]);

        // Each stage's set extends the previous one.
        let two = s.training(0, 2);
        let three = s.training(0, 3);
        assert_eq!(&three[..two.len()], two.as_slice());
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let a = KFoldSplitter::new(50, 5, 2, 42);
        let b = KFoldSplitter::new(50, 5, 2, 42);
        assert_eq!(a.validation(3), b.validation(3));
        assert_eq!(a.training(3, 1), b.training(3, 1));
    }

    #[test]
    fn test_empty_dataset() {
        let s = KFoldSplitter::new(0, 10, 4, 0);
        assert!(s.validation(0).is_empty());
        assert!(s.training(0, 1).is_empty());
    }
}
