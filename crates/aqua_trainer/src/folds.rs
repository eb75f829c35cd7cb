//! Seeded k-fold assignment, plain or stratified by group

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::errors::CvError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldStrategy {
    /// Shuffle once, cut into consecutive folds
    Shuffled,
    /// Deal each group's rows round-robin across folds
    Stratified,
}

/// One fold: rows to fit on and rows held out, both sorted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldSplitter {
    pub n_folds: usize,
    pub seed: u64,
    pub strategy: FoldStrategy,
}

impl FoldSplitter {
    pub fn new(n_folds: usize, seed: u64) -> Self {
        Self {
            n_folds,
            seed,
            strategy: FoldStrategy::Shuffled,
        }
    }

    pub fn stratified(mut self, enabled: bool) -> Self {
        self.strategy = if enabled {
            FoldStrategy::Stratified
        } else {
            FoldStrategy::Shuffled
        };
        self
    }

    /// Assign `groups.len()` rows to folds. Fold sizes differ by at most one,
    /// the first `n % k` folds being the larger ones.
    pub fn split(&self, groups: &[String]) -> Result<Vec<Fold>, CvError> {
        let n = groups.len();
        let k = self.n_folds;
        if k < 2 || k > n {
            return Err(CvError::InvalidFolds { folds: k, rows: n });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut validation: Vec<Vec<usize>> = vec![Vec::new(); k];

        match self.strategy {
            FoldStrategy::Shuffled => {
                let mut order: Vec<usize> = (0..n).collect();
                order.shuffle(&mut rng);
                let mut start = 0;
                for (fold, rows) in validation.iter_mut().enumerate() {
                    let size = n / k + usize::from(fold < n % k);
                    rows.extend_from_slice(&order[start..start + size]);
                    start += size;
                }
            }
            FoldStrategy::Stratified => {
                let mut by_group: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
                for (row, group) in groups.iter().enumerate() {
                    by_group.entry(group.as_str()).or_default().push(row);
                }
                // Dealing continues across groups so totals stay balanced.
                let mut position = 0;
                for rows in by_group.values_mut() {
                    rows.shuffle(&mut rng);
                    for &row in rows.iter() {
                        validation[position % k].push(row);
                        position += 1;
                    }
                }
            }
        }

        let mut fold_of = vec![0; n];
        for (fold, rows) in validation.iter_mut().enumerate() {
            rows.sort_unstable();
            for &row in rows.iter() {
                fold_of[row] = fold;
            }
        }

        Ok(validation
            .into_iter()
            .enumerate()
            .map(|(index, validation)| Fold {
                index,
                train: (0..n).filter(|&row| fold_of[row] != index).collect(),
                validation,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn groups(n: usize, distinct: usize) -> Vec<String> {
        (0..n).map(|i| format!("G{}", i % distinct)).collect()
    }

    #[test]
    fn test_first_folds_are_larger() {
        let folds = FoldSplitter::new(5, 42).split(&groups(23, 1)).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.validation.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);
    }

    #[test]
    fn test_invalid_fold_counts() {
        assert!(FoldSplitter::new(1, 42).split(&groups(10, 1)).is_err());
        assert!(FoldSplitter::new(11, 42).split(&groups(10, 1)).is_err());
    }

    #[test]
    fn test_stratified_spreads_each_group() {
        let g = groups(40, 4);
        let folds = FoldSplitter::new(5, 3).stratified(true).split(&g).unwrap();
        for fold in &folds {
            assert_eq!(fold.validation.len(), 8);
            for code in ["G0", "G1", "G2", "G3"] {
                let count = fold.validation.iter().filter(|&&r| g[r] == code).count();
                assert_eq!(count, 2, "fold {} group {}", fold.index, code);
            }
        }
    }

    #[test]
    fn test_seed_changes_assignment() {
        let g = groups(30, 1);
        let a = FoldSplitter::new(3, 1).split(&g).unwrap();
        let b = FoldSplitter::new(3, 1).split(&g).unwrap();
        let c = FoldSplitter::new(3, 2).split(&g).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn prop_every_row_held_out_once(
            n in 2usize..80,
            k in 2usize..8,
            distinct in 1usize..5,
            seed in any::<u64>(),
            stratified in any::<bool>(),
        ) {
            prop_assume!(k <= n);
            let folds = FoldSplitter::new(k, seed).stratified(stratified).split(&groups(n, distinct)).unwrap();
            let mut seen = vec![0usize; n];
            for fold in &folds {
                for &row in &fold.validation {
                    seen[row] += 1;
                    prop_assert!(!fold.train.contains(&row));
                }
                prop_assert_eq!(fold.train.len() + fold.validation.len(), n);
            }
            prop_assert!(seen.iter().all(|&c| c == 1));

            let sizes: Vec<usize> = folds.iter().map(|f| f.validation.len()).collect();
            let max = *sizes.iter().max().unwrap();
            let min = *sizes.iter().min().unwrap();
            prop_assert!(max - min <= 1);
        }
    }
}
