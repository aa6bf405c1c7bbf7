//! Cross-validation splitters

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CVStrategy {
    /// Contiguous folds in row order (optionally shuffled first)
    KFold { n_splits: usize, shuffle: bool },
    /// Folds preserving the class balance
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match *self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => n_splits,
        }
    }
}

/// A single train/test split; both index lists are ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Generate train/test splits for labels `y`
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(PipelineError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(PipelineError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let test_folds = match self.strategy {
            CVStrategy::KFold { shuffle, .. } => self.k_fold_assignment(n_samples, n_splits, shuffle),
            CVStrategy::StratifiedKFold { shuffle, .. } => self.stratified_assignment(y, n_splits, shuffle)?,
        };

        Ok((0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&i| test_folds[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Fold id per sample; the first `n % k` folds get one extra sample
    fn k_fold_assignment(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            order.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut test_folds = vec![0; n_samples];
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let size = if fold_idx < remainder { base + 1 } else { base };
            for &i in &order[current..current + size] {
                test_folds[i] = fold_idx;
            }
            current += size;
        }
        test_folds
    }

    /// Fold id per sample.
    ///
    /// The class-sorted label vector is dealt round-robin to decide how many
    /// samples of each class every fold receives; each class's samples (in row
    /// order) then fill fold 0 first, fold 1 next, and so on.
    fn stratified_assignment(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Result<Vec<usize>> {
        // Classes numbered by first appearance
        let mut class_ids: BTreeMap<i64, usize> = BTreeMap::new();
        let mut first_seen: Vec<i64> = Vec::new();
        for &v in y.iter() {
            let key = v.round() as i64;
            if !class_ids.contains_key(&key) {
                class_ids.insert(key, first_seen.len());
                first_seen.push(key);
            }
        }
        let encoded: Vec<usize> = y.iter().map(|&v| class_ids[&(v.round() as i64)]).collect();
        let n_classes = first_seen.len();

        let mut counts = vec![0usize; n_classes];
        for &c in &encoded {
            counts[c] += 1;
        }
        if counts.iter().all(|&c| c < n_splits) {
            return Err(PipelineError::ValidationError(format!(
                "n_splits={} cannot be greater than the number of members in each class",
                n_splits
            )));
        }

        let mut sorted = encoded.clone();
        sorted.sort_unstable();
        let mut allocation = vec![vec![0usize; n_classes]; n_splits];
        for (pos, &c) in sorted.iter().enumerate() {
            allocation[pos % n_splits][c] += 1;
        }

        let mut rng = if shuffle { Some(self.rng()) } else { None };
        let mut test_folds = vec![0; y.len()];
        for class in 0..n_classes {
            let mut folds_for_class: Vec<usize> = (0..n_splits)
                .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]))
                .collect();
            if let Some(rng) = rng.as_mut() {
                folds_for_class.shuffle(rng);
            }
            let members = encoded.iter().enumerate().filter(|(_, &c)| c == class).map(|(i, _)| i);
            for (i, fold) in members.zip(folds_for_class) {
                test_folds[i] = fold;
            }
        }
        Ok(test_folds)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    pub n_folds: usize,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds.max(1) as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds.max(1) as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let y = Array1::zeros(10);
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 3, shuffle: false });
        let splits = cv.split(&y).unwrap();

        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].test_indices, vec![4, 5, 6]);
        assert_eq!(splits[2].test_indices, vec![7, 8, 9]);
        assert_eq!(splits[1].train_indices, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_stratified_k_fold_balances_classes() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false });
        let splits = cv.split(&y).unwrap();

        assert_eq!(splits[0].test_indices, vec![0, 1, 6, 7]);
        assert_eq!(splits[1].test_indices, vec![2, 3, 8, 9]);
        assert_eq!(splits[2].test_indices, vec![4, 5, 10, 11]);

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_uneven_counts() {
        // 7 of class 1 then 4 of class 0
        let y = Array1::from_vec(vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false });
        let splits = cv.split(&y).unwrap();

        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 11);
        for split in &splits {
            let ones = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert!((2..=3).contains(&ones));
            for idx in &split.test_indices {
                assert!(!split.train_indices.contains(idx));
            }
        }
    }

    #[test]
    fn test_shuffled_split_is_seeded() {
        let y = Array1::from_vec((0..20).map(|i| (i % 2) as f64).collect());
        let strategy = CVStrategy::KFold { n_splits: 4, shuffle: true };
        let a = CrossValidator::new(strategy).with_random_state(9).split(&y).unwrap();
        let b = CrossValidator::new(strategy).with_random_state(9).split(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_samples() {
        let y = Array1::from_vec(vec![0.0, 1.0]);
        let cv = CrossValidator::new(CVStrategy::default());
        assert!(cv.split(&y).is_err());
    }

    #[test]
    fn test_cv_results() {
        let res = CVResults::from_scores(vec![0.5, 1.0]);
        assert!((res.mean_score - 0.75).abs() < 1e-12);
        assert!((res.std_score - 0.25).abs() < 1e-12);
        assert_eq!(res.n_folds, 2);
    }
}
