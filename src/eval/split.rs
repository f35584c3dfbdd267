//! Train/test splitters for outer and inner folds

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// (train indices, test indices)
pub type Fold = (Vec<usize>, Vec<usize>);

fn shuffled(n_samples: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    indices
}

/// K-Fold cross-validation splitter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    /// Create a new KFold splitter
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits, shuffle: true, seed: 42 }
    }

    /// Set random seed for shuffling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Disable shuffling
    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate train/test indices for each fold.
    ///
    /// Test partitions are disjoint and cover every sample; the first
    /// `n_samples % n_splits` folds get one extra sample.
    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(Error::Configuration(format!(
                "KFold needs at least 2 splits, got {}",
                self.n_splits
            )));
        }
        if n_samples < self.n_splits {
            return Err(Error::InvalidData(format!(
                "cannot split {n_samples} samples into {} folds",
                self.n_splits
            )));
        }

        let indices = if self.shuffle {
            shuffled(n_samples, self.seed)
        } else {
            (0..n_samples).collect()
        };

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let end = start + fold_size + usize::from(i < remainder);
            let test_indices = indices[start..end].to_vec();
            let train_indices: Vec<usize> =
                indices[..start].iter().chain(indices[end..].iter()).copied().collect();
            folds.push((train_indices, test_indices));
            start = end;
        }
        Ok(folds)
    }
}

/// Single shuffled train/test split
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoldoutSplit {
    test_size: f64,
    seed: u64,
}

impl HoldoutSplit {
    /// `test_size` is the fraction of samples held out, in (0, 1)
    pub fn new(test_size: f64) -> Self {
        Self { test_size, seed: 42 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(Error::Configuration(format!(
                "test_size must lie in (0, 1), got {}",
                self.test_size
            )));
        }
        if n_samples < 2 {
            return Err(Error::InvalidData(format!("cannot hold out from {n_samples} samples")));
        }
        let n_test = ((n_samples as f64 * self.test_size).ceil() as usize).clamp(1, n_samples - 1);
        let indices = shuffled(n_samples, self.seed);
        let test = indices[..n_test].to_vec();
        let train = indices[n_test..].to_vec();
        Ok(vec![(train, test)])
    }
}

/// Outer-fold strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CrossValidation {
    KFold(KFold),
    Holdout(HoldoutSplit),
}

impl CrossValidation {
    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        match self {
            CrossValidation::KFold(kfold) => kfold.split(n_samples),
            CrossValidation::Holdout(holdout) => holdout.split(n_samples),
        }
    }

    pub fn n_splits(&self) -> usize {
        match self {
            CrossValidation::KFold(kfold) => kfold.n_splits(),
            CrossValidation::Holdout(_) => 1,
        }
    }
}

impl From<KFold> for CrossValidation {
    fn from(kfold: KFold) -> Self {
        CrossValidation::KFold(kfold)
    }
}

impl From<HoldoutSplit> for CrossValidation {
    fn from(holdout: HoldoutSplit) -> Self {
        CrossValidation::Holdout(holdout)
    }
}
