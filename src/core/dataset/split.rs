use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetSplit {
    Train,
    Test,
}

impl DatasetSplit {
    pub fn as_str(&self) -> &str {
        match self {
            DatasetSplit::Train => "train",
            DatasetSplit::Test => "test",
        }
    }
}

/// A seeded partition of `[0, N)` into a train prefix and a test suffix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl IndexSplit {
    /// Number of indices across both sides
    pub fn total(&self) -> usize {
        self.train.len() + self.test.len()
    }

    /// Check that train and test are disjoint and cover `[0, n)` exactly once
    pub fn verify(&self, n: usize) -> PipelineResult<()> {
        if self.total() != n {
            return Err(PipelineError::CorruptArtifacts(format!(
                "split holds {} indices but the image list has {}",
                self.total(),
                n
            )));
        }

        let mut seen = HashSet::with_capacity(n);
        for &idx in self.train.iter().chain(self.test.iter()) {
            if idx >= n {
                return Err(PipelineError::CorruptArtifacts(format!(
                    "index {} is out of range for {} images",
                    idx, n
                )));
            }
            if !seen.insert(idx) {
                return Err(PipelineError::CorruptArtifacts(format!(
                    "index {} appears more than once",
                    idx
                )));
            }
        }
        Ok(())
    }
}

/// Size of the train prefix: `floor(fraction * n)`, never more than `n`
pub fn split_point(n: usize, fraction: f64) -> usize {
    ((fraction * n as f64).floor() as usize).min(n)
}

/// Shuffle `[0, n)` with a generator seeded from `seed`, then cut the
/// permutation at `floor(fraction * n)`.
pub fn split_indices(n: usize, fraction: f64, seed: u64) -> PipelineResult<IndexSplit> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(PipelineError::InvalidConfig(format!(
            "split fraction must be within [0, 1], got {}",
            fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let split = split_point(n, fraction);
    let test = indices.split_off(split);
    debug!("Split {} indices into {} train / {} test", n, indices.len(), test.len());

    Ok(IndexSplit {
        train: indices,
        test,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hundred_images_split() {
        let split = split_indices(100, 0.15, 69).unwrap();
        assert_eq!(split.train.len(), 15);
        assert_eq!(split.test.len(), 85);

        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        assert!(split.verify(100).is_ok());
    }

    #[test]
    fn test_split_is_reproducible() {
        let a = split_indices(537, 0.15, 69).unwrap();
        let b = split_indices(537, 0.15, 69).unwrap();
        assert_eq!(a, b);

        let c = split_indices(537, 0.15, 70).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_sizes_for_many_counts() {
        for n in 1..200 {
            let split = split_indices(n, 0.15, 69).unwrap();
            assert_eq!(split.train.len(), (0.15 * n as f64).floor() as usize);
            assert_eq!(split.total(), n);
            assert!(split.verify(n).is_ok());
        }
    }

    #[test]
    fn test_empty_and_edge_fractions() {
        let split = split_indices(0, 0.15, 69).unwrap();
        assert_eq!(split.total(), 0);

        let split = split_indices(10, 0.0, 69).unwrap();
        assert!(split.train.is_empty());
        assert_eq!(split.test.len(), 10);

        let split = split_indices(10, 1.0, 69).unwrap();
        assert_eq!(split.train.len(), 10);
        assert!(split.test.is_empty());

        assert!(split_indices(10, -0.1, 69).is_err());
    }

    #[test]
    fn test_verify_rejects_overlap_and_gaps() {
        let overlap = IndexSplit {
            train: vec![0, 1],
            test: vec![1, 2],
        };
        assert!(overlap.verify(4).is_err());

        let gap = IndexSplit {
            train: vec![0],
            test: vec![2],
        };
        assert!(gap.verify(2).is_err());

        let short = IndexSplit {
            train: vec![0],
            test: vec![1],
        };
        assert!(short.verify(3).is_err());
    }

    #[test]
    fn test_split_display() {
        assert_eq!(DatasetSplit::Train.as_str(), "train");
        assert_eq!(DatasetSplit::Test.as_str(), "test");
    }
}
