//! Plain ratio split for a single dataset, ignoring class balance

use super::{Bucket, shuffled_ids};
use crate::error::SplitError;
use crate::labels::LabelIndex;
use crate::split::Allocation;
use rand::Rng;
use serde::{Deserialize, Serialize};

const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioSplit {
    train: f64,
    val: f64,
    test: f64,
}

impl Default for RatioSplit {
    fn default() -> Self {
        Self {
            train: 0.7,
            val: 0.2,
            test: 0.1,
        }
    }
}

impl RatioSplit {
    pub fn new(train: f64, val: f64, test: f64) -> crate::Result<Self> {
        for (name, value) in [("train", train), ("val", val), ("test", test)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SplitError::InvalidRatio { name, value });
            }
        }
        let sum = train + val + test;
        if sum > 1.0 + RATIO_EPSILON {
            return Err(SplitError::RatioSum(sum));
        }
        Ok(Self { train, val, test })
    }

    /// Bucket sizes for `n` examples as (train, val, test).
    ///
    /// Test is carved out first, then val from what remains; both round up.
    pub fn sizes(&self, n: usize) -> (usize, usize, usize) {
        let test = ceil_count(n, self.test);
        let rest = n - test;
        let val_share = if self.train + self.val > 0.0 {
            self.val / (self.train + self.val)
        } else {
            0.0
        };
        let val = ceil_count(rest, val_share);
        (rest - val, val, test)
    }

    /// Shuffle the index with `rng` and cut it into the three buckets
    pub fn split<R: Rng + ?Sized>(&self, index: &LabelIndex, rng: &mut R) -> Allocation {
        let ids = shuffled_ids(index, rng);
        let (_, val, test) = self.sizes(ids.len());

        let mut allocation = Allocation::default();
        for (position, id) in ids.into_iter().enumerate() {
            let bucket = if position < test {
                Bucket::Test
            } else if position < test + val {
                Bucket::Val
            } else {
                Bucket::Train
            };
            if let Some(counts) = index.get(&id) {
                match bucket {
                    Bucket::Train => allocation.train_counts.merge(counts),
                    Bucket::Val => allocation.val_counts.merge(counts),
                    Bucket::Test => {}
                }
            }
            allocation.insert(bucket, id);
        }
        allocation
    }
}

fn ceil_count(n: usize, ratio: f64) -> usize {
    let raw = (n as f64 * ratio - RATIO_EPSILON).ceil();
    (raw.max(0.0) as usize).min(n)
}
