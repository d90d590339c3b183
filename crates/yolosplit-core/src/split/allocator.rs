//! Greedy class-capped allocation
//!
//! Examples are visited once, in shuffled order. Each one goes whole into
//! the first bucket (train, then val) whose per-class counters can absorb
//! its entire class multiset without crossing the cap; anything left over
//! lands in test, which has no cap.

use super::{Bucket, Cap, seeded_rng};
use crate::labels::{ClassCounts, ExampleId, LabelIndex};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Running per-class counters of a single allocation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatorState {
    train: ClassCounts,
    val: ClassCounts,
}

impl AllocatorState {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, bucket: Bucket) -> Option<&ClassCounts> {
        match bucket {
            Bucket::Train => Some(&self.train),
            Bucket::Val => Some(&self.val),
            Bucket::Test => None,
        }
    }

    /// All-or-nothing test over the example's whole class multiset.
    ///
    /// An example without classes passes vacuously. Test always admits.
    pub fn admits(&self, bucket: Bucket, example: &ClassCounts, cap: &Cap) -> bool {
        let Some(current) = self.counters(bucket) else {
            return true;
        };
        example.iter().all(|(class, n)| {
            u64::from(current.get(class)) + u64::from(n) <= u64::from(cap.limit(class))
        })
    }

    /// Add the example's counts to the bucket's counters
    pub fn admit(&mut self, bucket: Bucket, example: &ClassCounts) {
        match bucket {
            Bucket::Train => self.train.merge(example),
            Bucket::Val => self.val.merge(example),
            Bucket::Test => {}
        }
    }

    pub fn train_counts(&self) -> &ClassCounts {
        &self.train
    }

    pub fn val_counts(&self) -> &ClassCounts {
        &self.val
    }
}

/// Bucket membership of one dataset version, one entry per example
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub train: BTreeSet<ExampleId>,
    pub val: BTreeSet<ExampleId>,
    pub test: BTreeSet<ExampleId>,
    /// Objects per class admitted to train
    pub train_counts: ClassCounts,
    /// Objects per class admitted to val
    pub val_counts: ClassCounts,
}

impl Allocation {
    pub fn bucket(&self, bucket: Bucket) -> &BTreeSet<ExampleId> {
        match bucket {
            Bucket::Train => &self.train,
            Bucket::Val => &self.val,
            Bucket::Test => &self.test,
        }
    }

    pub(crate) fn insert(&mut self, bucket: Bucket, id: ExampleId) {
        match bucket {
            Bucket::Train => self.train.insert(id),
            Bucket::Val => self.val.insert(id),
            Bucket::Test => self.test.insert(id),
        };
    }

    pub fn bucket_of(&self, id: &ExampleId) -> Option<Bucket> {
        Bucket::ALL
            .into_iter()
            .find(|&bucket| self.bucket(bucket).contains(id))
    }

    /// Every (bucket, example) pair, train first
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &ExampleId)> {
        Bucket::ALL
            .into_iter()
            .flat_map(move |bucket| self.bucket(bucket).iter().map(move |id| (bucket, id)))
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Train-first greedy allocator with per-class caps for train and val
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocator {
    train_cap: Cap,
    val_cap: Cap,
}

impl Allocator {
    pub fn new(train_cap: impl Into<Cap>, val_cap: impl Into<Cap>) -> Self {
        Self {
            train_cap: train_cap.into(),
            val_cap: val_cap.into(),
        }
    }

    pub fn train_cap(&self) -> &Cap {
        &self.train_cap
    }

    pub fn val_cap(&self) -> &Cap {
        &self.val_cap
    }

    /// Assign examples in exactly the given order, no shuffling
    pub fn assign<'a, I>(&self, order: I) -> Allocation
    where
        I: IntoIterator<Item = (&'a ExampleId, &'a ClassCounts)>,
    {
        let mut state = AllocatorState::new();
        let mut allocation = Allocation::default();

        for (id, counts) in order {
            let bucket = self.place(&mut state, counts);
            allocation.insert(bucket, id.clone());
        }

        allocation.train_counts = state.train;
        allocation.val_counts = state.val;
        allocation
    }

    /// Shuffle the index with `rng`, then assign
    pub fn allocate<R: Rng + ?Sized>(&self, index: &LabelIndex, rng: &mut R) -> Allocation {
        let mut order: Vec<(&ExampleId, &ClassCounts)> = index.iter().collect();
        order.shuffle(rng);
        self.assign(order)
    }

    /// Allocate with a fresh generator seeded by `seed`
    pub fn allocate_seeded(&self, index: &LabelIndex, seed: u64) -> Allocation {
        let mut rng = seeded_rng(seed);
        self.allocate(index, &mut rng)
    }

    fn place(&self, state: &mut AllocatorState, counts: &ClassCounts) -> Bucket {
        let bucket = if state.admits(Bucket::Train, counts, &self.train_cap) {
            Bucket::Train
        } else if state.admits(Bucket::Val, counts, &self.val_cap) {
            Bucket::Val
        } else {
            Bucket::Test
        };
        state.admit(bucket, counts);
        bucket
    }
}
