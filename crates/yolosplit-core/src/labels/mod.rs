//! Class and example identifiers plus per-example class multisets

pub mod index;

pub use index::LabelIndex;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque object category. YOLO ids are kept as their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(String);

impl ClassId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClassId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// File stem shared by an example's image and label file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExampleId(String);

impl ExampleId {
    pub fn new(stem: impl Into<String>) -> Self {
        Self(stem.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExampleId {
    fn from(stem: &str) -> Self {
        Self::new(stem)
    }
}

impl From<String> for ExampleId {
    fn from(stem: String) -> Self {
        Self(stem)
    }
}

/// Multiset of class occurrences, grouped by class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassCounts {
    counts: BTreeMap<ClassId, u32>,
}

impl ClassCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence per item
    pub fn from_classes<I>(classes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ClassId>,
    {
        let mut counts = Self::new();
        for class in classes {
            counts.add(class.into(), 1);
        }
        counts
    }

    pub fn add(&mut self, class: ClassId, n: u32) {
        if n == 0 {
            return;
        }
        *self.counts.entry(class).or_insert(0) += n;
    }

    /// Add every count of `other` into `self`
    pub fn merge(&mut self, other: &ClassCounts) {
        for (class, n) in other.iter() {
            self.add(class.clone(), n);
        }
    }

    pub fn get(&self, class: &ClassId) -> u32 {
        self.counts.get(class).copied().unwrap_or(0)
    }

    /// Total number of annotated objects
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&n| u64::from(n)).sum()
    }

    /// Number of distinct classes
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClassId, u32)> {
        self.counts.iter().map(|(class, &n)| (class, n))
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassId> {
        self.counts.keys()
    }
}

impl<C: Into<ClassId>> FromIterator<C> for ClassCounts {
    fn from_iter<T: IntoIterator<Item = C>>(iter: T) -> Self {
        Self::from_classes(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_group_repeated_classes() {
        let counts: ClassCounts = ["3", "1", "3", "3"].into_iter().collect();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(&ClassId::from("3")), 3);
        assert_eq!(counts.get(&ClassId::from("1")), 1);
        assert_eq!(counts.get(&ClassId::from("7")), 0);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_zero_add_keeps_counts_empty() {
        let mut counts = ClassCounts::new();
        counts.add(ClassId::from("a"), 0);
        assert!(counts.is_empty());
    }

    #[test]
    fn test_merge_accumulates() {
        let mut a = ClassCounts::from_classes(["x", "y"]);
        let b = ClassCounts::from_classes(["y", "z"]);
        a.merge(&b);

        assert_eq!(a.get(&"y".into()), 2);
        assert_eq!(a.get(&"z".into()), 1);
        assert_eq!(a.total(), 4);
    }
}
