use super::{ClassCounts, ExampleId};
use std::collections::BTreeMap;

/// Class multiset of every example, keyed by example id.
///
/// Iteration is always in lexicographic id order, which is what makes a
/// seeded shuffle reproducible regardless of how the index was filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelIndex {
    examples: BTreeMap<ExampleId, ClassCounts>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an example, returning the previous record for that id if any
    pub fn insert(&mut self, id: ExampleId, counts: ClassCounts) -> Option<ClassCounts> {
        self.examples.insert(id, counts)
    }

    pub fn get(&self, id: &ExampleId) -> Option<&ClassCounts> {
        self.examples.get(id)
    }

    pub fn contains(&self, id: &ExampleId) -> bool {
        self.examples.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ExampleId> {
        self.examples.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExampleId, &ClassCounts)> {
        self.examples.iter()
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Object count per class across the whole index
    pub fn class_histogram(&self) -> ClassCounts {
        let mut histogram = ClassCounts::new();
        for counts in self.examples.values() {
            histogram.merge(counts);
        }
        histogram
    }

    /// Examples whose label file holds no objects
    pub fn empty_examples(&self) -> usize {
        self.examples.values().filter(|c| c.is_empty()).count()
    }
}

impl FromIterator<(ExampleId, ClassCounts)> for LabelIndex {
    fn from_iter<T: IntoIterator<Item = (ExampleId, ClassCounts)>>(iter: T) -> Self {
        Self {
            examples: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sorted() {
        let index: LabelIndex = [
            (ExampleId::from("b"), ClassCounts::from_classes(["0"])),
            (ExampleId::from("a"), ClassCounts::from_classes(["1"])),
            (ExampleId::from("c"), ClassCounts::new()),
        ]
        .into_iter()
        .collect();

        let ids: Vec<&str> = index.ids().map(ExampleId::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(index.empty_examples(), 1);
    }

    #[test]
    fn test_histogram_sums_all_examples() {
        let mut index = LabelIndex::new();
        index.insert("a".into(), ClassCounts::from_classes(["0", "0", "1"]));
        index.insert("b".into(), ClassCounts::from_classes(["1"]));

        let histogram = index.class_histogram();
        assert_eq!(histogram.get(&"0".into()), 2);
        assert_eq!(histogram.get(&"1".into()), 2);
    }

    #[test]
    fn test_insert_replaces_previous_record() {
        let mut index = LabelIndex::new();
        assert!(index.insert("a".into(), ClassCounts::from_classes(["0"])).is_none());
        let previous = index.insert("a".into(), ClassCounts::from_classes(["1"]));

        assert_eq!(previous, Some(ClassCounts::from_classes(["0"])));
        assert_eq!(index.len(), 1);
    }
}
