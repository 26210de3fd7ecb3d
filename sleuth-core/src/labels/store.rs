//! Label store
//!
//! Per-workspace mapping of (element, category) to user label, with counters
//! maintained on every write so count queries never rescan. The store itself
//! holds no lock; the owning workspace wraps it in an `RwLock`.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Element};
use crate::types::{CategoryId, ElementId, LabelValue};

/// Number of labeled elements per value for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub positive: usize,
    pub negative: usize,
}

impl LabelCounts {
    #[must_use]
    pub fn get(&self, value: LabelValue) -> usize {
        match value {
            LabelValue::True => self.positive,
            LabelValue::False => self.negative,
            LabelValue::Unset => 0,
        }
    }

    /// Total number of labeled elements
    #[must_use]
    pub fn total(&self) -> usize {
        self.positive + self.negative
    }

    /// Map view with zero entries omitted
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<LabelValue, usize> {
        [LabelValue::True, LabelValue::False]
            .into_iter()
            .map(|value| (value, self.get(value)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    fn slot(&mut self, value: LabelValue) -> Option<&mut usize> {
        match value {
            LabelValue::True => Some(&mut self.positive),
            LabelValue::False => Some(&mut self.negative),
            LabelValue::Unset => None,
        }
    }

    fn apply(&mut self, previous: Option<LabelValue>, next: LabelValue) {
        if let Some(slot) = previous.and_then(|value| self.slot(value)) {
            *slot = slot.saturating_sub(1);
        }
        if let Some(slot) = self.slot(next) {
            *slot += 1;
        }
    }
}

/// Outcome of a single label write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelWrite {
    pub previous: Option<LabelValue>,
    pub changed: bool,
    /// Category label version after the write
    pub version: u64,
}

/// A labeled element captured in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledElement {
    pub element: Element,
    pub value: LabelValue,
}

/// Immutable copy of one category's labels, taken when an iteration is
/// reserved. Later writes never reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSnapshot {
    pub category_id: CategoryId,
    /// Label version the snapshot was taken at
    pub version: u64,
    pub counts: LabelCounts,
    pub examples: Vec<LabeledElement>,
}

impl LabelSnapshot {
    /// Ids of all elements labeled in this snapshot
    #[must_use]
    pub fn labeled_ids(&self) -> HashSet<&ElementId> {
        self.examples.iter().map(|e| &e.element.id).collect()
    }

    /// Dataset elements without a label in this snapshot, in dataset order
    #[must_use]
    pub fn unlabeled<'a>(&self, dataset: &'a Dataset) -> Vec<&'a Element> {
        let labeled = self.labeled_ids();
        dataset
            .elements()
            .iter()
            .filter(|e| !labeled.contains(&e.id))
            .collect()
    }
}

#[derive(Debug, Default)]
struct CategoryLabels {
    values: BTreeMap<ElementId, LabelValue>,
    counts: LabelCounts,
    /// Bumped on every write that changes a stored value
    version: u64,
}

/// Per-workspace user labels
#[derive(Debug, Default)]
pub struct LabelStore {
    categories: HashMap<CategoryId, CategoryLabels>,
}

impl LabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the label for (element, category). Last write wins.
    ///
    /// Writing `Unset` removes the label. Callers validate ids first.
    pub fn set(
        &mut self,
        element_id: &ElementId,
        category_id: &CategoryId,
        value: LabelValue,
    ) -> LabelWrite {
        let labels = self.categories.entry(category_id.clone()).or_default();
        let previous = if value.is_set() {
            labels.values.insert(element_id.clone(), value)
        } else {
            labels.values.remove(element_id)
        };

        let changed = previous != Some(value) && !(previous.is_none() && !value.is_set());
        if changed {
            labels.counts.apply(previous, value);
            labels.version += 1;
        }

        LabelWrite {
            previous,
            changed,
            version: labels.version,
        }
    }

    pub fn get(&self, element_id: &ElementId, category_id: &CategoryId) -> Option<LabelValue> {
        self.categories
            .get(category_id)
            .and_then(|labels| labels.values.get(element_id))
            .copied()
    }

    /// All labels held by one element, keyed by category
    pub fn labels_for(&self, element_id: &ElementId) -> BTreeMap<CategoryId, LabelValue> {
        self.categories
            .iter()
            .filter_map(|(category_id, labels)| {
                labels
                    .values
                    .get(element_id)
                    .map(|value| (category_id.clone(), *value))
            })
            .collect()
    }

    /// Maintained counters, O(1)
    pub fn counts(&self, category_id: &CategoryId) -> LabelCounts {
        self.categories
            .get(category_id)
            .map(|labels| labels.counts)
            .unwrap_or_default()
    }

    /// Number of value-changing writes applied to a category so far
    pub fn version(&self, category_id: &CategoryId) -> u64 {
        self.categories
            .get(category_id)
            .map(|labels| labels.version)
            .unwrap_or(0)
    }

    pub fn is_labeled(&self, element_id: &ElementId, category_id: &CategoryId) -> bool {
        self.get(element_id, category_id).is_some()
    }

    /// Copy one category's labels, resolving elements through the dataset
    pub fn snapshot(&self, category_id: &CategoryId, dataset: &Dataset) -> LabelSnapshot {
        let examples = self
            .categories
            .get(category_id)
            .map(|labels| {
                labels
                    .values
                    .iter()
                    .filter_map(|(element_id, value)| {
                        dataset.element(element_id).map(|element| LabeledElement {
                            element: element.clone(),
                            value: *value,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        LabelSnapshot {
            category_id: category_id.clone(),
            version: self.version(category_id),
            counts: self.counts(category_id),
            examples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Document;
    use crate::types::DatasetId;

    fn el(id: &str) -> ElementId {
        ElementId::new(id)
    }

    fn cat() -> CategoryId {
        CategoryId::new("cat")
    }

    // ==================== Write Tests ====================

    #[test]
    fn set_label_overwrites_previous_value() {
        let mut store = LabelStore::new();

        store.set(&el("e1"), &cat(), LabelValue::True);
        let write = store.set(&el("e1"), &cat(), LabelValue::False);

        assert_eq!(write.previous, Some(LabelValue::True));
        assert!(write.changed);
        assert_eq!(store.get(&el("e1"), &cat()), Some(LabelValue::False));
    }

    #[test]
    fn unset_removes_label() {
        let mut store = LabelStore::new();
        store.set(&el("e1"), &cat(), LabelValue::True);

        store.set(&el("e1"), &cat(), LabelValue::Unset);

        assert_eq!(store.get(&el("e1"), &cat()), None);
        assert_eq!(store.counts(&cat()).total(), 0);
    }

    #[test]
    fn rewriting_same_value_does_not_bump_version() {
        let mut store = LabelStore::new();
        store.set(&el("e1"), &cat(), LabelValue::True);

        let write = store.set(&el("e1"), &cat(), LabelValue::True);

        assert!(!write.changed);
        assert_eq!(write.version, 1);
        assert_eq!(store.counts(&cat()).positive, 1);
    }

    #[test]
    fn unsetting_unlabeled_element_is_a_no_op() {
        let mut store = LabelStore::new();

        let write = store.set(&el("e1"), &cat(), LabelValue::Unset);

        assert!(!write.changed);
        assert_eq!(store.version(&cat()), 0);
    }

    #[test]
    fn last_write_wins_per_key() {
        let mut store = LabelStore::new();
        let sequence = [
            LabelValue::True,
            LabelValue::False,
            LabelValue::Unset,
            LabelValue::False,
            LabelValue::True,
        ];
        for value in sequence {
            store.set(&el("e1"), &cat(), value);
            store.set(&el("e2"), &cat(), LabelValue::False);
        }

        assert_eq!(store.get(&el("e1"), &cat()), Some(LabelValue::True));
        assert_eq!(store.counts(&cat()).positive, 1);
        assert_eq!(store.counts(&cat()).negative, 1);
    }

    // ==================== Count Tests ====================

    #[test]
    fn counts_match_labels_written() {
        let mut store = LabelStore::new();
        for i in 0..5 {
            store.set(&el(&format!("p{i}")), &cat(), LabelValue::True);
        }
        for i in 0..3 {
            store.set(&el(&format!("n{i}")), &cat(), LabelValue::False);
        }

        let counts = store.counts(&cat());
        assert_eq!(counts.get(LabelValue::True), 5);
        assert_eq!(counts.get(LabelValue::False), 3);
        assert_eq!(counts.total(), 8);
    }

    #[test]
    fn count_map_omits_zero_entries() {
        let mut store = LabelStore::new();
        store.set(&el("e1"), &cat(), LabelValue::True);

        let map = store.counts(&cat()).to_map();

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&LabelValue::True), Some(&1));
    }

    #[test]
    fn categories_are_counted_independently() {
        let mut store = LabelStore::new();
        let other = CategoryId::new("other");
        store.set(&el("e1"), &cat(), LabelValue::True);
        store.set(&el("e1"), &other, LabelValue::False);

        assert_eq!(store.counts(&cat()).positive, 1);
        assert_eq!(store.counts(&other).negative, 1);
        assert_eq!(store.labels_for(&el("e1")).len(), 2);
    }

    // ==================== Snapshot Tests ====================

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let ds = DatasetId::new("ds");
        let dataset = Dataset::new(ds.clone(), vec![Document::from_texts(&ds, "d", &["a", "b", "c"])]);
        let mut store = LabelStore::new();
        store.set(&el("ds-d-0"), &cat(), LabelValue::True);

        let snapshot = store.snapshot(&cat(), &dataset);
        store.set(&el("ds-d-1"), &cat(), LabelValue::False);

        assert_eq!(snapshot.examples.len(), 1);
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.counts.total(), 1);
        let unlabeled: Vec<&str> = snapshot
            .unlabeled(&dataset)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(unlabeled, vec!["ds-d-1", "ds-d-2"]);
    }
}
