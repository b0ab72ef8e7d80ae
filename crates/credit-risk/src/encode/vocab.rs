//! Categorical vocabularies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of looking a value up in a [`Vocabulary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CategoryCode {
    /// Position of the category in the sorted vocabulary.
    Known(u32),
    /// Value not in the vocabulary; routed to the reserved unseen column.
    Unseen,
}

impl CategoryCode {
    #[inline]
    pub fn is_unseen(self) -> bool {
        matches!(self, CategoryCode::Unseen)
    }
}

/// Sorted set of categories learned for one field.
///
/// Categories are ordered byte-wise, so the code of a category depends only
/// on the set of categories and never on the order rows were observed in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    categories: Vec<String>,
}

/// Occurrence counts of one categorical field, in sorted order.
#[derive(Clone, Debug, Default)]
pub struct CategoryCounts {
    counts: BTreeMap<String, usize>,
}

impl CategoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: &str) {
        match self.counts.get_mut(value) {
            Some(c) => *c += 1,
            None => {
                self.counts.insert(value.to_string(), 1);
            }
        }
    }

    /// Total number of observations.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Most frequent value; ties resolve to the smallest value in sort order.
    pub fn mode(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for (value, &count) in &self.counts {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((value.as_str(), count));
            }
        }
        best.map(|(v, _)| v)
    }

    /// Build a vocabulary from the values seen at least `min_count` times.
    pub fn into_vocabulary(self, min_count: usize) -> Vocabulary {
        Vocabulary {
            categories: self
                .counts
                .into_iter()
                .filter(|(_, c)| *c >= min_count.max(1))
                .map(|(v, _)| v)
                .collect(),
        }
    }
}

impl Vocabulary {
    /// Vocabulary from arbitrary categories; sorts and deduplicates.
    pub fn from_categories<S: Into<String>>(categories: impl IntoIterator<Item = S>) -> Self {
        let mut categories: Vec<String> = categories.into_iter().map(Into::into).collect();
        categories.sort_unstable();
        categories.dedup();
        Self { categories }
    }

    #[inline]
    pub fn lookup(&self, value: &str) -> CategoryCode {
        match self.categories.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(pos) => CategoryCode::Known(pos as u32),
            Err(_) => CategoryCode::Unseen,
        }
    }

    /// Number of known categories (the unseen column is not counted).
    #[inline]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    #[inline]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// True if categories are strictly increasing.
    pub fn is_sorted(&self) -> bool {
        self.categories.windows(2).all(|w| w[0] < w[1])
    }
}
