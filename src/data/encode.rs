//! Label encoding of categorical columns.
//!
//! Encoding is a pure function of the column: categories are sorted and
//! numbered from 0, and the mapping is returned next to the codes. Nothing is
//! remembered between calls, so encoding is deterministic and safe to run from
//! any thread.

use std::collections::{BTreeSet, HashMap};

/// Category ↔ code mapping for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMapping {
    categories: Vec<String>,
    index: HashMap<String, u32>,
}

impl CategoryMapping {
    fn from_categories(categories: Vec<String>) -> Self {
        let index = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i as u32))
            .collect();
        Self { categories, index }
    }

    /// Categories in code order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn code_of(&self, value: &str) -> Option<u32> {
        self.index.get(value).copied()
    }

    /// Encode another column with this mapping.
    ///
    /// Values not seen when the mapping was built get new codes after the
    /// existing ones, in sorted order. The extended mapping is returned.
    pub fn encode_extending(&self, values: &[String]) -> (Vec<u32>, CategoryMapping) {
        let unseen: BTreeSet<&str> = values
            .iter()
            .map(String::as_str)
            .filter(|v| !self.index.contains_key(*v))
            .collect();

        let mapping = if unseen.is_empty() {
            self.clone()
        } else {
            let mut categories = self.categories.clone();
            categories.extend(unseen.into_iter().map(str::to_string));
            CategoryMapping::from_categories(categories)
        };

        let codes = values.iter().map(|v| mapping.index[v.as_str()]).collect();
        (codes, mapping)
    }
}

/// Encode a column as sorted-category codes.
pub fn label_encode(values: &[String]) -> (Vec<u32>, CategoryMapping) {
    let categories: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    let mapping = CategoryMapping::from_categories(categories.into_iter().map(str::to_string).collect());
    let codes = values.iter().map(|v| mapping.index[v.as_str()]).collect();
    (codes, mapping)
}

/// Combine several code columns into one id per distinct combination.
///
/// Ids follow the sorted order of the combinations, so the result does not
/// depend on row order.
pub fn combine_codes(columns: &[Vec<u32>]) -> Vec<u32> {
    let n = columns.first().map_or(0, Vec::len);
    let keys: Vec<Vec<u32>> = (0..n)
        .map(|i| columns.iter().map(|c| c[i]).collect())
        .collect();
    let distinct: BTreeSet<&Vec<u32>> = keys.iter().collect();
    let ids: HashMap<&Vec<u32>, u32> = distinct
        .into_iter()
        .enumerate()
        .map(|(i, k)| (k, i as u32))
        .collect();
    keys.iter().map(|k| ids[k]).collect()
}
