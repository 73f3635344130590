//! Flattening: nested extraction document → `"SECTION.FIELD"` index.
//!
//! Each leaf's path splits into section candidates (every key but the last)
//! and a field (the last key). The section is the *deepest* candidate with a
//! non-empty canonical form, so `SALES_COMPARISON_APPROACH → Comparable Sale
//! #3 → GLA` lands on `COMPARABLE SALE #3.GLA` rather than on the wrapper.
//!
//! Besides the composite key a leaf may also be indexed under:
//!
//! * its bare field name, for the field-only fields (`POOL`, `DEPRECIATION`, …)
//!   that the resolver looks up regardless of section;
//! * `SALES_HISTORY.Subject.{field}`, for the subject's prior-sale fields in
//!   the sales-history block, which is the key the resolver reads for
//!   unlabeled sales-history template columns.
//!
//! Keys are never overwritten: the first leaf to claim a key keeps it.

use super::normalize::{
    canonical_field, canonical_section, is_field_only, is_sales_history_field, SALES_HISTORY,
    SUBJECT,
};
use crate::document::{ExtractionDocument, Value};
use std::collections::HashMap;
use tracing::debug;

/// Flat lookup table built from one extraction document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatIndex {
    entries: HashMap<String, String>,
}

impl FlatIndex {
    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All `(key, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert unless the key is already taken. Returns whether it was stored.
    fn insert_first(&mut self, key: String, value: &str) -> bool {
        if self.entries.contains_key(&key) {
            debug!("flatten: duplicate key '{}' ignored", key);
            return false;
        }
        self.entries.insert(key, value.to_string());
        true
    }
}

/// Flatten a whole document. Error-shaped documents yield an empty index.
pub fn flatten(doc: &ExtractionDocument) -> FlatIndex {
    let mut flat = FlatIndex::default();
    let mut path: Vec<&str> = Vec::new();
    for (key, value) in doc.sections() {
        walk(&mut path, key, value, &mut flat);
    }
    debug!("flatten: {} index entries", flat.len());
    flat
}

fn walk<'a>(path: &mut Vec<&'a str>, key: &'a str, value: &'a Value, flat: &mut FlatIndex) {
    path.push(key);
    match value {
        Value::Node(children) => {
            for (k, v) in children {
                walk(path, k, v, flat);
            }
        }
        Value::Leaf(text) => index_leaf(path, text, flat),
    }
    path.pop();
}

fn index_leaf(path: &[&str], value: &str, flat: &mut FlatIndex) {
    let Some((raw_field, raw_sections)) = path.split_last() else {
        return;
    };
    let field = canonical_field(raw_field);
    let section = raw_sections
        .iter()
        .rev()
        .map(|p| canonical_section(p))
        .find(|s| !s.is_empty())
        .unwrap_or_default();

    if !section.is_empty() && !field.is_empty() {
        flat.insert_first(format!("{section}.{field}"), value);
    }

    if is_field_only(&field) {
        flat.insert_first(field.clone(), value);
    }

    if section == SUBJECT
        && is_sales_history_field(&field)
        && raw_sections
            .iter()
            .any(|p| canonical_section(p) == SALES_HISTORY)
    {
        flat.insert_first(format!("{SALES_HISTORY}.Subject.{field}"), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_of(json: &str) -> FlatIndex {
        flatten(&ExtractionDocument::from_json_str(json).unwrap())
    }

    #[test]
    fn subject_field() {
        let flat = flat_of(r#"{"SUBJECT": {"Property Address": "123 Main St"}}"#);
        assert_eq!(flat.get("SUBJECT.PROPERTY ADDRESS"), Some("123 Main St"));
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn field_only_is_double_indexed() {
        let flat = flat_of(r#"{"RECONCILIATION": {"Depreciation": "500"}}"#);
        assert_eq!(flat.get("RECONCILIATION.DEPRECIATION"), Some("500"));
        assert_eq!(flat.get("DEPRECIATION"), Some("500"));
    }

    #[test]
    fn deepest_section_wins() {
        let flat = flat_of(
            r#"{"SALES_COMPARISON_APPROACH": {
                "Subject": {"GLA": "1450", "Bdrms": "3"},
                "Comparable Sale #3": {"GLA": "1520", "Bath(s)": "2.1"}
            }}"#,
        );
        assert_eq!(flat.get("SUBJECT.GLA"), Some("1450"));
        assert_eq!(flat.get("SUBJECT.BEDROOMS"), Some("3"));
        assert_eq!(flat.get("COMPARABLE SALE #3.GLA"), Some("1520"));
        assert_eq!(flat.get("COMPARABLE SALE #3.BATHS"), Some("2.1"));
        assert!(!flat.contains_key("SALES_COMPARISON_APPROACH.GLA"));
    }

    #[test]
    fn opaque_sections_are_kept_normalised() {
        let flat = flat_of(r#"{"SITE": {"FEMA Flood Zone": "X"}, "ONE_UNIT_HOUSING_TRENDS": {"Property Values": "Stable"}}"#);
        assert_eq!(flat.get("SITE.FEMA FLOOD ZONE"), Some("X"));
        assert_eq!(flat.get("ONE_UNIT_HOUSING_TRENDS.PROPERTY VALUES"), Some("Stable"));
    }

    #[test]
    fn upstream_error_contributes_nothing() {
        let flat = flatten(&ExtractionDocument::upstream_error("```not json"));
        assert!(flat.is_empty());
    }

    #[test]
    fn top_level_leaf_without_section_is_skipped_unless_field_only() {
        let flat = flat_of(r#"{"note": "hello", "Pool": "None"}"#);
        assert!(!flat.contains_key("NOTE"));
        assert_eq!(flat.get("POOL"), Some("None"));
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn first_occurrence_wins() {
        let flat = flat_of(
            r#"{"SUBJECT": {"Pool": "Yes"}, "SALES_COMPARISON_APPROACH": {"Comparable Sale #1": {"Pool": "No"}}}"#,
        );
        assert_eq!(flat.get("POOL"), Some("Yes"));
        assert_eq!(flat.get("SUBJECT.POOL"), Some("Yes"));
        assert_eq!(flat.get("COMPARABLE SALE #1.POOL"), Some("No"));
    }

    #[test]
    fn sales_history_subject_bridge() {
        let flat = flat_of(
            r#"{"SALES_HISTORY": {
                "Subject": {"Date of Prior Sale/Transfer": "03/2019", "Data Source(s)": "MLS"},
                "Comparable Sale #1": {"Date of Prior Sale/Transfer": "None"}
            }}"#,
        );
        assert_eq!(flat.get("SUBJECT.DATE OF PRIOR SALE/TRANSFER"), Some("03/2019"));
        assert_eq!(
            flat.get("SALES_HISTORY.Subject.DATE OF PRIOR SALE/TRANSFER"),
            Some("03/2019")
        );
        assert_eq!(flat.get("SALES_HISTORY.Subject.DATA SOURCE(S)"), Some("MLS"));
        assert_eq!(
            flat.get("COMPARABLE SALE #1.DATE OF PRIOR SALE/TRANSFER"),
            Some("None")
        );
    }

    #[test]
    fn sales_grid_subject_is_not_bridged() {
        let flat = flat_of(
            r#"{"SALES_COMPARISON_APPROACH": {"Subject": {"Data Source(s)": "Tax"}}}"#,
        );
        assert!(!flat.contains_key("SALES_HISTORY.Subject.DATA SOURCE(S)"));
    }
}
