//! Value resolution: `(section, field)` → flat-index lookup.
//!
//! Exact key lookups only. Every bit of fuzziness was already absorbed by
//! canonicalisation on both sides.

use super::flatten::FlatIndex;
use super::normalize::{
    is_comparable, is_field_only, is_sales_history_field, SALES_HISTORY, SALES_HISTORY_SUBJECT,
    SUBJECT,
};

/// Where a `(section, field)` pair is looked up, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Section-invariant field: bare field key.
    FieldOnly(String),
    /// Comparable prior-sale field: `{section}.{field}`.
    ComparableSalesHistory(String),
    /// Any other comparable field: `{section}.{field}`.
    Comparable(String),
    /// `SUBJECT.{field}`.
    Subject(String),
    /// Unlabeled subject sales-history column: `SALES_HISTORY.Subject.{field}`.
    SubjectSalesHistory(String),
    /// `{section}.{field}`.
    Composite(String),
}

impl Lookup {
    pub fn for_column(section: &str, field: &str) -> Self {
        if is_field_only(field) {
            Lookup::FieldOnly(field.to_string())
        } else if is_sales_history_field(field) && is_comparable(section) {
            Lookup::ComparableSalesHistory(format!("{section}.{field}"))
        } else if is_comparable(section) {
            Lookup::Comparable(format!("{section}.{field}"))
        } else if section == SUBJECT {
            Lookup::Subject(format!("{SUBJECT}.{field}"))
        } else if section == SALES_HISTORY_SUBJECT {
            Lookup::SubjectSalesHistory(format!("{SALES_HISTORY}.Subject.{field}"))
        } else {
            Lookup::Composite(format!("{section}.{field}"))
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Lookup::FieldOnly(k)
            | Lookup::ComparableSalesHistory(k)
            | Lookup::Comparable(k)
            | Lookup::Subject(k)
            | Lookup::SubjectSalesHistory(k)
            | Lookup::Composite(k) => k,
        }
    }
}

/// Value for `(section, field)`, or `""` when the index has none.
pub fn pick_value<'a>(section: &str, field: &str, flat: &'a FlatIndex) -> &'a str {
    flat.get(Lookup::for_column(section, field).key()).unwrap_or("")
}
