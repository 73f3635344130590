//! The extraction document: a tree of string leaves and ordered mappings.
//!
//! VLM answers are loosely shaped JSON. Sections nest fields directly
//! (`SUBJECT.State`) or through wrappers (`SALES_COMPARISON_APPROACH.
//! Comparable Sale #3.GLA`), numbers arrive as numbers or strings, and now
//! and then a model answers with an array or `null`. [`Value`] folds all of
//! that into two shapes so the flattener never has to guess:
//!
//! | JSON                         | [`Value`]                               |
//! |------------------------------|-----------------------------------------|
//! | string                       | `Leaf` (verbatim)                       |
//! | number / boolean             | `Leaf` (JSON text, e.g. `1450`, `true`) |
//! | `null`, `""`                 | dropped together with its key           |
//! | array of scalars             | `Leaf` joined with `", "`               |
//! | array containing objects     | `Node` keyed `"1"`, `"2"`, …            |
//! | empty array                  | dropped together with its key           |
//! | object                       | `Node` in source order                  |
//!
//! Duplicate keys inside one object keep their first occurrence.

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Marker text of the document substituted for a model answer that was not JSON.
pub const UPSTREAM_ERROR_MESSAGE: &str = "Invalid JSON returned from model";

/// Top-level keys of the results file written by [`crate::extract_to_file`].
const RESULTS_KEYS: &[&str] = &["merged", "blocks", "raw", "stats"];

/// The part of a results file a fill run reads.
#[derive(Deserialize)]
struct ResultsFile {
    #[serde(default)]
    merged: Option<Value>,
}

/// One node of an extraction document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A scalar field value.
    Leaf(String),
    /// An ordered mapping of child keys to values.
    Node(Vec<(String, Value)>),
}

impl Value {
    /// Child value under `key` when this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Node(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Value::Leaf(_) => None,
        }
    }

    /// Leaf text, if this is a leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Leaf(s) => Some(s),
            Value::Node(_) => None,
        }
    }

    /// Number of leaves below (and including) this value.
    pub fn leaf_count(&self) -> usize {
        match self {
            Value::Leaf(_) => 1,
            Value::Node(entries) => entries.iter().map(|(_, v)| v.leaf_count()).sum(),
        }
    }
}

// ── Deserialisation ──────────────────────────────────────────────────────

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Leaf(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Leaf(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Leaf(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Leaf(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Leaf(v.to_string()))
    }

    // serde_json's own float formatting keeps `1450.0` as written.
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Leaf(
            serde_json::Number::from_f64(v).map_or_else(|| v.to_string(), |n| n.to_string()),
        ))
    }

    // A bare `null` only reaches the visitor at the root or inside an array;
    // map entries are filtered through `Option<Value>` before getting here.
    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Leaf(String::new()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Option<Value>>()? {
            if let Some(item) = item {
                items.push(item);
            }
        }
        if items.iter().all(|v| matches!(v, Value::Leaf(_))) {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(Value::Leaf(joined));
        }
        Ok(Value::Node(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| ((i + 1).to_string(), v))
                .collect(),
        ))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut entries: Vec<(String, Value)> = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Option<Value>>()? {
            let Some(value) = value else { continue };
            if is_dropped(&value) || entries.iter().any(|(k, _)| *k == key) {
                continue;
            }
            entries.push((key, value));
        }
        Ok(Value::Node(entries))
    }
}

/// Empty strings, empty arrays and empty objects carry nothing worth a key.
fn is_dropped(value: &Value) -> bool {
    matches!(value, Value::Leaf(s) if s.is_empty())
        || matches!(value, Value::Node(entries) if entries.is_empty())
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Leaf(s) => serializer.serialize_str(s),
            Value::Node(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

// ── Document ─────────────────────────────────────────────────────────────

/// A whole extraction document. The root is always a mapping whose keys are
/// section names (`SUBJECT`, `SALES_COMPARISON_APPROACH`, …).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ExtractionDocument {
    sections: Vec<(String, Value)>,
}

impl TryFrom<Value> for ExtractionDocument {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Node(sections) => Ok(Self { sections }),
            Value::Leaf(_) => Err("extraction document must be a JSON object".to_string()),
        }
    }
}

impl From<ExtractionDocument> for Value {
    fn from(doc: ExtractionDocument) -> Self {
        Value::Node(doc.sections)
    }
}

impl ExtractionDocument {
    /// Build a document from ordered top-level entries.
    pub fn new(sections: Vec<(String, Value)>) -> Self {
        Self { sections }
    }

    /// The document substituted for a model answer that could not be parsed.
    ///
    /// It flattens to nothing: neither `error` nor `raw_output` sits under a
    /// recognisable section, and neither is a field-only field.
    pub fn upstream_error(raw_output: &str) -> Self {
        Self {
            sections: vec![
                ("error".to_string(), Value::Leaf(UPSTREAM_ERROR_MESSAGE.to_string())),
                ("raw_output".to_string(), Value::Leaf(raw_output.to_string())),
            ],
        }
    }

    /// Parse a document from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Load the document a fill run should use from a JSON file.
    ///
    /// Accepts either a bare extraction document or the results file written
    /// by [`crate::extract_to_file`], in which case its `merged` member is used.
    pub fn load(path: &Path) -> Result<Self, crate::error::Form1004Error> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => crate::error::Form1004Error::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => crate::error::Form1004Error::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Self::from_results_str(&text).map_err(|source| crate::error::Form1004Error::InvalidDocument {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse either a results file or a bare extraction document.
    ///
    /// The results shape is recognised from the raw top-level keys, before
    /// empty objects are dropped. A results file yields its `merged` member;
    /// a missing, `null` or empty `merged` yields an empty document, so the
    /// per-block `raw` documents never leak into a fill.
    pub fn from_results_str(s: &str) -> Result<Self, serde_json::Error> {
        let keys: HashMap<String, IgnoredAny> = serde_json::from_str(s)?;
        if !RESULTS_KEYS.iter().any(|k| keys.contains_key(*k)) {
            return Self::from_json_str(s);
        }
        let results: ResultsFile = serde_json::from_str(s)?;
        Ok(match results.merged {
            Some(Value::Node(sections)) => Self { sections },
            _ => Self::default(),
        })
    }

    /// True when this is the fallback document for an unparseable model answer.
    pub fn is_upstream_error(&self) -> bool {
        self.get("error").and_then(Value::as_str) == Some(UPSTREAM_ERROR_MESSAGE)
            && self.get("raw_output").is_some()
    }

    /// Top-level value under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.sections.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Ordered top-level entries.
    pub fn sections(&self) -> &[(String, Value)] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Merge block documents in order.
    ///
    /// A top-level key seen for the first time is taken as-is. When a later
    /// document repeats a key and both values are mappings, the later inner
    /// entries are merged in, replacing inner keys that already exist. Any
    /// other repeat keeps the first value.
    pub fn merge<'a>(docs: impl IntoIterator<Item = &'a ExtractionDocument>) -> Self {
        let mut merged: Vec<(String, Value)> = Vec::new();
        for doc in docs {
            for (key, value) in &doc.sections {
                match merged.iter_mut().find(|(k, _)| k == key) {
                    None => merged.push((key.clone(), value.clone())),
                    Some((_, Value::Node(existing))) => {
                        if let Value::Node(incoming) = value {
                            for (ik, iv) in incoming {
                                match existing.iter_mut().find(|(k, _)| k == ik) {
                                    Some(slot) => slot.1 = iv.clone(),
                                    None => existing.push((ik.clone(), iv.clone())),
                                }
                            }
                        }
                    }
                    Some(_) => {}
                }
            }
        }
        Self { sections: merged }
    }
}
