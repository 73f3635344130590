//! Label canonicalisation: noisy header and JSON-key text → fixed vocabulary.
//!
//! Template headers are typed by hand ("Bdrms", "Bath(s)", "Comparable
//! Sale # 3") and VLM keys echo whatever the page said. Both sides pass
//! through the same three functions so the resolver only ever compares
//! canonical strings.
//!
//! ## Rule Order
//!
//! Section labels run through an ordered rule chain, not a lookup table:
//! several rules can match one label ("One-Unit Housing Trends" contains
//! "One-Unit Housing") and the first match wins. [`SECTION_RULES`] must stay
//! in its current order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

pub const SUBJECT: &str = "SUBJECT";
pub const SALES_HISTORY: &str = "SALES_HISTORY";
pub const ONE_UNIT_HOUSING_TRENDS: &str = "ONE_UNIT_HOUSING_TRENDS";
pub const ONE_UNIT_HOUSING: &str = "ONE_UNIT_HOUSING";
pub const RECONCILIATION: &str = "RECONCILIATION";
pub const COST_APPROACH: &str = "COST_APPROACH";

/// Prefix shared by every canonical comparable section (`COMPARABLE SALE #1` …).
pub const COMPARABLE_PREFIX: &str = "COMPARABLE SALE #";

/// Synthetic section for unlabeled sales-history columns outside any comparable block.
pub const SALES_HISTORY_SUBJECT: &str = "SALES_HISTORY_SUBJECT";

/// Fields whose value is the same for every section they appear under.
pub const FIELD_ONLY_FIELDS: &[&str] = &[
    "OPINION OF SITE VALUE",
    "TOTAL ESTIMATE OF COST-NEW",
    "DEPRECIATION",
    "R.E. TAX YEAR",
    "HOA FREQUENCY",
    "POOL",
];

/// Prior-sale fields reported per party in the sales-history grid.
pub const SALES_HISTORY_FIELDS: &[&str] = &[
    "DATE OF PRIOR SALE/TRANSFER",
    "PRICE OF PRIOR SALE/TRANSFER",
    "DATA SOURCE(S)",
    "EFFECTIVE DATE OF DATA SOURCE(S)",
];

static FIELD_SYNONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("BDRMS", "BEDROOMS"),
        ("BATH(S)", "BATHS"),
        ("QUALITY", "QUALITY OF CONSTRUCTION"),
        ("QUALITY OF CONST", "QUALITY OF CONSTRUCTION"),
        ("LOT SIZE", "SITE"),
        ("AREA", "SITE"),
    ])
});

/// `COMPARBE 7`, `COMPARABE7`, `COMPARABLE SALE # 3`, `COMPARBLE #2` …
static RE_COMPARABLE_FUZZY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^COMPARA?BL?E\s*(?:SALE\s*)?#?\s*(\d+)").unwrap());

static RE_COMPARABLE_CANONICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"COMPARABLE SALE #\s*(\d+)").unwrap());

pub fn is_field_only(field: &str) -> bool {
    FIELD_ONLY_FIELDS.contains(&field)
}

pub fn is_sales_history_field(field: &str) -> bool {
    SALES_HISTORY_FIELDS.contains(&field)
}

pub fn is_comparable(section: &str) -> bool {
    section.starts_with(COMPARABLE_PREFIX)
}

/// Collapse whitespace (newlines included) to single spaces, trim, contract
/// `"# "` to `"#"` and uppercase. Empty input gives an empty string.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("# ", "#")
        .to_uppercase()
}

/// Canonical field name: normalised text, then the synonym table.
pub fn canonical_field(label: &str) -> String {
    let s = normalize_text(label);
    match FIELD_SYNONYMS.get(s.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => s,
    }
}

/// Canonical section name: normalised text, then [`SECTION_RULES`].
pub fn canonical_section(label: &str) -> String {
    let s = normalize_text(label);
    SECTION_RULES
        .iter()
        .find_map(|rule| rule.apply(&s))
        .unwrap_or(s)
}

// ── Section rule chain ───────────────────────────────────────────────────

/// One predicate → tag rule of the section cascade.
#[derive(Debug, Clone, Copy)]
pub enum SectionRule {
    /// Misspelt "comparable" followed by a sale number.
    ComparableFuzzy,
    /// Already `COMPARABLE SALE #n`; tidied and re-emitted.
    ComparableCanonical,
    /// Label contains every needle.
    ContainsAll(&'static [&'static str], &'static str),
    /// Label equals the text exactly.
    Exact(&'static str, &'static str),
}

pub const SECTION_RULES: &[SectionRule] = &[
    SectionRule::ComparableFuzzy,
    SectionRule::ComparableCanonical,
    SectionRule::ContainsAll(&["ONE-UNIT HOUSING TRENDS"], ONE_UNIT_HOUSING_TRENDS),
    SectionRule::ContainsAll(&["ONE-UNIT HOUSING"], ONE_UNIT_HOUSING),
    SectionRule::ContainsAll(&["RECONCILIATION"], RECONCILIATION),
    SectionRule::ContainsAll(&["COST APPROACH"], COST_APPROACH),
    SectionRule::ContainsAll(&["SALES", "HISTORY"], SALES_HISTORY),
    SectionRule::Exact("SUBJECT", SUBJECT),
];

impl SectionRule {
    /// Tag for an already-normalised label, or `None` when the rule does not match.
    pub fn apply(&self, s: &str) -> Option<String> {
        match self {
            SectionRule::ComparableFuzzy => RE_COMPARABLE_FUZZY
                .captures(s)
                .map(|caps| format!("{COMPARABLE_PREFIX}{}", &caps[1])),
            SectionRule::ComparableCanonical => is_comparable(s).then(|| {
                RE_COMPARABLE_CANONICAL
                    .replace_all(s, "COMPARABLE SALE #${1}")
                    .into_owned()
            }),
            SectionRule::ContainsAll(needles, tag) => {
                needles.iter().all(|n| s.contains(*n)).then(|| (*tag).to_string())
            }
            SectionRule::Exact(text, tag) => (s == *text).then(|| (*tag).to_string()),
        }
    }
}
