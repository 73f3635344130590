//! Prompts for VLM-based Form 1004 field extraction.
//!
//! Each page block gets its own user prompt naming the sections and fields
//! to return. The JSON keys requested here are what the flattener and the
//! template headers are reconciled against, so renaming a field in a prompt
//! means checking the synonym table in [`crate::reconcile::normalize`] too.

/// System message shared by every block request.
pub const SYSTEM_PROMPT: &str =
    "You are a structured data extraction model. Return only valid JSON.";

/// Subject, neighborhood, site and improvements (first selected page).
pub const SUBJECT_PROMPT: &str = r#"Extract every visible field of the SUBJECT block and the related sections of this Form 1004 page.
Small or faint labels (HOA frequency, One-Unit Housing Trends) matter as much as large ones.

ONE_UNIT_HOUSING_TRENDS:
["Property Values","Demand/Supply","Marketing Time"]

SUBJECT:
["Property Address","County","City","State","Zip Code","Assessor's Parcel #","R.E. Taxes $","Neighborhood Name","HOA $","R.E. Tax Year","HOA Frequency","Pool"]

ONE_UNIT_HOUSING:
["Price $ (000) - Low","Price $ (000) - High","Price $ (000) - Pred","Age (Yrs) - Low","Age (Yrs) - High","Age (Yrs) - Pred"]

SITE:
["Area","Specific Zoning Classification","Zoning Description","FEMA Flood Zone","FEMA Map #","FEMA Map Date"]

IMPROVEMENTS:
["Year Built","Garage"]

Field rules:
- "State" is the 2-letter postal abbreviation (WI, IL, CA). Use " " when it is not readable.
- "HOA Frequency" is the checked box only (per month, per year). Use " " when no box is checked.
- "Zoning Description" is zoning text such as "Residential/Planned Development", never "See addendum".
- "Specific Zoning Classification" is a code such as "R-1", "C-3", "PD".
- Visible text only. Missing fields are " ".
- Return one JSON object with top-level keys SUBJECT, ONE_UNIT_HOUSING_TRENDS, ONE_UNIT_HOUSING, SITE, IMPROVEMENTS."#;

/// Sales comparison grid, sales history and reconciliation (middle pages).
pub const SALES_PROMPT: &str = r##"Extract the SALES COMPARISON APPROACH, SALES HISTORY and RECONCILIATION fields from these Form 1004 pages.

SALES_COMPARISON_APPROACH (one object per column: "Subject" and "Comparable Sale #1" through "Comparable Sale #9"):
["Address","Proximity","Sale Price","Data Source","Verification Source","Date of Sale","Location","Site","View","Quality","Condition","Total","Bdrms","Baths","GLA","Basement","Pool","Garage"]

SALES_HISTORY (one object per column: "Subject" and "Comparable Sale #1" through "Comparable Sale #9"):
["Date of Prior Sale/Transfer","Price of Prior Sale/Transfer","Data Source(s)","Effective Date of Data Source(s)"]

RECONCILIATION:
["Sales Comparison Approach","Cost Approach","Income Approach","Value","Effective Date","Opinion of Site value","Total Estimate of Cost-New","Depreciation"]

Rules:
- Only "Subject" and "Comparable Sale #1" to "#9"; ignore comparables numbered 10 and above.
- Every column is its own object; never copy a Subject value into a comparable or the reverse.
- Proximity, Sale Price, Data Source, Verification Source and Date of Sale exist for comparables only.
- "Total", "Bdrms" and "Baths" are separate values.
- The three approach values are the dollar amounts after the $ sign in RECONCILIATION.
- "Value" is the amount after "As Is Value"; "Effective Date" is the date after "Effective Date".
- Blank or placeholder cells are " ".
- Return one JSON object with top-level keys SALES_COMPARISON_APPROACH, SALES_HISTORY, RECONCILIATION."##;

/// Cost approach (last selected page).
pub const COST_PROMPT: &str = r#"Extract the COST APPROACH fields from this Form 1004 page.

COST_APPROACH:
["Opinion of Site value","Total Estimate of Cost-New","Depreciation"]

Rules:
- Visible text only. Blank cells are " ".
- Return one JSON object with the top-level key COST_APPROACH."#;
