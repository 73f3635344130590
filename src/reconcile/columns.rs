//! Column detection: which `(section, field)` each template column stands for.
//!
//! Templates label a section once above its first column and leave the cells
//! over the rest of the block blank (a merged header). Section labels are
//! therefore carried left to right. Leading columns with no section label
//! at all are recovered positionally (before the first comparable block they
//! belong to the subject) or, failing that, by field identity (unlabeled
//! prior-sale columns are the subject's sales history).

use super::normalize::{
    canonical_field, canonical_section, is_sales_history_field, COMPARABLE_PREFIX,
    SALES_HISTORY_SUBJECT, SUBJECT,
};
use crate::config::HeaderLayout;
use crate::grid::SpreadsheetGrid;
use serde::Serialize;
use tracing::debug;

/// Resolved identity of one template column. An empty `section` or `field`
/// means the header did not say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnIdentity {
    /// 1-based column index.
    pub column: usize,
    pub section: String,
    pub field: String,
}

/// One identity per column `1..=grid.max_column()`, in column order.
pub fn detect_sections(grid: &SpreadsheetGrid, layout: &HeaderLayout) -> Vec<ColumnIdentity> {
    let first_comparable = format!("{COMPARABLE_PREFIX}1");
    let mut running = String::new();

    let mut columns: Vec<ColumnIdentity> = (1..=grid.max_column())
        .map(|column| {
            let label = canonical_section(grid.cell(layout.section_row, column));
            if !label.is_empty() {
                running = label;
            }
            ColumnIdentity {
                column,
                section: running.clone(),
                field: canonical_field(grid.cell(layout.field_row, column)),
            }
        })
        .collect();

    let comp1_start = columns
        .iter()
        .find(|c| c.section == first_comparable)
        .map(|c| c.column);

    for identity in columns.iter_mut().filter(|c| c.section.is_empty()) {
        if comp1_start.is_some_and(|start| identity.column < start) {
            identity.section = SUBJECT.to_string();
        } else if is_sales_history_field(&identity.field) {
            identity.section = SALES_HISTORY_SUBJECT.to_string();
        }
    }

    for c in &columns {
        debug!("column {}: section '{}', field '{}'", c.column, c.section, c.field);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::normalize::SALES_HISTORY;

    fn grid(sections: &[&str], fields: &[&str]) -> SpreadsheetGrid {
        SpreadsheetGrid::from_rows([vec![""; fields.len()], sections.to_vec(), fields.to_vec()])
    }

    fn sections_of(ids: &[ColumnIdentity]) -> Vec<&str> {
        ids.iter().map(|c| c.section.as_str()).collect()
    }

    #[test]
    fn blank_section_cells_inherit_from_the_left() {
        let g = grid(
            &["", "", "COMPARABLE SALE #1", "", ""],
            &["Address", "GLA", "Address", "GLA", "Bdrms"],
        );
        let ids = detect_sections(&g, &HeaderLayout::default());
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[3].section, "COMPARABLE SALE #1");
        assert_eq!(ids[4].section, "COMPARABLE SALE #1");
        assert_eq!(ids[4].field, "BEDROOMS");
        assert_eq!(ids[4].column, 5);
    }

    #[test]
    fn unlabeled_columns_before_first_comparable_are_subject() {
        let g = grid(
            &["", "", "", "", "Comparable Sale # 1", "", "Comparbe 2"],
            &["Address", "City", "State", "GLA", "Address", "GLA", "GLA"],
        );
        let ids = detect_sections(&g, &HeaderLayout::default());
        assert_eq!(
            sections_of(&ids),
            vec![
                SUBJECT,
                SUBJECT,
                SUBJECT,
                SUBJECT,
                "COMPARABLE SALE #1",
                "COMPARABLE SALE #1",
                "COMPARABLE SALE #2"
            ]
        );
    }

    #[test]
    fn labeled_section_is_not_overridden_by_fallback() {
        let g = grid(&["Reconciliation", "", "Comparable Sale #1"], &["Value", "Depreciation", "GLA"]);
        let ids = detect_sections(&g, &HeaderLayout::default());
        assert_eq!(sections_of(&ids), vec!["RECONCILIATION", "RECONCILIATION", "COMPARABLE SALE #1"]);
    }

    #[test]
    fn unlabeled_prior_sale_columns_are_subject_sales_history() {
        let g = grid(
            &["", "", ""],
            &["Date of Prior Sale/Transfer", "Data Source(s)", "Condition"],
        );
        let ids = detect_sections(&g, &HeaderLayout::default());
        assert_eq!(
            sections_of(&ids),
            vec![SALES_HISTORY_SUBJECT, SALES_HISTORY_SUBJECT, ""]
        );
    }

    #[test]
    fn explicit_sales_history_label_is_kept() {
        let g = grid(&["Sales History", ""], &["Data Source(s)", "Price of Prior Sale/Transfer"]);
        let ids = detect_sections(&g, &HeaderLayout::default());
        assert_eq!(sections_of(&ids), vec![SALES_HISTORY, SALES_HISTORY]);
    }

    #[test]
    fn custom_layout_rows() {
        let g = SpreadsheetGrid::from_rows([vec!["SUBJECT", "COST APPROACH"], vec!["State", "Depreciation"]]);
        let layout = HeaderLayout {
            section_row: 1,
            field_row: 2,
            first_data_row: 3,
        };
        let ids = detect_sections(&g, &layout);
        assert_eq!(ids[0].section, SUBJECT);
        assert_eq!(ids[0].field, "STATE");
        assert_eq!(ids[1].section, "COST_APPROACH");
    }
}
