//! Page blocks: which selected pages go to which VLM request.
//!
//! A Form 1004 report reads front to back as subject/site/improvements, then
//! the sales comparison grid and sales history, then the cost approach. The
//! first selected page is therefore the subject block, the last one the cost
//! block, and every page in between belongs to the sales block.

use crate::prompts::{COST_PROMPT, SALES_PROMPT, SUBJECT_PROMPT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three page blocks sent to the VLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Subject,
    Sales,
    Cost,
}

impl BlockKind {
    /// Blocks in request (and merge) order.
    pub const ALL: [BlockKind; 3] = [BlockKind::Subject, BlockKind::Sales, BlockKind::Cost];

    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Subject => "subject",
            BlockKind::Sales => "sales",
            BlockKind::Cost => "cost",
        }
    }

    /// User prompt listing the fields this block should yield.
    pub fn prompt(self) -> &'static str {
        match self {
            BlockKind::Subject => SUBJECT_PROMPT,
            BlockKind::Sales => SALES_PROMPT,
            BlockKind::Cost => COST_PROMPT,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selected pages split into blocks (1-indexed page numbers).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPlan {
    pub subject: Vec<usize>,
    pub sales: Vec<usize>,
    pub cost: Vec<usize>,
}

impl BlockPlan {
    /// Split sorted, deduplicated pages into blocks.
    ///
    /// One page is a subject-only plan; two pages give subject and cost with
    /// an empty sales block.
    pub fn split(pages: &[usize]) -> Self {
        match pages {
            [] => Self::default(),
            [only] => Self {
                subject: vec![*only],
                ..Self::default()
            },
            [first, middle @ .., last] => Self {
                subject: vec![*first],
                sales: middle.to_vec(),
                cost: vec![*last],
            },
        }
    }

    pub fn pages(&self, kind: BlockKind) -> &[usize] {
        match kind {
            BlockKind::Subject => &self.subject,
            BlockKind::Sales => &self.sales,
            BlockKind::Cost => &self.cost,
        }
    }

    /// Non-empty blocks in request order.
    pub fn non_empty(&self) -> impl Iterator<Item = (BlockKind, &[usize])> {
        BlockKind::ALL
            .into_iter()
            .map(|k| (k, self.pages(k)))
            .filter(|(_, pages)| !pages.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.non_empty().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_typical_range() {
        let plan = BlockPlan::split(&[2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(plan.subject, vec![2]);
        assert_eq!(plan.sales, vec![3, 4, 5, 6, 7]);
        assert_eq!(plan.cost, vec![8]);
    }

    #[test]
    fn split_edge_cases() {
        assert!(BlockPlan::split(&[]).is_empty());

        let single = BlockPlan::split(&[4]);
        assert_eq!(single.subject, vec![4]);
        assert!(single.sales.is_empty() && single.cost.is_empty());

        let pair = BlockPlan::split(&[2, 9]);
        assert_eq!(pair.subject, vec![2]);
        assert!(pair.sales.is_empty());
        assert_eq!(pair.cost, vec![9]);
        let kinds: Vec<BlockKind> = pair.non_empty().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![BlockKind::Subject, BlockKind::Cost]);
    }

    #[test]
    fn block_kind_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&BlockKind::Sales).unwrap(), "\"sales\"");
        assert_eq!(BlockKind::Cost.to_string(), "cost");
    }
}
