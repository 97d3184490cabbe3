pub mod cte_inline;
mod oracle;
mod report;
mod settings;


pub use cte_inline::{
    IneligibleReason, inline_cte, inline_ctes_in_query_tree, is_statically_eligible,
    query_tree_contains_cte, recursively_inline_ctes, verify_cte_reference_counts,
};
pub use oracle::{
    AlwaysPlannable, Plannability, PlannabilityOracle, PushdownOracle, SupportSettings,
};
pub use report::{InlineReport, SkipReason, SkippedCte};
pub use settings::{InlineSettings, MissingUsagePolicy};

use cteinline_common::Result;
use cteinline_ir::Query;

/// Inlines CTEs across the whole tree with the reference pushdown oracle.
pub fn optimize(query: &mut Query) -> Result<InlineReport> {
    optimize_with_settings(query, &InlineSettings::all_enabled())
}

pub fn optimize_with_settings(
    query: &mut Query,
    settings: &InlineSettings,
) -> Result<InlineReport> {
    recursively_inline_ctes(query, &PushdownOracle::new(), settings)
}
