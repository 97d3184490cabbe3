//! Folds single-use CTEs into their use site as plain subqueries.
//!
//! A CTE is inlined only when it is statically safe to do so (see
//! [`static_ineligibility`]) and the plannability oracle accepts every scope
//! between its declaration and its use. Anything else is left for the
//! materializing path.

mod eligibility;
mod inliner;
mod recursive;
mod references;
mod usage;

pub use eligibility::{
    IneligibleReason, contains_dml, contains_volatile_functions, first_volatile_function,
    is_statically_eligible, static_ineligibility,
};
pub use inliner::inline_cte;
pub use recursive::{inline_ctes_in_query_tree, recursively_inline_ctes};
pub use references::{count_cte_references, query_tree_contains_cte, verify_cte_reference_counts};
pub use usage::{UsageChain, cte_used_in_range_table, find_usage_chain, find_usage_scope};
