use cteinline_common::{Error, Result};
use cteinline_ir::Query;
use cteinline_ir::visit::{
    RangeEntryTiming, VisitorMut, extract_queries, walk_query_mut, with_query_at_mut,
};
use tracing::{debug, info, instrument};

use super::eligibility::static_ineligibility;
use super::inliner::inline_cte;
use super::references::verify_cte_reference_counts;
use super::usage::find_usage_chain;
use crate::oracle::{Plannability, PlannabilityOracle};
use crate::report::{InlineReport, SkipReason};
use crate::settings::{InlineSettings, MissingUsagePolicy};

/// Runs the inlining pass over every scope of `query`, top-down. Scopes
/// created by inlining are visited too, so CTEs declared inside an inlined
/// body get their own chance.
#[instrument(level = "debug", skip_all)]
pub fn recursively_inline_ctes(
    query: &mut Query,
    oracle: &dyn PlannabilityOracle,
    settings: &InlineSettings,
) -> Result<InlineReport> {
    let mut report = InlineReport::default();
    if !settings.enable_cte_inlining {
        debug!("CTE inlining disabled");
        return Ok(report);
    }
    if settings.verify_reference_counts {
        verify_cte_reference_counts(query)?;
    }

    let mut inliner = RecursiveInliner {
        oracle,
        settings,
        report: &mut report,
        error: None,
    };
    inliner.visit_query_mut(query);
    if let Some(err) = inliner.error {
        return Err(err);
    }
    Ok(report)
}

struct RecursiveInliner<'r> {
    oracle: &'r dyn PlannabilityOracle,
    settings: &'r InlineSettings,
    report: &'r mut InlineReport,
    error: Option<Error>,
}

impl VisitorMut for RecursiveInliner<'_> {
    fn visit_query_mut(&mut self, query: &mut Query) -> bool {
        if let Err(err) = inline_ctes_in_query_tree(query, self.oracle, self.settings, self.report)
        {
            self.error = Some(err);
            return true;
        }
        walk_query_mut(self, query, RangeEntryTiming::Before)
    }
}

/// Inlines the eligible CTEs declared directly in `query`. Nested scopes are
/// not processed.
pub fn inline_ctes_in_query_tree(
    query: &mut Query,
    oracle: &dyn PlannabilityOracle,
    settings: &InlineSettings,
    report: &mut InlineReport,
) -> Result<()> {
    if query.cte_list.is_empty() || query.has_recursive || query.has_modifying_ctes() {
        return Ok(());
    }

    let names: Vec<String> = query.cte_list.iter().map(|cte| cte.name.clone()).collect();
    for name in names {
        let Some(position) = query.cte_position(&name) else {
            continue;
        };
        let cte = &query.cte_list[position];

        if let Some(reason) = static_ineligibility(cte, query.command_type) {
            debug!(cte = %name, %reason, "CTE is not eligible for inlining");
            report.record_skip(&name, SkipReason::Ineligible(reason));
            continue;
        }

        let ordinals = match find_usage_chain(query, cte) {
            Ok(chain) => chain.ordinals().to_vec(),
            Err(err) => match settings.missing_usage {
                MissingUsagePolicy::Abort => return Err(err),
                MissingUsagePolicy::Skip => {
                    info!(cte = %name, "Skipped inlining the cte because it has no use site");
                    report.record_skip(&name, SkipReason::UsageNotFound);
                    continue;
                }
            },
        };

        if usage_chain_locks_rows(query, &ordinals) {
            debug!(cte = %name, "CTE is used by a data-modifying or row-locking scope");
            report.record_skip(&name, SkipReason::LockingUseSite);
            continue;
        }

        if settings.check_plannability {
            if let Plannability::Unsupported { reason } =
                check_usage_chain(query, &ordinals, oracle)?
            {
                info!(
                    cte = %name,
                    %reason,
                    "Skipped inlining the cte because if inlined, the planner would error"
                );
                report.record_skip(&name, SkipReason::NotPlannable(reason));
                continue;
            }
        }

        debug!(cte = %name, "CTE is going to be inlined via distributed planning");
        let cte = query.cte_list.remove(position);
        inline_cte(query, &cte)?;
        report.record_inlined(&name);
    }
    Ok(())
}

/// `true` when any scope on the chain is not a plain SELECT or carries
/// FOR UPDATE/SHARE.
fn usage_chain_locks_rows(query: &Query, ordinals: &[usize]) -> bool {
    let scopes = extract_queries(query);
    ordinals
        .iter()
        .filter_map(|&ordinal| scopes.get(ordinal))
        .any(|scope| !scope.is_select() || !scope.row_marks.is_empty())
}

/// Asks the oracle about every scope between the declaring query and the use
/// site, each with its own CTE list and set operations hidden.
fn check_usage_chain(
    query: &mut Query,
    ordinals: &[usize],
    oracle: &dyn PlannabilityOracle,
) -> Result<Plannability> {
    for &ordinal in ordinals {
        let mut verdict = None;
        with_query_at_mut(query, ordinal, |scope| {
            let cte_list = std::mem::take(&mut scope.cte_list);
            let set_operations = scope.set_operations.take();
            verdict = Some(oracle.check(scope));
            scope.cte_list = cte_list;
            scope.set_operations = set_operations;
        });

        match verdict {
            Some(Plannability::Plannable) => {}
            Some(unsupported @ Plannability::Unsupported { .. }) => return Ok(unsupported),
            None => {
                return Err(Error::internal(format!(
                    "usage scope at position {ordinal} is missing from the tree"
                )));
            }
        }
    }
    Ok(Plannability::Plannable)
}
