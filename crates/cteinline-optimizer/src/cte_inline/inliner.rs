use cteinline_common::{Error, Result};
use cteinline_ir::visit::{RangeEntryTiming, VisitorMut, walk_query_mut};
use cteinline_ir::{CommonTableExpr, Query, RangeTblEntry, RteKind, increment_var_sublevels_up};
use tracing::debug;

struct InlineCteMutator<'c> {
    cte_name: &'c str,
    cte_query: &'c Query,
    column_aliases: &'c [String],
    levels_up: usize,
    replaced: usize,
}

impl InlineCteMutator<'_> {
    fn matches(&self, rte: &RangeTblEntry) -> bool {
        matches!(
            &rte.kind,
            RteKind::Cte { name, levels_up, .. }
                if name == self.cte_name && *levels_up == self.levels_up
        )
    }
}

impl VisitorMut for InlineCteMutator<'_> {
    fn range_entry_timing(&self) -> RangeEntryTiming {
        RangeEntryTiming::After
    }

    fn visit_query_mut(&mut self, query: &mut Query) -> bool {
        self.levels_up += 1;
        let stop = walk_query_mut(self, query, RangeEntryTiming::After);
        self.levels_up -= 1;
        stop
    }

    fn visit_range_entry_mut(&mut self, rte: &mut RangeTblEntry) -> bool {
        if !self.matches(rte) {
            return false;
        }

        let mut subquery = self.cte_query.clone();
        if self.levels_up > 0 {
            increment_var_sublevels_up(&mut subquery, self.levels_up, 1);
        }
        apply_column_aliases(&mut subquery, self.column_aliases);

        rte.kind = RteKind::Subquery {
            subquery: Box::new(subquery),
        };
        rte.security_barrier = false;
        self.replaced += 1;
        debug!(
            cte = self.cte_name,
            levels_up = self.levels_up,
            "replaced CTE reference with subquery"
        );
        false
    }
}

/// Renames output columns positionally. Junk columns are not outputs and
/// keep their names; aliases past the last output are ignored.
fn apply_column_aliases(query: &mut Query, aliases: &[String]) {
    let outputs = query.target_list.iter_mut().filter(|te| !te.resjunk);
    for (entry, alias) in outputs.zip(aliases) {
        entry.resname = Some(alias.clone());
    }
}

/// Replaces every reference to `cte` below `main_query` with a copy of its
/// body. `main_query` is the scope declaring `cte`; the caller drops the
/// definition afterwards.
pub fn inline_cte(main_query: &mut Query, cte: &CommonTableExpr) -> Result<()> {
    let mut mutator = InlineCteMutator {
        cte_name: &cte.name,
        cte_query: &cte.query,
        column_aliases: &cte.column_aliases,
        levels_up: 0,
        replaced: 0,
    };
    walk_query_mut(&mut mutator, main_query, RangeEntryTiming::After);

    if mutator.replaced != cte.ref_count {
        return Err(Error::reference_count_mismatch(
            &cte.name,
            cte.ref_count,
            mutator.replaced,
        ));
    }
    Ok(())
}
