use crate::visit::{RangeEntryTiming, VisitorMut, walk_expr_mut, walk_query_mut};
use crate::{Expr, Query, RangeTblEntry, RteKind};

struct IncrementVarSublevelsUp {
    delta: usize,
    min_sublevels_up: usize,
    depth: usize,
}

impl IncrementVarSublevelsUp {
    fn threshold(&self) -> usize {
        self.min_sublevels_up.saturating_add(self.depth)
    }
}

impl VisitorMut for IncrementVarSublevelsUp {
    fn visit_query_mut(&mut self, query: &mut Query) -> bool {
        self.depth += 1;
        walk_query_mut(self, query, RangeEntryTiming::Before);
        self.depth -= 1;
        false
    }

    fn visit_range_entry_mut(&mut self, rte: &mut RangeTblEntry) -> bool {
        let threshold = self.threshold();
        if let RteKind::Cte { levels_up, .. } = &mut rte.kind {
            if *levels_up >= threshold {
                *levels_up = levels_up.saturating_add(self.delta);
            }
        }
        false
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) -> bool {
        let threshold = self.threshold();
        match expr {
            Expr::Var(var) if var.levels_up >= threshold => {
                var.levels_up = var.levels_up.saturating_add(self.delta)
            }
            Expr::Aggregate { levels_up, .. } if *levels_up >= threshold => {
                *levels_up = levels_up.saturating_add(self.delta)
            }
            _ => {}
        }
        walk_expr_mut(self, expr)
    }
}

/// Adds `delta` to every variable, aggregate level and CTE reference in
/// `query` that points at least `min_sublevels_up` levels above the query it
/// appears in, measured from `query` itself. References that resolve inside
/// `query` are untouched. Levels already at the top of the range stay there;
/// such references are dangling either way.
pub fn increment_var_sublevels_up(query: &mut Query, delta: usize, min_sublevels_up: usize) {
    if delta == 0 {
        return;
    }
    let mut mutator = IncrementVarSublevelsUp {
        delta,
        min_sublevels_up,
        depth: 0,
    };
    walk_query_mut(&mut mutator, query, RangeEntryTiming::Before);
}
