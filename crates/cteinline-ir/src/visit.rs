//! Generic query tree walkers.
//!
//! [`walk_query`] visits everything reachable from one query: its expressions,
//! the bodies of its CTEs and its range table. Nested queries (subquery range
//! entries, sublinks, CTE bodies) are handed to [`Visitor::visit_query`],
//! whose default implementation keeps descending; overriding it lets a
//! visitor keep per-scope state such as a nesting depth. The query passed to
//! `walk_query` itself is not handed to `visit_query`; call
//! `visitor.visit_query(root)` to include it.
//!
//! Every visitor method returns `true` to stop the walk. The stop propagates
//! to the caller and no further siblings are visited.
//!
//! [`VisitorMut`] mirrors [`Visitor`] over mutable references and traverses in
//! exactly the same order, so pre-order positions computed by one can address
//! nodes through the other.

use crate::{Expr, OnConflict, Query, RangeTblEntry, RteKind, TargetEntry};

/// When a range entry is handed to the visitor relative to its own contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeEntryTiming {
    #[default]
    Before,
    /// Lets a visitor replace an entry without the walk descending into the
    /// replacement.
    After,
}

pub trait Visitor<'a> {
    fn range_entry_timing(&self) -> RangeEntryTiming {
        RangeEntryTiming::Before
    }

    fn visit_query(&mut self, query: &'a Query) -> bool {
        let timing = self.range_entry_timing();
        walk_query(self, query, timing)
    }

    fn visit_range_entry(&mut self, _rte: &'a RangeTblEntry) -> bool {
        false
    }

    fn visit_expr(&mut self, expr: &'a Expr) -> bool {
        walk_expr(self, expr)
    }
}

pub trait VisitorMut {
    fn range_entry_timing(&self) -> RangeEntryTiming {
        RangeEntryTiming::Before
    }

    fn visit_query_mut(&mut self, query: &mut Query) -> bool {
        let timing = self.range_entry_timing();
        walk_query_mut(self, query, timing)
    }

    fn visit_range_entry_mut(&mut self, _rte: &mut RangeTblEntry) -> bool {
        false
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) -> bool {
        walk_expr_mut(self, expr)
    }
}

pub fn walk_query<'a, V>(visitor: &mut V, query: &'a Query, timing: RangeEntryTiming) -> bool
where
    V: Visitor<'a> + ?Sized,
{
    if walk_target_list(visitor, &query.target_list) {
        return true;
    }
    if let Some(on_conflict) = &query.on_conflict {
        if walk_on_conflict(visitor, on_conflict) {
            return true;
        }
    }
    if walk_target_list(visitor, &query.returning_list) {
        return true;
    }
    if walk_opt_expr(visitor, query.quals.as_ref()) {
        return true;
    }
    // Set-operation leaves index the range table and are reached through it.
    if walk_exprs(visitor, &query.group_by) {
        return true;
    }
    if walk_opt_expr(visitor, query.having.as_ref()) {
        return true;
    }
    for window in &query.window_clauses {
        if walk_exprs(visitor, &window.partition_by) || walk_exprs(visitor, &window.order_by) {
            return true;
        }
    }
    if walk_opt_expr(visitor, query.limit_offset.as_ref()) {
        return true;
    }
    if walk_opt_expr(visitor, query.limit_count.as_ref()) {
        return true;
    }
    for cte in &query.cte_list {
        if visitor.visit_query(&cte.query) {
            return true;
        }
    }
    walk_range_table(visitor, &query.range_table, timing)
}

pub fn walk_range_table<'a, V>(
    visitor: &mut V,
    range_table: &'a [RangeTblEntry],
    timing: RangeEntryTiming,
) -> bool
where
    V: Visitor<'a> + ?Sized,
{
    for rte in range_table {
        if timing == RangeEntryTiming::Before && visitor.visit_range_entry(rte) {
            return true;
        }

        let stop = match &rte.kind {
            RteKind::Relation { tablesample, .. } => walk_opt_expr(visitor, tablesample.as_ref()),
            RteKind::Subquery { subquery } => visitor.visit_query(subquery),
            RteKind::Join {
                join_alias_vars,
                quals,
                ..
            } => walk_exprs(visitor, join_alias_vars) || walk_opt_expr(visitor, quals.as_ref()),
            RteKind::Function { functions } => walk_exprs(visitor, functions),
            RteKind::TableFunc { args } => walk_exprs(visitor, args),
            RteKind::Values { values_lists } => {
                values_lists.iter().any(|row| walk_exprs(visitor, row))
            }
            RteKind::Cte { .. } => false,
        };
        if stop || walk_exprs(visitor, &rte.security_quals) {
            return true;
        }

        if timing == RangeEntryTiming::After && visitor.visit_range_entry(rte) {
            return true;
        }
    }
    false
}

pub fn walk_expr<'a, V>(visitor: &mut V, expr: &'a Expr) -> bool
where
    V: Visitor<'a> + ?Sized,
{
    match expr {
        Expr::Var(_) | Expr::Const(_) | Expr::Param { .. } => false,
        Expr::FuncCall { args, .. } | Expr::BoolExpr { args, .. } => walk_exprs(visitor, args),
        Expr::BinaryOp { left, right, .. } => {
            visitor.visit_expr(left) || visitor.visit_expr(right)
        }
        Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } => visitor.visit_expr(expr),
        Expr::Case {
            operand,
            when_clauses,
            else_result,
        } => {
            walk_opt_expr(visitor, operand.as_deref())
                || when_clauses.iter().any(|clause| {
                    visitor.visit_expr(&clause.condition) || visitor.visit_expr(&clause.result)
                })
                || walk_opt_expr(visitor, else_result.as_deref())
        }
        Expr::Aggregate { args, filter, .. } => {
            walk_exprs(visitor, args) || walk_opt_expr(visitor, filter.as_deref())
        }
        Expr::WindowFunc { args, .. } => walk_exprs(visitor, args),
        Expr::SubLink {
            test_expr,
            subquery,
            ..
        } => walk_opt_expr(visitor, test_expr.as_deref()) || visitor.visit_query(subquery),
    }
}

fn walk_exprs<'a, V>(visitor: &mut V, exprs: &'a [Expr]) -> bool
where
    V: Visitor<'a> + ?Sized,
{
    exprs.iter().any(|expr| visitor.visit_expr(expr))
}

fn walk_opt_expr<'a, V>(visitor: &mut V, expr: Option<&'a Expr>) -> bool
where
    V: Visitor<'a> + ?Sized,
{
    expr.is_some_and(|expr| visitor.visit_expr(expr))
}

fn walk_target_list<'a, V>(visitor: &mut V, target_list: &'a [TargetEntry]) -> bool
where
    V: Visitor<'a> + ?Sized,
{
    target_list.iter().any(|te| visitor.visit_expr(&te.expr))
}

fn walk_on_conflict<'a, V>(visitor: &mut V, on_conflict: &'a OnConflict) -> bool
where
    V: Visitor<'a> + ?Sized,
{
    walk_opt_expr(visitor, on_conflict.arbiter_where.as_ref())
        || walk_target_list(visitor, &on_conflict.set_list)
        || walk_opt_expr(visitor, on_conflict.where_clause.as_ref())
}

pub fn walk_query_mut<V>(visitor: &mut V, query: &mut Query, timing: RangeEntryTiming) -> bool
where
    V: VisitorMut + ?Sized,
{
    if walk_target_list_mut(visitor, &mut query.target_list) {
        return true;
    }
    if let Some(on_conflict) = &mut query.on_conflict {
        if walk_on_conflict_mut(visitor, on_conflict) {
            return true;
        }
    }
    if walk_target_list_mut(visitor, &mut query.returning_list) {
        return true;
    }
    if walk_opt_expr_mut(visitor, query.quals.as_mut()) {
        return true;
    }
    if walk_exprs_mut(visitor, &mut query.group_by) {
        return true;
    }
    if walk_opt_expr_mut(visitor, query.having.as_mut()) {
        return true;
    }
    for window in &mut query.window_clauses {
        if walk_exprs_mut(visitor, &mut window.partition_by)
            || walk_exprs_mut(visitor, &mut window.order_by)
        {
            return true;
        }
    }
    if walk_opt_expr_mut(visitor, query.limit_offset.as_mut()) {
        return true;
    }
    if walk_opt_expr_mut(visitor, query.limit_count.as_mut()) {
        return true;
    }
    for cte in &mut query.cte_list {
        if visitor.visit_query_mut(&mut cte.query) {
            return true;
        }
    }
    walk_range_table_mut(visitor, &mut query.range_table, timing)
}

pub fn walk_range_table_mut<V>(
    visitor: &mut V,
    range_table: &mut [RangeTblEntry],
    timing: RangeEntryTiming,
) -> bool
where
    V: VisitorMut + ?Sized,
{
    for rte in range_table {
        if timing == RangeEntryTiming::Before && visitor.visit_range_entry_mut(rte) {
            return true;
        }

        let stop = match &mut rte.kind {
            RteKind::Relation { tablesample, .. } => {
                walk_opt_expr_mut(visitor, tablesample.as_mut())
            }
            RteKind::Subquery { subquery } => visitor.visit_query_mut(subquery),
            RteKind::Join {
                join_alias_vars,
                quals,
                ..
            } => {
                walk_exprs_mut(visitor, join_alias_vars)
                    || walk_opt_expr_mut(visitor, quals.as_mut())
            }
            RteKind::Function { functions } => walk_exprs_mut(visitor, functions),
            RteKind::TableFunc { args } => walk_exprs_mut(visitor, args),
            RteKind::Values { values_lists } => values_lists
                .iter_mut()
                .any(|row| walk_exprs_mut(visitor, row)),
            RteKind::Cte { .. } => false,
        };
        if stop || walk_exprs_mut(visitor, &mut rte.security_quals) {
            return true;
        }

        if timing == RangeEntryTiming::After && visitor.visit_range_entry_mut(rte) {
            return true;
        }
    }
    false
}

pub fn walk_expr_mut<V>(visitor: &mut V, expr: &mut Expr) -> bool
where
    V: VisitorMut + ?Sized,
{
    match expr {
        Expr::Var(_) | Expr::Const(_) | Expr::Param { .. } => false,
        Expr::FuncCall { args, .. } | Expr::BoolExpr { args, .. } => {
            walk_exprs_mut(visitor, args)
        }
        Expr::BinaryOp { left, right, .. } => {
            visitor.visit_expr_mut(left) || visitor.visit_expr_mut(right)
        }
        Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } => visitor.visit_expr_mut(expr),
        Expr::Case {
            operand,
            when_clauses,
            else_result,
        } => {
            walk_opt_expr_mut(visitor, operand.as_deref_mut())
                || when_clauses.iter_mut().any(|clause| {
                    visitor.visit_expr_mut(&mut clause.condition)
                        || visitor.visit_expr_mut(&mut clause.result)
                })
                || walk_opt_expr_mut(visitor, else_result.as_deref_mut())
        }
        Expr::Aggregate { args, filter, .. } => {
            walk_exprs_mut(visitor, args) || walk_opt_expr_mut(visitor, filter.as_deref_mut())
        }
        Expr::WindowFunc { args, .. } => walk_exprs_mut(visitor, args),
        Expr::SubLink {
            test_expr,
            subquery,
            ..
        } => {
            walk_opt_expr_mut(visitor, test_expr.as_deref_mut())
                || visitor.visit_query_mut(subquery)
        }
    }
}

fn walk_exprs_mut<V>(visitor: &mut V, exprs: &mut [Expr]) -> bool
where
    V: VisitorMut + ?Sized,
{
    exprs.iter_mut().any(|expr| visitor.visit_expr_mut(expr))
}

fn walk_opt_expr_mut<V>(visitor: &mut V, expr: Option<&mut Expr>) -> bool
where
    V: VisitorMut + ?Sized,
{
    expr.is_some_and(|expr| visitor.visit_expr_mut(expr))
}

fn walk_target_list_mut<V>(visitor: &mut V, target_list: &mut [TargetEntry]) -> bool
where
    V: VisitorMut + ?Sized,
{
    target_list
        .iter_mut()
        .any(|te| visitor.visit_expr_mut(&mut te.expr))
}

fn walk_on_conflict_mut<V>(visitor: &mut V, on_conflict: &mut OnConflict) -> bool
where
    V: VisitorMut + ?Sized,
{
    walk_opt_expr_mut(visitor, on_conflict.arbiter_where.as_mut())
        || walk_target_list_mut(visitor, &mut on_conflict.set_list)
        || walk_opt_expr_mut(visitor, on_conflict.where_clause.as_mut())
}

struct QueryCollector<'a> {
    queries: Vec<&'a Query>,
}

impl<'a> Visitor<'a> for QueryCollector<'a> {
    fn visit_query(&mut self, query: &'a Query) -> bool {
        self.queries.push(query);
        walk_query(self, query, RangeEntryTiming::Before)
    }
}

/// Every query in the tree, `root` first, in walk pre-order.
pub fn extract_queries(root: &Query) -> Vec<&Query> {
    let mut collector = QueryCollector {
        queries: Vec::new(),
    };
    collector.visit_query(root);
    collector.queries
}

struct NthQuery<F> {
    target: usize,
    seen: usize,
    action: Option<F>,
}

impl<F: FnOnce(&mut Query)> VisitorMut for NthQuery<F> {
    fn visit_query_mut(&mut self, query: &mut Query) -> bool {
        let ordinal = self.seen;
        self.seen += 1;
        if ordinal == self.target {
            if let Some(action) = self.action.take() {
                action(query);
            }
            return true;
        }
        walk_query_mut(self, query, RangeEntryTiming::Before)
    }
}

/// Applies `action` to the query at pre-order position `ordinal` (the root is
/// 0), using the numbering of [`extract_queries`]. Returns `false` when the
/// tree has fewer queries.
pub fn with_query_at_mut<F>(root: &mut Query, ordinal: usize, action: F) -> bool
where
    F: FnOnce(&mut Query),
{
    let mut finder = NthQuery {
        target: ordinal,
        seen: 0,
        action: Some(action),
    };
    finder.visit_query_mut(root);
    finder.action.is_none()
}
