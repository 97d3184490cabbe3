#![allow(dead_code)]

use cteinline_common::Result;
use cteinline_ir::visit::extract_queries;
use cteinline_ir::{
    BinaryOp, BoolOp, CommandType, CommonTableExpr, Expr, Literal, LockStrength, Query,
    RangeTblEntry, RowMark, RteKind, SetOpNode, SetOperationStmt, SetOperationType, SubLinkKind,
    TargetEntry, Volatility, WindowClause,
};
use rust_decimal::Decimal;

/// Fluent construction of bound query trees for tests and benches.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new(command_type: CommandType) -> Self {
        Self {
            query: Query::new(command_type),
        }
    }

    pub fn select() -> Self {
        Self::new(CommandType::Select)
    }

    pub fn from_table(mut self, name: &str) -> Self {
        self.query
            .range_table
            .push(RangeTblEntry::relation(name).with_alias(name));
        self
    }

    pub fn from_cte(mut self, name: &str, levels_up: usize) -> Self {
        self.query
            .range_table
            .push(RangeTblEntry::cte(name, levels_up).with_alias(name));
        self
    }

    pub fn from_subquery(mut self, subquery: Query) -> Self {
        self.query.range_table.push(RangeTblEntry::subquery(subquery));
        self
    }

    pub fn from_entry(mut self, rte: RangeTblEntry) -> Self {
        self.query.range_table.push(rte);
        self
    }

    /// Appends an output column at the next position.
    pub fn column(mut self, name: &str, expr: Expr) -> Self {
        let resno = self.query.target_list.len() + 1;
        self.query
            .target_list
            .push(TargetEntry::new(expr, resno, Some(name.to_string())));
        self
    }

    pub fn junk_column(mut self, name: &str, expr: Expr) -> Self {
        let resno = self.query.target_list.len() + 1;
        let mut entry = TargetEntry::new(expr, resno, Some(name.to_string()));
        entry.resjunk = true;
        self.query.target_list.push(entry);
        self
    }

    /// ANDs `expr` into the WHERE clause.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.query.quals = Some(match self.query.quals.take() {
            None => expr,
            Some(existing) => and(existing, expr),
        });
        self
    }

    pub fn with_cte(mut self, cte: CommonTableExpr) -> Self {
        if cte.recursive {
            self.query.has_recursive = true;
        }
        if cte.query.command_type.is_modifying() {
            self.query.has_modifying_cte = true;
        }
        self.query.cte_list.push(cte);
        self
    }

    pub fn window(mut self, partition_by: Vec<Expr>) -> Self {
        self.query.window_clauses.push(WindowClause {
            partition_by,
            ..WindowClause::default()
        });
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.query.group_by = exprs;
        self
    }

    pub fn grouping_sets(mut self) -> Self {
        self.query.grouping_sets = true;
        self
    }

    pub fn for_update(mut self) -> Self {
        self.query.row_marks.push(RowMark {
            rt_index: 1,
            strength: LockStrength::ForUpdate,
        });
        self
    }

    pub fn limit(mut self, count: i64) -> Self {
        self.query.limit_count = Some(Expr::literal_int64(count));
        self
    }

    /// UNION [ALL] over the first two range entries.
    pub fn union(mut self, all: bool) -> Self {
        self.query.set_operations = Some(SetOperationStmt {
            op: SetOperationType::Union,
            all,
            left: SetOpNode::RangeRef(1),
            right: SetOpNode::RangeRef(2),
        });
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// `SELECT <columns> FROM <table>` with one column per name.
pub fn scan(table: &str, columns: &[&str]) -> Query {
    columns
        .iter()
        .enumerate()
        .fold(
            QueryBuilder::select().from_table(table),
            |builder, (i, name)| builder.column(name, col(1, i + 1)),
        )
        .build()
}

/// `SELECT * FROM <cte>` reading the given columns from the CTE reference.
pub fn cte_scan(name: &str, levels_up: usize, columns: &[&str]) -> Query {
    columns
        .iter()
        .enumerate()
        .fold(
            QueryBuilder::select().from_cte(name, levels_up),
            |builder, (i, column)| builder.column(column, col(1, i + 1)),
        )
        .build()
}

/// Single-use CTE, the shape the inliner accepts.
pub fn cte(name: &str, body: Query) -> CommonTableExpr {
    CommonTableExpr::new(name, body).with_ref_count(1)
}

pub fn col(rt_index: usize, attno: usize) -> Expr {
    Expr::column(rt_index, attno)
}

pub fn outer_col(rt_index: usize, attno: usize, levels_up: usize) -> Expr {
    Expr::outer_column(rt_index, attno, levels_up)
}

pub fn int(value: i64) -> Expr {
    Expr::literal_int64(value)
}

pub fn numeric(value: &str) -> Expr {
    let parsed = value
        .parse::<Decimal>()
        .unwrap_or_else(|e| panic!("invalid numeric literal {value}: {e}"));
    Expr::Const(Literal::Numeric(parsed))
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Gt, right)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    Expr::binary(left, BinaryOp::Eq, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    Expr::BoolExpr {
        op: BoolOp::And,
        args: vec![left, right],
    }
}

pub fn exists(subquery: Query) -> Expr {
    Expr::sublink(SubLinkKind::Exists, subquery)
}

pub fn random() -> Expr {
    Expr::func("random", vec![], Volatility::Volatile)
}

pub fn now() -> Expr {
    Expr::func("now", vec![], Volatility::Stable)
}

pub fn row_number() -> Expr {
    Expr::WindowFunc {
        name: "row_number".to_string(),
        args: vec![],
        window_ref: 0,
    }
}

/// Every CTE reference named `name` anywhere in the tree, regardless of the
/// scope it resolves to.
pub fn cte_reference_count(root: &Query, name: &str) -> usize {
    extract_queries(root)
        .into_iter()
        .flat_map(|query| query.range_table.iter())
        .filter(|rte| rte.references_cte(name))
        .count()
}

/// CTE names declared by any scope in the tree, in walk order.
pub fn declared_cte_names(root: &Query) -> Vec<String> {
    extract_queries(root)
        .into_iter()
        .flat_map(|query| query.cte_list.iter().map(|cte| cte.name.clone()))
        .collect()
}

pub fn subquery_at(query: &Query, index: usize) -> &Query {
    match query.range_table.get(index).map(|rte| &rte.kind) {
        Some(RteKind::Subquery { subquery }) => subquery,
        other => panic!("Expected Subquery at range entry {index}, got {:?}", other),
    }
}

pub fn sublink_query(expr: Option<&Expr>) -> &Query {
    match expr {
        Some(Expr::SubLink { subquery, .. }) => subquery,
        other => panic!("Expected SubLink, got {:?}", other),
    }
}

pub fn assert_error_contains<T: std::fmt::Debug>(result: Result<T>, keywords: &[&str]) {
    match result {
        Ok(value) => panic!("Expected error but got Ok({:?})", value),
        Err(e) => {
            let error_msg = e.to_string().to_lowercase();
            let found = keywords
                .iter()
                .any(|keyword| error_msg.contains(&keyword.to_lowercase()));
            assert!(
                found,
                "Error message '{}' does not contain any of the expected keywords: {:?}",
                e, keywords
            );
        }
    }
}
