use std::fmt;

use cteinline_ir::visit::{RangeEntryTiming, Visitor, walk_expr, walk_query};
use cteinline_ir::{CommandType, CommonTableExpr, CteMaterialize, Expr, Query, Volatility};

/// First condition that keeps a CTE from being inlined, independent of where
/// it is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IneligibleReason {
    ReferenceCount(usize),
    Recursive,
    NonSelectCommand(CommandType),
    DataModifying,
    VolatileFunction(String),
    MaterializeAlways,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::ReferenceCount(count) => {
                write!(f, "referenced {count} times, only single-use CTEs are inlined")
            }
            IneligibleReason::Recursive => write!(f, "recursive CTE"),
            IneligibleReason::NonSelectCommand(command) => {
                write!(f, "enclosing command is {command:?}, not a SELECT")
            }
            IneligibleReason::DataModifying => {
                write!(f, "body contains a data-modifying statement or row lock")
            }
            IneligibleReason::VolatileFunction(name) => {
                write!(f, "body calls volatile function {name}")
            }
            IneligibleReason::MaterializeAlways => write!(f, "declared AS MATERIALIZED"),
        }
    }
}

/// Mirrors the planner's own rule for folding a CTE into its single use site.
pub fn static_ineligibility(
    cte: &CommonTableExpr,
    command_type: CommandType,
) -> Option<IneligibleReason> {
    if cte.ref_count != 1 {
        return Some(IneligibleReason::ReferenceCount(cte.ref_count));
    }
    if cte.recursive {
        return Some(IneligibleReason::Recursive);
    }
    if command_type != CommandType::Select {
        return Some(IneligibleReason::NonSelectCommand(command_type));
    }
    if contains_dml(&cte.query) {
        return Some(IneligibleReason::DataModifying);
    }
    if let Some(name) = first_volatile_function(&cte.query) {
        return Some(IneligibleReason::VolatileFunction(name.to_string()));
    }
    if cte.materialized == CteMaterialize::Always {
        return Some(IneligibleReason::MaterializeAlways);
    }
    None
}

pub fn is_statically_eligible(cte: &CommonTableExpr, command_type: CommandType) -> bool {
    static_ineligibility(cte, command_type).is_none()
}

struct DmlFinder;

impl<'a> Visitor<'a> for DmlFinder {
    fn visit_query(&mut self, query: &'a Query) -> bool {
        if query.command_type != CommandType::Select || !query.row_marks.is_empty() {
            return true;
        }
        walk_query(self, query, RangeEntryTiming::Before)
    }
}

/// `true` when `query` or any query nested in it is not a plain SELECT or
/// carries a row-locking clause.
pub fn contains_dml(query: &Query) -> bool {
    DmlFinder.visit_query(query)
}

struct VolatileFinder<'a> {
    found: Option<&'a str>,
}

impl<'a> Visitor<'a> for VolatileFinder<'a> {
    fn visit_expr(&mut self, expr: &'a Expr) -> bool {
        if let Expr::FuncCall {
            name,
            volatility: Volatility::Volatile,
            ..
        } = expr
        {
            self.found = Some(name.as_str());
            return true;
        }
        walk_expr(self, expr)
    }
}

pub fn first_volatile_function(query: &Query) -> Option<&str> {
    let mut finder = VolatileFinder { found: None };
    finder.visit_query(query);
    finder.found
}

pub fn contains_volatile_functions(query: &Query) -> bool {
    first_volatile_function(query).is_some()
}
