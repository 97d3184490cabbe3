//! Query tree model for cteinline.
//!
//! A [`Query`] is one SELECT-shaped scope. Scopes nest through subquery range
//! entries, sublink expressions and CTE bodies; every nested scope is owned by
//! its parent. CTE references are resolved structurally by name plus
//! `levels_up`, never through pointers.

mod cte;
mod expr;
mod query;
mod range_table;
pub mod var_levels;
pub mod visit;

pub use cte::{CommonTableExpr, CteMaterialize};
pub use expr::{
    BinaryOp, BoolOp, DataType, Expr, Literal, SubLinkKind, Var, Volatility, WhenClause,
};
pub use query::{
    CommandType, LockStrength, OnConflict, Query, RowMark, SetOpNode, SetOperationStmt,
    SetOperationType, TargetEntry, WindowClause,
};
pub use range_table::{JoinType, RangeTblEntry, RteKind};
pub use var_levels::increment_var_sublevels_up;
pub use visit::{RangeEntryTiming, Visitor, VisitorMut};
