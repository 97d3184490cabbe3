use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int64,
    Float64,
    Numeric,
    String,
    Date,
    Timestamp,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Numeric(Decimal),
    String(String),
}

/// Function volatility class as recorded by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Volatility {
    #[default]
    Immutable,
    Stable,
    Volatile,
}

/// A column reference. `levels_up` counts the query boundaries between the
/// reference and the scope whose range table holds `rt_index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Var {
    pub rt_index: usize,
    pub attno: usize,
    pub levels_up: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubLinkKind {
    Exists,
    Any,
    All,
    Expr,
    Array,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhenClause {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Var(Var),
    Const(Literal),
    Param {
        index: usize,
    },
    FuncCall {
        name: String,
        args: Vec<Expr>,
        volatility: Volatility,
    },
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    BoolExpr {
        op: BoolOp,
        args: Vec<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
    },
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<WhenClause>,
        else_result: Option<Box<Expr>>,
    },
    Aggregate {
        name: String,
        args: Vec<Expr>,
        filter: Option<Box<Expr>>,
        levels_up: usize,
    },
    WindowFunc {
        name: String,
        args: Vec<Expr>,
        window_ref: usize,
    },
    SubLink {
        kind: SubLinkKind,
        test_expr: Option<Box<Expr>>,
        subquery: Box<Query>,
    },
}

impl Expr {
    pub fn column(rt_index: usize, attno: usize) -> Self {
        Expr::Var(Var {
            rt_index,
            attno,
            levels_up: 0,
        })
    }

    pub fn outer_column(rt_index: usize, attno: usize, levels_up: usize) -> Self {
        Expr::Var(Var {
            rt_index,
            attno,
            levels_up,
        })
    }

    pub fn literal_int64(value: i64) -> Self {
        Expr::Const(Literal::Int64(value))
    }

    pub fn literal_bool(value: bool) -> Self {
        Expr::Const(Literal::Bool(value))
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>, volatility: Volatility) -> Self {
        Expr::FuncCall {
            name: name.into(),
            args,
            volatility,
        }
    }

    pub fn sublink(kind: SubLinkKind, subquery: Query) -> Self {
        Expr::SubLink {
            kind,
            test_expr: None,
            subquery: Box::new(subquery),
        }
    }
}
