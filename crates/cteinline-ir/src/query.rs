use serde::{Deserialize, Serialize};

use crate::{CommonTableExpr, Expr, RangeTblEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CommandType {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Utility,
}

impl CommandType {
    pub fn is_modifying(self) -> bool {
        match self {
            CommandType::Insert
            | CommandType::Update
            | CommandType::Delete
            | CommandType::Merge => true,
            CommandType::Select | CommandType::Utility => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub expr: Expr,
    /// 1-based output position.
    pub resno: usize,
    pub resname: Option<String>,
    #[serde(default)]
    pub resjunk: bool,
}

impl TargetEntry {
    pub fn new(expr: Expr, resno: usize, resname: Option<String>) -> Self {
        Self {
            expr,
            resno,
            resname,
            resjunk: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOperationType {
    Union,
    Intersect,
    Except,
}

/// Leaves index the owning query's range table; the tree itself embeds no
/// expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOpNode {
    RangeRef(usize),
    SetOp(Box<SetOperationStmt>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOperationStmt {
    pub op: SetOperationType,
    pub all: bool,
    pub left: SetOpNode,
    pub right: SetOpNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockStrength {
    ForKeyShare,
    ForShare,
    ForNoKeyUpdate,
    ForUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMark {
    pub rt_index: usize,
    pub strength: LockStrength,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowClause {
    pub name: Option<String>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnConflict {
    pub arbiter_where: Option<Expr>,
    pub set_list: Vec<TargetEntry>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub command_type: CommandType,
    pub range_table: Vec<RangeTblEntry>,
    /// WHERE clause of the join tree.
    pub quals: Option<Expr>,
    pub target_list: Vec<TargetEntry>,
    pub cte_list: Vec<CommonTableExpr>,
    pub set_operations: Option<SetOperationStmt>,
    pub group_by: Vec<Expr>,
    pub grouping_sets: bool,
    pub having: Option<Expr>,
    pub window_clauses: Vec<WindowClause>,
    pub limit_count: Option<Expr>,
    pub limit_offset: Option<Expr>,
    pub on_conflict: Option<OnConflict>,
    pub returning_list: Vec<TargetEntry>,
    pub row_marks: Vec<RowMark>,
    pub has_recursive: bool,
    pub has_modifying_cte: bool,
}

impl Query {
    pub fn new(command_type: CommandType) -> Self {
        Self {
            command_type,
            ..Self::default()
        }
    }

    pub fn select() -> Self {
        Self::new(CommandType::Select)
    }

    pub fn is_select(&self) -> bool {
        self.command_type == CommandType::Select
    }

    pub fn find_cte(&self, name: &str) -> Option<&CommonTableExpr> {
        self.cte_list.iter().find(|cte| cte.name == name)
    }

    pub fn cte_position(&self, name: &str) -> Option<usize> {
        self.cte_list.iter().position(|cte| cte.name == name)
    }

    /// `true` when any declared CTE is data-modifying, either per the flag set
    /// by the binder or by inspecting the CTE bodies.
    pub fn has_modifying_ctes(&self) -> bool {
        self.has_modifying_cte
            || self
                .cte_list
                .iter()
                .any(|cte| cte.query.command_type.is_modifying())
    }

    pub fn output_column_names(&self) -> Vec<Option<&str>> {
        self.target_list
            .iter()
            .filter(|te| !te.resjunk)
            .map(|te| te.resname.as_deref())
            .collect()
    }
}
