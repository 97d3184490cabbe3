use serde::{Deserialize, Serialize};

use crate::{DataType, Expr, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RteKind {
    Relation {
        name: String,
        #[serde(default)]
        tablesample: Option<Expr>,
    },
    Subquery {
        subquery: Box<Query>,
    },
    Join {
        join_type: JoinType,
        join_alias_vars: Vec<Expr>,
        quals: Option<Expr>,
    },
    Function {
        functions: Vec<Expr>,
    },
    TableFunc {
        args: Vec<Expr>,
    },
    Values {
        values_lists: Vec<Vec<Expr>>,
    },
    /// Reference to a CTE declared `levels_up` query boundaries above the
    /// scope owning this entry.
    Cte {
        name: String,
        levels_up: usize,
        #[serde(default)]
        self_reference: bool,
        #[serde(default)]
        col_types: Vec<DataType>,
        #[serde(default)]
        col_collations: Vec<Option<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeTblEntry {
    pub kind: RteKind,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub column_aliases: Vec<String>,
    #[serde(default)]
    pub lateral: bool,
    #[serde(default)]
    pub security_barrier: bool,
    #[serde(default)]
    pub security_quals: Vec<Expr>,
}

impl RangeTblEntry {
    pub fn new(kind: RteKind) -> Self {
        Self {
            kind,
            alias: None,
            column_aliases: Vec::new(),
            lateral: false,
            security_barrier: false,
            security_quals: Vec::new(),
        }
    }

    pub fn relation(name: impl Into<String>) -> Self {
        Self::new(RteKind::Relation {
            name: name.into(),
            tablesample: None,
        })
    }

    pub fn subquery(subquery: Query) -> Self {
        Self::new(RteKind::Subquery {
            subquery: Box::new(subquery),
        })
    }

    pub fn cte(name: impl Into<String>, levels_up: usize) -> Self {
        Self::new(RteKind::Cte {
            name: name.into(),
            levels_up,
            self_reference: false,
            col_types: Vec::new(),
            col_collations: Vec::new(),
        })
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns `true` when this entry references the CTE `name`, at any level.
    pub fn references_cte(&self, name: &str) -> bool {
        matches!(&self.kind, RteKind::Cte { name: ctename, .. } if ctename == name)
    }

    pub fn cte_levels_up(&self) -> Option<usize> {
        match &self.kind {
            RteKind::Cte { levels_up, .. } => Some(*levels_up),
            RteKind::Relation { .. }
            | RteKind::Subquery { .. }
            | RteKind::Join { .. }
            | RteKind::Function { .. }
            | RteKind::TableFunc { .. }
            | RteKind::Values { .. } => None,
        }
    }

    pub fn subquery_ref(&self) -> Option<&Query> {
        match &self.kind {
            RteKind::Subquery { subquery } => Some(subquery.as_ref()),
            RteKind::Relation { .. }
            | RteKind::Join { .. }
            | RteKind::Function { .. }
            | RteKind::TableFunc { .. }
            | RteKind::Values { .. }
            | RteKind::Cte { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_cte_matches_name_only() {
        let rte = RangeTblEntry::cte("c", 2);
        assert!(rte.references_cte("c"));
        assert!(!rte.references_cte("d"));
        assert_eq!(rte.cte_levels_up(), Some(2));
    }

    #[test]
    fn relation_is_not_a_cte_reference() {
        let rte = RangeTblEntry::relation("c");
        assert!(!rte.references_cte("c"));
        assert_eq!(rte.cte_levels_up(), None);
        assert!(rte.subquery_ref().is_none());
    }

    #[test]
    fn subquery_ref_returns_body() {
        let rte = RangeTblEntry::subquery(Query::select());
        assert!(rte.subquery_ref().is_some());
    }
}
