use serde::{Deserialize, Serialize};

use crate::Query;

/// Materialization hint attached to a CTE (`AS [NOT] MATERIALIZED`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CteMaterialize {
    Never,
    #[default]
    Default,
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonTableExpr {
    pub name: String,
    pub query: Box<Query>,
    /// Declared output column aliases, `WITH c(a, b) AS (...)`. May be
    /// shorter than the body's target list.
    #[serde(default)]
    pub column_aliases: Vec<String>,
    /// Number of range entries anywhere in the tree that resolve to this CTE.
    pub ref_count: usize,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub materialized: CteMaterialize,
}

impl CommonTableExpr {
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        Self {
            name: name.into(),
            query: Box::new(query),
            column_aliases: Vec::new(),
            ref_count: 0,
            recursive: false,
            materialized: CteMaterialize::Default,
        }
    }

    pub fn with_ref_count(mut self, ref_count: usize) -> Self {
        self.ref_count = ref_count;
        self
    }

    pub fn with_column_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column_aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_materialized(mut self, materialized: CteMaterialize) -> Self {
        self.materialized = materialized;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}
