use cteinline_ir::{Query, RteKind};
use rustc_hash::FxHashSet;

/// Verdict of a plannability check on a single scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plannability {
    Plannable,
    Unsupported { reason: String },
}

impl Plannability {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Plannability::Unsupported {
            reason: reason.into(),
        }
    }

    pub fn is_plannable(&self) -> bool {
        matches!(self, Plannability::Plannable)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Plannability::Plannable => None,
            Plannability::Unsupported { reason } => Some(reason),
        }
    }
}

/// Answers whether the downstream planner could handle a scope if the CTE it
/// uses were inlined. The scope is passed with its own CTE list and set
/// operation tree hidden.
pub trait PlannabilityOracle: Send + Sync {
    fn check(&self, scope: &Query) -> Plannability;
}

impl<F> PlannabilityOracle for F
where
    F: Fn(&Query) -> Plannability + Send + Sync,
{
    fn check(&self, scope: &Query) -> Plannability {
        self(scope)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPlannable;

impl PlannabilityOracle for AlwaysPlannable {
    fn check(&self, _scope: &Query) -> Plannability {
        Plannability::Plannable
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportSettings {
    pub enable_router_execution: bool,
    pub allow_window_without_partition: bool,
    pub allow_grouping_sets: bool,
    /// Relations that live only on the coordinator.
    pub local_tables: FxHashSet<String>,
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            enable_router_execution: true,
            allow_window_without_partition: false,
            allow_grouping_sets: false,
            local_tables: FxHashSet::default(),
        }
    }
}

impl SupportSettings {
    pub fn with_local_table(mut self, name: impl Into<String>) -> Self {
        self.local_tables.insert(name.into());
        self
    }
}

/// Reference oracle modelled on a pushdown planner: a scope is plannable when
/// every construct in it can be evaluated independently on each shard.
#[derive(Debug, Clone, Default)]
pub struct PushdownOracle {
    settings: SupportSettings,
}

impl PushdownOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: SupportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SupportSettings {
        &self.settings
    }

    fn unsupported_range_entry(&self, scope: &Query) -> Option<&'static str> {
        for rte in &scope.range_table {
            match &rte.kind {
                RteKind::Relation { name, .. } if self.settings.local_tables.contains(name) => {
                    return Some("Local tables cannot be used in distributed queries.");
                }
                RteKind::Function { .. } | RteKind::TableFunc { .. } => {
                    return Some("could not run distributed query with complex table expressions");
                }
                RteKind::Relation { .. }
                | RteKind::Subquery { .. }
                | RteKind::Join { .. }
                | RteKind::Values { .. }
                | RteKind::Cte { .. } => {}
            }
        }
        None
    }
}

impl PlannabilityOracle for PushdownOracle {
    fn check(&self, scope: &Query) -> Plannability {
        if scope.has_modifying_ctes() {
            return Plannability::unsupported(
                "data-modifying statements are not supported in the WITH clauses of distributed queries",
            );
        }
        if !self.settings.allow_window_without_partition
            && scope
                .window_clauses
                .iter()
                .any(|window| window.partition_by.is_empty())
        {
            return Plannability::unsupported(
                "could not run distributed query because the window function that is used cannot be pushed down",
            );
        }
        if !self.settings.allow_grouping_sets && scope.grouping_sets {
            return Plannability::unsupported(
                "could not run distributed query with GROUPING SETS, CUBE, or ROLLUP",
            );
        }
        if let Some(reason) = self.unsupported_range_entry(scope) {
            return Plannability::unsupported(reason);
        }
        if !self.settings.enable_router_execution && !scope.row_marks.is_empty() {
            return Plannability::unsupported(
                "could not run distributed query with FOR UPDATE/SHARE commands",
            );
        }
        Plannability::Plannable
    }
}

#[cfg(test)]
mod tests {
    use cteinline_ir::{
        CommandType, CommonTableExpr, Expr, LockStrength, RangeTblEntry, RowMark, WindowClause,
    };

    use super::*;

    fn scan(table: &str) -> Query {
        let mut query = Query::select();
        query.range_table.push(RangeTblEntry::relation(table));
        query
    }

    fn reason_of(verdict: Plannability) -> String {
        match verdict {
            Plannability::Unsupported { reason } => reason,
            other => panic!("Expected Unsupported, got {:?}", other),
        }
    }

    #[test]
    fn plain_scan_is_plannable() {
        assert!(PushdownOracle::new().check(&scan("t")).is_plannable());
    }

    #[test]
    fn window_without_partition_is_rejected() {
        let mut query = scan("t");
        query.window_clauses.push(WindowClause::default());

        let reason = reason_of(PushdownOracle::new().check(&query));
        assert!(reason.contains("window function"));
    }

    #[test]
    fn partitioned_window_is_plannable() {
        let mut query = scan("t");
        query.window_clauses.push(WindowClause {
            partition_by: vec![Expr::column(1, 1)],
            ..WindowClause::default()
        });

        assert!(PushdownOracle::new().check(&query).is_plannable());
    }

    #[test]
    fn window_allowed_by_settings() {
        let mut query = scan("t");
        query.window_clauses.push(WindowClause::default());
        let oracle = PushdownOracle::with_settings(SupportSettings {
            allow_window_without_partition: true,
            ..SupportSettings::default()
        });

        assert!(oracle.check(&query).is_plannable());
    }

    #[test]
    fn grouping_sets_are_rejected() {
        let mut query = scan("t");
        query.grouping_sets = true;

        let reason = reason_of(PushdownOracle::new().check(&query));
        assert!(reason.contains("GROUPING SETS"));
    }

    #[test]
    fn local_tables_are_rejected() {
        let oracle =
            PushdownOracle::with_settings(SupportSettings::default().with_local_table("local_t"));

        assert!(oracle.check(&scan("dist_t")).is_plannable());
        assert_eq!(
            oracle.check(&scan("local_t")).reason(),
            Some("Local tables cannot be used in distributed queries.")
        );
    }

    #[test]
    fn table_functions_are_rejected() {
        let mut query = Query::select();
        query
            .range_table
            .push(RangeTblEntry::new(RteKind::TableFunc { args: vec![] }));

        assert!(!PushdownOracle::new().check(&query).is_plannable());
    }

    #[test]
    fn modifying_ctes_are_rejected() {
        let mut query = scan("t");
        query
            .cte_list
            .push(CommonTableExpr::new("del", Query::new(CommandType::Delete)));

        let reason = reason_of(PushdownOracle::new().check(&query));
        assert!(reason.starts_with("data-modifying statements"));
    }

    #[test]
    fn row_marks_need_router_execution() {
        let mut query = scan("t");
        query.row_marks.push(RowMark {
            rt_index: 1,
            strength: LockStrength::ForUpdate,
        });

        assert!(PushdownOracle::new().check(&query).is_plannable());

        let oracle = PushdownOracle::with_settings(SupportSettings {
            enable_router_execution: false,
            ..SupportSettings::default()
        });
        assert!(!oracle.check(&query).is_plannable());
    }

    #[test]
    fn closures_are_oracles() {
        let oracle = |scope: &Query| {
            if scope.range_table.is_empty() {
                Plannability::unsupported("empty")
            } else {
                Plannability::Plannable
            }
        };

        assert!(oracle.check(&scan("t")).is_plannable());
        assert_eq!(oracle.check(&Query::select()).reason(), Some("empty"));
        assert!(AlwaysPlannable.check(&Query::select()).is_plannable());
    }
}
