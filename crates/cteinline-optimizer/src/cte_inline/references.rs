use cteinline_common::{Error, Result};
use cteinline_ir::visit::{RangeEntryTiming, Visitor, walk_query};
use cteinline_ir::{Query, RangeTblEntry, RteKind};
use rustc_hash::FxHashMap;

struct CteFinder;

impl<'a> Visitor<'a> for CteFinder {
    fn visit_query(&mut self, query: &'a Query) -> bool {
        if !query.cte_list.is_empty() {
            return true;
        }
        walk_query(self, query, RangeEntryTiming::Before)
    }
}

/// `true` when `query` or any query nested in it declares a CTE.
pub fn query_tree_contains_cte(query: &Query) -> bool {
    CteFinder.visit_query(query)
}

struct Scope<'a> {
    ordinal: usize,
    query: &'a Query,
}

#[derive(Default)]
struct ReferenceCounter<'a> {
    scopes: Vec<Scope<'a>>,
    seen: usize,
    counted: FxHashMap<(usize, &'a str), usize>,
    declared: Vec<(usize, &'a Query)>,
    error: Option<Error>,
}

impl<'a> Visitor<'a> for ReferenceCounter<'a> {
    fn visit_query(&mut self, query: &'a Query) -> bool {
        let ordinal = self.seen;
        self.seen += 1;
        if !query.cte_list.is_empty() {
            self.declared.push((ordinal, query));
        }

        self.scopes.push(Scope { ordinal, query });
        let stop = walk_query(self, query, RangeEntryTiming::Before);
        self.scopes.pop();
        stop
    }

    fn visit_range_entry(&mut self, rte: &'a RangeTblEntry) -> bool {
        let RteKind::Cte {
            name,
            levels_up,
            self_reference,
            ..
        } = &rte.kind
        else {
            return false;
        };

        let declaring = levels_up
            .checked_add(1)
            .and_then(|above| self.scopes.len().checked_sub(above))
            .and_then(|index| self.scopes.get(index))
            .filter(|scope| scope.query.find_cte(name).is_some());
        let Some(scope) = declaring else {
            self.error = Some(Error::corrupt_tree(format!(
                "reference to cte {name} at levels_up {levels_up} does not resolve"
            )));
            return true;
        };

        // Self-references of a recursive CTE are not counted as uses.
        if !self_reference {
            *self.counted.entry((scope.ordinal, name.as_str())).or_default() += 1;
        }
        false
    }
}

/// Resolves every CTE reference in the tree to its declaring scope and checks
/// that each CTE's declared reference count matches the references found.
pub fn verify_cte_reference_counts(root: &Query) -> Result<()> {
    let mut counter = ReferenceCounter::default();
    counter.visit_query(root);
    if let Some(err) = counter.error {
        return Err(err);
    }

    for (ordinal, query) in &counter.declared {
        for cte in &query.cte_list {
            let actual = counter
                .counted
                .get(&(*ordinal, cte.name.as_str()))
                .copied()
                .unwrap_or(0);
            if actual != cte.ref_count {
                return Err(Error::reference_count_mismatch(
                    &cte.name,
                    cte.ref_count,
                    actual,
                ));
            }
        }
    }
    Ok(())
}

struct ReferenceFinder<'n> {
    name: &'n str,
    depth: usize,
    count: usize,
}

impl<'a> Visitor<'a> for ReferenceFinder<'_> {
    fn visit_query(&mut self, query: &'a Query) -> bool {
        self.depth += 1;
        walk_query(self, query, RangeEntryTiming::Before);
        self.depth -= 1;
        false
    }

    fn visit_range_entry(&mut self, rte: &'a RangeTblEntry) -> bool {
        if rte.references_cte(self.name) && rte.cte_levels_up() == Some(self.depth) {
            self.count += 1;
        }
        false
    }
}

/// Number of range entries anywhere below `root` that resolve to the CTE
/// `name` declared in `root` itself.
pub fn count_cte_references(root: &Query, name: &str) -> usize {
    let mut finder = ReferenceFinder {
        name,
        depth: 0,
        count: 0,
    };
    walk_query(&mut finder, root, RangeEntryTiming::Before);
    finder.count
}

#[cfg(test)]
mod tests {
    use cteinline_ir::{CommonTableExpr, Expr, SubLinkKind};

    use super::*;

    fn cte_scan(name: &str, levels_up: usize) -> Query {
        let mut query = Query::select();
        query.range_table.push(RangeTblEntry::cte(name, levels_up));
        query
    }

    fn body() -> Query {
        let mut query = Query::select();
        query.range_table.push(RangeTblEntry::relation("t"));
        query
    }

    #[test]
    fn contains_cte_at_any_depth() {
        assert!(!query_tree_contains_cte(&body()));

        let mut inner = cte_scan("c", 0);
        inner
            .cte_list
            .push(CommonTableExpr::new("c", body()).with_ref_count(1));
        let mut root = body();
        root.quals = Some(Expr::sublink(SubLinkKind::Exists, inner));
        assert!(query_tree_contains_cte(&root));
    }

    #[test]
    fn consistent_counts_verify() {
        let mut root = cte_scan("c", 0);
        root.range_table.push(RangeTblEntry::subquery(cte_scan("c", 1)));
        root.cte_list
            .push(CommonTableExpr::new("c", body()).with_ref_count(2));

        verify_cte_reference_counts(&root).unwrap();
        assert_eq!(count_cte_references(&root, "c"), 2);
    }

    #[test]
    fn sibling_cte_reference_counts_for_declaring_scope() {
        let mut root = cte_scan("b", 0);
        root.cte_list
            .push(CommonTableExpr::new("a", body()).with_ref_count(1));
        root.cte_list
            .push(CommonTableExpr::new("b", cte_scan("a", 1)).with_ref_count(1));

        verify_cte_reference_counts(&root).unwrap();
        assert_eq!(count_cte_references(&root, "a"), 1);
    }

    #[test]
    fn declared_count_too_high() {
        let mut root = cte_scan("c", 0);
        root.cte_list
            .push(CommonTableExpr::new("c", body()).with_ref_count(3));

        assert_eq!(
            verify_cte_reference_counts(&root),
            Err(Error::reference_count_mismatch("c", 3, 1))
        );
    }

    #[test]
    fn dangling_reference_is_corrupt() {
        let root = cte_scan("missing", 0);
        assert!(matches!(
            verify_cte_reference_counts(&root),
            Err(Error::CorruptTree(_))
        ));

        let mut root = Query::select();
        root.range_table.push(RangeTblEntry::subquery(cte_scan("c", 5)));
        root.cte_list
            .push(CommonTableExpr::new("c", body()).with_ref_count(0));
        assert!(matches!(
            verify_cte_reference_counts(&root),
            Err(Error::CorruptTree(_))
        ));
    }

    #[test]
    fn out_of_range_level_is_corrupt() {
        let mut root = cte_scan("c", usize::MAX);
        root.cte_list
            .push(CommonTableExpr::new("c", body()).with_ref_count(1));

        assert!(matches!(
            verify_cte_reference_counts(&root),
            Err(Error::CorruptTree(_))
        ));
    }

    #[test]
    fn shadowed_names_resolve_to_innermost_scope() {
        let mut inner = cte_scan("c", 0);
        inner
            .cte_list
            .push(CommonTableExpr::new("c", body()).with_ref_count(1));
        let mut root = cte_scan("c", 0);
        root.range_table.push(RangeTblEntry::subquery(inner));
        root.cte_list
            .push(CommonTableExpr::new("c", body()).with_ref_count(1));

        verify_cte_reference_counts(&root).unwrap();
        assert_eq!(count_cte_references(&root, "c"), 1);
    }

    #[test]
    fn recursive_self_reference_is_not_a_use() {
        let mut self_ref = RangeTblEntry::cte("r", 1);
        if let RteKind::Cte { self_reference, .. } = &mut self_ref.kind {
            *self_reference = true;
        }
        let mut recursive_body = body();
        recursive_body.range_table.push(self_ref);
        let mut root = cte_scan("r", 0);
        root.has_recursive = true;
        root.cte_list.push(
            CommonTableExpr::new("r", recursive_body)
                .with_ref_count(1)
                .with_recursive(true),
        );

        verify_cte_reference_counts(&root).unwrap();
    }
}
