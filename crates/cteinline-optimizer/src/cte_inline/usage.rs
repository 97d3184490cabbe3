use cteinline_common::{Error, Result};
use cteinline_ir::visit::{RangeEntryTiming, Visitor, walk_query};
use cteinline_ir::{CommonTableExpr, Query, RangeTblEntry, RteKind};

/// Scopes from the declaring query down to the one whose range table holds
/// the reference, each paired with its pre-order ordinal in the tree.
#[derive(Debug, Clone)]
pub struct UsageChain<'a> {
    scopes: Vec<&'a Query>,
    ordinals: Vec<usize>,
}

impl<'a> UsageChain<'a> {
    pub fn scopes(&self) -> &[&'a Query] {
        &self.scopes
    }

    pub fn ordinals(&self) -> &[usize] {
        &self.ordinals
    }

    /// Number of query boundaries between the declaring scope and the use
    /// site; equals the reference's `levels_up`.
    pub fn depth(&self) -> usize {
        self.scopes.len().saturating_sub(1)
    }

    pub fn usage_scope(&self) -> Option<&'a Query> {
        self.scopes.last().copied()
    }
}

pub fn cte_used_in_range_table(
    range_table: &[RangeTblEntry],
    name: &str,
    levels_up: usize,
) -> bool {
    range_table.iter().any(|rte| {
        matches!(
            &rte.kind,
            RteKind::Cte { name: cte_name, levels_up: rte_levels, .. }
                if cte_name == name && *rte_levels == levels_up
        )
    })
}

struct UsageChainFinder<'a, 'n> {
    name: &'n str,
    seen: usize,
    scopes: Vec<&'a Query>,
    ordinals: Vec<usize>,
}

impl<'a> Visitor<'a> for UsageChainFinder<'a, '_> {
    fn visit_query(&mut self, query: &'a Query) -> bool {
        let ordinal = self.seen;
        self.seen += 1;
        let depth = self.scopes.len();
        self.scopes.push(query);
        self.ordinals.push(ordinal);

        if cte_used_in_range_table(&query.range_table, self.name, depth) {
            return true;
        }
        if walk_query(self, query, RangeEntryTiming::Before) {
            return true;
        }

        self.scopes.pop();
        self.ordinals.pop();
        false
    }
}

pub fn find_usage_chain<'a>(root: &'a Query, cte: &CommonTableExpr) -> Result<UsageChain<'a>> {
    let mut finder = UsageChainFinder {
        name: &cte.name,
        seen: 0,
        scopes: Vec::new(),
        ordinals: Vec::new(),
    };
    if !finder.visit_query(root) {
        return Err(Error::cte_not_found(&cte.name));
    }
    Ok(UsageChain {
        scopes: finder.scopes,
        ordinals: finder.ordinals,
    })
}

/// Innermost scope whose range table references `cte`, which must be
/// declared in `root`.
pub fn find_usage_scope<'a>(root: &'a Query, cte: &CommonTableExpr) -> Result<&'a Query> {
    if cte_used_in_range_table(&root.range_table, &cte.name, 0) {
        return Ok(root);
    }
    find_usage_chain(root, cte)?
        .usage_scope()
        .ok_or_else(|| Error::cte_not_found(&cte.name))
}
