use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cteinline::{
    CteInliner, InlineSettings, Plannability, PushdownOracle, Query, SkipReason, SupportSettings,
    inline_ctes,
};
use cteinline_test_utils::{
    QueryBuilder, assert_error_contains, col, cte, cte_reference_count, cte_scan,
    declared_cte_names, exists, gt, int, now, numeric, outer_col, random, row_number, scan,
    subquery_at, sublink_query,
};

#[test]
fn where_filtered_single_use_cte() {
    // WITH c AS (SELECT x FROM t) SELECT * FROM c WHERE x > 1
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .column("x", col(1, 1))
        .filter(gt(col(1, 1), int(1)))
        .with_cte(cte("c", scan("t", &["x"])))
        .build();

    let report = inline_ctes(&mut query).unwrap();

    assert_eq!(report.inlined, vec!["c".to_string()]);
    assert!(query.cte_list.is_empty());
    assert_eq!(subquery_at(&query, 0), &scan("t", &["x"]));
    assert_eq!(query.quals, Some(gt(col(1, 1), int(1))));
}

#[test]
fn random_in_body_is_never_duplicated() {
    // WITH c AS (SELECT random() AS r FROM t) SELECT * FROM c
    let body = QueryBuilder::select()
        .from_table("t")
        .column("r", random())
        .build();
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .column("r", col(1, 1))
        .with_cte(cte("c", body))
        .build();
    let before = query.clone();

    let report = inline_ctes(&mut query).unwrap();

    assert_eq!(query, before);
    assert!(matches!(
        report.skip_reason("c"),
        Some(SkipReason::Ineligible(_))
    ));
}

#[test]
fn select_for_update_keeps_its_cte() {
    // WITH c AS (SELECT x FROM t) SELECT x FROM c FOR UPDATE
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .column("x", col(1, 1))
        .for_update()
        .with_cte(cte("c", scan("t", &["x"])))
        .build();
    let before = query.clone();

    let report = inline_ctes(&mut query).unwrap();

    assert_eq!(query, before);
    assert_eq!(declared_cte_names(&query), vec!["c".to_string()]);
    assert_eq!(report.skip_reason("c"), Some(&SkipReason::LockingUseSite));
}

#[test]
fn stable_functions_do_not_block_inlining() {
    let body = QueryBuilder::select()
        .from_table("t")
        .column("ts", now())
        .column("price", numeric("9.99"))
        .build();
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .column("ts", col(1, 1))
        .with_cte(cte("c", body))
        .build();

    let report = inline_ctes(&mut query).unwrap();

    assert!(report.is_inlined("c"));
}

#[test]
fn row_number_over_empty_window_is_kept() {
    // WITH c AS (SELECT * FROM t) SELECT *, row_number() OVER () FROM c
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .column("x", col(1, 1))
        .column("row_number", row_number())
        .window(vec![])
        .with_cte(cte("c", scan("t", &["x"])))
        .build();
    let before = query.clone();

    let report = inline_ctes(&mut query).unwrap();

    assert_eq!(query, before);
    assert!(matches!(
        report.skip_reason("c"),
        Some(SkipReason::NotPlannable(_))
    ));
}

#[test]
fn row_number_with_partition_is_inlined() {
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .column("x", col(1, 1))
        .column("row_number", row_number())
        .window(vec![col(1, 1)])
        .with_cte(cte("c", scan("t", &["x"])))
        .build();

    let report = inline_ctes(&mut query).unwrap();

    assert!(report.is_inlined("c"));
}

#[test]
fn reference_count_two_is_kept() {
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .from_subquery(cte_scan("c", 1, &["x"]))
        .column("x", col(1, 1))
        .with_cte(cte("c", scan("t", &["x"])).with_ref_count(2))
        .build();
    let before = query.clone();

    inline_ctes(&mut query).unwrap();

    assert_eq!(query, before);
    assert_eq!(cte_reference_count(&query, "c"), 2);
}

#[test]
fn aliases_rename_first_columns_only() {
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .column("a", col(1, 1))
        .with_cte(cte("c", scan("t", &["x", "y", "z"])).with_column_aliases(["a", "b"]))
        .build();

    inline_ctes(&mut query).unwrap();

    assert_eq!(
        subquery_at(&query, 0).output_column_names(),
        vec![Some("a"), Some("b"), Some("z")]
    );
}

#[test]
fn correlated_use_site_keeps_outer_references_resolving() {
    // SELECT * FROM o WHERE EXISTS (
    //   WITH c AS (SELECT y FROM t WHERE t.y > o.x) SELECT * FROM (SELECT * FROM c))
    let body = QueryBuilder::select()
        .from_table("t")
        .column("y", col(1, 1))
        .filter(gt(col(1, 1), outer_col(1, 1, 2)))
        .build();
    let inner = QueryBuilder::select()
        .from_subquery(cte_scan("c", 1, &["y"]))
        .column("y", col(1, 1))
        .with_cte(cte("c", body))
        .build();
    let mut query = QueryBuilder::select()
        .from_table("o")
        .column("x", col(1, 1))
        .filter(exists(inner))
        .build();

    let report = inline_ctes(&mut query).unwrap();
    assert!(report.is_inlined("c"));

    let inner = sublink_query(query.quals.as_ref());
    let use_site = subquery_at(inner, 0);
    let inlined = subquery_at(use_site, 0);
    // o was two levels above the body; the copy sits one level deeper.
    assert_eq!(inlined.quals, Some(gt(col(1, 1), outer_col(1, 1, 3))));
}

#[test]
fn local_table_in_use_site_blocks_inlining() {
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .from_table("coordinator_only")
        .column("x", col(1, 1))
        .with_cte(cte("c", scan("t", &["x"])))
        .build();
    let inliner = CteInliner::new().with_oracle(PushdownOracle::with_settings(
        SupportSettings::default().with_local_table("coordinator_only"),
    ));

    let report = inliner.run(&mut query).unwrap();

    assert_eq!(declared_cte_names(&query), vec!["c".to_string()]);
    match report.skip_reason("c") {
        Some(SkipReason::NotPlannable(reason)) => {
            assert_eq!(reason, "Local tables cannot be used in distributed queries.")
        }
        other => panic!("Expected NotPlannable, got {:?}", other),
    }
}

#[test]
fn oracle_is_called_once_per_chain_scope() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let oracle = move |_scope: &Query| {
        counter.fetch_add(1, Ordering::SeqCst);
        Plannability::Plannable
    };
    let middle = QueryBuilder::select()
        .from_subquery(cte_scan("c", 2, &["x"]))
        .column("x", col(1, 1))
        .build();
    let mut query = QueryBuilder::select()
        .from_subquery(middle)
        .column("x", col(1, 1))
        .with_cte(cte("c", scan("t", &["x"])))
        .build();

    let report = CteInliner::new().with_oracle(oracle).run(&mut query).unwrap();

    assert!(report.is_inlined("c"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn inliner_is_shareable_across_threads() {
    let inliner = CteInliner::new();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let inliner = inliner.clone();
            std::thread::spawn(move || {
                let name = format!("c{i}");
                let mut query = QueryBuilder::select()
                    .from_cte(&name, 0)
                    .column("x", col(1, 1))
                    .with_cte(cte(&name, scan("t", &["x"])))
                    .build();
                inliner.run(&mut query).map(|report| report.inlined)
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let inlined = handle.join().unwrap().unwrap();
        assert_eq!(inlined, vec![format!("c{i}")]);
    }
}

#[test]
fn dangling_reference_is_reported() {
    let mut query = cte_scan("ghost", 0, &["x"]);

    assert_error_contains(inline_ctes(&mut query), &["corrupt", "ghost"]);
}

#[test]
fn disabled_settings_leave_tree_alone() {
    let mut query = QueryBuilder::select()
        .from_cte("c", 0)
        .column("x", col(1, 1))
        .with_cte(cte("c", scan("t", &["x"])))
        .build();
    let before = query.clone();

    let report = CteInliner::new()
        .with_settings(InlineSettings::all_disabled())
        .run(&mut query)
        .unwrap();

    assert_eq!(query, before);
    assert!(report.is_empty());
}
