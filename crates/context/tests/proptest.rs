//! Property-based tests for strata-context using proptest.

use proptest::prelude::*;
use strata_context::{
    AnyContext, Context, ContextConfig, ContextId, Engine, FlatConfig, GroupedConfig, PivotConfig,
};
use strata_core::{DataType, Scalar, Schema};
use strata_incremental::{Filter, Reducer};
use strata_tree::{SortOrder, SortSpec, Traversal};

fn schema() -> Schema {
    Schema::new(vec![
        ("id".into(), DataType::Int64),
        ("cat".into(), DataType::Int64),
        ("amt".into(), DataType::Float64),
    ])
}

#[derive(Clone, Debug)]
enum Op {
    Upsert(i64, i64, i64),
    Delete(i64),
}

fn cycles_strategy() -> impl Strategy<Value = Vec<Vec<Op>>> {
    let op = prop_oneof![
        3 => (0i64..12, 0i64..4, -20i64..20).prop_map(|(id, cat, amt)| Op::Upsert(id, cat, amt)),
        1 => (0i64..12).prop_map(Op::Delete),
    ];
    prop::collection::vec(prop::collection::vec(op, 1..10), 1..8)
}

// empty sums are null
fn as_f64(v: &Scalar) -> f64 {
    match v {
        Scalar::Float64(f) => *f,
        _ => 0.0,
    }
}

proptest! {
    /// After every cycle the pivot's grand total, its per-group rows and the
    /// flat view's row count agree with the master.
    #[test]
    fn views_track_master(cycles in cycles_strategy(), depth in 0usize..2) {
        let mut engine = Engine::new(schema(), "id").unwrap();
        let pivot = engine
            .register(ContextConfig::OneSided(
                PivotConfig::new()
                    .row_pivot("cat")
                    .aggregate("amt", Reducer::Sum)
                    .depth(depth),
            ))
            .unwrap();
        let flat = engine
            .register(ContextConfig::Flat(FlatConfig::new().sort("amt", SortOrder::Desc)))
            .unwrap();

        for ops in &cycles {
            let mut b = engine.batch();
            for op in ops {
                match *op {
                    Op::Upsert(id, cat, amt) => b
                        .insert(&[Scalar::Int64(id), Scalar::Int64(cat), Scalar::Float64(amt as f64)])
                        .unwrap(),
                    Op::Delete(id) => b.delete(id).unwrap(),
                }
            }
            engine.send(b).unwrap();
            engine.process();

            let master = engine.master();
            let expected: f64 = master
                .sorted_pkeys()
                .iter()
                .map(|p| as_f64(master.get(2, p)))
                .sum();

            let ctx = engine.context(pivot).unwrap();
            let rows = ctx.num_rows();
            let data = ctx.get_data(master, 0..rows, 0..2);
            prop_assert_eq!(as_f64(&data[0][1]), expected);
            if depth > 0 {
                let groups: f64 = data[1..].iter().map(|r| as_f64(&r[1])).sum();
                prop_assert_eq!(groups, expected);
            }
            let trav = ctx.as_one_sided().unwrap().traversal();
            prop_assert!(trav.check_invariants().is_ok());

            let view = engine.context(flat).unwrap();
            prop_assert_eq!(view.num_rows(), master.num_rows());
            let amts: Vec<f64> = view
                .get_data(master, 0..view.num_rows(), 2..3)
                .iter()
                .map(|r| as_f64(&r[0]))
                .collect();
            prop_assert!(amts.windows(2).all(|w| w[0] >= w[1]));
        }
    }
}

fn wide_schema() -> Schema {
    Schema::new(vec![
        ("id".into(), DataType::Int64),
        ("cat".into(), DataType::Int64),
        ("sub".into(), DataType::Int64),
        ("parent".into(), DataType::Int64),
        ("amt".into(), DataType::Float64),
    ])
}

#[derive(Clone, Debug)]
enum Edit {
    Upsert(i64, i64, i64, Option<i64>, i64),
    SetAmt(i64, i64),
    SetParent(i64, Option<i64>),
    Delete(i64),
}

fn edits_strategy() -> impl Strategy<Value = Vec<Vec<Edit>>> {
    let parent = prop::option::of(0i64..10);
    let edit = prop_oneof![
        4 => (0i64..10, 0i64..3, 0i64..3, parent.clone(), -20i64..20)
            .prop_map(|(id, cat, sub, parent, amt)| Edit::Upsert(id, cat, sub, parent, amt)),
        1 => (0i64..10, -20i64..20).prop_map(|(id, amt)| Edit::SetAmt(id, amt)),
        1 => (0i64..10, parent).prop_map(|(id, parent)| Edit::SetParent(id, parent)),
        2 => (0i64..10).prop_map(Edit::Delete),
    ];
    prop::collection::vec(prop::collection::vec(edit, 1..12), 1..8)
}

fn view_configs() -> Vec<ContextConfig> {
    vec![
        ContextConfig::Flat(
            FlatConfig::new()
                .filter(Filter::gt("amt", -10.0))
                .sort("amt", SortOrder::Desc),
        ),
        ContextConfig::OneSided(
            PivotConfig::new()
                .row_pivot("cat")
                .row_pivot("sub")
                .aggregate("amt", Reducer::Sum)
                .aggregate("amt", Reducer::Count)
                .sort(SortSpec::desc(0)),
        ),
        ContextConfig::TwoSided(
            PivotConfig::new()
                .row_pivot("cat")
                .column_pivot("sub")
                .aggregate("amt", Reducer::Sum),
        ),
        ContextConfig::GroupedPkey(
            GroupedConfig::new("parent")
                .aggregate("amt", Reducer::Sum)
                .aggregate("amt", Reducer::Count),
        ),
    ]
}

/// Opens the root, then every row below it, last row first so earlier
/// indices stay put.
fn open_two_levels(engine: &mut Engine, id: ContextId) {
    let (ctx, _) = engine.context_mut(id).unwrap();
    ctx.open(0);
    for i in (1..ctx.num_rows()).rev() {
        ctx.open(i);
    }
}

/// Row and column traversals as (depth, ndesc, nchild, expanded, rel_pidx).
fn shapes(ctx: &AnyContext) -> Vec<Vec<(usize, usize, usize, bool, usize)>> {
    let shape = |t: &Traversal| {
        t.nodes()
            .iter()
            .map(|n| (n.depth, n.ndesc, n.nchild, n.expanded, n.rel_pidx))
            .collect::<Vec<_>>()
    };
    match ctx {
        AnyContext::Flat(_) => Vec::new(),
        AnyContext::OneSided(c) => vec![shape(c.traversal())],
        AnyContext::TwoSided(c) => vec![shape(c.row_traversal()), shape(c.column_traversal())],
        AnyContext::GroupedPkey(c) => vec![shape(c.traversal())],
    }
}

proptest! {
    /// Views that followed every cycle end up identical to views built
    /// fresh on the final master, whichever mix of initial loads and
    /// incremental updates got them there.
    #[test]
    fn incremental_views_match_fresh_views(cycles in edits_strategy()) {
        let mut engine = Engine::new(wide_schema(), "id").unwrap();
        let live: Vec<ContextId> = view_configs()
            .into_iter()
            .map(|c| engine.register(c).unwrap())
            .collect();

        for edits in &cycles {
            let mut b = engine.batch();
            for edit in edits {
                match *edit {
                    Edit::Upsert(id, cat, sub, parent, amt) => b
                        .insert(&[
                            Scalar::Int64(id),
                            Scalar::Int64(cat),
                            Scalar::Int64(sub),
                            Scalar::from(parent),
                            Scalar::Float64(amt as f64),
                        ])
                        .unwrap(),
                    Edit::SetAmt(id, amt) => b.update(id, &[("amt", Scalar::Float64(amt as f64))]).unwrap(),
                    Edit::SetParent(id, parent) => b.update(id, &[("parent", Scalar::from(parent))]).unwrap(),
                    Edit::Delete(id) => b.delete(id).unwrap(),
                }
            }
            engine.send(b).unwrap();
            engine.process();
        }

        let fresh: Vec<ContextId> = view_configs()
            .into_iter()
            .map(|c| engine.register(c).unwrap())
            .collect();
        for (&old, &new) in live.iter().zip(&fresh) {
            open_two_levels(&mut engine, old);
            open_two_levels(&mut engine, new);

            let master = engine.master();
            let (a, b) = (engine.context(old).unwrap(), engine.context(new).unwrap());
            prop_assert_eq!(a.num_rows(), b.num_rows());
            prop_assert_eq!(a.num_columns(), b.num_columns());
            prop_assert_eq!(a.column_names(), b.column_names());
            prop_assert_eq!(
                a.get_data(master, 0..a.num_rows(), 0..a.num_columns()),
                b.get_data(master, 0..b.num_rows(), 0..b.num_columns())
            );
            prop_assert_eq!(shapes(a), shapes(b));
            for i in 0..a.num_rows() {
                prop_assert_eq!(a.get_row_path(i), b.get_row_path(i));
            }
        }
    }
}
