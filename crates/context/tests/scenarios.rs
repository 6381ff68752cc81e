//! End-to-end view behavior through the engine.

use strata_context::{
    Context, ContextConfig, ContextId, Ctx1, Engine, FlatChange, FlatConfig, GroupedConfig,
    PivotConfig, TotalsMode,
};
use strata_core::{DataType, Scalar, Schema};
use strata_incremental::{Filter, Port, Reducer, StepTables};
use strata_storage::MasterState;

fn sales_schema() -> Schema {
    Schema::new(vec![
        ("id".into(), DataType::Int64),
        ("cat".into(), DataType::Str),
        ("sub".into(), DataType::Str),
        ("amt".into(), DataType::Float64),
    ])
}

const SALES: [(i64, &str, &str, f64); 5] = [
    (1, "A", "x", 1.0),
    (2, "A", "y", 2.0),
    (3, "B", "z", 4.0),
    (4, "B", "z", 8.0),
    (5, "C", "x", 16.0),
];

fn load_sales(engine: &mut Engine) {
    let mut b = engine.batch();
    for (id, cat, sub, amt) in SALES {
        b.insert(&[
            Scalar::Int64(id),
            Scalar::from(cat),
            Scalar::from(sub),
            Scalar::Float64(amt),
        ])
        .unwrap();
    }
    engine.send(b).unwrap();
    engine.process();
}

fn two_level() -> PivotConfig {
    PivotConfig::new()
        .row_pivot("cat")
        .row_pivot("sub")
        .aggregate("amt", Reducer::Sum)
}

fn one_sided(engine: &Engine, id: ContextId) -> &Ctx1 {
    engine.context(id).and_then(|c| c.as_one_sided()).unwrap()
}

fn update_amt(engine: &mut Engine, id: i64, amt: f64) {
    let mut b = engine.batch();
    b.update(id, &[("amt", Scalar::Float64(amt))]).unwrap();
    engine.send(b).unwrap();
    engine.process();
}

#[test]
fn flat_view_returns_inserted_rows() {
    let schema = Schema::new(vec![
        ("id".into(), DataType::Int64),
        ("amt".into(), DataType::Float64),
    ]);
    let mut engine = Engine::new(schema, "id").unwrap();
    let view = engine.register(ContextConfig::Flat(FlatConfig::new())).unwrap();
    let mut b = engine.batch();
    b.insert(&[Scalar::Int64(1), Scalar::Float64(10.0)]).unwrap();
    b.insert(&[Scalar::Int64(2), Scalar::Float64(20.0)]).unwrap();
    engine.send(b).unwrap();
    engine.process();

    let ctx = engine.context(view).unwrap();
    assert_eq!(
        ctx.get_data(engine.master(), 0..2, 0..2),
        vec![
            vec![Scalar::Int64(1), Scalar::Float64(10.0)],
            vec![Scalar::Int64(2), Scalar::Float64(20.0)],
        ]
    );
}

#[test]
fn pivot_update_touches_only_its_group() {
    let schema = Schema::new(vec![
        ("id".into(), DataType::Int64),
        ("cat".into(), DataType::Str),
        ("amt".into(), DataType::Float64),
    ]);
    let mut engine = Engine::new(schema, "id").unwrap();
    let view = engine
        .register(ContextConfig::OneSided(
            PivotConfig::new().row_pivot("cat").aggregate("amt", Reducer::Sum),
        ))
        .unwrap();
    let mut b = engine.batch();
    for (id, cat, amt) in [(1, "A", 5.0), (2, "A", 7.0), (3, "B", 2.0)] {
        b.insert(&[Scalar::Int64(id), Scalar::from(cat), Scalar::Float64(amt)])
            .unwrap();
    }
    engine.send(b).unwrap();
    engine.process();
    {
        let (ctx, master) = engine.context_mut(view).unwrap();
        ctx.open(0);
        assert_eq!(
            ctx.get_data(master, 1..3, 0..2),
            vec![
                vec![Scalar::from("A"), Scalar::Float64(12.0)],
                vec![Scalar::from("B"), Scalar::Float64(2.0)],
            ]
        );
        ctx.get_step_delta(0..3);
    }

    update_amt(&mut engine, 1, 15.0);

    let (ctx, _) = engine.context_mut(view).unwrap();
    let delta = ctx.get_step_delta(0..3);
    let cells: Vec<(usize, usize, Scalar, Scalar)> = delta
        .cells
        .iter()
        .map(|c| (c.row, c.column, c.old.clone(), c.new.clone()))
        .collect();
    assert_eq!(
        cells,
        vec![
            (0, 1, Scalar::Float64(14.0), Scalar::Float64(24.0)),
            (1, 1, Scalar::Float64(12.0), Scalar::Float64(22.0)),
        ]
    );
}

#[test]
fn collapse_and_reexpand_restores_rows() {
    let mut engine = Engine::new(sales_schema(), "id").unwrap();
    load_sales(&mut engine);
    let view = engine.register(ContextConfig::OneSided(two_level())).unwrap();
    {
        let (ctx, _) = engine.context_mut(view).unwrap();
        assert_eq!(ctx.open(0), 3);
        assert_eq!(ctx.open(1), 2);
        assert_eq!(ctx.open(4), 1);
    }
    let before: Vec<Vec<Scalar>> = {
        let ctx = engine.context(view).unwrap();
        (0..ctx.num_rows()).map(|i| ctx.get_row_path(i)).collect()
    };
    assert_eq!(before.len(), 7);
    assert_eq!(one_sided(&engine, view).traversal().get(0).unwrap().ndesc, 6);

    {
        let (ctx, _) = engine.context_mut(view).unwrap();
        assert_eq!(ctx.close(1), 2);
    }
    let trav = one_sided(&engine, view).traversal();
    assert_eq!(trav.len(), 5);
    assert_eq!(trav.get(0).unwrap().ndesc, 4);
    assert!(trav.check_invariants().is_ok());

    {
        let (ctx, _) = engine.context_mut(view).unwrap();
        assert_eq!(ctx.open(1), 2);
    }
    let ctx = engine.context(view).unwrap();
    let after: Vec<Vec<Scalar>> = (0..ctx.num_rows()).map(|i| ctx.get_row_path(i)).collect();
    assert_eq!(before, after);
}

#[test]
fn filtered_delete_is_reported() {
    let mut engine = Engine::new(sales_schema(), "id").unwrap();
    load_sales(&mut engine);
    let view = engine
        .register(ContextConfig::Flat(
            FlatConfig::new().filter(Filter::gt("amt", 3.0)),
        ))
        .unwrap();
    assert_eq!(engine.context(view).unwrap().num_rows(), 3);
    let slots = engine.master().num_slots();

    let mut b = engine.batch();
    b.delete(3i64).unwrap();
    engine.send(b).unwrap();
    engine.process();

    let flat = engine.context(view).and_then(|c| c.as_flat()).unwrap();
    assert_eq!(flat.last_changes(), &[(Scalar::Int64(3), FlatChange::Delete)]);
    assert_eq!(flat.num_rows(), 2);
    assert_eq!(engine.master().lookup(&Scalar::Int64(3)), None);
    assert_eq!(engine.master().num_slots(), slots);
}

#[test]
fn empty_notify_changes_nothing() {
    let mut master = MasterState::new(sales_schema(), "id").unwrap();
    let mut port = Port::new(sales_schema(), "id").unwrap();
    let mut b = port.batch();
    for (id, cat, sub, amt) in SALES {
        b.insert(&[
            Scalar::Int64(id),
            Scalar::from(cat),
            Scalar::from(sub),
            Scalar::Float64(amt),
        ])
        .unwrap();
    }
    port.send(b).unwrap();
    master.fill_master_table(&port.flatten());
    let mut ctx = Ctx1::new(&sales_schema(), &two_level()).unwrap();
    ctx.notify_initial(&master);
    ctx.set_depth(2);
    ctx.get_step_delta(0..100);

    let rows = ctx.num_rows();
    let data = ctx.get_data(&master, 0..rows, 0..2);
    let nodes = ctx.traversal().nodes().to_vec();

    let step = StepTables::compute(&master, port.flatten());
    master.update_master_table(&step.flattened);
    ctx.step_begin();
    ctx.notify(&master, &step);
    ctx.step_end();

    assert_eq!(ctx.num_rows(), rows);
    assert_eq!(ctx.get_data(&master, 0..rows, 0..2), data);
    assert_eq!(ctx.traversal().nodes(), nodes.as_slice());
    assert!(ctx.get_step_delta(0..rows).is_empty());
}

#[test]
fn frontier_table_repivots_to_same_totals() {
    let mut engine = Engine::new(sales_schema(), "id").unwrap();
    load_sales(&mut engine);
    let view = engine.register(ContextConfig::OneSided(two_level())).unwrap();
    {
        let (ctx, _) = engine.context_mut(view).unwrap();
        ctx.open(0);
        // A expanded to its subs, B and C left collapsed
        ctx.open(1);
    }
    let table = one_sided(&engine, view).get_table();
    assert_eq!(table.num_rows(), 4);

    let mut copy = Engine::new(table.schema().clone(), "__index").unwrap();
    let mut b = copy.batch();
    for r in 0..table.num_rows() {
        let row: Vec<Scalar> = (0..table.schema().len()).map(|c| table.get(c, r).clone()).collect();
        b.insert(&row).unwrap();
    }
    copy.send(b).unwrap();
    copy.process();
    let again = copy
        .register(ContextConfig::OneSided(
            PivotConfig::new()
                .row_pivot("cat")
                .row_pivot("sub")
                .aggregate("sum(amt)", Reducer::Sum),
        ))
        .unwrap();

    let (ctx, master) = copy.context_mut(again).unwrap();
    ctx.open(0);
    let original = engine.context(view).unwrap();
    let expect = original.get_data(engine.master(), 0..1, 0..2);
    assert_eq!(ctx.get_data(master, 0..1, 0..2), expect);
    for (i, cat) in ["A", "B", "C"].iter().enumerate() {
        let row = ctx.get_data(master, i + 1..i + 2, 0..2);
        assert_eq!(row[0][0], Scalar::from(*cat));
        let source = original.get_data(engine.master(), 0..original.num_rows(), 0..2);
        let wanted = source.iter().find(|r| r[0] == Scalar::from(*cat)).unwrap();
        assert_eq!(&row[0], wanted);
    }
}

#[test]
fn traversal_and_tree_indices_round_trip() {
    let mut engine = Engine::new(sales_schema(), "id").unwrap();
    load_sales(&mut engine);
    let view = engine.register(ContextConfig::OneSided(two_level())).unwrap();
    {
        let (ctx, _) = engine.context_mut(view).unwrap();
        ctx.open(0);
        ctx.open(3);
        ctx.open(1);
    }
    let trav = one_sided(&engine, view).traversal();
    assert!(trav.check_invariants().is_ok());
    for i in 0..trav.len() {
        let id = trav.get_tree_index(i).unwrap();
        assert_eq!(trav.get_traversal_index(id), Some(i));
    }
}

#[test]
fn leaf_update_reports_leaf_and_ancestors_only() {
    let mut engine = Engine::new(sales_schema(), "id").unwrap();
    load_sales(&mut engine);
    let view = engine.register(ContextConfig::OneSided(two_level())).unwrap();
    {
        let (ctx, _) = engine.context_mut(view).unwrap();
        ctx.set_depth(2);
        assert_eq!(ctx.num_rows(), 8);
        ctx.get_step_delta(0..8);
    }

    update_amt(&mut engine, 2, 3.0);

    let (ctx, _) = engine.context_mut(view).unwrap();
    let delta = ctx.get_step_delta(0..8);
    let rows: Vec<usize> = delta.cells.iter().map(|c| c.row).collect();
    // root, A, A/y
    assert_eq!(rows, vec![0, 1, 3]);
    assert_eq!(ctx.get_row_path(3), vec![Scalar::from("A"), Scalar::from("y")]);
    assert!(delta.cells.iter().all(|c| c.column == 1));
}

#[test]
fn two_sided_leaf_columns_sum_to_row_total() {
    let mut engine = Engine::new(sales_schema(), "id").unwrap();
    load_sales(&mut engine);
    let config = PivotConfig::new()
        .row_pivot("cat")
        .column_pivot("sub")
        .aggregate("amt", Reducer::Sum)
        .totals(TotalsMode::Hidden);
    let view = engine.register(ContextConfig::TwoSided(config)).unwrap();
    let (ctx, master) = engine.context_mut(view).unwrap();
    ctx.open(0);
    // x, y, z
    assert_eq!(ctx.num_columns(), 4);
    let data = ctx.get_data(master, 0..4, 0..4);
    let totals = [31.0, 3.0, 12.0, 16.0];
    for (row, total) in data.iter().zip(totals) {
        let sum: f64 = row[1..]
            .iter()
            .filter_map(|v| match v {
                Scalar::Float64(f) => Some(*f),
                _ => None,
            })
            .sum();
        assert_eq!(sum, total);
    }
}

#[test]
fn grouped_view_follows_parent_updates() {
    let schema = Schema::new(vec![
        ("id".into(), DataType::Int64),
        ("parent".into(), DataType::Int64),
        ("amt".into(), DataType::Float64),
    ]);
    let mut engine = Engine::new(schema, "id").unwrap();
    let view = engine
        .register(ContextConfig::GroupedPkey(
            GroupedConfig::new("parent").aggregate("amt", Reducer::Sum).depth(3),
        ))
        .unwrap();
    let mut b = engine.batch();
    for (id, parent, amt) in [(1, None::<i64>, 1.0), (2, Some(1), 2.0), (3, Some(2), 4.0)] {
        b.insert(&[Scalar::Int64(id), Scalar::from(parent), Scalar::Float64(amt)])
            .unwrap();
    }
    engine.send(b).unwrap();
    engine.process();

    let ctx = engine.context(view).unwrap();
    assert_eq!(ctx.num_rows(), 4);
    assert_eq!(
        ctx.get_row_path(3),
        vec![Scalar::Int64(1), Scalar::Int64(2), Scalar::Int64(3)]
    );

    // move 3 directly under 1
    let mut b = engine.batch();
    b.update(3i64, &[("parent", Scalar::Int64(1))]).unwrap();
    engine.send(b).unwrap();
    engine.process();

    let (ctx, master) = engine.context_mut(view).unwrap();
    assert_eq!(ctx.get_row_path(3), vec![Scalar::Int64(1), Scalar::Int64(3)]);
    assert_eq!(
        ctx.get_data(master, 2..3, 0..2),
        vec![vec![Scalar::Int64(2), Scalar::Float64(2.0)]]
    );
    let delta = ctx.get_step_delta(0..4);
    assert!(delta.rows_changed);
}

#[test]
fn reload_from_empty_keeps_only_the_root_open() {
    let mut engine = Engine::new(sales_schema(), "id").unwrap();
    load_sales(&mut engine);
    let view = engine.register(ContextConfig::OneSided(two_level())).unwrap();
    {
        let (ctx, _) = engine.context_mut(view).unwrap();
        ctx.open(0);
        ctx.open(1);
        assert_eq!(ctx.num_rows(), 6);
    }

    let mut b = engine.batch();
    for (id, ..) in SALES {
        b.delete(id).unwrap();
    }
    engine.send(b).unwrap();
    engine.process();
    assert!(engine.master().is_empty());
    assert_eq!(engine.context(view).unwrap().num_rows(), 1);

    load_sales(&mut engine);
    let trav = one_sided(&engine, view).traversal();
    assert_eq!(trav.len(), 4);
    assert!(trav.get(0).unwrap().expanded);
    assert!((1..4).all(|i| !trav.is_expanded(i)));
    assert!(trav.check_invariants().is_ok());
}
