use budget_demo::models::{ActualItem, Budget, BudgetItem, Transaction};
use persist_engine::history::OpType;
use persist_engine::Persister;

fn fixed_date(rfc3339: &str) -> chrono::DateTime<chrono::FixedOffset> {
    chrono::DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

/// S1 — create/read two items.
#[test]
fn s1_create_and_read_two_items() {
    let engine = Persister::open_in_memory().unwrap();
    let mut i1 = BudgetItem::new("budget item test", 1.5);
    let mut i2 = BudgetItem::new("budget item test2", 2.1);
    engine.save(&mut i1).unwrap();
    engine.save(&mut i2).unwrap();

    let all: Vec<BudgetItem> = engine.retrieve().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.contains(&i1));
    assert!(all.contains(&i2));
}

/// S2 — update idempotence: a no-op re-save produces no extra transaction.
#[test]
fn s2_update_idempotence() {
    let engine = Persister::open_in_memory().unwrap();
    let mut item = BudgetItem::new("x", 1.5);
    engine.save(&mut item).unwrap();

    let mut reloaded: BudgetItem = engine.retrieve_by_id(item.id.unwrap()).unwrap().unwrap();
    reloaded.budgeted = 1.6;
    engine.save(&mut reloaded).unwrap();
    engine.save(&mut reloaded).unwrap();

    let all: Vec<BudgetItem> = engine.retrieve().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].budgeted, 1.6);

    let undo1 = engine.undo().expect("the real update undoes");
    assert_eq!(undo1.op_type, OpType::Update);
    let all: Vec<BudgetItem> = engine.retrieve().unwrap();
    assert_eq!(all[0].budgeted, 1.5);

    let undo2 = engine.undo().expect("the creation undoes");
    assert_eq!(undo2.op_type, OpType::Create);
    assert!(engine.retrieve::<BudgetItem>().unwrap().is_empty());

    assert!(engine.undo().is_none(), "the no-op re-save left nothing further to undo");
}

/// S3 — a to-many edge, reassigned and undone/redone.
#[test]
fn s3_related_edges_with_undo() {
    let engine = Persister::open_in_memory().unwrap();
    let mut i1 = BudgetItem::new("i1", 10.0);
    let mut i2 = BudgetItem::new("i2", 20.0);
    engine.save(&mut i1).unwrap();
    engine.save(&mut i2).unwrap();

    let mut budget = Budget::new(fixed_date("2020-04-14T01:40:59+00:00"), 3.6);
    engine.save(&mut budget).unwrap();

    budget.items = vec![i1, i2];
    engine.save(&mut budget).unwrap();

    let all: Vec<Budget> = engine.retrieve().unwrap();
    assert_eq!(all[0].items.len(), 2);

    let outcome = engine.undo().unwrap();
    assert_eq!(outcome.op_type, OpType::Update);
    let all: Vec<Budget> = engine.retrieve().unwrap();
    assert_eq!(all[0].items.len(), 0);

    let outcome = engine.redo().unwrap();
    assert_eq!(outcome.op_type, OpType::Update);
    let all: Vec<Budget> = engine.retrieve().unwrap();
    assert_eq!(all[0].items.len(), 2);
}

/// S4 — cascading save/delete over a budget and its items.
#[test]
fn s4_cascading_save_and_delete() {
    let engine = Persister::open_in_memory().unwrap();
    let mut budget = Budget::new(fixed_date("2020-04-14T01:40:59+00:00"), 30.0);
    budget.items = vec![BudgetItem::new("a", 10.0), BudgetItem::new("b", 20.0)];
    engine.save_all(&mut budget).unwrap();

    assert_eq!(engine.retrieve::<Budget>().unwrap().len(), 1);
    assert_eq!(engine.retrieve::<BudgetItem>().unwrap().len(), 2);

    engine.undo().unwrap();
    assert!(engine.retrieve::<Budget>().unwrap().is_empty());
    assert!(engine.retrieve::<BudgetItem>().unwrap().is_empty());

    engine.redo().unwrap();
    assert_eq!(engine.retrieve::<Budget>().unwrap().len(), 1);
    assert_eq!(engine.retrieve::<BudgetItem>().unwrap().len(), 2);

    let saved = engine.retrieve::<Budget>().unwrap().into_iter().next().unwrap();
    engine.delete_all(&saved).unwrap();
    assert!(engine.retrieve::<Budget>().unwrap().is_empty());
    assert!(engine.retrieve::<BudgetItem>().unwrap().is_empty());

    engine.undo().unwrap();
    let restored = engine.retrieve::<Budget>().unwrap().into_iter().next().unwrap();
    assert_eq!(restored.items.len(), 2, "undoing the cascading delete must not duplicate the parent-child edges");
}

/// S5 — a transaction whose splits are transactions, one with an actual item.
#[test]
fn s5_to_one_edge_on_a_split() {
    let engine = Persister::open_in_memory().unwrap();
    let date = fixed_date("2020-04-14T01:40:59+00:00");
    let mut parent = Transaction::new(100.0, "socks", "2", date);
    let s1 = Transaction::split(60.0);
    let mut s2 = Transaction::split(40.0);
    s2.actual_item = Some(ActualItem::new(40.0, "socks", "2", date));
    parent.splits = vec![s1, s2];

    engine.save_all(&mut parent).unwrap();

    let all: Vec<Transaction> = engine.retrieve().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all.iter().filter(|t| t.actual_item.is_some()).count(), 1);
}

/// S6 — a full undo-to-empty/redo cycle restores the first save, and the
/// completion index answers prefix queries over indexed labels.
#[test]
fn s6_full_undo_cycle_and_completions() {
    let engine = Persister::open_in_memory().unwrap();

    let mut item = BudgetItem::new("budget item test", 1.5);
    engine.save(&mut item).unwrap();
    engine.index_completion("BudgetItem", "label", &item.label).unwrap();
    engine.index_completion("BudgetItem", "label", "budget item test2").unwrap();

    let mut reloaded: BudgetItem = engine.retrieve_by_id(item.id.unwrap()).unwrap().unwrap();
    reloaded.budgeted = 1.6;
    engine.save(&mut reloaded).unwrap();

    engine.undo().unwrap();
    engine.undo().unwrap();
    assert!(engine.undo().is_none());

    let outcome = engine.redo().expect("the first save redoes");
    assert_eq!(outcome.op_type, OpType::Create);
    let all: Vec<BudgetItem> = engine.retrieve().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].budgeted, 1.5);

    let hits = engine.completions("BudgetItem", "label", "budget i").unwrap();
    assert_eq!(hits.len(), 2);
    let hits = engine.completions("BudgetItem", "label", "budget in").unwrap();
    assert!(hits.is_empty());
}
