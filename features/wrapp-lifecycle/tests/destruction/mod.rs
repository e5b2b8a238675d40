//! Tests for reverse order teardown

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use wrapp_lifecycle::{CellState, DestroyError, Destroyer};

use crate::common::{chain, Probe};

#[tokio::test]
async fn test_chain_is_destroyed_in_reverse_order() {
    // a -> b -> c
    let probe = Probe::new();
    let c = probe.component("c", vec![]);
    let b = probe.component("b", vec![c.erase()]);
    let a = probe.component("a", vec![b.erase()]);

    a.init().await.unwrap();
    Destroyer::new().destroy_all(&[a.erase()]).await.unwrap();

    assert_eq!(probe.events_of("create"), vec!["c", "b", "a"]);
    assert_eq!(probe.events_of("destroy"), vec!["a", "b", "c"]);
    for component in [&a, &b, &c] {
        assert_eq!(component.state(), CellState::Empty);
    }
}

#[tokio::test]
async fn test_diamond_waits_for_all_dependents() {
    let probe = Probe::new();
    let base = probe.component("base", vec![]);
    let left = probe.slow("left", vec![base.erase()], Duration::from_millis(5));
    let right = probe.component("right", vec![base.erase()]);
    let root = probe.component("root", vec![left.erase(), right.erase()]);

    root.init().await.unwrap();
    root.destroy().await.unwrap();

    let destroys = probe.events_of("destroy");
    assert_eq!(destroys.len(), 4);
    assert_eq!(destroys.first().map(String::as_str), Some("root"));
    assert_eq!(destroys.last().map(String::as_str), Some("base"));
}

#[tokio::test]
async fn test_init_destroy_init_recreates_everything() {
    let probe = Probe::new();
    let db = probe.component("db", vec![]);
    let server = probe.component("server", vec![db.erase()]);

    server.init().await.unwrap();
    server.destroy().await.unwrap();
    server.init().await.unwrap();

    for name in ["db", "server"] {
        assert_eq!(probe.creates(name), 2, "{name} should be created twice");
        assert_eq!(probe.destroys(name), 1, "{name} should be destroyed once");
    }
    assert_eq!(server.state(), CellState::Ready);
}

#[tokio::test]
async fn test_destroying_twice_is_a_no_op() {
    let probe = Probe::new();
    let db = probe.component("db", vec![]);

    db.init().await.unwrap();
    db.destroy().await.unwrap();
    db.destroy().await.unwrap();

    assert_eq!(probe.destroys("db"), 1);
}

#[tokio::test]
async fn test_uninitialized_and_failed_components_are_skipped() {
    let probe = Probe::new();
    let idle = probe.component("idle", vec![]);
    let broken = probe.failing("broken", vec![], Duration::ZERO);
    let _ = broken.init().await;

    Destroyer::new()
        .destroy_all(&[idle.erase(), broken.erase()])
        .await
        .unwrap();

    assert!(probe.events_of("destroy").is_empty());
    assert_eq!(broken.state(), CellState::Failed);
}

#[tokio::test]
async fn test_failing_destroy_does_not_stop_siblings() {
    //      root
    //     /    \
    //   bad    good
    let probe = Probe::new();
    let bad = probe.failing_destroy("bad", vec![]);
    let good = probe.component("good", vec![]);
    let root = probe.component("root", vec![bad.erase(), good.erase()]);

    root.init().await.unwrap();
    let errors = root.destroy().await.unwrap_err();

    assert_eq!(probe.destroys("root"), 1);
    assert_eq!(probe.destroys("good"), 1);
    assert_eq!(probe.destroys("bad"), 1);
    assert_eq!(errors.errors.len(), 1);
    assert!(matches!(
        &errors.errors[0],
        DestroyError::Failed { info, .. } if info.name == "bad"
    ));
    // The failed value is gone either way
    assert_eq!(bad.state(), CellState::Empty);
}

#[tokio::test]
async fn test_failing_dependent_keeps_dependencies_alive() {
    // top -> db
    let probe = Probe::new();
    let db = probe.component("db", vec![]);
    let top = probe.failing_destroy("top", vec![db.erase()]);

    top.init().await.unwrap();
    let errors = top.destroy().await.unwrap_err();

    assert_eq!(probe.destroys("db"), 0);
    assert_eq!(db.state(), CellState::Ready);
    assert!(errors.errors.iter().any(|error| matches!(
        error,
        DestroyError::Blocked { info, dependent } if info.name == "db" && dependent.name == "top"
    )));
    assert!(errors.to_string().contains("refused to stop"));

    // db can still be torn down on its own
    db.destroy().await.unwrap();
    assert_eq!(probe.destroys("db"), 1);
}

#[tokio::test]
async fn test_destroy_only_reaches_dependencies() {
    // Destroying a leaf ignores components depending on it outside the given roots
    let probe = Probe::new();
    let db = probe.component("db", vec![]);
    let server = probe.component("server", vec![db.erase()]);

    server.init().await.unwrap();
    db.destroy().await.unwrap();

    assert_eq!(probe.events_of("destroy"), vec!["db"]);
    assert_eq!(server.state(), CellState::Ready);
}

#[tokio::test]
async fn test_deep_chain_tears_down_without_recursion() {
    let created = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    let mut links = chain(20_000, &created, &destroyed);
    let head = links[links.len() - 1].erase();

    Destroyer::new().destroy_all(&[head.clone()]).await.unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);

    links[links.len() - 1].init().await.unwrap();
    Destroyer::new().destroy_all(&[head.clone()]).await.unwrap();

    assert_eq!(destroyed.load(Ordering::SeqCst), 20_001);
    assert!(links.iter().all(|link| link.state() == CellState::Empty));

    // Torn down links come back on the next init
    links[links.len() - 1].init().await.unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2 * 20_001);

    drop(head);
    while links.pop().is_some() {}
}
