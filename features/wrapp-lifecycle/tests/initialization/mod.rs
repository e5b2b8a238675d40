//! Tests for initialization order, memoization and error chains

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use wrapp_lifecycle::{CellState, InitError, Initializer};

use crate::common::{chain, Probe};

#[tokio::test]
async fn test_dependencies_are_created_first_and_passed_in_order() {
    let probe = Probe::new();
    let db = probe.component("db", vec![]);
    let cache = probe.component("cache", vec![]);
    let server = probe.component("server", vec![db.erase(), cache.erase()]);

    let value = server.init().await.unwrap();

    assert_eq!(*value, "server(db(),cache())");
    let creates = probe.events_of("create");
    assert_eq!(creates.last().map(String::as_str), Some("server"));
    assert_eq!(creates.len(), 3);
}

#[tokio::test]
async fn test_init_twice_is_idempotent() {
    let probe = Probe::new();
    let db = probe.component("db", vec![]);
    let server = probe.component("server", vec![db.erase()]);

    let first = server.init().await.unwrap();
    let second = server.init().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(probe.creates("server"), 1);
    assert_eq!(probe.creates("db"), 1);
}

#[tokio::test]
async fn test_shared_dependency_is_created_once() {
    //      root
    //     /    \
    //   left  right
    //     \    /
    //      base
    let probe = Probe::new();
    let base = probe.component("base", vec![]);
    let left = probe.component("left", vec![base.erase()]);
    let right = probe.component("right", vec![base.erase()]);
    let root = probe.component("root", vec![left.erase(), right.erase()]);

    let value = root.init().await.unwrap();

    assert_eq!(*value, "root(left(base()),right(base()))");
    assert_eq!(probe.creates("base"), 1);
}

#[tokio::test]
async fn test_initializer_returns_values_in_root_order() {
    let probe = Probe::new();
    let a = probe.component("a", vec![]);
    let b = probe.component("b", vec![a.erase()]);

    let values = Initializer::new()
        .init(&[b.erase(), a.erase()])
        .await
        .unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(*values[0].downcast::<String>().unwrap(), "b(a())");
    assert_eq!(*values[1].downcast::<String>().unwrap(), "a()");
}

#[tokio::test]
async fn test_partial_failure_does_not_cancel_siblings() {
    let probe = Probe::new();
    let x = probe.failing("x", vec![], Duration::from_millis(10));
    let y = probe.slow("y", vec![], Duration::from_millis(60));
    let root = probe.component("root", vec![x.erase(), y.erase()]);

    let error = root.init().await.unwrap_err();

    // Sibling ran to completion
    assert_eq!(probe.creates("y"), 1);
    assert_eq!(y.state(), CellState::Ready);
    // Root never got created
    assert_eq!(probe.creates("root"), 0);
    assert_eq!(root.state(), CellState::Failed);

    let trace: Vec<&str> = error.trace().iter().map(|info| info.name.as_ref()).collect();
    assert_eq!(trace, vec!["x", "root"]);
    assert_eq!(error.origin().map(|info| &*info.name), Some("x"));
    assert_eq!(
        error.root_cause().map(ToString::to_string),
        Some("x is broken".to_string())
    );
}

#[tokio::test]
async fn test_error_chain_spans_every_level() {
    let probe = Probe::new();
    let broken = probe.failing("broken", vec![], Duration::ZERO);
    let middle = probe.component("middle", vec![broken.erase()]);
    let top = probe.component("top", vec![middle.erase()]);

    let error = top.init().await.unwrap_err();

    assert!(matches!(&error, InitError::Component { info, .. } if info.name == "top"));
    let trace: Vec<&str> = error.trace().iter().map(|info| info.name.as_ref()).collect();
    assert_eq!(trace, vec!["broken", "middle", "top"]);
    assert_eq!(probe.creates("middle"), 0);
    assert_eq!(probe.creates("top"), 0);
}

#[tokio::test]
async fn test_failure_stays_cached() {
    let probe = Probe::new();
    let broken = probe.failing("broken", vec![], Duration::ZERO);

    assert!(broken.init().await.is_err());
    assert!(broken.init().await.is_err());

    assert_eq!(probe.creates("broken"), 1);
    assert!(broken.get_if_ready().is_none());
}

#[tokio::test]
async fn test_get_if_ready_follows_the_lifecycle() {
    let probe = Probe::new();
    let db = probe.component("db", vec![]);

    assert!(db.get_if_ready().is_none());
    assert_eq!(db.state(), CellState::Empty);

    db.init().await.unwrap();
    assert_eq!(db.get_if_ready().as_deref().map(String::as_str), Some("db()"));

    db.destroy().await.unwrap();
    assert!(db.get_if_ready().is_none());
}

#[tokio::test]
async fn test_depends_on_orders_without_passing_values() {
    let probe = Probe::new();
    let migrations = probe.component("migrations", vec![]);
    let server = probe
        .component("server", vec![])
        .depends_on([migrations.erase()]);

    let value = server.init().await.unwrap();

    // Ordering only dependency is not an argument
    assert_eq!(*value, "server()");
    assert_eq!(probe.events_of("create"), vec!["migrations", "server"]);

    server.destroy().await.unwrap();
    assert_eq!(probe.events_of("destroy"), vec!["server", "migrations"]);
}

#[tokio::test]
async fn test_timeout_does_not_cancel_creation() {
    let probe = Probe::new();
    let slow = probe.slow("slow", vec![], Duration::from_millis(300));

    let result = Initializer::new()
        .with_timeout(Duration::from_millis(30))
        .init(&[slow.erase()])
        .await;
    assert!(matches!(result, Err(InitError::Timeout)));

    // A later init picks the pending creation up again
    let value = slow.init().await.unwrap();
    assert_eq!(*value, "slow()");
    assert_eq!(probe.creates("slow"), 1);
}

#[tokio::test]
async fn test_deep_chain_initializes() {
    let created = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    let mut links = chain(20_000, &created, &destroyed);

    let head = links[links.len() - 1].clone();
    assert_eq!(*head.init().await.unwrap(), 20_000);
    assert_eq!(created.load(Ordering::SeqCst), 20_001);
    assert_eq!(links[0].state(), CellState::Ready);

    // Everything settled, a second init creates nothing
    head.init().await.unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 20_001);

    drop(head);
    while links.pop().is_some() {}
}
