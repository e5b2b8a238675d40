//! Tests for cycle detection before any side effect

use std::sync::{Arc, OnceLock};

use wrapp_lifecycle::{
    validate, CellState, Component, ComponentInfo, DynComponent, InitError, Initializer, Resolved,
};

use crate::common::Probe;

/// Builds a -> b -> c -> a, with c referring back to a lazily
fn triangle(probe: &Probe) -> (Component<String>, Component<String>, Component<String>) {
    let slot: Arc<OnceLock<DynComponent>> = Arc::new(OnceLock::new());

    let back = slot.clone();
    let c = Component::builder(ComponentInfo::new("c"))
        .dependencies_with(move || back.get().cloned().into_iter().collect())
        .create(|_: Resolved| async { Ok::<_, std::convert::Infallible>("c".to_string()) });
    let b = probe.component("b", vec![c.erase()]);
    let a = probe.component("a", vec![b.erase()]);
    slot.set(a.erase()).unwrap();

    (a, b, c)
}

#[test]
fn test_validate_reports_the_cycle_path() {
    let probe = Probe::new();
    let (a, _, _) = triangle(&probe);

    let error = validate(&[a.erase()]).unwrap_err();

    assert_eq!(error.names(), vec!["a", "b", "c", "a"]);
    assert!(error.to_string().starts_with("dependency cycle detected: a"));
}

#[test]
fn test_cycle_path_starts_at_the_revisited_component() {
    let probe = Probe::new();
    let (_a, b, _) = triangle(&probe);
    let entry = probe.component("entry", vec![b.erase()]);

    let error = validate(&[entry.erase()]).unwrap_err();
    assert_eq!(error.names(), vec!["b", "c", "a", "b"]);
}

#[tokio::test]
async fn test_init_rejects_cycles_without_side_effects() {
    let probe = Probe::new();
    let (a, b, c) = triangle(&probe);

    let error = a.init().await.unwrap_err();

    let InitError::Cycle(cycle) = error else {
        panic!("expected a cycle error, got {error:?}");
    };
    assert_eq!(cycle.names(), vec!["a", "b", "c", "a"]);
    assert!(probe.events().is_empty());
    for component in [&a, &b, &c] {
        assert_eq!(component.state(), CellState::Empty);
    }
}

#[tokio::test]
async fn test_cycle_anywhere_below_the_roots_fails_all_roots() {
    let probe = Probe::new();
    let (a, _, _) = triangle(&probe);
    let healthy = probe.component("healthy", vec![]);

    let result = Initializer::new().init(&[healthy.erase(), a.erase()]).await;

    assert!(matches!(result, Err(InitError::Cycle(_))));
    assert_eq!(probe.creates("healthy"), 0);
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let slot: Arc<OnceLock<DynComponent>> = Arc::new(OnceLock::new());
    let back = slot.clone();
    let selfish = Component::builder(ComponentInfo::new("selfish"))
        .dependencies_with(move || back.get().cloned().into_iter().collect())
        .create(|_: Resolved| async { Ok::<_, std::convert::Infallible>(1_u32) });
    slot.set(selfish.erase()).unwrap();

    let error = validate(&[selfish.erase()]).unwrap_err();

    assert_eq!(error.names(), vec!["selfish", "selfish"]);
}

#[test]
fn test_deep_chain_validates_without_recursion() {
    let probe = Probe::new();
    let mut chain = vec![probe.component("link", vec![])];
    for _ in 0..20_000 {
        let previous = chain[chain.len() - 1].erase();
        chain.push(probe.component("link", vec![previous]));
    }

    let head = chain[chain.len() - 1].erase();
    assert!(validate(&[head]).is_ok());

    // Release from the head down, so no drop recurses through the chain
    while chain.pop().is_some() {}
}
