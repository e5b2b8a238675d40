use std::collections::{HashMap, HashSet};

use futures::{
    future::{self, BoxFuture},
    stream::FuturesUnordered,
    FutureExt, StreamExt,
};

use crate::{
    component::DynComponent,
    dependency_graph::DependencyGraph,
    errors::{DestroyError, DestroyErrors},
    types::CellId,
};

type Settled = HashMap<CellId, Result<(), DestroyError>>;

/// Tears components down in reverse dependency order
///
/// A component is destroyed only after every component depending on it (within the
/// graph reachable from the roots) has been destroyed. Independent branches are torn
/// down concurrently; a failing branch does not stop the others.
///
/// Teardowns are polled side by side from one flat set of futures, each started once
/// all of its dependents are done, so deep graphs do not grow the call stack.
#[derive(Debug, Clone, Default)]
pub struct Destroyer;

impl Destroyer {
    pub fn new() -> Self {
        Destroyer
    }

    /// Destroys every ready component reachable from `roots`
    ///
    /// Components that were never initialized, are still pending or failed to initialize
    /// are skipped. Destroyed components can be initialized again afterwards.
    pub async fn destroy_all(&self, roots: &[DynComponent]) -> Result<(), DestroyErrors> {
        let graph = DependencyGraph::collect(roots)?;
        tracing::debug!("Destroying {} reachable component(s)", graph.len());

        let mut waiting: HashMap<CellId, usize> = graph
            .nodes()
            .iter()
            .map(|node| {
                let id = node.cell_id();
                (id, graph.dependents(id).len())
            })
            .collect();

        let mut settled = Settled::with_capacity(graph.len());
        let mut running = FuturesUnordered::new();
        // Dependents come before their dependencies in reverse order
        for node in graph.nodes().iter().rev() {
            if graph.dependents(node.cell_id()).is_empty() {
                running.push(destroy_task(&graph, node, &settled));
            }
        }

        while let Some((id, result)) = running.next().await {
            settled.insert(id, result);

            let dependencies: HashSet<&CellId> = graph.dependencies(id).iter().collect();
            for dependency in dependencies {
                let Some(remaining) = waiting.get_mut(dependency) else {
                    continue;
                };
                *remaining -= 1;
                if *remaining > 0 {
                    continue;
                }
                if let Some(node) = graph.node(*dependency) {
                    if graph.is_terminal(*dependency) {
                        tracing::trace!("'{}' is torn down last in its branch", node.info());
                    }
                    running.push(destroy_task(&graph, node, &settled));
                }
            }
        }

        let errors: Vec<DestroyError> = graph
            .nodes()
            .iter()
            .filter_map(|node| match settled.remove(&node.cell_id()) {
                Some(Err(error)) => Some(error),
                _ => None,
            })
            .collect();
        if !errors.is_empty() {
            tracing::error!("{} component(s) could not be destroyed", errors.len());
            return Err(DestroyErrors { errors });
        }

        tracing::debug!("All reachable components destroyed");
        Ok(())
    }
}

/// Destroys `node`, whose dependents have all settled, unless one of them failed
fn destroy_task(
    graph: &DependencyGraph,
    node: &DynComponent,
    settled: &Settled,
) -> BoxFuture<'static, (CellId, Result<(), DestroyError>)> {
    let id = node.cell_id();
    let failed = graph
        .dependents(id)
        .iter()
        .find_map(|dependent| match settled.get(dependent) {
            Some(Err(error)) => Some(error),
            _ => None,
        });

    if let Some(failed) = failed {
        let dependent = failed.info().unwrap_or(node.info()).clone();
        tracing::warn!(
            "Keeping '{}' alive, its dependent '{}' failed to tear down",
            node.info(),
            dependent
        );

        let blocked = DestroyError::Blocked {
            info: node.info().clone(),
            dependent,
        };
        return future::ready((id, Err(blocked))).boxed();
    }

    node.destroy_instance()
        .map(move |result| (id, result))
        .boxed()
}
