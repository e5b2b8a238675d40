use std::{
    collections::{HashMap, HashSet},
    thread::{self, sleep},
    time::Duration,
};

use futures::{
    future::{self, BoxFuture, Either},
    stream::FuturesUnordered,
    FutureExt, StreamExt,
};
use futures_channel::oneshot;

use crate::{
    component::DynComponent,
    dependency_graph::DependencyGraph,
    errors::InitError,
    types::{CellId, Instance},
};

type Settled = HashMap<CellId, Result<Instance, InitError>>;

/// Initializes components and everything they depend on
///
/// Every call validates the graph reachable from its roots first; a cycle fails the call
/// before any create step runs. Afterwards each component is created once, as soon as
/// all of its dependencies are available, with independent branches progressing concurrently.
///
/// All components of a call are polled side by side from one flat set of futures, so
/// the depth of the graph never translates into depth of the call stack.
#[derive(Debug, Clone, Default)]
pub struct Initializer {
    timeout: Option<Duration>,
}

impl Initializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops waiting after `timeout` with [`InitError::Timeout`]
    ///
    /// Creation already in flight is not cancelled, but nothing polls it after the timeout.
    /// It stays suspended, with its cell pending, until a later init reaches the same
    /// component and drives it to completion.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Initializes all roots, returning their values in root order
    ///
    /// All roots run to completion; if several fail, the first failing root is reported.
    pub async fn init(&self, roots: &[DynComponent]) -> Result<Vec<Instance>, InitError> {
        let graph = DependencyGraph::collect(roots)?;

        tracing::debug!(
            "Initializing {} root component(s), {} reachable",
            roots.len(),
            graph.len()
        );
        let all = initialize_graph(&graph);

        let settled = match self.timeout {
            None => all.await,
            Some(timeout) => {
                // If we have a timeout - spawn a thread to signal once it's done
                let (timeout_tx, timeout_rx) = oneshot::channel::<()>();
                // We don't join the thread - it will just die after the timeout
                thread::spawn(move || {
                    sleep(timeout);
                    let _ = timeout_tx.send(());
                });

                match future::select(Box::pin(all), timeout_rx).await {
                    Either::Left((settled, _)) => settled,
                    Either::Right(_) => {
                        tracing::warn!("Initialization timed out after {timeout:?}");
                        return Err(InitError::Timeout);
                    }
                }
            }
        };

        let instances = roots
            .iter()
            .map(|root| match settled.get(&root.cell_id()) {
                Some(result) => result.clone(),
                None => unreachable!("every reachable component settles"),
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("All {} root component(s) initialized", instances.len());
        Ok(instances)
    }
}

/// Settles every node of `graph`, dependencies first
///
/// A node is started once all of its dependencies have settled and receives their
/// results; nodes already pending or settled are joined instead.
async fn initialize_graph(graph: &DependencyGraph) -> Settled {
    let mut waiting: HashMap<CellId, usize> = graph
        .nodes()
        .iter()
        .map(|node| {
            let id = node.cell_id();
            let distinct: HashSet<&CellId> = graph.dependencies(id).iter().collect();
            (id, distinct.len())
        })
        .collect();

    let mut settled = Settled::with_capacity(graph.len());
    let mut running = FuturesUnordered::new();
    for node in graph.nodes() {
        if graph.is_terminal(node.cell_id()) {
            running.push(start(graph, node, &settled));
        }
    }

    while let Some((id, result)) = running.next().await {
        settled.insert(id, result);

        for dependent in graph.dependents(id) {
            let Some(remaining) = waiting.get_mut(dependent) else {
                continue;
            };
            *remaining -= 1;
            if *remaining > 0 {
                continue;
            }
            if let Some(node) = graph.node(*dependent) {
                running.push(start(graph, node, &settled));
            }
        }
    }

    settled
}

fn start(
    graph: &DependencyGraph,
    node: &DynComponent,
    settled: &Settled,
) -> BoxFuture<'static, (CellId, Result<Instance, InitError>)> {
    let id = node.cell_id();
    let dependencies = graph
        .dependencies(id)
        .iter()
        .filter_map(|dependency| settled.get(dependency).cloned())
        .collect();

    tracing::trace!("Dependencies of '{}' settled", node.info());
    node.init_instance(dependencies)
        .map(move |result| (id, result))
        .boxed()
}
