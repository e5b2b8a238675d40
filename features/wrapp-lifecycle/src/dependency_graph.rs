//! Depth-first walking of component graphs.
//!
//! [`depth_first`] is generic over the node type, the identity key and the child relation.
//! It keeps an explicit stack of frames instead of recursing, so arbitrarily deep
//! dependency chains never exhaust the native call stack.
//!
//! On top of it, [`validate`] rejects cycles and [`DependencyGraph`] collects the
//! reachable subgraph in dependency order, together with the reverse (dependents) relation.
//! Initialization and teardown schedule their work off that flat structure, never by
//! recursing through the graph.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use crate::{
    component::DynComponent,
    errors::CycleError,
    types::{CellId, ComponentInfo},
};

/// Callbacks invoked while walking a graph
pub trait Visitor<N> {
    type Error;

    /// A node is reached for the first time, before any of its children
    fn on_enter(&mut self, _node: &N) -> Result<(), Self::Error> {
        Ok(())
    }

    /// All children of the node are done
    fn on_exit(&mut self, _node: &N) -> Result<(), Self::Error> {
        Ok(())
    }

    /// `node` is already on the current `stack` - a back edge
    ///
    /// Returning `Ok` skips the edge and continues the walk.
    fn on_cycle(&mut self, node: &N, stack: &[&N]) -> Result<(), Self::Error>;
}

struct Frame<N> {
    node: N,
    children: std::vec::IntoIter<N>,
}

/// Walks everything reachable from `roots`, children before parents
///
/// Nodes are identified by `key`; every key is entered and exited at most once.
/// Children are visited in the order returned by `children`.
pub fn depth_first<N, K, V>(
    roots: impl IntoIterator<Item = N>,
    key: impl Fn(&N) -> K,
    children: impl Fn(&N) -> Vec<N>,
    visitor: &mut V,
) -> Result<(), V::Error>
where
    K: Hash + Eq,
    V: Visitor<N>,
{
    let mut done: HashSet<K> = HashSet::new();
    let mut on_stack: HashSet<K> = HashSet::new();
    let mut frames: Vec<Frame<N>> = Vec::new();

    for root in roots {
        if done.contains(&key(&root)) {
            continue;
        }

        visitor.on_enter(&root)?;
        on_stack.insert(key(&root));
        frames.push(Frame {
            children: children(&root).into_iter(),
            node: root,
        });

        while let Some(frame) = frames.last_mut() {
            let Some(child) = frame.children.next() else {
                // All children handled - node is complete
                let Some(frame) = frames.pop() else { break };
                let frame_key = key(&frame.node);
                on_stack.remove(&frame_key);
                visitor.on_exit(&frame.node)?;
                done.insert(frame_key);
                continue;
            };

            let child_key = key(&child);
            if on_stack.contains(&child_key) {
                let stack: Vec<&N> = frames.iter().map(|frame| &frame.node).collect();
                visitor.on_cycle(&child, &stack)?;
                continue;
            }

            if done.contains(&child_key) {
                continue;
            }

            visitor.on_enter(&child)?;
            on_stack.insert(child_key);
            frames.push(Frame {
                children: children(&child).into_iter(),
                node: child,
            });
        }
    }

    Ok(())
}

/// Builds the cycle path `node -> ... -> node` out of the current stack
fn cycle_path(node: &DynComponent, stack: &[&DynComponent]) -> CycleError {
    let start = stack
        .iter()
        .position(|entry| entry.cell_id() == node.cell_id())
        .unwrap_or(0);

    let path = stack[start..]
        .iter()
        .map(|entry| entry.info().clone())
        .chain(std::iter::once(node.info().clone()))
        .collect();

    CycleError { path }
}

/// Rejects the first cycle found
struct CycleCheck;
impl Visitor<DynComponent> for CycleCheck {
    type Error = CycleError;

    fn on_cycle(
        &mut self,
        node: &DynComponent,
        stack: &[&DynComponent],
    ) -> Result<(), Self::Error> {
        Err(cycle_path(node, stack))
    }
}

fn walk<V: Visitor<DynComponent>>(roots: &[DynComponent], visitor: &mut V) -> Result<(), V::Error> {
    depth_first(
        roots.iter().cloned(),
        |component| component.cell_id(),
        |component| component.dependencies(),
        visitor,
    )
}

/// Checks that the graph reachable from `roots` is acyclic
///
/// Does not run any create step.
pub fn validate(roots: &[DynComponent]) -> Result<(), CycleError> {
    tracing::debug!("Validating dependency graph of {} root(s)", roots.len());
    walk(roots, &mut CycleCheck)?;
    tracing::trace!("Dependency graph is acyclic");
    Ok(())
}

/// Reachable subgraph of a set of roots
///
/// Drives both lifecycle directions: initialization follows the dependencies of each
/// node, teardown follows the reverse (dependents) relation.
pub struct DependencyGraph {
    /// Reachable components, every dependency before its dependents
    nodes: Vec<DynComponent>,
    /// Component -> position in `nodes`
    index: HashMap<CellId, usize>,
    /// Component -> its dependencies, in declared order
    dependencies: HashMap<CellId, Vec<CellId>>,
    /// Component -> components that declared it as a dependency
    dependents: HashMap<CellId, Vec<CellId>>,
    /// Components without dependencies
    terminals: HashSet<CellId>,
}

impl DependencyGraph {
    /// Collects everything reachable from `roots`
    ///
    /// Fails like [`validate`] if the subgraph contains a cycle.
    pub fn collect(roots: &[DynComponent]) -> Result<Self, CycleError> {
        let mut collector = Collector {
            graph: DependencyGraph {
                nodes: Vec::new(),
                index: HashMap::new(),
                dependencies: HashMap::new(),
                dependents: HashMap::new(),
                terminals: HashSet::new(),
            },
        };
        walk(roots, &mut collector)?;

        Ok(collector.graph)
    }

    /// Reachable components, dependencies first
    pub fn nodes(&self) -> &[DynComponent] {
        &self.nodes
    }

    pub fn node(&self, id: CellId) -> Option<&DynComponent> {
        self.index.get(&id).map(|position| &self.nodes[*position])
    }

    /// Dependencies of `id` in declared order, ordering-only ones last
    pub fn dependencies(&self, id: CellId) -> &[CellId] {
        self.dependencies.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Components which declared `id` as a dependency
    pub fn dependents(&self, id: CellId) -> &[CellId] {
        self.dependents.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether the component has no dependencies of its own
    pub fn is_terminal(&self, id: CellId) -> bool {
        self.terminals.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Infos of all reachable components, dependencies first
    pub fn infos(&self) -> Vec<&ComponentInfo> {
        self.nodes.iter().map(|node| node.info()).collect()
    }
}

struct Collector {
    graph: DependencyGraph,
}
impl Visitor<DynComponent> for Collector {
    type Error = CycleError;

    fn on_enter(&mut self, node: &DynComponent) -> Result<(), Self::Error> {
        let id = node.cell_id();
        let dependencies: Vec<CellId> = node
            .dependencies()
            .iter()
            .map(|dependency| dependency.cell_id())
            .collect();
        if dependencies.is_empty() {
            tracing::trace!("'{}' is a terminal component", node.info());
            self.graph.terminals.insert(id);
        }

        for dependency in &dependencies {
            let dependents = self.graph.dependents.entry(*dependency).or_default();
            if !dependents.contains(&id) {
                dependents.push(id);
            }
        }
        self.graph.dependencies.insert(id, dependencies);

        Ok(())
    }

    fn on_exit(&mut self, node: &DynComponent) -> Result<(), Self::Error> {
        self.graph.index.insert(node.cell_id(), self.graph.nodes.len());
        self.graph.nodes.push(node.clone());
        Ok(())
    }

    fn on_cycle(
        &mut self,
        node: &DynComponent,
        stack: &[&DynComponent],
    ) -> Result<(), Self::Error> {
        Err(cycle_path(node, stack))
    }
}
