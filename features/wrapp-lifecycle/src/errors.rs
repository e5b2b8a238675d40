use std::{error::Error, sync::Arc};

use thiserror::Error;

use crate::types::{ComponentInfo, DynError};

/// Shared error source, so errors stay `Clone` while settled results are handed to many waiters
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// A dependency cycle found while validating the graph
///
/// `path` starts and ends with the component that was revisited, in declared dependency order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub path: Vec<ComponentInfo>,
}
impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chain = self
            .path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        write!(f, "dependency cycle detected: {chain}")
    }
}

impl CycleError {
    /// Names of the components along the cycle
    pub fn names(&self) -> Vec<&str> {
        self.path.iter().map(|info| info.name.as_ref()).collect()
    }
}

/// Errors while initializing components
#[derive(Error, Debug, Clone)]
pub enum InitError {
    /// The graph reachable from the roots has a cycle - nothing was created
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A component failed to initialize
    ///
    /// `source` is either the error of the component's own create step, or the
    /// [`InitError`] of the dependency which failed before it.
    #[error("failed to initialize '{info}'")]
    Component {
        info: ComponentInfo,
        #[source]
        source: SharedError,
    },

    /// Initialization timed out
    #[error("Initialization timed out")]
    Timeout,
}

impl InitError {
    pub(crate) fn create_failed(info: ComponentInfo, error: DynError) -> Self {
        InitError::Component {
            info,
            source: Arc::from(error),
        }
    }

    pub(crate) fn dependency_failed(info: ComponentInfo, error: InitError) -> Self {
        InitError::Component {
            info,
            source: Arc::new(error),
        }
    }

    /// Components the failure passed through, from the failing component up to the requested root
    pub fn trace(&self) -> Vec<&ComponentInfo> {
        let mut trace = Vec::new();
        let mut current = self;
        while let InitError::Component { info, source } = current {
            trace.push(info);
            match source.downcast_ref::<InitError>() {
                Some(inner) => current = inner,
                None => break,
            }
        }
        trace.reverse();
        trace
    }

    /// The component whose create step failed
    pub fn origin(&self) -> Option<&ComponentInfo> {
        self.trace().first().copied()
    }

    /// The error returned by the failing create step
    pub fn root_cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        let mut current = self;
        loop {
            match current {
                InitError::Component { source, .. } => match source.downcast_ref::<InitError>() {
                    Some(inner) => current = inner,
                    None => return Some(source.as_ref()),
                },
                _ => return None,
            }
        }
    }
}

/// Errors while tearing a single component down
#[derive(Error, Debug, Clone)]
pub enum DestroyError {
    /// The destroy step of the component failed
    #[error("failed to destroy '{info}' - error: {source}")]
    Failed {
        info: ComponentInfo,
        #[source]
        source: SharedError,
    },
    /// A component depending on this one failed to tear down, so this one was kept alive
    #[error("'{info}' was not destroyed because its dependent '{dependent}' failed to tear down")]
    Blocked {
        info: ComponentInfo,
        dependent: ComponentInfo,
    },
    /// The graph reachable from the roots has a cycle - nothing was destroyed
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

impl DestroyError {
    pub fn info(&self) -> Option<&ComponentInfo> {
        match self {
            DestroyError::Failed { info, .. } | DestroyError::Blocked { info, .. } => Some(info),
            DestroyError::Cycle(_) => None,
        }
    }
}

/// All errors collected by one destroy run
#[derive(Error, Debug, Clone)]
pub struct DestroyErrors {
    pub errors: Vec<DestroyError>,
}
impl std::fmt::Display for DestroyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("Destroying components had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}
impl From<CycleError> for DestroyErrors {
    fn from(error: CycleError) -> Self {
        DestroyErrors {
            errors: vec![error.into()],
        }
    }
}

/// Errors when reading resolved dependency values inside a create step
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("Dependency #{index} requested, but only {len} were declared")]
    Missing { index: usize, len: usize },

    #[error("Failed to downcast dependency #{index}, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        index: usize,
        required_type: &'static str,
        actual_type: &'static str,
    },
}
