//! Bridge error types.

use kiln_hostapi::FetchError;

use crate::handles::HandleError;
use crate::layout::LayoutError;
use crate::marshal::MarshalError;
use crate::memory::MemoryError;

/// Top-level error type for the bridge crate.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module bytes could not be fetched.
    #[error("failed to fetch module '{path}': {source}")]
    Fetch {
        path: String,
        #[source]
        source: FetchError,
    },

    /// Module validation failed (missing exports, wrong signatures).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// No provider in the composed environment supplies this import.
    #[error("module '{module}' imports unresolved {import_module}::{name}")]
    UnresolvedImport {
        module: String,
        import_module: String,
        name: String,
    },

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// An operation needs the primary module, which is not loaded yet.
    #[error("no primary module loaded")]
    NoPrimaryModule,

    /// A module name was not found among loaded modules.
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    /// A module does not export a function the caller asked for.
    #[error("module '{module}' has no export '{name}'")]
    MissingExport { module: String, name: String },

    /// `compute_layout` may only run once per bridge.
    #[error("memory layout already computed")]
    LayoutAlreadyComputed,

    /// Events and frames need an initialized guest.
    #[error("memory layout not computed; call compute_layout first")]
    LayoutNotComputed,

    /// The guest used a drawing family the host did not configure.
    #[error("no {0} backend configured")]
    MissingBackend(&'static str),

    /// Fuel exhausted during a guest call.
    #[error("fuel exhausted (instruction limit)")]
    FuelExhausted,

    /// WASM guest trapped.
    #[error("guest trapped: {0}")]
    GuestTrapped(String),
}

impl BridgeError {
    /// Convert a failed guest call into the most specific error available.
    ///
    /// Host functions report boundary violations as a `HostCallError`, which
    /// Wasmtime carries through the trap.
    pub fn from_trap(err: anyhow::Error) -> Self {
        if let Some(trap) = err.downcast_ref::<wasmtime::Trap>() {
            if *trap == wasmtime::Trap::OutOfFuel {
                return Self::FuelExhausted;
            }
        }
        match err.downcast_ref::<HostCallError>() {
            Some(HostCallError::Handle(e)) => Self::Handle(e.clone()),
            Some(HostCallError::Memory(e)) => Self::Memory(e.clone()),
            Some(HostCallError::Marshal(e)) => Self::Marshal(e.clone()),
            Some(HostCallError::MissingBackend(kind)) => Self::MissingBackend(*kind),
            Some(HostCallError::MemoryUnbound) | None => Self::GuestTrapped(format!("{:#}", err)),
        }
    }
}

/// Fatal error raised inside a host function. Returning one traps the
/// guest call that invoked the import.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostCallError {
    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error("no {0} backend configured")]
    MissingBackend(&'static str),

    #[error("guest memory is not bound")]
    MemoryUnbound,
}

impl HostCallError {
    /// Log at `error` and convert into the trap value for `import`.
    pub(crate) fn trap(self, import: &str) -> anyhow::Error {
        log::error!("host import env::{} failed: {}", import, self);
        anyhow::Error::new(self)
    }
}
