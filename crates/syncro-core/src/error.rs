//! Engine error handling
//!
//! Typed errors for path parsing, the wire codec, the realtime store and
//! the coordination service, with helpers the retry loops use to decide
//! whether an attempt is worth repeating.

use thiserror::Error;

/// Errors that can occur while mounting or syncing a floating entity
#[derive(Error, Debug)]
pub enum SyncroError {
    /// Path string does not match `ENTITY::UUID(::RELATION)?`
    #[error("Invalid syncro path '{path}'. Expected ENTITY::UUID or ENTITY::UUID::RELATION.")]
    PathSyntax { path: String },

    /// Entity is not present in the configured registry
    #[error("Unsupported entity '{entity}'")]
    UnsupportedEntity { entity: String },

    /// Reactive adapter does not honor its contract
    #[error("Reactive adapter contract violated: {0}")]
    AdapterContract(String),

    /// Realtime document was removed server-side
    #[error("Realtime document '{collection}/{id}' not found")]
    NotFound { collection: String, id: String },

    /// Coordination service answered with a non-2xx status
    #[error("Coordination request to '{url}' failed with status {status}")]
    Transport { url: String, status: u16 },

    /// Coordination service could not be reached
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Realtime store failure other than not-found
    #[error("Realtime store error: {0}")]
    Store(String),

    /// Value could not be converted to or from the wire format
    #[error("Codec error: {0}")]
    Codec(String),

    /// An entity's init/flush hook failed
    #[error("Entity '{entity}' hook failed: {source}")]
    Entity {
        entity: String,
        #[source]
        source: anyhow::Error,
    },

    /// Mount gave up after exhausting its retry budget
    #[error("Mount failed after {attempts} attempts: {source}")]
    MountRetryExhausted {
        attempts: u32,
        #[source]
        source: Box<SyncroError>,
    },

    /// Operation requires a mounted engine
    #[error("Engine is not mounted")]
    NotMounted,

    /// Operation attempted on a destroyed engine
    #[error("Engine has been destroyed")]
    Destroyed,
}

impl SyncroError {
    /// Check if a failed attempt may succeed when repeated
    ///
    /// Parse, validation and adapter errors are configuration bugs and
    /// never retried. Entity hook failures go straight to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncroError::NotFound { .. }
                | SyncroError::Transport { .. }
                | SyncroError::Http(_)
                | SyncroError::Store(_)
        )
    }

    /// Check if this error came from the coordination service
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncroError::Transport { .. } | SyncroError::Http(_))
    }

    /// Unwrap retry exhaustion down to the error that caused it
    pub fn root_cause(&self) -> &SyncroError {
        match self {
            SyncroError::MountRetryExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Errors reported by a realtime store implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Document does not exist
    #[error("Document '{collection}/{id}' not found")]
    NotFound { collection: String, id: String },

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for SyncroError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => SyncroError::NotFound { collection, id },
            StoreError::Backend(message) => SyncroError::Store(message),
        }
    }
}

/// Result type for engine operations
pub type SyncroResult<T> = Result<T, SyncroError>;
