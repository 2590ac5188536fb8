use thiserror::Error;

/// Failure talking to the resource store.
///
/// Not-found is deliberately absent: a query matching zero objects is an
/// ordinary empty result, surfaced upstream as `Option`/`bool`, so callers
/// can tell "never existed or wrong owner" apart from a transport failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected a create because the object name already exists.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// The store rejected the call.
    #[error("api error: {0}")]
    Api(String),

    /// The store was unreachable.
    #[error("transport error: {0}")]
    Transport(String),

    /// A readiness wait elapsed before the condition was observed.
    #[error("timed out waiting for {0}")]
    WaitTimeout(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed task or volume definition, rejected before any cluster call.
    #[error("invalid definition: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
