//! Error types for the sync engine.
//!
//! The taxonomy distinguishes failures that should land in the outbox
//! (transport/offline, server 5xx) from failures that must surface
//! immediately (client 4xx, decode problems, local storage faults).

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, SyncError>;

/// All errors that can occur when using the sync engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The transport failed before any HTTP response was obtained
    /// (connection refused, DNS failure, timeout).
    #[error("network unreachable: {0}")]
    Offline(#[source] reqwest::Error),

    /// A response arrived but could not be interpreted as HTTP.
    #[error("invalid response from server")]
    InvalidResponse(#[source] reqwest::Error),

    /// The server answered with a non-2xx status code.
    #[error("server returned status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body, kept for diagnostics.
        body: Vec<u8>,
    },

    /// A response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// A request body could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A durable-storage operation failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),

    /// A referenced entity is absent from the local cache.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"bank account"`.
        entity: &'static str,
        /// The id that was looked up.
        id: i64,
    },

    /// A required builder parameter was missing or invalid.
    #[error("configuration error: {0}")]
    Config(&'static str),

    /// Anything that does not fit the categories above.
    #[error("unknown error: {0}")]
    Unknown(Box<dyn core::error::Error + Send + Sync>),
}

impl SyncError {
    /// Returns `true` if the failure means the remote service could not
    /// be reached at all.
    #[inline]
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }

    /// Returns `true` if a failed write should be recorded in the outbox
    /// for later replay.
    ///
    /// Transport failures and server-side errors (5xx) are considered
    /// transient. Client errors (4xx) will not succeed as written, so
    /// they propagate without queuing.
    #[inline]
    #[must_use]
    pub const fn should_queue(&self) -> bool {
        match self {
            Self::Offline(_) | Self::InvalidResponse(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Decode(_)
            | Self::Encode(_)
            | Self::Storage(_)
            | Self::NotFound { .. }
            | Self::Config(_)
            | Self::Unknown(_) => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    #[inline]
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::Offline(err)
        } else if err.is_decode() || err.is_body() {
            Self::InvalidResponse(err)
        } else {
            Self::Unknown(Box::new(err))
        }
    }
}
