//! Error types for key derivation and subscriptions.

use std::sync::Arc;

/// Errors surfaced by the SWR layer.
///
/// Key derivation failures are produced here; subscription failures come from
/// the [`QueryProvider`](crate::QueryProvider) and are returned to the caller
/// exactly as the provider reported them. The cache never retries or hides
/// an error behind a stale value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// The query identity does not resolve to a canonical function name.
    #[error("invalid query identity `{name}`: {reason}")]
    InvalidIdentity {
        /// The raw function path as supplied.
        name: String,
        /// Which canonicalisation rule rejected it.
        reason: &'static str,
    },

    /// The arguments cannot be encoded as JSON.
    #[error("query arguments are not serializable: {message}")]
    UnserializableArguments {
        /// Message from the serializer.
        message: String,
    },

    /// A batch member could not be decoded as the requested type.
    #[error("result `{name}` has an unexpected shape: {message}")]
    UnexpectedResultShape {
        /// Name of the batch member.
        name: String,
        /// Message from the deserializer.
        message: String,
    },

    /// The live subscription failed.
    ///
    /// Wraps the provider's error so that `QueryError` stays `Clone`.
    #[error("subscription failed: {0}")]
    Subscription(Arc<anyhow::Error>),
}

impl QueryError {
    /// Wrap any error coming out of a provider.
    pub fn subscription(err: impl Into<anyhow::Error>) -> Self {
        QueryError::Subscription(Arc::new(err.into()))
    }

    pub(crate) fn invalid_identity(name: &str, reason: &'static str) -> Self {
        QueryError::InvalidIdentity {
            name: name.to_owned(),
            reason,
        }
    }

    pub(crate) fn unserializable(err: serde_json::Error) -> Self {
        QueryError::UnserializableArguments {
            message: err.to_string(),
        }
    }

    /// Returns the provider error if this is a `Subscription` variant.
    pub fn subscription_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            QueryError::Subscription(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast the provider error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.subscription_error().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` if this is a `Subscription` error containing an `E`.
    pub fn is<E: std::error::Error + Send + Sync + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }
}
