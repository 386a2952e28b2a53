use thiserror::Error;

use crate::store::StoreError;

/// Failure of an ingestion or snapshot request. `Display` is the message
/// returned to the caller; store variants keep the underlying cause for `details`.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    StoreQuery {
        message: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{message}")]
    StoreWrite {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    pub fn validation(message: impl Into<String>) -> Self {
        IngestError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, IngestError::Validation(_))
    }

    /// Message of the underlying store error, if any.
    pub fn details(&self) -> Option<String> {
        match self {
            IngestError::Validation(_) => None,
            IngestError::StoreQuery { source, .. } | IngestError::StoreWrite { source, .. } => {
                Some(source.to_string())
            }
        }
    }
}
