use std::fmt::{Display, Formatter};

use chain::error::{FailureClass, RpcFailure};
use thiserror::Error;

use crate::range::RangeError;

/// Where a failure happened, carried into every surfaced error so the caller
/// can route the range to the right place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureContext {
    pub chain: String,
    pub object: Option<String>,
    pub range: Option<String>,
}

impl FailureContext {
    pub fn new(chain: impl Into<String>) -> Self {
        Self { chain: chain.into(), object: None, range: None }
    }

    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn range(mut self, range: impl Display) -> Self {
        self.range = Some(range.to_string());
        self
    }
}

impl Display for FailureContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "chain={}", self.chain)?;
        if let Some(object) = &self.object {
            write!(f, " object={object}")?;
        }
        if let Some(range) = &self.range {
            write!(f, " range={range}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    InvalidRange(#[from] RangeError),

    #[error("{context}: gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        context: FailureContext,
        attempts: u32,
        #[source]
        source: RpcFailure,
    },

    #[error("{context}: archive node required: {source}")]
    ArchiveNodeRequired {
        context: FailureContext,
        #[source]
        source: RpcFailure,
    },

    #[error("{context}: fatal provider error: {source}")]
    Fatal {
        context: FailureContext,
        #[source]
        source: RpcFailure,
    },

    #[error("{context}: provider returned no result")]
    MissingResult { context: FailureContext },

    #[error("{context}: sink rejected logs: {message}")]
    Sink { context: FailureContext, message: String },

    /// A bug, not a provider problem. Never retried.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl ImportError {
    /// Wraps a provider failure that will not be retried any further.
    pub fn from_rpc(context: FailureContext, attempts: u32, failure: RpcFailure) -> Self {
        match failure.class() {
            FailureClass::Retryable => {
                ImportError::RetriesExhausted { context, attempts, source: failure }
            }
            FailureClass::ArchiveNodeRequired => {
                ImportError::ArchiveNodeRequired { context, source: failure }
            }
            FailureClass::Fatal => ImportError::Fatal { context, source: failure },
        }
    }

    pub fn is_archive_node_required(&self) -> bool {
        matches!(self, ImportError::ArchiveNodeRequired { .. })
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, ImportError::Invariant(_))
    }
}
