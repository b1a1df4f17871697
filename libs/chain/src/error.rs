use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

/// Provider error messages meaning the node pruned the requested state.
const ARCHIVE_NODE_SIGNATURES: &[&str] = &[
    "missing trie node",
    "pruning=archive",
    "archive node",
    "historical state",
    "state histories haven't been fully indexed",
    "state is not available",
];

/// Provider error messages meaning we got rate limited.
const RATE_LIMIT_SIGNATURES: &[&str] =
    &["rate limit", "too many requests", "exceeded", "capacity", "throttled"];

/// JSON-RPC codes providers use to signal rate limiting.
const RATE_LIMIT_CODES: &[i64] = &[429, -32005, -32029];

/// JSON-RPC codes that can only be fixed by changing the request.
const MISCONFIGURATION_CODES: &[i64] = &[-32601, -32602];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Timeouts, 5xx, rate limits: worth another attempt after a delay.
    Retryable,
    /// The node does not keep the requested history.
    ArchiveNodeRequired,
    /// Never retried.
    Fatal,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcFailure {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unparseable response: {0}")]
    Decode(String),

    #[error("misconfigured request: {0}")]
    Misconfigured(String),
}

impl RpcFailure {
    pub fn class(&self) -> FailureClass {
        if self.requires_archive_node() {
            return FailureClass::ArchiveNodeRequired;
        }

        match self {
            RpcFailure::Timeout(_) | RpcFailure::Transport(_) => FailureClass::Retryable,
            RpcFailure::Http { status, .. } => match status {
                408 | 429 => FailureClass::Retryable,
                400..=499 => FailureClass::Fatal,
                _ => FailureClass::Retryable,
            },
            RpcFailure::Rpc { code, message } => {
                if RATE_LIMIT_CODES.contains(code) || contains_any(message, RATE_LIMIT_SIGNATURES)
                {
                    FailureClass::Retryable
                } else if MISCONFIGURATION_CODES.contains(code) {
                    FailureClass::Fatal
                } else {
                    // providers report all kinds of transient trouble as -32000
                    FailureClass::Retryable
                }
            }
            RpcFailure::Decode(_) | RpcFailure::Misconfigured(_) => FailureClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == FailureClass::Retryable
    }

    pub fn requires_archive_node(&self) -> bool {
        let text = match self {
            RpcFailure::Rpc { message, .. } => message,
            RpcFailure::Http { body, .. } => body,
            RpcFailure::Transport(text) => text,
            RpcFailure::Timeout(_) | RpcFailure::Decode(_) | RpcFailure::Misconfigured(_) => {
                return false;
            }
        };
        contains_any(text, ARCHIVE_NODE_SIGNATURES)
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    let text = text.to_lowercase();
    needles.iter().any(|needle| text.contains(needle))
}

impl From<RpcError<TransportErrorKind>> for RpcFailure {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => {
                RpcFailure::Rpc { code: payload.code, message: payload.message.to_string() }
            }
            RpcError::Transport(TransportErrorKind::HttpError(http)) => {
                RpcFailure::Http { status: http.status, body: http.body }
            }
            RpcError::Transport(kind) => {
                let text = kind.to_string();
                if text.contains("timed out") || text.contains("timeout") {
                    RpcFailure::Timeout(text)
                } else {
                    RpcFailure::Transport(text)
                }
            }
            RpcError::DeserError { err, text } => {
                RpcFailure::Decode(format!("{err}: {}", truncate(&text, 256)))
            }
            RpcError::SerError(err) => RpcFailure::Misconfigured(err.to_string()),
            other => RpcFailure::Transport(other.to_string()),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
