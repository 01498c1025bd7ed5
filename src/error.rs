// src/error.rs
// Error taxonomy for the scan pipeline. Only two error kinds ever reach
// the caller of run_scan; everything else is absorbed into degraded
// category data.

use thiserror::Error;

/// Errors raised at the transport seam.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The org rejected the credentials (HTTP 401). The only error class
    /// that escalates past a category fetcher.
    #[error("authentication rejected by org ({status}): {message}")]
    AuthExpired { status: u16, message: String },

    #[error("org API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A bounded call outlived its deadline. Inside a cascade this is
    /// identical to a strategy failure; elsewhere it degrades the
    /// category like any other non-auth error.
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

impl TransportError {
    pub fn is_auth(&self) -> bool {
        matches!(self, TransportError::AuthExpired { .. })
    }
}

/// Errors surfaced by `run_scan`. Carries a trace id so the caller can
/// correlate logs and, for auth failures, prompt re-authentication.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("authentication expired (trace {trace_id})")]
    AuthenticationExpired { trace_id: String },

    #[error("scan failed (trace {trace_id}): {message}")]
    ScanFailed { trace_id: String, message: String },
}

impl ScanError {
    pub fn trace_id(&self) -> &str {
        match self {
            ScanError::AuthenticationExpired { trace_id } => trace_id,
            ScanError::ScanFailed { trace_id, .. } => trace_id,
        }
    }
}
