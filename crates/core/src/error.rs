//! Error types for the StudyClaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context has
//! its own error variant, and transport errors carry a classification: a
//! failure is either recoverable by the model (bad arguments), worth retrying
//! (timeouts, rate limits), or terminal for the whole run (bad credentials).

use thiserror::Error;

/// The top-level error type for all StudyClaw operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Loop convergence ---
    #[error("Run did not converge: {reason}")]
    Convergence { reason: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether a retry with backoff can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Rate limited: {tool_name}, retry after {retry_after_secs}s")]
    RateLimited {
        tool_name: String,
        retry_after_secs: u64,
    },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Network error in {tool_name}: {reason}")]
    Network { tool_name: String, reason: String },

    #[error("Authentication failed for {tool_name}: {reason}")]
    AuthFailed { tool_name: String, reason: String },

    #[error("Upstream error from {tool_name}: {message} (status: {status_code})")]
    Upstream {
        tool_name: String,
        status_code: u16,
        message: String,
    },
}

impl ToolError {
    /// Validation-class errors: fed back to the model as a structured error
    /// turn so it can self-correct; they never abort the run.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidArguments(_))
    }

    /// Whether a retry with backoff can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Upstream { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Terminal transport failures (bad credentials, permanently rejected
    /// requests) abort the run immediately, without retry.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::AuthFailed { .. } => true,
            Self::Upstream { status_code, .. } => *status_code < 500,
            _ => false,
        }
    }
}
