//! Error types for the privacy audit
//!
//! Two layers:
//! - [`HostError`] is what a host port returns when a browser surface is
//!   missing or refuses access. Collectors always absorb it.
//! - [`AuditError`] is the crate-level taxonomy with error codes and
//!   user-facing messages, used at the WASM boundary and by the lookup
//!   collaborators.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, AuditError>;

/// Failure reported by a host port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The runtime has no such capability
    #[error("{0} is not supported")]
    Unsupported(String),

    /// The capability exists but access was refused (security error, policy)
    #[error("access to {0} was blocked")]
    Blocked(String),

    /// Anything else thrown while talking to the runtime
    #[error("host call failed: {0}")]
    Failed(String),
}

impl HostError {
    /// Wrap a thrown JS value.
    pub fn from_js(context: &str, err: JsValue) -> Self {
        // SecurityError is what storage and cookie getters throw when the
        // user or an embedding policy disabled them.
        let name = js_sys::Reflect::get(&err, &JsValue::from_str("name"))
            .ok()
            .and_then(|v| v.as_string());
        match name.as_deref() {
            Some("SecurityError") | Some("NotAllowedError") => {
                HostError::Blocked(context.to_string())
            }
            _ => HostError::Failed(format!("{}: {:?}", context, err)),
        }
    }
}

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Collection degradations (1xx)
    CapabilityUnavailable = 100,
    PermissionQueryFailed = 101,
    DiscoveryTimedOut = 102,

    // Collaborator errors (2xx)
    UpstreamLookupFailed = 200,
    RateLimited = 201,

    // Configuration errors (8xx)
    ConfigError = 800,

    // Internal errors (9xx)
    SerializationError = 900,
}

/// Main error type for the audit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    // ===== Degradations (absorbed by collectors) =====
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Permission query failed for {name}: {reason}")]
    PermissionQueryFailed { name: String, reason: String },

    #[error("Address discovery window of {window_ms}ms elapsed")]
    DiscoveryTimedOut { window_ms: u32 },

    // ===== Collaborators =====
    #[error("Upstream lookup failed: {0}")]
    UpstreamLookupFailed(String),

    #[error("Rate limited: retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    // ===== Configuration =====
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ===== Internal =====
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuditError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            AuditError::CapabilityUnavailable(_) => ErrorCode::CapabilityUnavailable,
            AuditError::PermissionQueryFailed { .. } => ErrorCode::PermissionQueryFailed,
            AuditError::DiscoveryTimedOut { .. } => ErrorCode::DiscoveryTimedOut,
            AuditError::UpstreamLookupFailed(_) => ErrorCode::UpstreamLookupFailed,
            AuditError::RateLimited { .. } => ErrorCode::RateLimited,
            AuditError::InvalidConfig(_) => ErrorCode::ConfigError,
            AuditError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Whether this condition only lowers report confidence.
    ///
    /// Degradations are mapped to typed defaults inside the collectors and
    /// never abort an audit.
    pub fn is_degradation(&self) -> bool {
        matches!(
            self,
            AuditError::CapabilityUnavailable(_)
                | AuditError::PermissionQueryFailed { .. }
                | AuditError::DiscoveryTimedOut { .. }
        )
    }

    /// Whether the caller may simply try again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuditError::UpstreamLookupFailed(_) | AuditError::RateLimited { .. }
        )
    }

    /// Get a user-friendly message for display
    pub fn user_message(&self) -> String {
        match self {
            AuditError::CapabilityUnavailable(what) => {
                format!("Your browser does not expose {}.", what)
            }
            AuditError::PermissionQueryFailed { name, .. } => {
                format!("The state of the '{}' permission could not be read.", name)
            }
            AuditError::DiscoveryTimedOut { .. } => {
                "Local address discovery finished at its time limit.".into()
            }
            AuditError::UpstreamLookupFailed(_) => "Failed to lookup IP information".into(),
            AuditError::RateLimited { .. } => "Rate limited. Please try again later.".into(),
            AuditError::InvalidConfig(_) => {
                "Invalid audit options. Please check your settings.".into()
            }
            AuditError::Serialization(_) => {
                "An internal error occurred. Please report this bug.".into()
            }
        }
    }
}

impl From<HostError> for AuditError {
    fn from(err: HostError) -> Self {
        AuditError::CapabilityUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Serialization(err.to_string())
    }
}

impl From<AuditError> for JsValue {
    fn from(err: AuditError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Error information for JavaScript consumption
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
    pub user_message: String,
    pub is_degradation: bool,
    pub is_retryable: bool,
}

impl From<&AuditError> for ErrorInfo {
    fn from(err: &AuditError) -> Self {
        ErrorInfo {
            code: err.code() as u32,
            message: err.to_string(),
            user_message: err.user_message(),
            is_degradation: err.is_degradation(),
            is_retryable: err.is_retryable(),
        }
    }
}
