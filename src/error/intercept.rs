// Interceptor installation error types and constants

use crate::error::ErrorCode;
use crate::model::Category;
use std::fmt;
use tracing::warn;

/// Installation/restoration error code constants
///
/// Error code range: 2001-2004
pub struct InterceptErrorCodes {}

impl InterceptErrorCodes {
    /// Host does not provide the capability being patched
    pub const CAPABILITY_MISSING: i32 = 2001;

    /// Installing the replacement failed
    pub const INSTALL_FAILED: i32 = 2002;

    /// Restoring the saved original failed
    pub const RESTORE_FAILED: i32 = 2003;

    /// Mutex/RwLock guarding a capability slot was poisoned
    pub const LOCK_POISONED: i32 = 2004;
}

/// Log an interceptor error with structured context
///
/// Installation failures are recovered locally (the interceptor stays
/// inactive), so this is the only trace they leave.
pub fn log_intercept_error(err: &InterceptError, category: Category) {
    warn!(
        error_code = err.code(),
        category = category.as_str(),
        "interceptor error: {}",
        err.message()
    );
}

/// Errors raised while patching or restoring a host capability
#[derive(Debug, Clone, PartialEq)]
pub enum InterceptError {
    /// The slot holds no capability (host lacks it)
    CapabilityMissing { capability: String },

    /// Replacement could not be installed
    InstallFailed { capability: String, reason: String },

    /// Original could not be put back
    RestoreFailed { capability: String, reason: String },

    /// Slot lock poisoned by a panicking writer
    LockPoisoned { capability: String },
}

impl ErrorCode for InterceptError {
    fn code(&self) -> i32 {
        match self {
            InterceptError::CapabilityMissing { .. } => InterceptErrorCodes::CAPABILITY_MISSING,
            InterceptError::InstallFailed { .. } => InterceptErrorCodes::INSTALL_FAILED,
            InterceptError::RestoreFailed { .. } => InterceptErrorCodes::RESTORE_FAILED,
            InterceptError::LockPoisoned { .. } => InterceptErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            InterceptError::CapabilityMissing { capability } => {
                format!("Host does not provide capability '{}'", capability)
            }
            InterceptError::InstallFailed { capability, reason } => {
                format!("Failed to install replacement for '{}': {}", capability, reason)
            }
            InterceptError::RestoreFailed { capability, reason } => {
                format!("Failed to restore original '{}': {}", capability, reason)
            }
            InterceptError::LockPoisoned { capability } => {
                format!("Lock poisoned on capability slot '{}'", capability)
            }
        }
    }
}

impl fmt::Display for InterceptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterceptError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for InterceptError {}
