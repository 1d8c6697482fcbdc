// Record rejection error types and constants

use crate::error::ErrorCode;
use crate::model::Category;
use std::fmt;

/// Record rejection code constants
///
/// Error code range: 3001-3004
pub struct RecordErrorCodes {}

impl RecordErrorCodes {
    pub const NOT_INITIALIZED: i32 = 3001;
    pub const MALFORMED: i32 = 3002;
    pub const CATEGORY_DISABLED: i32 = 3003;
    pub const LOCK_POISONED: i32 = 3004;
}

/// Reasons `LogStore::try_record` refuses an entry
///
/// The public `record` path drops these silently; the typed variant exists so
/// tests and diagnostics can tell the cases apart.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Store has not been initialized yet
    NotInitialized,

    /// Entry is missing fields its category requires
    Malformed { category: Category, reason: String },

    /// Category is gated off by configuration
    CategoryDisabled { category: Category },

    /// Store state lock was poisoned
    LockPoisoned,
}

impl ErrorCode for RecordError {
    fn code(&self) -> i32 {
        match self {
            RecordError::NotInitialized => RecordErrorCodes::NOT_INITIALIZED,
            RecordError::Malformed { .. } => RecordErrorCodes::MALFORMED,
            RecordError::CategoryDisabled { .. } => RecordErrorCodes::CATEGORY_DISABLED,
            RecordError::LockPoisoned => RecordErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            RecordError::NotInitialized => "Log store not initialized".to_string(),
            RecordError::Malformed { category, reason } => {
                format!("Malformed {} entry: {}", category, reason)
            }
            RecordError::CategoryDisabled { category } => {
                format!("Category '{}' is disabled", category)
            }
            RecordError::LockPoisoned => "Log store state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for RecordError {}
