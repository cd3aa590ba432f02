//! Numeric error codes and categories shared by the link and the CLI.
//!
//! Codes are stable so that front ends can match on them without parsing
//! error messages.

pub const CONNECT_FAILED: i32 = -32101;
pub const CONNECTION_CLOSED: i32 = -32102;
pub const READ_FAILED: i32 = -32103;
pub const WRITE_FAILED: i32 = -32104;
pub const NOT_CONNECTED: i32 = -32105;
pub const ATTEMPTS_EXHAUSTED: i32 = -32106;
pub const INVALID_ADDRESS: i32 = -32107;
pub const INVALID_CONFIG: i32 = -32108;

pub const GENERIC_ERROR: i32 = -32100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidInput,
    Internal,
    External,
    Exhausted,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::Internal => "internal",
            ErrorCategory::External => "external",
            ErrorCategory::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport failures that a fresh connection attempt may cure.
pub fn is_retryable(code: i32) -> bool {
    matches!(
        code,
        CONNECT_FAILED | CONNECTION_CLOSED | READ_FAILED | WRITE_FAILED
    )
}

pub fn category_for_code(code: i32) -> ErrorCategory {
    match code {
        INVALID_ADDRESS | INVALID_CONFIG => ErrorCategory::InvalidInput,
        CONNECT_FAILED | CONNECTION_CLOSED | READ_FAILED | WRITE_FAILED | NOT_CONNECTED => {
            ErrorCategory::External
        }
        ATTEMPTS_EXHAUSTED => ErrorCategory::Exhausted,
        _ => ErrorCategory::Internal,
    }
}
