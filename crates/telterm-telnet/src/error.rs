//! Link errors with structured context.
//!
//! Each variant carries a stable code, a category and a suggestion so a
//! front end can react without parsing the message.

use telterm_common::error_codes;
use telterm_common::error_codes::ErrorCategory;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Failed to read from connection: {0}")]
    Read(String),
    #[error("Failed to write to connection: {0}")]
    Write(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Gave up after {attempts} connect attempts: {last_error}")]
    AttemptsExhausted { attempts: u32, last_error: String },
    #[error("Connection closed by remote host")]
    ConnectionClosed,
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

impl LinkError {
    pub fn code(&self) -> i32 {
        match self {
            LinkError::Connect { .. } => error_codes::CONNECT_FAILED,
            LinkError::Read(_) => error_codes::READ_FAILED,
            LinkError::Write(_) => error_codes::WRITE_FAILED,
            LinkError::NotConnected => error_codes::NOT_CONNECTED,
            LinkError::AttemptsExhausted { .. } => error_codes::ATTEMPTS_EXHAUSTED,
            LinkError::ConnectionClosed => error_codes::CONNECTION_CLOSED,
            LinkError::InvalidAddress { .. } => error_codes::INVALID_ADDRESS,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn suggestion(&self) -> String {
        match self {
            LinkError::Connect { reason, .. } => {
                if reason.contains("refused") {
                    "The host refused the connection. Check the port number and that the server is running."
                        .to_string()
                } else if reason.contains("timed out") {
                    "The connection timed out. Check the host name and your network.".to_string()
                } else {
                    "Check the host name and port, or enable --retry to keep trying.".to_string()
                }
            }
            LinkError::Read(_) | LinkError::ConnectionClosed => {
                "The connection dropped. Enable --retry-dropped to reconnect automatically."
                    .to_string()
            }
            LinkError::Write(_) => {
                "Failed to send data. The connection may have closed.".to_string()
            }
            LinkError::NotConnected => "Wait for the link to connect before sending.".to_string(),
            LinkError::AttemptsExhausted { .. } => {
                "Raise --max-attempts (0 for unlimited) or --retry-pause and try again.".to_string()
            }
            LinkError::InvalidAddress { .. } => {
                "Use a non-empty host name and a port between 1 and 65535.".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        error_codes::is_retryable(self.code())
    }

    pub fn operation(&self) -> &'static str {
        match self {
            LinkError::Connect { .. } | LinkError::AttemptsExhausted { .. } => "connect",
            LinkError::Read(_) | LinkError::ConnectionClosed => "read",
            LinkError::Write(_) | LinkError::NotConnected => "write",
            LinkError::InvalidAddress { .. } => "resolve",
        }
    }
}
