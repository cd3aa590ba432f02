#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod error_codes;
mod sync;

pub use error_codes::ErrorCategory;
pub use sync::mutex_lock_or_recover;
pub use sync::poison_recovery_count;
