#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Telnet transport for telterm.
//!
//! [`TelnetParser`] strips and answers IAC negotiation, [`Reconnector`]
//! decides when to retry, and [`TelnetLink`] drives both over a socket.

mod connector;
mod error;
mod link;
pub mod protocol;
mod reconnect;
mod sleeper;

pub use connector::BoxedStream;
pub use connector::Connector;
pub use connector::LinkStream;
pub use connector::MockConnector;
pub use connector::TcpConnector;
pub use error::LinkError;
pub use link::LinkConfig;
pub use link::LinkEvent;
pub use link::TelnetLink;
pub use link::DEFAULT_PORT;
pub use link::READ_BUFFER_SIZE;
pub use protocol::ScanOutput;
pub use protocol::TelnetParser;
pub use reconnect::FailureKind;
pub use reconnect::LinkState;
pub use reconnect::ReconnectPolicy;
pub use reconnect::Reconnector;
pub use reconnect::DEFAULT_MAX_ATTEMPTS;
pub use reconnect::DEFAULT_RETRY_PAUSE;
pub use sleeper::MockSleeper;
pub use sleeper::PendingSleeper;
pub use sleeper::RealSleeper;
pub use sleeper::Sleeper;
