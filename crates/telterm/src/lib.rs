#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Command-line front end for telterm: configuration, tracing setup and the
//! glue between a telnet link and a virtual screen.

pub mod app;
pub mod commands;
pub mod config;
pub mod render;
pub mod session;
pub mod telemetry;

pub use config::ClientConfig;
pub use config::ConfigError;
