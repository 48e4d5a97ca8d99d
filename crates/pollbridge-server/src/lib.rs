//! # pollbridge-server
//!
//! Axum HTTP adapter for the chat bridge.
//!
//! - Bridge endpoints: `/connect`, `/send`, `/poll`, `/disconnect`
//! - Health check and the static browser client bundle
//! - Idle watchdog lifetime tied to the server
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use server::{AppState, BridgeServer};
pub use shutdown::ShutdownCoordinator;
