//! # pollbridge-core
//!
//! Session bridge between a short-polling HTTP client and a line-oriented
//! TCP chat server.
//!
//! - **Frames**: [`FrameDecoder`] reassembles newline-delimited JSON
//! - **Session**: [`Session`] holds the single connection and inbound queue
//! - **Receiver**: [`ReceiverLoop`] reads the socket into the queue
//! - **Watchdog**: [`IdleWatchdog`] closes idle sessions
//! - **Facade**: [`Bridge`] exposes `connect`, `send`, `poll`, `disconnect`

#![deny(unsafe_code)]

pub mod bridge;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod receiver;
pub mod session;
pub mod watchdog;

pub use bridge::{Bridge, BridgeConfig};
pub use errors::BridgeError;
pub use frame::FrameDecoder;
pub use ids::ConnectionId;
pub use receiver::ReceiverLoop;
pub use session::{DISCONNECTED_PAYLOAD, Session, SessionSnapshot, TeardownReason, status_message};
pub use watchdog::IdleWatchdog;
