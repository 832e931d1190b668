//! WebSocket Session Management
//!
//! This module contains the logic for running voice learning sessions over
//! WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `bridge`: Exposes the browser's speech synthesis and recognition as session devices.
//! - `session`: Manages the WebSocket connection lifecycle, from handshake to teardown.

mod bridge;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
