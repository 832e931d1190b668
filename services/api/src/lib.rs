//! Imagitale API Library Crate
//!
//! This library contains the web service around the session controller:
//! configuration, application state, the catalogue REST handlers, the
//! WebSocket bridge to the browser's speech devices, and routing. The `api`
//! binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
