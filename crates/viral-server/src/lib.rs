//! HTTP API server for the viral agent-based model.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`POST /start`** to begin a session with client parameters
//! - **`POST /step`** to apply the transition rules once
//! - **`GET /status`** for a summary of the running session
//! - the browser client's static files, or a minimal HTML status page
//!
//! # Architecture
//!
//! One [`SessionSlot`] lives behind a mutex in [`AppState`]. `/start` builds
//! the new session outside the lock and swaps it in; `/step` holds the lock
//! for the single rule application, so steps are serialized.
//!
//! [`SessionSlot`]: viral_core::session::SessionSlot

pub mod error;
pub mod handlers;
pub mod request;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
