//! Shared type definitions for the viral ABM simulation.
//!
//! This crate is the single source of truth for every type that crosses
//! the HTTP boundary. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` so the browser client can type its `fetch` calls.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (session identifiers)
//! - [`enums`] -- The closed set of cell states
//! - [`structs`] -- Start parameters, counts, snapshots, session status

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::CellState;
pub use ids::SessionId;
pub use structs::{Counts, SessionStatus, SimulationParams, StateSnapshot};
