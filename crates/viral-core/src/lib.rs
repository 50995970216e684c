//! Grid, transition rules, and session management for the viral ABM.
//!
//! This crate owns the simulation itself. It has no knowledge of HTTP: the
//! server crate wraps a [`SessionSlot`] in a lock and calls into it.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `viral-config.yaml` into
//!   strongly-typed structs.
//! - [`counts`] -- Per-state tallies of a grid.
//! - [`durations`] -- Dwell-time sampling (fixed or gamma-distributed).
//! - [`error`] -- [`EngineError`], the engine's single error type.
//! - [`grid`] -- The square lattice of agents and neighbourhood iteration.
//! - [`rules`] -- The per-step transition function.
//! - [`session`] -- Sessions and the single-session slot.
//!
//! [`EngineError`]: error::EngineError
//! [`SessionSlot`]: session::SessionSlot

pub mod config;
pub mod counts;
pub mod durations;
pub mod error;
pub mod grid;
pub mod rules;
pub mod session;

pub use error::EngineError;
