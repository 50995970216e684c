//! Shared application state for the simulation API server.
//!
//! [`AppState`] holds the single session slot behind a [`Mutex`] together
//! with the configuration every `/start` needs. Handlers hold the lock for
//! the whole start or step, so no two requests ever touch the grid at the
//! same time.
//!
//! There is one slot per process: every browser tab talking to this server
//! drives the same simulation.

use tokio::sync::Mutex;
use viral_core::config::SimulationDefaults;
use viral_core::rules::RuleSettings;
use viral_core::session::SessionSlot;

/// Shared state for the Axum application.
///
/// Wrapped in [`std::sync::Arc`] and injected via Axum's `State` extractor.
#[derive(Debug)]
pub struct AppState {
    /// The one active simulation, if started.
    pub session: Mutex<SessionSlot>,
    /// Defaults and limits for `/start` bodies.
    pub defaults: SimulationDefaults,
    /// Transition rule policy applied to every new session.
    pub rules: RuleSettings,
}

impl AppState {
    /// Create application state with an empty session slot.
    pub fn new(defaults: SimulationDefaults, rules: RuleSettings) -> Self {
        Self {
            session: Mutex::new(SessionSlot::new()),
            defaults,
            rules,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SimulationDefaults::default(), RuleSettings::default())
    }
}
