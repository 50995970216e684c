//! Wire structs exchanged between the engine and the browser client.
//!
//! Covers the start parameters, the per-state tallies, the grid snapshot
//! returned by `/start` and `/step`, and the operator status view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::CellState;
use crate::ids::SessionId;

// ---------------------------------------------------------------------------
// Simulation parameters
// ---------------------------------------------------------------------------

/// Parameters chosen by the client when starting a simulation.
///
/// Immutable for the lifetime of a session; changing any of them requires a
/// new `/start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationParams {
    /// Side length of the square grid.
    pub layers: u32,
    /// Per-step probability that an exposed healthy cell enters eclipse.
    pub probi: f64,
    /// Per-step probability that an infected cell fuses with one neighbour.
    pub fusion_prob: f64,
    /// Display boundary for the client. `None` takes the server default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub end_time: Option<f64>,
    /// Seed for the session RNG. `None` seeds from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Number of cells in each state.
///
/// Field names are single letters because the client reads them as
/// `counts.h`, `counts.e` and so on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Counts {
    /// Healthy cells.
    pub h: u32,
    /// Eclipse cells.
    pub e: u32,
    /// Infected cells.
    pub i: u32,
    /// Fused cells.
    pub f: u32,
    /// Dead cells.
    pub d: u32,
}

impl Counts {
    /// Add one cell in `state` to the tally.
    pub const fn record(&mut self, state: CellState) {
        let slot = match state {
            CellState::Healthy => &mut self.h,
            CellState::Eclipse => &mut self.e,
            CellState::Infected => &mut self.i,
            CellState::Fused => &mut self.f,
            CellState::Dead => &mut self.d,
        };
        *slot = slot.saturating_add(1);
    }

    /// Count for a single state.
    pub const fn get(&self, state: CellState) -> u32 {
        match state {
            CellState::Healthy => self.h,
            CellState::Eclipse => self.e,
            CellState::Infected => self.i,
            CellState::Fused => self.f,
            CellState::Dead => self.d,
        }
    }

    /// Sum over every state. Equals `layers * layers` for a well-formed grid.
    pub fn total(&self) -> u64 {
        CellState::ALL
            .into_iter()
            .map(|state| u64::from(self.get(state)))
            .sum()
    }
}

// ---------------------------------------------------------------------------
// State snapshot
// ---------------------------------------------------------------------------

/// Grid, tallies and clock returned by `/start` and `/step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StateSnapshot {
    /// Simulated hours as last reported by the client.
    pub time: f64,
    /// Display boundary. Present on `/start` responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub end_time: Option<f64>,
    /// Row-major cell states.
    pub grid: Vec<Vec<CellState>>,
    /// Per-state tallies of `grid`.
    pub counts: Counts,
}

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

/// Summary of the active session for the `/status` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionStatus {
    /// Session identifier.
    pub session_id: SessionId,
    /// Wall-clock time the session was started.
    pub started_at: DateTime<Utc>,
    /// Parameters the session was started with.
    pub params: SimulationParams,
    /// Simulated hours as last reported by the client.
    pub time: f64,
    /// Display boundary in simulated hours.
    pub end_time: f64,
    /// Number of rule applications since start.
    #[ts(type = "number")]
    pub steps: u64,
    /// Current per-state tallies.
    pub counts: Counts,
}
