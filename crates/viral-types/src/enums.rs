//! Enumeration types for the viral ABM.
//!
//! The cell-state strings are consumed verbatim by the browser client as CSS
//! class names, so their serialized spelling is part of the wire contract.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Cell state
// ---------------------------------------------------------------------------

/// Infection status of a single cell on the lattice.
///
/// States advance along `healthy -> eclipse -> infected -> dead`, with
/// `healthy` and `eclipse` cells also able to jump straight to `fused` when
/// an infected neighbour fuses with them. A cell never returns to an
/// earlier stage; `fused` and `dead` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum CellState {
    /// Uninfected and susceptible.
    Healthy,
    /// Infected but not yet producing virus (incubation).
    Eclipse,
    /// Producing virus; infectious to neighbours.
    Infected,
    /// Merged into a syncytium with an infected neighbour. Terminal.
    Fused,
    /// Killed by the infection. Terminal.
    Dead,
}

impl CellState {
    /// Every state, in progression order.
    pub const ALL: [Self; 5] = [
        Self::Healthy,
        Self::Eclipse,
        Self::Infected,
        Self::Fused,
        Self::Dead,
    ];

    /// The wire spelling of this state.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Eclipse => "eclipse",
            Self::Infected => "infected",
            Self::Fused => "fused",
            Self::Dead => "dead",
        }
    }

    /// Whether the state admits no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fused | Self::Dead)
    }

    /// Whether a cell in this state can expose a healthy neighbour.
    pub const fn is_infectious(self) -> bool {
        matches!(self, Self::Infected | Self::Fused)
    }

    /// Whether a neighbouring infected cell can fuse with a cell in this state.
    pub const fn is_fusible(self) -> bool {
        matches!(self, Self::Healthy | Self::Eclipse)
    }
}

impl core::fmt::Display for CellState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
