//! Square lattice of agents and neighbourhood iteration.
//!
//! The grid is stored row-major in a flat `Vec`. All coordinate access goes
//! through [`Grid::get`] and [`Grid::neighbors`], which return only in-bounds
//! positions: there is no wraparound, so edge and corner cells simply have
//! fewer neighbours.

use serde::Deserialize;
use viral_types::CellState;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Neighbourhood
// ---------------------------------------------------------------------------

/// Offsets of the four orthogonal neighbours.
const VON_NEUMANN_OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Offsets of all eight surrounding cells.
const MOORE_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Offsets of the six neighbours on an axial-coordinate hex lattice.
const HEXAGONAL_OFFSETS: [(isize, isize); 6] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, 1), (1, -1)];

/// Which surrounding cells count as adjacent.
///
/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// Four orthogonal neighbours.
    #[default]
    VonNeumann,
    /// Eight neighbours including diagonals.
    Moore,
    /// Six neighbours of a hex lattice in axial coordinates.
    Hexagonal,
}

impl Neighborhood {
    /// Row/column offsets for this neighbourhood.
    pub const fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Self::VonNeumann => &VON_NEUMANN_OFFSETS,
            Self::Moore => &MOORE_OFFSETS,
            Self::Hexagonal => &HEXAGONAL_OFFSETS,
        }
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// One cell of the lattice together with its progression clock.
///
/// Progress is counted in whole steps. The hour-based dwell is converted
/// once, on entry, by [`RuleSettings::dwell_steps`].
///
/// [`RuleSettings::dwell_steps`]: crate::rules::RuleSettings::dwell_steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Agent {
    /// Current infection status.
    pub state: CellState,
    /// Steps spent in `state` so far.
    pub steps_in_state: u32,
    /// Steps this agent will spend in `state` before progressing.
    /// Only meaningful for `eclipse` and `infected`.
    pub dwell_steps: u32,
}

impl Agent {
    /// A susceptible agent.
    pub const fn healthy() -> Self {
        Self::entering(CellState::Healthy, 0)
    }

    /// An agent that has just entered `state` and will dwell there for
    /// `dwell_steps`.
    pub const fn entering(state: CellState, dwell_steps: u32) -> Self {
        Self {
            state,
            steps_in_state: 0,
            dwell_steps,
        }
    }

    /// The same agent one step later in its current state.
    #[must_use]
    pub const fn aged(self) -> Self {
        Self {
            steps_in_state: self.steps_in_state.saturating_add(1),
            ..self
        }
    }

    /// Whether the agent has spent at least its dwell in `state`.
    pub const fn dwell_elapsed(&self) -> bool {
        self.steps_in_state >= self.dwell_steps
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A `side x side` lattice of [`Agent`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    side: usize,
    cells: Vec<Agent>,
}

impl Grid {
    /// Allocate an all-healthy grid.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if `side` is zero or the cell
    /// count would overflow `usize`.
    pub fn new(side: usize) -> Result<Self, EngineError> {
        if side == 0 {
            return Err(EngineError::validation("grid side must be at least 1"));
        }
        let len = side
            .checked_mul(side)
            .ok_or_else(|| EngineError::validation("grid side is too large"))?;
        Ok(Self {
            side,
            cells: vec![Agent::healthy(); len],
        })
    }

    /// Side length of the grid.
    pub const fn side(&self) -> usize {
        self.side
    }

    /// Total number of cells (`side * side`).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always `false`: a grid has at least one cell.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Coordinates of the centre cell (rounded down for even sides).
    pub const fn center(&self) -> (usize, usize) {
        let mid = self.side / 2;
        (mid, mid)
    }

    /// `(row, col)` of the cell at row-major `index`, or `None` when out
    /// of bounds.
    pub fn position(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.cells.len() {
            return None;
        }
        Some((index.checked_div(self.side)?, index.checked_rem(self.side)?))
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.side || col >= self.side {
            return None;
        }
        row.checked_mul(self.side)?.checked_add(col)
    }

    /// The agent at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<&Agent> {
        self.index(row, col).and_then(|idx| self.cells.get(idx))
    }

    /// The state at `(row, col)`, or `None` when out of bounds.
    pub fn state(&self, row: usize, col: usize) -> Option<CellState> {
        self.get(row, col).map(|agent| agent.state)
    }

    /// Replace the agent at `(row, col)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] if the position is out of bounds.
    pub fn set(&mut self, row: usize, col: usize, agent: Agent) -> Result<(), EngineError> {
        let slot = self
            .index(row, col)
            .and_then(|idx| self.cells.get_mut(idx))
            .ok_or_else(|| {
                EngineError::Internal(format!("cell ({row}, {col}) is outside the grid"))
            })?;
        *slot = agent;
        Ok(())
    }

    /// In-bounds neighbours of `(row, col)` under `neighborhood`.
    pub fn neighbors(
        &self,
        row: usize,
        col: usize,
        neighborhood: Neighborhood,
    ) -> impl Iterator<Item = (usize, usize)> + '_ {
        neighborhood.offsets().iter().filter_map(move |&(dr, dc)| {
            let r = row.checked_add_signed(dr)?;
            let c = col.checked_add_signed(dc)?;
            (r < self.side && c < self.side).then_some((r, c))
        })
    }

    /// Agents of the neighbours of `(row, col)`.
    pub fn neighbor_agents(
        &self,
        row: usize,
        col: usize,
        neighborhood: Neighborhood,
    ) -> impl Iterator<Item = &Agent> + '_ {
        self.neighbors(row, col, neighborhood)
            .filter_map(move |(r, c)| self.get(r, c))
    }

    /// Row-major iteration over `(row, col, agent)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Agent)> + '_ {
        self.cells
            .chunks(self.side)
            .enumerate()
            .flat_map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(move |(col, agent)| (row, col, agent))
            })
    }

    /// The grid as nested rows of state strings, as sent to the client.
    pub fn state_rows(&self) -> Vec<Vec<CellState>> {
        self.cells
            .chunks(self.side)
            .map(|row| row.iter().map(|agent| agent.state).collect())
            .collect()
    }
}
