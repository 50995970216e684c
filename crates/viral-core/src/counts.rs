//! Per-state tallies of a grid.
//!
//! Counts are recomputed from scratch on every call. The grid is at most
//! `max_layers²` cells, so a full pass is cheap and there is no running
//! total that could drift from the grid it describes.

use viral_types::Counts;

use crate::grid::Grid;

/// Tally every cell of `grid` by state.
pub fn count_states(grid: &Grid) -> Counts {
    grid.iter()
        .fold(Counts::default(), |mut counts, (_, _, agent)| {
            counts.record(agent.state);
            counts
        })
}
