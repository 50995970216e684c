//! Transition rules: one simulated step of the infection model.
//!
//! [`advance`] is a pure function from the current grid to the next one.
//! Every decision reads the *input* grid only, so the order in which cells
//! are visited never lets a transition cascade within a single step. The
//! random source is injected, so a seeded RNG replays a run exactly.
//!
//! # Per-cell policy
//!
//! | From | Condition | To |
//! |------|-----------|----|
//! | `healthy`, `eclipse` | any infected neighbour's fusion draw `< fusion_prob` | `fused` |
//! | `healthy` | an `infected`/`fused` neighbour and draw `< probi` | `eclipse` |
//! | `eclipse` | dwell elapsed | `infected` |
//! | `infected` | dwell elapsed and draw `< mortality_prob` | `dead` |
//! | `fused`, `dead` | -- | unchanged |
//!
//! Dwell times are counted in whole steps, converted from hours once when
//! an agent enters a timed state.
//!
//! Fusion takes precedence over every other transition in the same step.
//! An infected cell whose mortality draw fails stays infected and is
//! re-rolled on every later step.

use rand::Rng;
use serde::Deserialize;
use viral_types::{CellState, SimulationParams};

use crate::durations::{DurationModel, Phase};
use crate::error::EngineError;
use crate::grid::{Agent, Grid, Neighborhood};

/// Relative slack when converting an hour dwell into steps.
pub const STEP_TOLERANCE: f64 = 1e-9;

/// Policy knobs shared by every session.
///
/// These are server configuration rather than client parameters: the
/// browser only ever chooses `probi`, `fusion_prob` and `layers`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleSettings {
    /// Which cells count as adjacent.
    #[serde(default)]
    pub neighborhood: Neighborhood,

    /// Simulated hours covered by one `/step`.
    #[serde(default = "default_hours_per_step")]
    pub hours_per_step: f64,

    /// Mean hours spent in `eclipse` before becoming `infected`.
    #[serde(default = "default_eclipse_hours")]
    pub eclipse_hours: f64,

    /// Mean hours spent `infected` before the mortality roll.
    #[serde(default = "default_infected_hours")]
    pub infected_hours: f64,

    /// Probability that an infected cell dies once its dwell has elapsed.
    #[serde(default = "default_mortality_prob")]
    pub mortality_prob: f64,

    /// How dwell times are sampled.
    #[serde(default)]
    pub durations: DurationModel,
}

impl RuleSettings {
    /// Reject settings that would make the model ill-defined.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.hours_per_step.is_finite() || self.hours_per_step <= 0.0 {
            return Err(EngineError::validation(
                "rules.hours_per_step must be a positive number",
            ));
        }
        for (name, hours) in [
            ("eclipse_hours", self.eclipse_hours),
            ("infected_hours", self.infected_hours),
        ] {
            if !hours.is_finite() || hours < 0.0 {
                return Err(EngineError::validation(format!(
                    "rules.{name} must be a non-negative number"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.mortality_prob) {
            return Err(EngineError::validation(
                "rules.mortality_prob must be within [0, 1]",
            ));
        }
        self.durations
            .validate()
            .map_err(|reason| EngineError::validation(format!("rules.{reason}")))
    }

    /// Sample a dwell for an agent entering `phase`, in hours.
    pub fn sample_dwell<R: Rng + ?Sized>(&self, phase: Phase, rng: &mut R) -> f64 {
        let mean = match phase {
            Phase::Eclipse => self.eclipse_hours,
            Phase::Infected => self.infected_hours,
        };
        self.durations.sample(phase, mean, rng)
    }

    /// Sample a dwell for an agent entering `phase`, in whole steps.
    pub fn sample_dwell_steps<R: Rng + ?Sized>(&self, phase: Phase, rng: &mut R) -> u32 {
        self.dwell_steps(self.sample_dwell(phase, rng))
    }

    /// Number of whole steps needed to cover `hours`.
    ///
    /// A ratio within a relative [`STEP_TOLERANCE`] of an integer snaps to
    /// it, so 6 h at 0.1 h per step is 60 steps rather than 61.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn dwell_steps(&self, hours: f64) -> u32 {
        if hours <= 0.0 || hours.is_nan() {
            return 0;
        }
        let ratio = hours / self.hours_per_step;
        let nearest = ratio.round();
        let steps = if (ratio - nearest).abs() <= STEP_TOLERANCE * nearest.max(1.0) {
            nearest
        } else {
            ratio.ceil()
        };
        steps.min(f64::from(u32::MAX)) as u32
    }
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            neighborhood: Neighborhood::default(),
            hours_per_step: default_hours_per_step(),
            eclipse_hours: default_eclipse_hours(),
            infected_hours: default_infected_hours(),
            mortality_prob: default_mortality_prob(),
            durations: DurationModel::default(),
        }
    }
}

const fn default_hours_per_step() -> f64 {
    1.0
}

const fn default_eclipse_hours() -> f64 {
    6.0
}

const fn default_infected_hours() -> f64 {
    12.0
}

const fn default_mortality_prob() -> f64 {
    1.0
}

/// One uniform draw in `[0, 1)` compared against `probability`.
///
/// Probability 0 never succeeds and probability 1 always does.
fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.random::<f64>() < probability
}

/// Read-only view of the hour being advanced.
struct StepContext<'a> {
    grid: &'a Grid,
    params: &'a SimulationParams,
    settings: &'a RuleSettings,
}

impl StepContext<'_> {
    fn transition<R: Rng + ?Sized>(
        &self,
        row: usize,
        col: usize,
        agent: Agent,
        rng: &mut R,
    ) -> Agent {
        if agent.state.is_fusible() && self.fuses(row, col, rng) {
            return Agent::entering(CellState::Fused, 0);
        }

        match agent.state {
            CellState::Healthy => {
                if self.exposed(row, col) && chance(rng, self.params.probi) {
                    let dwell = self.settings.sample_dwell_steps(Phase::Eclipse, rng);
                    Agent::entering(CellState::Eclipse, dwell)
                } else {
                    agent
                }
            }
            CellState::Eclipse => {
                let aged = agent.aged();
                if aged.dwell_elapsed() {
                    let dwell = self.settings.sample_dwell_steps(Phase::Infected, rng);
                    Agent::entering(CellState::Infected, dwell)
                } else {
                    aged
                }
            }
            CellState::Infected => {
                let aged = agent.aged();
                if aged.dwell_elapsed() && chance(rng, self.settings.mortality_prob) {
                    Agent::entering(CellState::Dead, 0)
                } else {
                    aged
                }
            }
            CellState::Fused | CellState::Dead => agent,
        }
    }

    /// One fusion draw per infected neighbour; stops at the first success.
    fn fuses<R: Rng + ?Sized>(&self, row: usize, col: usize, rng: &mut R) -> bool {
        self.grid
            .neighbor_agents(row, col, self.settings.neighborhood)
            .filter(|n| n.state == CellState::Infected)
            .any(|_| chance(rng, self.params.fusion_prob))
    }

    fn exposed(&self, row: usize, col: usize) -> bool {
        self.grid
            .neighbor_agents(row, col, self.settings.neighborhood)
            .any(|n| n.state.is_infectious())
    }
}

/// Compute the grid one step after `current`.
///
/// Cells are visited row-major and each random draw comes from `rng` in
/// that order, so the same seed and inputs always give the same output.
/// Never fails: any internal inconsistency leaves the affected cell as it
/// was.
pub fn advance<R: Rng + ?Sized>(
    current: &Grid,
    params: &SimulationParams,
    settings: &RuleSettings,
    rng: &mut R,
) -> Grid {
    let ctx = StepContext {
        grid: current,
        params,
        settings,
    };
    let mut next = current.clone();
    for (row, col, agent) in current.iter() {
        let updated = ctx.transition(row, col, *agent, rng);
        if updated != *agent
            && let Err(e) = next.set(row, col, updated)
        {
            tracing::error!(row, col, error = %e, "dropping cell update");
        }
    }
    next
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn params(layers: u32, probi: f64, fusion_prob: f64) -> SimulationParams {
        SimulationParams {
            layers,
            probi,
            fusion_prob,
            end_time: None,
            seed: None,
        }
    }

    fn seeded_grid(side: usize, settings: &RuleSettings) -> Grid {
        let mut grid = Grid::new(side).unwrap();
        let (r, c) = grid.center();
        let dwell = settings.dwell_steps(settings.infected_hours);
        grid.set(r, c, Agent::entering(CellState::Infected, dwell))
            .unwrap();
        grid
    }

    fn count(grid: &Grid, state: CellState) -> usize {
        grid.iter().filter(|(_, _, a)| a.state == state).count()
    }

    #[test]
    fn zero_probabilities_leave_healthy_cells_alone() {
        let settings = RuleSettings::default();
        let p = params(20, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(11);
        let mut grid = seeded_grid(20, &settings);
        for _ in 0..40 {
            grid = advance(&grid, &p, &settings, &mut rng);
            assert_eq!(count(&grid, CellState::Healthy), 399);
            assert_eq!(count(&grid, CellState::Eclipse), 0);
            assert_eq!(count(&grid, CellState::Fused), 0);
        }
        // The seed cell ran out its dwell and died.
        assert_eq!(count(&grid, CellState::Dead), 1);
    }

    #[test]
    fn certain_infection_exposes_every_neighbor() {
        let settings = RuleSettings::default();
        let p = params(10, 1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(5);
        let grid = seeded_grid(10, &settings);
        let (r, c) = grid.center();
        let next = advance(&grid, &p, &settings, &mut rng);
        for (nr, nc) in grid.neighbors(r, c, settings.neighborhood) {
            assert_eq!(next.state(nr, nc), Some(CellState::Eclipse));
        }
        // Only direct neighbours move in one step.
        assert_eq!(count(&next, CellState::Eclipse), 4);
        assert_eq!(count(&next, CellState::Infected), 1);
    }

    #[test]
    fn fused_cells_also_expose_neighbors() {
        let settings = RuleSettings::default();
        let p = params(3, 1.0, 0.0);
        let mut grid = Grid::new(3).unwrap();
        grid.set(0, 0, Agent::entering(CellState::Fused, 0)).unwrap();
        let next = advance(&grid, &p, &settings, &mut StdRng::seed_from_u64(2));
        assert_eq!(next.state(0, 1), Some(CellState::Eclipse));
        assert_eq!(next.state(1, 0), Some(CellState::Eclipse));
        assert_eq!(next.state(1, 1), Some(CellState::Healthy));
        assert_eq!(next.state(0, 0), Some(CellState::Fused));
    }

    #[test]
    fn eclipse_progresses_after_dwell() {
        let settings = RuleSettings {
            eclipse_hours: 2.0,
            ..RuleSettings::default()
        };
        let p = params(1, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(9);
        let mut grid = Grid::new(1).unwrap();
        grid.set(0, 0, Agent::entering(CellState::Eclipse, 2)).unwrap();

        grid = advance(&grid, &p, &settings, &mut rng);
        assert_eq!(grid.state(0, 0), Some(CellState::Eclipse));
        grid = advance(&grid, &p, &settings, &mut rng);
        assert_eq!(grid.state(0, 0), Some(CellState::Infected));
        assert_eq!(grid.get(0, 0).unwrap().dwell_steps, 12);
    }

    #[test]
    fn fractional_steps_leave_eclipse_on_time() {
        let settings = RuleSettings {
            hours_per_step: 0.1,
            ..RuleSettings::default()
        };
        let p = params(1, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(6);
        let mut grid = Grid::new(1).unwrap();
        let dwell = settings.dwell_steps(settings.eclipse_hours);
        grid.set(0, 0, Agent::entering(CellState::Eclipse, dwell)).unwrap();

        let mut steps = 0_u32;
        while grid.state(0, 0) == Some(CellState::Eclipse) {
            grid = advance(&grid, &p, &settings, &mut rng);
            steps = steps.saturating_add(1);
            assert!(steps <= 100, "eclipse never ended");
        }
        assert_eq!(steps, 60);
    }

    #[test]
    fn dwell_hours_convert_to_whole_steps() {
        let tenth = RuleSettings {
            hours_per_step: 0.1,
            ..RuleSettings::default()
        };
        assert_eq!(tenth.dwell_steps(6.0), 60);
        assert_eq!(tenth.dwell_steps(12.0), 120);
        assert_eq!(tenth.dwell_steps(0.3), 3);

        let hourly = RuleSettings::default();
        assert_eq!(hourly.dwell_steps(6.0), 6);
        assert_eq!(hourly.dwell_steps(6.2), 7);
        assert_eq!(hourly.dwell_steps(0.25), 1);
        assert_eq!(hourly.dwell_steps(0.0), 0);
        assert_eq!(hourly.dwell_steps(-1.0), 0);
    }

    #[test]
    fn zero_mortality_keeps_infected_alive() {
        let settings = RuleSettings {
            mortality_prob: 0.0,
            ..RuleSettings::default()
        };
        let p = params(1, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(4);
        let mut grid = Grid::new(1).unwrap();
        grid.set(0, 0, Agent::entering(CellState::Infected, 1)).unwrap();
        for _ in 0..50 {
            grid = advance(&grid, &p, &settings, &mut rng);
        }
        assert_eq!(grid.state(0, 0), Some(CellState::Infected));
    }

    #[test]
    fn certain_fusion_beats_eclipse() {
        let settings = RuleSettings::default();
        let p = params(3, 1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(8);
        let grid = seeded_grid(3, &settings);
        let next = advance(&grid, &p, &settings, &mut rng);
        for (r, c) in grid.neighbors(1, 1, settings.neighborhood) {
            assert_eq!(next.state(r, c), Some(CellState::Fused));
        }
        // Diagonals are not von Neumann neighbours of the centre, and the
        // fused cells only count as exposure from the next step on.
        assert_eq!(next.state(0, 0), Some(CellState::Healthy));
        assert_eq!(next.state(1, 1), Some(CellState::Infected));
    }

    #[test]
    fn terminal_states_never_change() {
        let settings = RuleSettings::default();
        let p = params(2, 1.0, 1.0);
        let mut grid = Grid::new(2).unwrap();
        grid.set(0, 0, Agent::entering(CellState::Dead, 0)).unwrap();
        grid.set(0, 1, Agent::entering(CellState::Fused, 0)).unwrap();
        grid.set(1, 0, Agent::entering(CellState::Infected, 100)).unwrap();
        grid.set(1, 1, Agent::entering(CellState::Fused, 0)).unwrap();
        let next = advance(&grid, &p, &settings, &mut StdRng::seed_from_u64(1));
        assert_eq!(next.state(0, 0), Some(CellState::Dead));
        assert_eq!(next.state(0, 1), Some(CellState::Fused));
        assert_eq!(next.state(1, 1), Some(CellState::Fused));
    }

    #[test]
    fn states_never_regress() {
        let settings = RuleSettings::default();
        let p = params(15, 0.4, 0.1);
        let mut rng = StdRng::seed_from_u64(21);
        let mut grid = seeded_grid(15, &settings);
        for _ in 0..30 {
            let next = advance(&grid, &p, &settings, &mut rng);
            for (row, col, before) in grid.iter() {
                let after = next.state(row, col).unwrap();
                let allowed = match before.state {
                    CellState::Healthy => true,
                    CellState::Eclipse => after != CellState::Healthy,
                    CellState::Infected => {
                        matches!(after, CellState::Infected | CellState::Dead)
                    }
                    CellState::Fused | CellState::Dead => after == before.state,
                };
                assert!(allowed, "{} -> {after} at ({row}, {col})", before.state);
            }
            grid = next;
        }
    }

    #[test]
    fn same_seed_replays_identically() {
        let settings = RuleSettings {
            durations: DurationModel::Gamma {
                eclipse_shape: 30.0,
                infected_shape: 100.0,
            },
            ..RuleSettings::default()
        };
        let p = params(12, 0.3, 0.05);
        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut grid = seeded_grid(12, &settings);
            for _ in 0..25 {
                grid = advance(&grid, &p, &settings, &mut rng);
            }
            grid
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn moore_lattice_spreads_to_eight_cells() {
        let settings = RuleSettings {
            neighborhood: Neighborhood::Moore,
            ..RuleSettings::default()
        };
        let p = params(5, 1.0, 0.0);
        let grid = seeded_grid(5, &settings);
        let next = advance(&grid, &p, &settings, &mut StdRng::seed_from_u64(3));
        assert_eq!(count(&next, CellState::Eclipse), 8);
        assert_eq!(next.state(1, 1), Some(CellState::Eclipse));
        assert_eq!(next.state(0, 0), Some(CellState::Healthy));
    }

    #[test]
    fn hexagonal_lattice_spreads_to_six_cells() {
        let settings = RuleSettings {
            neighborhood: Neighborhood::Hexagonal,
            ..RuleSettings::default()
        };
        let p = params(5, 1.0, 0.0);
        let grid = seeded_grid(5, &settings);
        let next = advance(&grid, &p, &settings, &mut StdRng::seed_from_u64(3));
        assert_eq!(count(&next, CellState::Eclipse), 6);
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let bad_step = RuleSettings {
            hours_per_step: 0.0,
            ..RuleSettings::default()
        };
        assert!(bad_step.validate().is_err());

        let bad_mortality = RuleSettings {
            mortality_prob: -0.1,
            ..RuleSettings::default()
        };
        assert!(bad_mortality.validate().is_err());

        let bad_hours = RuleSettings {
            eclipse_hours: f64::NAN,
            ..RuleSettings::default()
        };
        assert!(bad_hours.validate().is_err());

        assert!(RuleSettings::default().validate().is_ok());
    }
}
