//! Simulation sessions and the single-session slot.
//!
//! A [`SimulationSession`] owns one run: its parameters, grid, clock and
//! RNG. [`SessionSlot`] holds at most one session and is what the HTTP
//! layer guards with its lock. A new `start` only replaces the slot after
//! the new session validated, so a rejected `start` leaves the running
//! simulation untouched.
//!
//! # Time
//!
//! The client sends monotonically increasing timestamps as a cadence marker
//! rather than a seek target. Each `step` applies the rules exactly once
//! and records whatever time the client reported. Times past `end_time` are
//! accepted as-is: the client decides when to stop polling.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use tracing::{debug, info};
use viral_types::{CellState, SessionId, SessionStatus, SimulationParams, StateSnapshot};

use crate::config::SimulationDefaults;
use crate::counts::count_states;
use crate::durations::Phase;
use crate::error::EngineError;
use crate::grid::{Agent, Grid};
use crate::rules::{self, RuleSettings};

/// Check client-supplied parameters against the server limits.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] naming the first bad field.
pub fn validate_params(
    params: &SimulationParams,
    defaults: &SimulationDefaults,
) -> Result<(), EngineError> {
    if params.layers == 0 {
        return Err(EngineError::validation("layers must be a positive integer"));
    }
    if params.layers > defaults.max_layers {
        return Err(EngineError::validation(format!(
            "layers must be at most {}",
            defaults.max_layers
        )));
    }
    if !(0.0..=1.0).contains(&params.probi) {
        return Err(EngineError::validation("probi must be within [0, 1]"));
    }
    if !(0.0..=1.0).contains(&params.fusion_prob) {
        return Err(EngineError::validation("fusion_prob must be within [0, 1]"));
    }
    let cells = u64::from(params.layers).saturating_mul(u64::from(params.layers));
    if u64::from(defaults.initial_infected) > cells {
        return Err(EngineError::validation(format!(
            "initial_infected ({}) exceeds the {} cells of a {}x{} grid",
            defaults.initial_infected, cells, params.layers, params.layers
        )));
    }
    if let Some(end_time) = params.end_time
        && (!end_time.is_finite() || end_time <= 0.0)
    {
        return Err(EngineError::validation("end_time must be a positive number"));
    }
    Ok(())
}

/// Place the time-0 infected cells.
///
/// A single seed goes to the centre. Larger counts are drawn without
/// replacement from the session RNG, so a seeded start is reproducible.
fn seed_infected(
    grid: &mut Grid,
    count: u32,
    settings: &RuleSettings,
    rng: &mut StdRng,
) -> Result<(), EngineError> {
    let count = usize::try_from(count)
        .map_err(|e| EngineError::validation(format!("initial_infected out of range: {e}")))?;
    if count > grid.len() {
        return Err(EngineError::validation(
            "initial_infected exceeds the number of cells",
        ));
    }

    let positions: Vec<(usize, usize)> = if count == 1 {
        vec![grid.center()]
    } else {
        index::sample(rng, grid.len(), count)
            .iter()
            .filter_map(|idx| grid.position(idx))
            .collect()
    };

    for (row, col) in positions {
        let dwell = settings.sample_dwell_steps(Phase::Infected, rng);
        grid.set(row, col, Agent::entering(CellState::Infected, dwell))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SimulationSession
// ---------------------------------------------------------------------------

/// One running simulation.
#[derive(Debug)]
pub struct SimulationSession {
    id: SessionId,
    params: SimulationParams,
    settings: RuleSettings,
    grid: Grid,
    time: f64,
    end_time: f64,
    steps: u64,
    rng: StdRng,
    started_at: DateTime<Utc>,
}

impl SimulationSession {
    /// Validate `params` and build a fresh session at time 0.
    ///
    /// The RNG is seeded from `params.seed` when present, otherwise from
    /// OS entropy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if the parameters or rule
    /// settings are out of range.
    pub fn start(
        params: SimulationParams,
        defaults: &SimulationDefaults,
        settings: &RuleSettings,
    ) -> Result<Self, EngineError> {
        let rng = params
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self::start_with_rng(params, defaults, settings, rng)
    }

    /// Like [`start`](Self::start) but with a caller-supplied RNG.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if the parameters or rule
    /// settings are out of range.
    pub fn start_with_rng(
        params: SimulationParams,
        defaults: &SimulationDefaults,
        settings: &RuleSettings,
        mut rng: StdRng,
    ) -> Result<Self, EngineError> {
        validate_params(&params, defaults)?;
        settings.validate()?;

        let side = usize::try_from(params.layers)
            .map_err(|e| EngineError::validation(format!("layers out of range: {e}")))?;
        let mut grid = Grid::new(side)?;
        seed_infected(&mut grid, defaults.initial_infected, settings, &mut rng)?;

        let session = Self {
            id: SessionId::new(),
            params,
            settings: settings.clone(),
            grid,
            time: 0.0,
            end_time: params.end_time.unwrap_or(defaults.default_end_time),
            steps: 0,
            rng,
            started_at: Utc::now(),
        };

        info!(
            session_id = %session.id,
            layers = params.layers,
            probi = params.probi,
            fusion_prob = params.fusion_prob,
            end_time = session.end_time,
            initial_infected = defaults.initial_infected,
            seeded = params.seed.is_some(),
            "Simulation session started"
        );

        Ok(session)
    }

    /// Apply the rules once and record the client's timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if `requested_time` is not a
    /// finite number. The session is not advanced in that case.
    pub fn step(&mut self, requested_time: f64) -> Result<StateSnapshot, EngineError> {
        if !requested_time.is_finite() {
            return Err(EngineError::validation("time must be a finite number"));
        }

        self.grid = rules::advance(&self.grid, &self.params, &self.settings, &mut self.rng);
        self.steps = self.steps.saturating_add(1);
        self.time = requested_time;

        if self.time > self.end_time {
            debug!(
                session_id = %self.id,
                time = self.time,
                end_time = self.end_time,
                "Step past end_time"
            );
        }

        let snapshot = self.snapshot(false);
        debug!(
            session_id = %self.id,
            step = self.steps,
            time = self.time,
            healthy = snapshot.counts.h,
            eclipse = snapshot.counts.e,
            infected = snapshot.counts.i,
            fused = snapshot.counts.f,
            dead = snapshot.counts.d,
            "Step applied"
        );
        Ok(snapshot)
    }

    /// The timestamp one step after the current one.
    pub fn next_time(&self) -> f64 {
        self.time + self.settings.hours_per_step
    }

    /// Wire view of the session. `end_time` is included on request.
    pub fn snapshot(&self, include_end_time: bool) -> StateSnapshot {
        StateSnapshot {
            time: self.time,
            end_time: include_end_time.then_some(self.end_time),
            grid: self.grid.state_rows(),
            counts: count_states(&self.grid),
        }
    }

    /// Operator summary of the session.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id,
            started_at: self.started_at,
            params: self.params,
            time: self.time,
            end_time: self.end_time,
            steps: self.steps,
            counts: count_states(&self.grid),
        }
    }

    /// Session identifier.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Parameters the session was started with.
    pub const fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// The current grid.
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Simulated hours as last reported by the client.
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Display boundary in simulated hours.
    pub const fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Rule applications since start.
    pub const fn steps(&self) -> u64 {
        self.steps
    }
}

// ---------------------------------------------------------------------------
// SessionSlot
// ---------------------------------------------------------------------------

/// Holder for the one active session.
///
/// The server keeps a single slot for the whole process, so every client
/// shares the same simulation.
#[derive(Debug, Default)]
pub struct SessionSlot {
    active: Option<SimulationSession>,
}

impl SessionSlot {
    /// An empty slot.
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Install `session`, discarding any previous one, and return its
    /// time-0 snapshot.
    pub fn install(&mut self, session: SimulationSession) -> StateSnapshot {
        let snapshot = session.snapshot(true);
        if let Some(previous) = self.active.replace(session) {
            info!(
                previous_session = %previous.id(),
                steps = previous.steps(),
                "Previous session discarded"
            );
        }
        snapshot
    }

    /// Step the active session.
    ///
    /// A missing `requested_time` advances the clock by one step.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoActiveSession`] if nothing was started, or
    /// the session's own validation error.
    pub fn step(&mut self, requested_time: Option<f64>) -> Result<StateSnapshot, EngineError> {
        let session = self.active.as_mut().ok_or(EngineError::NoActiveSession)?;
        let time = requested_time.unwrap_or_else(|| session.next_time());
        session.step(time)
    }

    /// Summary of the active session, if any.
    pub fn status(&self) -> Option<SessionStatus> {
        self.active.as_ref().map(SimulationSession::status)
    }

    /// The active session, if any.
    pub const fn active(&self) -> Option<&SimulationSession> {
        self.active.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::durations::DurationModel;

    fn params(layers: u32, probi: f64, fusion_prob: f64) -> SimulationParams {
        SimulationParams {
            layers,
            probi,
            fusion_prob,
            end_time: None,
            seed: Some(42),
        }
    }

    fn start(p: SimulationParams) -> Result<SimulationSession, EngineError> {
        SimulationSession::start(p, &SimulationDefaults::default(), &RuleSettings::default())
    }

    fn cells(layers: u32) -> u64 {
        u64::from(layers) * u64::from(layers)
    }

    #[test]
    fn start_seeds_one_infected_cell_at_center() {
        let session = start(params(20, 0.2, 0.05)).unwrap();
        let snapshot = session.snapshot(true);
        assert_eq!(snapshot.time, 0.0);
        assert_eq!(snapshot.end_time, Some(24.0));
        assert_eq!(snapshot.grid.len(), 20);
        assert!(snapshot.grid.iter().all(|row| row.len() == 20));
        assert_eq!(snapshot.grid[10][10], CellState::Infected);
        assert_eq!(snapshot.counts.i, 1);
        assert_eq!(snapshot.counts.h, 399);
    }

    fn start_with(
        p: SimulationParams,
        defaults: &SimulationDefaults,
        settings: &RuleSettings,
    ) -> Result<SimulationSession, EngineError> {
        SimulationSession::start(p, defaults, settings)
    }

    #[test]
    fn several_initial_infected_cells_are_distinct() {
        let defaults = SimulationDefaults {
            initial_infected: 5,
            ..SimulationDefaults::default()
        };
        let session = start_with(params(10, 0.2, 0.05), &defaults, &RuleSettings::default()).unwrap();
        let snapshot = session.snapshot(true);
        assert_eq!(snapshot.counts.i, 5);
        assert_eq!(snapshot.counts.h, 95);
    }

    #[test]
    fn random_seeding_replays_with_same_seed() {
        let defaults = SimulationDefaults {
            initial_infected: 7,
            ..SimulationDefaults::default()
        };
        let initial = || {
            start_with(params(12, 0.2, 0.05), &defaults, &RuleSettings::default())
                .unwrap()
                .snapshot(true)
                .grid
        };
        assert_eq!(initial(), initial());
    }

    #[test]
    fn initial_infected_may_fill_the_grid() {
        let defaults = SimulationDefaults {
            initial_infected: 9,
            ..SimulationDefaults::default()
        };
        let session = start_with(params(3, 0.2, 0.05), &defaults, &RuleSettings::default()).unwrap();
        assert_eq!(session.snapshot(true).counts.i, 9);
    }

    #[test]
    fn initial_infected_above_cell_count_is_rejected() {
        let defaults = SimulationDefaults {
            initial_infected: 10,
            ..SimulationDefaults::default()
        };
        let err = start_with(params(3, 0.2, 0.05), &defaults, &RuleSettings::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref msg) if msg.contains("initial_infected")));
    }

    #[test]
    fn gamma_durations_run_end_to_end() {
        let settings = RuleSettings {
            durations: DurationModel::Gamma {
                eclipse_shape: 30.0,
                infected_shape: 100.0,
            },
            ..RuleSettings::default()
        };
        let run = || {
            let mut session =
                start_with(params(15, 0.5, 0.02), &SimulationDefaults::default(), &settings).unwrap();
            let mut last = session.snapshot(true);
            for t in 1..=48 {
                last = session.step(f64::from(t)).unwrap();
                assert_eq!(last.counts.total(), cells(15));
            }
            last
        };
        let first = run();
        // Every infected dwell is well under 48 steps, so the seed has died
        // and the infection has moved outward.
        assert!(first.counts.d >= 1);
        assert!(first.counts.h < 224);
        assert_eq!(first, run());
    }

    #[test]
    fn single_layer_grid_has_one_cell() {
        let session = start(params(1, 0.5, 0.5)).unwrap();
        let snapshot = session.snapshot(true);
        assert_eq!(snapshot.grid, vec![vec![CellState::Infected]]);
        assert_eq!(snapshot.counts.total(), 1);
    }

    #[test]
    fn counts_always_sum_to_cell_count() {
        let mut session = start(params(17, 0.6, 0.1)).unwrap();
        assert_eq!(session.snapshot(true).counts.total(), cells(17));
        for t in 1..=48 {
            let snapshot = session.step(f64::from(t)).unwrap();
            assert_eq!(snapshot.counts.total(), cells(17));
        }
    }

    #[test]
    fn step_records_requested_time_and_omits_end_time() {
        let mut session = start(params(5, 0.2, 0.05)).unwrap();
        let snapshot = session.step(1.0).unwrap();
        assert_eq!(snapshot.time, 1.0);
        assert!(snapshot.end_time.is_none());
        assert_eq!(session.steps(), 1);
    }

    #[test]
    fn steps_past_end_time_still_advance() {
        let mut session = start(SimulationParams {
            end_time: Some(2.0),
            ..params(5, 0.2, 0.05)
        })
        .unwrap();
        for t in 1..=5 {
            session.step(f64::from(t)).unwrap();
        }
        assert_eq!(session.steps(), 5);
        assert_eq!(session.time(), 5.0);
        assert_eq!(session.end_time(), 2.0);
    }

    #[test]
    fn non_finite_time_is_rejected_without_advancing() {
        let mut session = start(params(5, 0.2, 0.05)).unwrap();
        let err = session.step(f64::NAN).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(session.steps(), 0);
    }

    #[test]
    fn same_seed_same_history() {
        let run = || {
            let mut session = start(params(15, 0.3, 0.05)).unwrap();
            (1..=20)
                .map(|t| session.step(f64::from(t)).unwrap().grid)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn invalid_params_are_rejected() {
        let defaults = SimulationDefaults::default();
        for bad in [
            params(0, 0.2, 0.05),
            params(201, 0.2, 0.05),
            params(10, 1.5, 0.05),
            params(10, 0.2, -0.1),
            params(10, f64::NAN, 0.05),
            SimulationParams {
                end_time: Some(0.0),
                ..params(10, 0.2, 0.05)
            },
        ] {
            assert!(
                matches!(validate_params(&bad, &defaults), Err(EngineError::Validation(_))),
                "accepted {bad:?}"
            );
        }
        assert!(validate_params(&params(200, 0.0, 1.0), &defaults).is_ok());
    }

    #[test]
    fn empty_slot_reports_no_active_session() {
        let mut slot = SessionSlot::new();
        assert_eq!(slot.step(Some(1.0)).unwrap_err(), EngineError::NoActiveSession);
        assert!(slot.status().is_none());
    }

    #[test]
    fn slot_step_without_time_advances_clock() {
        let mut slot = SessionSlot::new();
        slot.install(start(params(5, 0.2, 0.05)).unwrap());
        let first = slot.step(None).unwrap();
        let second = slot.step(None).unwrap();
        assert_eq!(first.time, 1.0);
        assert_eq!(second.time, 2.0);
    }

    #[test]
    fn install_replaces_previous_session() {
        let mut slot = SessionSlot::new();
        slot.install(start(params(5, 0.2, 0.05)).unwrap());
        slot.step(Some(1.0)).unwrap();
        let snapshot = slot.install(start(params(8, 0.2, 0.05)).unwrap());
        assert_eq!(snapshot.grid.len(), 8);
        let status = slot.status().unwrap();
        assert_eq!(status.steps, 0);
        assert_eq!(status.params.layers, 8);
        assert_eq!(status.counts.total(), 64);
    }
}
