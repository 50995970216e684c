//! Dwell-time sampling for the timed infection phases.
//!
//! An agent entering `eclipse` or `infected` is assigned the number of
//! simulated hours it will stay there. With [`DurationModel::Fixed`] every
//! agent gets the configured mean. With [`DurationModel::Gamma`] the dwell is
//! drawn from a gamma distribution with the configured mean, which spreads
//! progression out the way real cells vary in replication speed.

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::Deserialize;

/// Shape used for eclipse dwell times when the YAML omits it.
const DEFAULT_ECLIPSE_SHAPE: f64 = 30.0;

/// Shape used for infected dwell times when the YAML omits it.
const DEFAULT_INFECTED_SHAPE: f64 = 100.0;

/// The timed phase a dwell is being sampled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Incubation before becoming infectious.
    Eclipse,
    /// Infectious period before possible death.
    Infected,
}

/// How dwell times are assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DurationModel {
    /// Every agent dwells exactly the configured mean.
    #[default]
    Fixed,
    /// Gamma-distributed dwell with the configured mean.
    ///
    /// Larger shapes concentrate samples around the mean.
    Gamma {
        /// Shape parameter for eclipse dwell times.
        #[serde(default = "default_eclipse_shape")]
        eclipse_shape: f64,
        /// Shape parameter for infected dwell times.
        #[serde(default = "default_infected_shape")]
        infected_shape: f64,
    },
}

impl DurationModel {
    /// Check that gamma shapes are usable.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if let Self::Gamma {
            eclipse_shape,
            infected_shape,
        } = *self
        {
            for (name, shape) in [
                ("eclipse_shape", eclipse_shape),
                ("infected_shape", infected_shape),
            ] {
                if !shape.is_finite() || shape <= 0.0 {
                    return Err(format!("durations.{name} must be a positive number"));
                }
            }
        }
        Ok(())
    }

    /// Sample the dwell for `phase` given its mean in hours.
    ///
    /// A non-positive mean yields zero. If the distribution cannot be
    /// built the mean is returned unchanged, so sampling never fails.
    pub fn sample<R: Rng + ?Sized>(&self, phase: Phase, mean_hours: f64, rng: &mut R) -> f64 {
        if mean_hours <= 0.0 {
            return 0.0;
        }
        match *self {
            Self::Fixed => mean_hours,
            Self::Gamma {
                eclipse_shape,
                infected_shape,
            } => {
                let shape = match phase {
                    Phase::Eclipse => eclipse_shape,
                    Phase::Infected => infected_shape,
                };
                Gamma::new(shape, mean_hours / shape)
                    .map_or(mean_hours, |dist| dist.sample(rng))
            }
        }
    }
}

const fn default_eclipse_shape() -> f64 {
    DEFAULT_ECLIPSE_SHAPE
}

const fn default_infected_shape() -> f64 {
    DEFAULT_INFECTED_SHAPE
}
