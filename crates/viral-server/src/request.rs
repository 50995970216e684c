//! Request bodies for `/start` and `/step`.
//!
//! The browser client posts raw `<input>` values, so every numeric field
//! may arrive as a JSON number or as a numeric string (`"20"`). Fields that
//! are absent, `null`, or not numeric fall back to the configured defaults.
//! Fields that *are* numeric but out of range are rejected rather than
//! silently replaced.

use serde::Deserialize;
use serde_json::Value;
use viral_core::config::SimulationDefaults;
use viral_types::SimulationParams;

use crate::error::ApiError;

/// Body of `POST /start`.
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    /// Grid side length.
    #[serde(default)]
    pub layers: Option<Value>,
    /// Infection probability.
    #[serde(default)]
    pub probi: Option<Value>,
    /// Fusion probability.
    #[serde(default)]
    pub fusion_prob: Option<Value>,
    /// Display boundary in simulated hours.
    #[serde(default)]
    pub end_time: Option<Value>,
    /// RNG seed for a reproducible run.
    #[serde(default)]
    pub seed: Option<Value>,
}

impl StartRequest {
    /// Coerce the raw body into [`SimulationParams`].
    ///
    /// Range checks on probabilities and `end_time` are left to the engine;
    /// only `layers` is checked here because it must fit an integer.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] if `layers` is numeric but not a
    /// positive integer.
    pub fn into_params(self, defaults: &SimulationDefaults) -> Result<SimulationParams, ApiError> {
        let layers = match lenient_number(self.layers.as_ref()) {
            Some(raw) => layers_from(raw)?,
            None => defaults.default_layers,
        };

        Ok(SimulationParams {
            layers,
            probi: lenient_number(self.probi.as_ref()).unwrap_or(defaults.default_probi),
            fusion_prob: lenient_number(self.fusion_prob.as_ref())
                .unwrap_or(defaults.default_fusion_prob),
            end_time: lenient_number(self.end_time.as_ref()),
            seed: lenient_seed(self.seed.as_ref()),
        })
    }
}

/// Body of `POST /step`.
#[derive(Debug, Default, Deserialize)]
pub struct StepRequest {
    /// Client timestamp in simulated hours.
    #[serde(default)]
    pub time: Option<Value>,
}

impl StepRequest {
    /// The requested time, or `None` if absent or not numeric.
    ///
    /// Non-finite values such as `"inf"` are passed through so the session
    /// rejects them instead of silently advancing.
    pub fn requested_time(&self) -> Option<f64> {
        parse_number(self.time.as_ref())
    }
}

/// Read a number from a JSON number or numeric string.
fn parse_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Like [`parse_number`], but non-finite values count as absent.
fn lenient_number(value: Option<&Value>) -> Option<f64> {
    parse_number(value).filter(|number| number.is_finite())
}

/// Read a non-negative integer seed from a JSON number or numeric string.
fn lenient_seed(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn layers_from(raw: f64) -> Result<u32, ApiError> {
    if !(1.0..=f64::from(u32::MAX)).contains(&raw) || raw.fract() != 0.0 {
        return Err(ApiError::BadRequest(format!(
            "layers must be a positive integer, got {raw}"
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let layers = raw as u32;
    Ok(layers)
}
