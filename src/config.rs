use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    data::domain::Horizon,
    error::{ConfigError, TradeWhispersResult},
};

/// Selects which rows of the evaluated set are scored.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Score only rows whose prediction implies a trade. The metric label
    /// set shrinks to `{Decrease, Increase}`.
    Filtered,
    /// Score every evaluated row over the full three-way label set. Traded
    /// rows are still counted for reporting.
    Full,
}

/// Configuration shared by the evaluation engine and the account simulator.
///
/// Horizons are an explicit, ordered list; forward-return columns are named
/// from them, never discovered by scanning column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Forecast horizons, in minutes.
    pub horizons: Vec<Horizon>,

    /// Ground-truth threshold, in pips. Moves within `[-t, t]` label as
    /// `Stable` (boundary inclusive).
    pub threshold_pips: f64,

    pub mode: ScoringMode,

    /// Opening balance of every simulated per-horizon account.
    pub starting_balance: f64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            horizons: vec![Horizon(1), Horizon(2), Horizon(3)],
            threshold_pips: 0.0,
            mode: ScoringMode::Filtered,
            starting_balance: 1000.0,
        }
    }
}

impl EvalConfig {
    pub fn new(
        horizons: Vec<Horizon>,
        threshold_pips: f64,
        mode: ScoringMode,
    ) -> TradeWhispersResult<Self> {
        let cfg = Self {
            horizons,
            threshold_pips,
            mode,
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_starting_balance(mut self, balance: f64) -> TradeWhispersResult<Self> {
        self.starting_balance = balance;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(h) = self.horizons.iter().find(|h| h.minutes() == 0) {
            return Err(ConfigError::InvalidHorizon(h.to_string()));
        }
        if !self.threshold_pips.is_finite() || self.threshold_pips < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold_pips));
        }
        if !self.starting_balance.is_finite() || self.starting_balance <= 0.0 {
            return Err(ConfigError::InvalidBalance(self.starting_balance));
        }
        Ok(())
    }
}
