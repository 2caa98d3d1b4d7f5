//! Rating system configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Tunable knobs for the Weng-Lin rating system and leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSettings {
    /// Weng-Lin beta (skill-class width)
    pub beta: f64,
    /// Weng-Lin uncertainty tolerance
    pub uncertainty_tolerance: f64,
    /// Prior mean for unrated players
    pub initial_mean: f64,
    /// Prior spread for unrated players
    pub initial_spread: f64,
    /// Conservative ordinal constant: ordinal = mean - k * spread
    pub ordinal_k: f64,
    /// Default number of leaderboard entries returned
    pub leaderboard_limit: usize,
    /// Activity window for leaderboard inclusion, in days
    pub leaderboard_window_days: i64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            beta: 200.0,
            uncertainty_tolerance: 0.0001,
            initial_mean: 1500.0,
            initial_spread: 200.0,
            ordinal_k: 3.0,
            leaderboard_limit: 20,
            leaderboard_window_days: 30,
        }
    }
}

impl RatingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.beta <= 0.0 {
            return Err(anyhow!("Rating beta must be positive"));
        }
        if self.uncertainty_tolerance < 0.0 {
            return Err(anyhow!("Uncertainty tolerance must be non-negative"));
        }
        if self.initial_spread <= 0.0 {
            return Err(anyhow!("Initial spread must be positive"));
        }
        if self.ordinal_k < 0.0 {
            return Err(anyhow!("Ordinal constant must be non-negative"));
        }
        if self.leaderboard_window_days <= 0 {
            return Err(anyhow!("Leaderboard window must be positive"));
        }
        Ok(())
    }
}
