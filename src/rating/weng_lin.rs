//! Weng-Lin (OpenSkill) configuration wrapper
//!
//! Wraps the skillratings `WengLinConfig` with the prior distribution for
//! unrated players and the conservative ordinal constant.

use crate::config::RatingSettings;
use crate::error::{MatchmakingError, Result};
use crate::types::SkillRating;
use serde::{Deserialize, Serialize};
use skillratings::weng_lin::WengLinConfig;

/// Extended configuration for the Weng-Lin rating system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSystemConfig {
    /// Core Weng-Lin parameters
    pub weng_lin: WengLinConfig,
    /// Prior mean for unrated players
    pub initial_mean: f64,
    /// Prior spread for unrated players
    pub initial_spread: f64,
    /// Ordinal = mean - ordinal_k * spread
    pub ordinal_k: f64,
}

impl Default for RatingSystemConfig {
    fn default() -> Self {
        Self {
            weng_lin: WengLinConfig {
                beta: 200.0,
                uncertainty_tolerance: 0.0001,
            },
            initial_mean: 1500.0,
            initial_spread: 200.0,
            ordinal_k: 3.0,
        }
    }
}

impl RatingSystemConfig {
    /// Build from application settings
    pub fn from_settings(settings: &RatingSettings) -> Self {
        Self {
            weng_lin: WengLinConfig {
                beta: settings.beta,
                uncertainty_tolerance: settings.uncertainty_tolerance,
            },
            initial_mean: settings.initial_mean,
            initial_spread: settings.initial_spread,
            ordinal_k: settings.ordinal_k,
        }
    }

    /// Conservative configuration (slower rating changes)
    pub fn conservative() -> Self {
        Self {
            weng_lin: WengLinConfig {
                beta: 150.0,
                uncertainty_tolerance: 0.00001,
            },
            initial_mean: 1500.0,
            initial_spread: 150.0,
            ordinal_k: 3.0,
        }
    }

    /// The prior distribution assigned to players with no ledger history
    pub fn default_rating(&self) -> SkillRating {
        SkillRating {
            mean: self.initial_mean,
            spread: self.initial_spread,
        }
    }

    /// Conservative scalar ranking value for a distribution
    pub fn ordinal(&self, rating: &SkillRating) -> f64 {
        rating.ordinal(self.ordinal_k)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.weng_lin.beta <= 0.0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "Beta must be positive".to_string(),
            }
            .into());
        }

        if self.weng_lin.uncertainty_tolerance < 0.0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "Uncertainty tolerance must be non-negative".to_string(),
            }
            .into());
        }

        if self.initial_spread <= 0.0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "Initial spread must be positive".to_string(),
            }
            .into());
        }

        if self.ordinal_k < 0.0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "Ordinal constant must be non-negative".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
