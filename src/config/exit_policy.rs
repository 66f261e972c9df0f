use super::traits::ConfigSection;
use crate::error::TradepulseError;
use log::warn;
use serde::{Deserialize, Serialize};

/// One tier of the tiered early-exit heuristic: within the first `max_bars`
/// bars after entry, an adverse excursion of `adverse_excursion_pct` or worse
/// closes the trade before the main stop-loss would.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyExitThreshold {
    pub max_bars: usize,
    pub adverse_excursion_pct: f64, // e.g., 0.01 = 1% adverse move
    pub label: String,
}

/// Barrier parameters for the exit simulation. All percentages are fractions
/// (0.02 = 2%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitPolicy {
    pub stop_loss_pct: f64,
    pub trailing_activation_pct: f64,
    pub trailing_distance_pct: f64,
    pub max_holding_bars: usize,
    /// Sorted by ascending max_bars; tuned empirically, never hardcoded
    pub early_exit_thresholds: Vec<EarlyExitThreshold>,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.02,
            trailing_activation_pct: 0.015,
            trailing_distance_pct: 0.005,
            max_holding_bars: 10,
            early_exit_thresholds: vec![EarlyExitThreshold {
                max_bars: 4,
                adverse_excursion_pct: 0.01,
                label: "immediate".to_string(),
            }],
        }
    }
}

impl ConfigSection for ExitPolicy {
    fn section_name() -> &'static str {
        "exit_policy"
    }

    fn validate(&self) -> Result<(), TradepulseError> {
        if self.stop_loss_pct <= 0.0 {
            return Err(TradepulseError::Validation(
                "stop_loss_pct must be > 0".to_string(),
            ));
        }
        if self.trailing_activation_pct <= 0.0 {
            return Err(TradepulseError::Validation(
                "trailing_activation_pct must be > 0".to_string(),
            ));
        }
        if self.trailing_distance_pct <= 0.0 {
            return Err(TradepulseError::Validation(
                "trailing_distance_pct must be > 0".to_string(),
            ));
        }
        if self.max_holding_bars < 1 {
            return Err(TradepulseError::Validation(
                "max_holding_bars must be >= 1".to_string(),
            ));
        }

        for (idx, tier) in self.early_exit_thresholds.iter().enumerate() {
            if tier.adverse_excursion_pct <= 0.0 {
                return Err(TradepulseError::Validation(format!(
                    "early exit tier '{}': adverse_excursion_pct must be > 0",
                    tier.label
                )));
            }
            if tier.max_bars < 1 {
                return Err(TradepulseError::Validation(format!(
                    "early exit tier '{}': max_bars must be >= 1",
                    tier.label
                )));
            }

            if idx > 0 {
                let prev = &self.early_exit_thresholds[idx - 1];
                if tier.max_bars <= prev.max_bars {
                    return Err(TradepulseError::Validation(format!(
                        "early exit tiers must be strictly ordered by max_bars: '{}' ({}) after '{}' ({})",
                        tier.label, tier.max_bars, prev.label, prev.max_bars
                    )));
                }
                // Later tiers apply to trades that survived longer, so they
                // must allow at least as much adverse excursion
                if tier.adverse_excursion_pct < prev.adverse_excursion_pct {
                    return Err(TradepulseError::Validation(format!(
                        "early exit tier '{}' is stricter than earlier tier '{}'",
                        tier.label, prev.label
                    )));
                }
            }

            // The main stop fires first at equal or smaller excursion, which
            // makes this tier unreachable. Reported, not corrected.
            if tier.adverse_excursion_pct >= self.stop_loss_pct {
                warn!(
                    "early exit tier '{}' ({:.4}) is unreachable: stop_loss_pct is {:.4}",
                    tier.label, tier.adverse_excursion_pct, self.stop_loss_pct
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(max_bars: usize, pct: f64, label: &str) -> EarlyExitThreshold {
        EarlyExitThreshold {
            max_bars,
            adverse_excursion_pct: pct,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_default_policy_is_valid() {
        assert!(ExitPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_percentages() {
        let mut policy = ExitPolicy::default();
        policy.stop_loss_pct = 0.0;
        assert!(policy.validate().is_err());

        let mut policy = ExitPolicy::default();
        policy.trailing_distance_pct = -0.01;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_holding_period() {
        let mut policy = ExitPolicy::default();
        policy.max_holding_bars = 0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_rejects_unordered_tiers() {
        let mut policy = ExitPolicy::default();
        policy.early_exit_thresholds = vec![
            tier(4, 0.01, "immediate"),
            tier(4, 0.012, "short"), // duplicate max_bars
        ];
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_rejects_tightening_tiers() {
        let mut policy = ExitPolicy::default();
        policy.early_exit_thresholds = vec![
            tier(4, 0.012, "immediate"),
            tier(8, 0.01, "short"), // later tier is stricter
        ];
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_unreachable_tier_is_warning_not_error() {
        let mut policy = ExitPolicy::default();
        policy.early_exit_thresholds = vec![tier(4, 0.05, "immediate")]; // above the 2% stop
        assert!(policy.validate().is_ok());
    }
}
