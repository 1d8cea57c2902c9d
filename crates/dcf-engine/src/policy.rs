use serde::{Deserialize, Serialize};
use valuation_core::ValuationError;

/// Tunable constants of the valuation pipeline. Defaults reproduce the
/// standard model; the server can override a subset from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationPolicy {
    /// Risk-free rate used when no yield quote is available.
    pub default_risk_free_rate: f64,
    /// Base equity risk premium before the size tilt.
    pub base_erp: f64,
    /// ERP adjustment for companies at or above `mega_cap`.
    pub mega_cap_erp_adjustment: f64,
    /// ERP adjustment for companies at or below `small_cap`.
    pub small_cap_erp_adjustment: f64,
    pub mega_cap: f64,
    pub small_cap: f64,

    /// Weight of the regression beta when a provider beta is also known.
    pub hist_beta_weight: f64,
    /// Minimum date-aligned weekly closes for a regression beta.
    pub min_beta_observations: usize,

    pub default_tax_rate: f64,
    /// Spread over the risk-free rate when no debt data is usable.
    pub fallback_debt_spread: f64,

    /// Per-year decay of beta toward 1.0 along the WACC path.
    pub wacc_beta_decay: f64,
    /// Target debt weight multiplier for mega caps along the WACC path.
    pub mega_cap_leverage_factor: f64,

    /// FCFF growth assumed when history is unusable.
    pub default_fcff_growth: f64,
    /// Weight of FCFF CAGR when blending with revenue CAGR.
    pub fcff_growth_weight: f64,
    /// Total decay of the growth rate across the horizon.
    pub growth_decay: f64,
    /// Long-run nominal growth anchor of the terminal growth estimate.
    pub nominal_growth_anchor: f64,

    pub sens_wacc_step: f64,
    pub sens_growth_step: f64,
}

impl Default for ValuationPolicy {
    fn default() -> Self {
        Self {
            default_risk_free_rate: 0.04,
            base_erp: 0.0475,
            mega_cap_erp_adjustment: -0.005,
            small_cap_erp_adjustment: 0.01,
            mega_cap: 5e11,
            small_cap: 1e10,
            hist_beta_weight: 0.7,
            min_beta_observations: 26,
            default_tax_rate: 0.21,
            fallback_debt_spread: 0.015,
            wacc_beta_decay: 0.85,
            mega_cap_leverage_factor: 0.9,
            default_fcff_growth: 0.06,
            fcff_growth_weight: 0.7,
            growth_decay: 0.8,
            nominal_growth_anchor: 0.04,
            sens_wacc_step: 0.015,
            sens_growth_step: 0.005,
        }
    }
}

impl ValuationPolicy {
    /// Reject settings that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ValuationError> {
        let unit = [
            ("hist_beta_weight", self.hist_beta_weight),
            ("fcff_growth_weight", self.fcff_growth_weight),
            ("default_tax_rate", self.default_tax_rate),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValuationError::invalid_parameter(name, "must be within [0, 1]"));
            }
        }

        let decays = [
            ("wacc_beta_decay", self.wacc_beta_decay),
            ("growth_decay", self.growth_decay),
            ("mega_cap_leverage_factor", self.mega_cap_leverage_factor),
        ];
        for (name, value) in decays {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ValuationError::invalid_parameter(name, "must be within (0, 1]"));
            }
        }

        let non_negative = [
            ("base_erp", self.base_erp),
            ("sens_wacc_step", self.sens_wacc_step),
            ("sens_growth_step", self.sens_growth_step),
            ("fallback_debt_spread", self.fallback_debt_spread),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ValuationError::invalid_parameter(name, "must be a non-negative number"));
            }
        }

        if !(self.small_cap > 0.0 && self.mega_cap > self.small_cap) {
            return Err(ValuationError::invalid_parameter(
                "mega_cap",
                "must exceed small_cap, both positive",
            ));
        }
        if self.min_beta_observations < 3 {
            return Err(ValuationError::invalid_parameter(
                "min_beta_observations",
                "must be at least 3",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        assert!(ValuationPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let policy = ValuationPolicy {
            hist_beta_weight: 1.5,
            ..Default::default()
        };
        match policy.validate() {
            Err(ValuationError::InvalidParameter { name, .. }) => assert_eq!(name, "hist_beta_weight"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_inverted_size_thresholds() {
        let policy = ValuationPolicy {
            mega_cap: 1e9,
            small_cap: 1e10,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }
}
