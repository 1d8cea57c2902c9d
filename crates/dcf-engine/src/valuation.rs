//! Discounting of the explicit FCFF path and the Gordon terminal value, and
//! the bridge from enterprise value to value per share.

use serde::{Deserialize, Serialize};
use valuation_core::numeric::{finite, serialize_finite, serialize_finite_seq};
use valuation_core::ValuationError;

/// Minimum spread kept between the terminal discount rate and terminal growth.
pub const TERMINAL_SPREAD_FLOOR: f64 = 0.001;

/// A single WACC for every year, or one WACC per forecast year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountRate {
    Constant(f64),
    Path(Vec<f64>),
}

impl DiscountRate {
    fn validate(&self, years: usize) -> Result<(), ValuationError> {
        let rates: &[f64] = match self {
            DiscountRate::Constant(r) => std::slice::from_ref(r),
            DiscountRate::Path(path) => {
                if path.len() != years {
                    return Err(ValuationError::invalid_parameter(
                        "wacc_path",
                        format!("has {} entries for {} forecast years", path.len(), years),
                    ));
                }
                path
            }
        };
        if rates.iter().any(|r| !r.is_finite() || *r <= -1.0) {
            return Err(ValuationError::invalid_parameter(
                "wacc",
                "must be a finite rate above -100%",
            ));
        }
        Ok(())
    }

    /// Rate applied to the terminal value.
    pub fn terminal_rate(&self) -> Option<f64> {
        match self {
            DiscountRate::Constant(r) => Some(*r),
            DiscountRate::Path(path) => path.last().copied(),
        }
    }

    pub fn discount_factors(&self, years: usize, midyear: bool) -> Vec<f64> {
        match self {
            DiscountRate::Constant(r) => (1..=years)
                .map(|t| (1.0 + r).powf(-exponent(t, midyear)))
                .collect(),
            DiscountRate::Path(path) => {
                let mut cumulative = 1.0;
                path.iter()
                    .enumerate()
                    .map(|(i, r)| {
                        if i > 0 {
                            cumulative /= 1.0 + path[i - 1];
                        }
                        cumulative * (1.0 + r).powf(if midyear { -0.5 } else { -1.0 })
                    })
                    .collect()
            }
        }
    }

    fn terminal_discount(&self, years: usize, midyear: bool) -> f64 {
        match self {
            DiscountRate::Constant(r) => (1.0 + r).powf(-exponent(years, midyear)),
            DiscountRate::Path(path) => path.iter().map(|r| 1.0 / (1.0 + r)).product(),
        }
    }
}

fn exponent(t: usize, midyear: bool) -> f64 {
    if midyear {
        t as f64 - 0.5
    } else {
        t as f64
    }
}

/// Cash, debt and share count used to move from EV to value per share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityBridge {
    pub cash: f64,
    pub debt: f64,
    pub shares_outstanding: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    #[serde(serialize_with = "serialize_finite")]
    pub enterprise_value: f64,
    #[serde(serialize_with = "serialize_finite")]
    pub equity_value: f64,
    pub intrinsic_value_per_share: Option<f64>,
    #[serde(serialize_with = "serialize_finite")]
    pub pv_of_explicit_fcff: f64,
    #[serde(serialize_with = "serialize_finite")]
    pub pv_of_terminal_value: f64,
    #[serde(serialize_with = "serialize_finite")]
    pub terminal_value_at_horizon: f64,
    #[serde(serialize_with = "serialize_finite_seq")]
    pub discount_factors: Vec<f64>,
    pub terminal_growth_used: f64,
    pub terminal_growth_adjusted: bool,
}

/// Value an FCFF path under either discount-rate mode.
pub fn value_firm(
    fcff: &[f64],
    rate: &DiscountRate,
    terminal_growth: f64,
    midyear: bool,
    bridge: &EquityBridge,
) -> Result<ValuationResult, ValuationError> {
    let last = match fcff {
        [] => return Err(ValuationError::InsufficientData("FCFF projection is empty".into())),
        [first, ..] if *first == 0.0 => {
            return Err(ValuationError::InsufficientData(
                "first projected FCFF is zero".into(),
            ))
        }
        [.., last] => *last,
    };
    if fcff.iter().any(|v| !v.is_finite()) {
        return Err(ValuationError::Calculation(
            "projected FCFF contains non-finite values".into(),
        ));
    }
    if !terminal_growth.is_finite() {
        return Err(ValuationError::invalid_parameter(
            "terminal_growth",
            "must be a finite number",
        ));
    }
    if !(bridge.cash.is_finite() && bridge.debt.is_finite()) {
        return Err(ValuationError::invalid_parameter("cash/debt", "must be finite"));
    }

    let years = fcff.len();
    rate.validate(years)?;
    let terminal_rate = rate
        .terminal_rate()
        .ok_or_else(|| ValuationError::invalid_parameter("wacc_path", "is empty"))?;

    let discount_factors = rate.discount_factors(years, midyear);
    let pv_of_explicit_fcff: f64 = fcff.iter().zip(&discount_factors).map(|(f, df)| f * df).sum();

    let (g, terminal_growth_adjusted) = if terminal_rate - terminal_growth <= TERMINAL_SPREAD_FLOOR {
        (terminal_rate - TERMINAL_SPREAD_FLOOR, true)
    } else {
        (terminal_growth, false)
    };
    let terminal_value_at_horizon = last * (1.0 + g) / (terminal_rate - g);
    let pv_of_terminal_value = terminal_value_at_horizon * rate.terminal_discount(years, midyear);

    let enterprise_value = pv_of_explicit_fcff + pv_of_terminal_value;
    let equity_value = enterprise_value + bridge.cash - bridge.debt;
    if finite(equity_value).is_none() {
        return Err(ValuationError::Calculation(
            "valuation produced a non-finite value".into(),
        ));
    }
    let intrinsic_value_per_share = bridge
        .shares_outstanding
        .filter(|s| *s > 0.0)
        .and_then(|s| finite(equity_value / s));

    Ok(ValuationResult {
        enterprise_value,
        equity_value,
        intrinsic_value_per_share,
        pv_of_explicit_fcff,
        pv_of_terminal_value,
        terminal_value_at_horizon,
        discount_factors,
        terminal_growth_used: g,
        terminal_growth_adjusted,
    })
}

/// Constant-WACC DCF.
pub fn dcf_valuation(
    fcff: &[f64],
    wacc: f64,
    terminal_growth: f64,
    midyear: bool,
    cash: f64,
    debt: f64,
    shares_outstanding: Option<f64>,
) -> Result<ValuationResult, ValuationError> {
    value_firm(
        fcff,
        &DiscountRate::Constant(wacc),
        terminal_growth,
        midyear,
        &EquityBridge {
            cash,
            debt,
            shares_outstanding,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const FCFF: [f64; 3] = [100.0, 110.0, 121.0];

    #[test]
    fn test_worked_example() {
        let r = dcf_valuation(&FCFF, 0.10, 0.03, false, 0.0, 0.0, Some(100.0)).unwrap();
        for (f, df) in FCFF.iter().zip(&r.discount_factors) {
            assert!((f * df - 90.909_090_9).abs() < 1e-6);
        }
        assert!((r.terminal_value_at_horizon - 1780.428_571).abs() < 1e-3);
        assert!((r.pv_of_terminal_value - 1337.662_338).abs() < 1e-3);
        assert!((r.enterprise_value - 1610.389_610).abs() < 1e-3);
        assert!((r.intrinsic_value_per_share.unwrap() - 16.103_896).abs() < 1e-5);
        assert!(!r.terminal_growth_adjusted);
    }

    #[test]
    fn test_first_discount_factor() {
        let mid = dcf_valuation(&FCFF, 0.10, 0.03, true, 0.0, 0.0, None).unwrap();
        assert!((mid.discount_factors[0] - 1.1f64.powf(-0.5)).abs() < 1e-12);
        let end = dcf_valuation(&FCFF, 0.10, 0.03, false, 0.0, 0.0, None).unwrap();
        assert!((end.discount_factors[0] - 1.0 / 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_ev_monotonic_in_wacc_and_growth() {
        let ev = |w: f64, g: f64| {
            dcf_valuation(&FCFF, w, g, true, 0.0, 0.0, None)
                .unwrap()
                .enterprise_value
        };
        let waccs = [0.12, 0.10, 0.08, 0.06];
        assert!(waccs.windows(2).all(|w| ev(w[1], 0.02) > ev(w[0], 0.02)));
        let growths = [0.0, 0.01, 0.02, 0.03];
        assert!(growths.windows(2).all(|g| ev(0.09, g[1]) > ev(0.09, g[0])));
    }

    #[test]
    fn test_growth_guard_keeps_output_finite() {
        for g in [0.0999, 0.1, 0.1000001, 0.25] {
            let r = dcf_valuation(&FCFF, 0.10, g, true, 5.0, 1.0, Some(10.0)).unwrap();
            assert!(r.terminal_growth_adjusted);
            assert!((r.terminal_growth_used - 0.099).abs() < 1e-12);
            assert!(r.enterprise_value.is_finite());
            assert!(r.intrinsic_value_per_share.unwrap().is_finite());
        }
    }

    #[test]
    fn test_equity_bridge_and_share_count() {
        let r = dcf_valuation(&FCFF, 0.10, 0.03, false, 50.0, 20.0, Some(0.0)).unwrap();
        assert!((r.equity_value - (r.enterprise_value + 30.0)).abs() < 1e-9);
        assert!(r.intrinsic_value_per_share.is_none());
        let r = dcf_valuation(&FCFF, 0.10, 0.03, false, 0.0, 0.0, Some(-5.0)).unwrap();
        assert!(r.intrinsic_value_per_share.is_none());
    }

    #[test]
    fn test_failure_modes() {
        assert!(matches!(
            dcf_valuation(&[], 0.1, 0.03, true, 0.0, 0.0, None),
            Err(ValuationError::InsufficientData(_))
        ));
        assert!(matches!(
            dcf_valuation(&[0.0, 10.0], 0.1, 0.03, true, 0.0, 0.0, None),
            Err(ValuationError::InsufficientData(_))
        ));
        assert!(matches!(
            dcf_valuation(&FCFF, f64::NAN, 0.03, true, 0.0, 0.0, None),
            Err(ValuationError::InvalidParameter { .. })
        ));
        assert!(matches!(
            dcf_valuation(&FCFF, 0.1, f64::INFINITY, true, 0.0, 0.0, None),
            Err(ValuationError::InvalidParameter { .. })
        ));
        assert!(matches!(
            dcf_valuation(&[100.0, f64::INFINITY], 0.1, 0.03, true, 0.0, 0.0, None),
            Err(ValuationError::Calculation(_))
        ));
        assert!(matches!(
            dcf_valuation(&[100.0, f64::NAN, 120.0], 0.1, 0.03, false, 0.0, 0.0, None),
            Err(ValuationError::Calculation(_))
        ));
        let bridge = EquityBridge::default();
        assert!(matches!(
            value_firm(&FCFF, &DiscountRate::Path(vec![0.1, 0.1]), 0.03, true, &bridge),
            Err(ValuationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_flat_path_matches_constant_at_year_end() {
        let bridge = EquityBridge {
            cash: 10.0,
            debt: 5.0,
            shares_outstanding: Some(10.0),
        };
        let constant = value_firm(&FCFF, &DiscountRate::Constant(0.09), 0.025, false, &bridge).unwrap();
        let path = value_firm(&FCFF, &DiscountRate::Path(vec![0.09; 3]), 0.025, false, &bridge).unwrap();
        assert!((constant.enterprise_value - path.enterprise_value).abs() < 1e-9);
        for (a, b) in constant.discount_factors.iter().zip(&path.discount_factors) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_path_discount_factors() {
        let rate = DiscountRate::Path(vec![0.10, 0.08]);
        let dfs = rate.discount_factors(2, true);
        assert!((dfs[0] - 1.1f64.powf(-0.5)).abs() < 1e-12);
        assert!((dfs[1] - (1.0 / 1.1) * 1.08f64.powf(-0.5)).abs() < 1e-12);

        let r = value_firm(&[100.0, 100.0], &rate, 0.02, true, &EquityBridge::default()).unwrap();
        let tv = 100.0 * 1.02 / 0.06;
        assert!((r.terminal_value_at_horizon - tv).abs() < 1e-9);
        assert!((r.pv_of_terminal_value - tv / (1.1 * 1.08)).abs() < 1e-9);
    }
}
