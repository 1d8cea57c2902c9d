//! Historical growth, the decaying growth path, terminal growth and the
//! explicit-period FCFF projection.

use serde::Serialize;
use tracing::debug;
use valuation_core::numeric::{cagr, clamp, finite, serialize_finite_seq};
use valuation_core::{CompanyProfile, FinancialStatementSet, StatementTable, ValuationError};

use crate::capital_structure::cash_like;
use crate::policy::ValuationPolicy;
use crate::statements::{labels, latest, recent_values, ttm};

pub const TERMINAL_GROWTH_BOUNDS: (f64, f64) = (0.02, 0.06);
pub const TERMINAL_GROWTH_OVERRIDE_BOUNDS: (f64, f64) = (0.01, 0.06);

const HISTORY_POINTS: usize = 5;

/// CAGR of annual free cash flow, clamped to [0%, 25%], or the policy default.
pub fn fcff_history_cagr(cashflow_annual: &StatementTable, policy: &ValuationPolicy) -> f64 {
    let history = recent_values(cashflow_annual, labels::FREE_CASH_FLOW, HISTORY_POINTS);
    history_cagr(&history)
        .map(|g| clamp(g, 0.0, 0.25))
        .unwrap_or(policy.default_fcff_growth)
}

/// CAGR of annual revenue, clamped to [-20%, 25%].
pub fn revenue_cagr(income_annual: &StatementTable) -> Option<f64> {
    let revenue = recent_values(income_annual, labels::TOTAL_REVENUE, HISTORY_POINTS);
    history_cagr(&revenue).map(|g| clamp(g, -0.2, 0.25))
}

fn history_cagr(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let recent = values[0];
    let oldest = values[values.len() - 1];
    cagr(recent, oldest, values.len() - 1)
}

/// `g_i = g_used * decay^(i/N)` for i in 1..=N.
pub fn growth_path(g_used: f64, years: usize, decay: f64) -> Vec<f64> {
    (1..=years)
        .map(|i| g_used * decay.powf(i as f64 / years as f64))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthEstimate {
    pub fcff_cagr_hist: f64,
    pub revenue_cagr: Option<f64>,
    pub g_used: f64,
    pub projection_growth_path: Vec<f64>,
}

pub fn estimate_growth(
    statements: &FinancialStatementSet,
    years: usize,
    policy: &ValuationPolicy,
) -> GrowthEstimate {
    let g_fcff = fcff_history_cagr(&statements.cashflow_annual, policy);
    let g_rev = revenue_cagr(&statements.income_annual);
    let g_used = match g_rev {
        Some(rev) => clamp(
            policy.fcff_growth_weight * g_fcff + (1.0 - policy.fcff_growth_weight) * rev,
            -0.05,
            0.20,
        ),
        None => g_fcff,
    };
    GrowthEstimate {
        fcff_cagr_hist: g_fcff,
        revenue_cagr: g_rev,
        g_used,
        projection_growth_path: growth_path(g_used, years, policy.growth_decay),
    }
}

/// Terminal growth anchored on nominal growth and the risk-free rate,
/// tempered by the company's own growth and operating margin.
pub fn auto_terminal_growth(
    risk_free_rate: f64,
    fcff_cagr_hist: f64,
    revenue_cagr: Option<f64>,
    operating_margin: Option<f64>,
    policy: &ValuationPolicy,
) -> f64 {
    let signal = match revenue_cagr {
        Some(rev) => fcff_cagr_hist.max(rev),
        None => fcff_cagr_hist,
    };
    let mut tg = 0.4 * policy.nominal_growth_anchor
        + 0.4 * clamp(risk_free_rate, 0.02, 0.05)
        + 0.2 * clamp(signal, 0.0, 0.08);

    match operating_margin.and_then(finite) {
        Some(m) if m > 0.25 => tg += 0.003,
        Some(m) if m < 0.10 => tg -= 0.003,
        _ => {}
    }
    clamp(tg, TERMINAL_GROWTH_BOUNDS.0, TERMINAL_GROWTH_BOUNDS.1)
}

/// Clamp a caller-supplied terminal growth into its domain.
pub fn terminal_growth_override(value: f64) -> Result<f64, ValuationError> {
    if !value.is_finite() {
        return Err(ValuationError::invalid_parameter(
            "terminal_growth",
            "must be a finite number",
        ));
    }
    Ok(clamp(
        value,
        TERMINAL_GROWTH_OVERRIDE_BOUNDS.0,
        TERMINAL_GROWTH_OVERRIDE_BOUNDS.1,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    Roic,
    Naive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FcffProjection {
    #[serde(serialize_with = "serialize_finite_seq")]
    pub values: Vec<f64>,
    pub growth_rates: Vec<f64>,
    pub mode: ProjectionMode,
    pub roic: Option<f64>,
    pub invested_capital: Option<f64>,
    pub nopat_ttm: Option<f64>,
}

/// Compound the base FCFF along the growth path.
pub fn naive_path(base: f64, growth_rates: &[f64]) -> Vec<f64> {
    growth_rates
        .iter()
        .scan(base, |level, g| {
            *level *= 1.0 + g;
            Some(*level)
        })
        .collect()
}

/// Invested capital from the latest quarterly balance sheet, floored at 1.
pub fn invested_capital(profile: &CompanyProfile, statements: &FinancialStatementSet) -> Option<f64> {
    let bs = &statements.balance_quarterly;
    let total_assets = latest(bs, labels::TOTAL_ASSETS)?;
    let current_liabilities = latest(bs, labels::CURRENT_LIABILITIES).unwrap_or(0.0);
    let cash = cash_like(profile, bs);
    finite((total_assets - current_liabilities - cash).max(1.0))
}

/// Project FCFF through NOPAT growth and ROIC-implied reinvestment, falling
/// back to naive compounding when NOPAT or invested capital is unusable.
pub fn project_fcff(
    base_fcff: f64,
    tax_rate: f64,
    growth_rates: &[f64],
    profile: &CompanyProfile,
    statements: &FinancialStatementSet,
) -> FcffProjection {
    let ic = invested_capital(profile, statements);
    let nopat_ttm = ttm(&statements.income_quarterly, labels::EBIT).map(|ebit| ebit * (1.0 - tax_rate));

    let (ic_value, nopat0) = match (ic, nopat_ttm) {
        (Some(ic), Some(n)) if ic > 0.0 && n > 0.0 => (ic, n),
        _ => {
            debug!(ticker = %profile.ticker, "ROIC inputs unavailable; compounding base FCFF");
            return FcffProjection {
                values: naive_path(base_fcff, growth_rates),
                growth_rates: growth_rates.to_vec(),
                mode: ProjectionMode::Naive,
                roic: None,
                invested_capital: ic,
                nopat_ttm,
            };
        }
    };

    let roic = clamp(nopat0 / ic_value, 0.08, 0.40);
    let mut nopat = nopat0;
    let mut values: Vec<f64> = growth_rates
        .iter()
        .map(|g| {
            nopat *= 1.0 + g;
            let reinvestment = clamp((g / roic) * nopat, 0.0, 0.9 * nopat);
            nopat - reinvestment
        })
        .collect();

    if base_fcff > 0.0 {
        if let Some(first) = values.first().copied().filter(|f| *f > 0.0) {
            let scale = base_fcff / first;
            values.iter_mut().for_each(|v| *v *= scale);
        }
    }

    FcffProjection {
        values,
        growth_rates: growth_rates.to_vec(),
        mode: ProjectionMode::Roic,
        roic: Some(roic),
        invested_capital: Some(ic_value),
        nopat_ttm: Some(nopat0),
    }
}
