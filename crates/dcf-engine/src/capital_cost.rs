//! Cost of capital: risk-free rate, beta, equity risk premium, cost of equity,
//! after-tax cost of debt, WACC and the time-varying WACC path.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::debug;
use valuation_core::numeric::{clamp, finite, mean};
use valuation_core::{CompanyProfile, FinancialStatementSet, PricePoint, StatementTable};

use crate::chain::{resolve, Strategy};
use crate::policy::ValuationPolicy;
use crate::statements::{labels, latest, recent_values, ttm};

pub const BETA_BOUNDS: (f64, f64) = (0.2, 3.0);
pub const WACC_BOUNDS: (f64, f64) = (0.05, 0.15);
pub const COST_OF_EQUITY_BOUNDS: (f64, f64) = (0.05, 0.16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFreeSource {
    YieldQuote,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskFreeRate {
    pub rate: f64,
    pub source: RiskFreeSource,
}

/// 10-year yield from the most recent close of a percent-quoted index.
pub fn risk_free_rate(quotes: &[PricePoint], policy: &ValuationPolicy) -> RiskFreeRate {
    match quotes.iter().rev().find_map(|p| finite(p.close)) {
        Some(close) => RiskFreeRate {
            rate: clamp(close / 100.0, 0.02, 0.07),
            source: RiskFreeSource::YieldQuote,
        },
        None => RiskFreeRate {
            rate: policy.default_risk_free_rate,
            source: RiskFreeSource::Fallback,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetaRegression {
    pub beta: Option<f64>,
    /// Number of weekly log-return pairs used.
    pub observations: usize,
    pub period: &'static str,
    pub frequency: &'static str,
}

/// Cov/Var beta of weekly log returns, on closes aligned by calendar date.
pub fn regression_beta(
    security: &[PricePoint],
    benchmark: &[PricePoint],
    min_observations: usize,
) -> BetaRegression {
    let mut out = BetaRegression {
        beta: None,
        observations: 0,
        period: "2y",
        frequency: "1wk",
    };

    let usable = |p: &&PricePoint| p.close.is_finite() && p.close > 0.0;
    let market: HashMap<NaiveDate, f64> = benchmark
        .iter()
        .filter(usable)
        .map(|p| (p.timestamp.date_naive(), p.close))
        .collect();

    let mut aligned: Vec<(NaiveDate, f64, f64)> = security
        .iter()
        .filter(usable)
        .filter_map(|p| {
            let day = p.timestamp.date_naive();
            market.get(&day).map(|m| (day, p.close, *m))
        })
        .collect();
    aligned.sort_by_key(|(day, _, _)| *day);
    aligned.dedup_by_key(|(day, _, _)| *day);

    if aligned.len() < min_observations {
        return out;
    }

    let rs: Vec<f64> = aligned.windows(2).map(|w| (w[1].1 / w[0].1).ln()).collect();
    let rm: Vec<f64> = aligned.windows(2).map(|w| (w[1].2 / w[0].2).ln()).collect();
    out.observations = rs.len();

    let var_m = rm.as_slice().variance();
    if !(var_m > 0.0) {
        return out;
    }
    let cov = rs.as_slice().covariance(rm.as_slice());
    out.beta = finite(cov / var_m).map(|b| clamp(b, BETA_BOUNDS.0, BETA_BOUNDS.1));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BetaSource {
    Blend,
    Historical,
    Provider,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetaEstimate {
    pub beta: f64,
    pub source: BetaSource,
    pub regression: BetaRegression,
    pub provider_beta: Option<f64>,
}

/// Blend the regression beta with the provider's beta.
pub fn blend_beta(
    historical: Option<f64>,
    provider: Option<f64>,
    policy: &ValuationPolicy,
) -> (f64, BetaSource) {
    let provider = provider
        .and_then(finite)
        .map(|b| clamp(b, BETA_BOUNDS.0, BETA_BOUNDS.1));
    let (beta, source) = match (historical, provider) {
        (Some(h), Some(p)) => (
            policy.hist_beta_weight * h + (1.0 - policy.hist_beta_weight) * p,
            BetaSource::Blend,
        ),
        (Some(h), None) => (h, BetaSource::Historical),
        (None, Some(p)) => (p, BetaSource::Provider),
        (None, None) => (1.0, BetaSource::Fallback),
    };
    (clamp(beta, BETA_BOUNDS.0, BETA_BOUNDS.1), source)
}

pub fn estimate_beta(
    security: &[PricePoint],
    benchmark: &[PricePoint],
    provider_beta: Option<f64>,
    policy: &ValuationPolicy,
) -> BetaEstimate {
    let regression = regression_beta(security, benchmark, policy.min_beta_observations);
    let (beta, source) = blend_beta(regression.beta, provider_beta, policy);
    BetaEstimate {
        beta,
        source,
        regression,
        provider_beta,
    }
}

/// Base ERP with a size tilt for mega and small caps.
pub fn equity_risk_premium(market_cap: Option<f64>, policy: &ValuationPolicy) -> f64 {
    let mc = market_cap.unwrap_or(0.0);
    let tilt = if mc >= policy.mega_cap {
        policy.mega_cap_erp_adjustment
    } else if mc > 0.0 && mc <= policy.small_cap {
        policy.small_cap_erp_adjustment
    } else {
        0.0
    };
    clamp(policy.base_erp + tilt, 0.035, 0.07)
}

/// CAPM.
pub fn cost_of_equity(risk_free_rate: f64, beta: f64, erp: f64) -> f64 {
    clamp(
        risk_free_rate + beta * erp,
        COST_OF_EQUITY_BOUNDS.0,
        COST_OF_EQUITY_BOUNDS.1,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRateSource {
    Statements,
    CompanyAssumptions,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaxRate {
    pub rate: f64,
    pub source: TaxRateSource,
}

/// Income tax expense over pre-tax income from the latest annual statement.
pub fn effective_tax_rate(
    income_annual: &StatementTable,
    assumed: Option<f64>,
    policy: &ValuationPolicy,
) -> TaxRate {
    let tax = latest(income_annual, labels::INCOME_TAX_EXPENSE);
    let pre_tax = latest(income_annual, labels::INCOME_BEFORE_TAX);
    if let (Some(tax), Some(pre_tax)) = (tax, pre_tax) {
        if pre_tax != 0.0 {
            return TaxRate {
                rate: clamp(tax / pre_tax, 0.0, 0.35),
                source: TaxRateSource::Statements,
            };
        }
    }
    match assumed.and_then(finite) {
        Some(rate) => TaxRate {
            rate,
            source: TaxRateSource::CompanyAssumptions,
        },
        None => TaxRate {
            rate: policy.default_tax_rate,
            source: TaxRateSource::Default,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostOfDebtMethod {
    InterestOverAverageDebt,
    CoverageSpread,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostOfDebt {
    pub pretax: f64,
    pub after_tax: f64,
    pub method: CostOfDebtMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_ttm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_debt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
}

pub struct DebtInputs<'a> {
    pub statements: &'a FinancialStatementSet,
    pub risk_free_rate: f64,
    pub tax_rate: f64,
    pub fallback_spread: f64,
}

impl DebtInputs<'_> {
    fn finish(&self, pretax: f64, method: CostOfDebtMethod) -> CostOfDebt {
        CostOfDebt {
            pretax,
            after_tax: pretax * (1.0 - self.tax_rate),
            method,
            interest_ttm: None,
            average_debt: None,
            coverage: None,
        }
    }
}

/// Credit spread over the risk-free rate implied by interest coverage.
pub fn credit_spread(coverage: f64) -> f64 {
    const TABLE: [(f64, f64); 7] = [
        (12.0, 0.010),
        (8.0, 0.015),
        (6.0, 0.020),
        (4.0, 0.025),
        (3.0, 0.030),
        (2.0, 0.040),
        (1.0, 0.060),
    ];
    TABLE
        .iter()
        .find(|(floor, _)| coverage >= *floor)
        .map(|(_, spread)| *spread)
        .unwrap_or(0.080)
}

fn by_interest_over_debt(inputs: &DebtInputs<'_>) -> Option<CostOfDebt> {
    let interest = ttm(&inputs.statements.income_quarterly, labels::INTEREST_EXPENSE)?;
    let debts = recent_values(&inputs.statements.balance_quarterly, labels::TOTAL_DEBT, 4);
    let average_debt = mean(&debts).filter(|d| *d > 0.0)?;
    let pretax = clamp(interest.abs() / average_debt, 0.01, 0.12);
    Some(CostOfDebt {
        interest_ttm: Some(interest),
        average_debt: Some(average_debt),
        ..inputs.finish(pretax, CostOfDebtMethod::InterestOverAverageDebt)
    })
}

fn by_coverage_spread(inputs: &DebtInputs<'_>) -> Option<CostOfDebt> {
    let income = &inputs.statements.income_annual;
    let ebit = latest(income, labels::EBIT)?;
    let interest = latest(income, labels::INTEREST_EXPENSE).filter(|i| *i != 0.0)?;
    let coverage = (ebit / interest).abs();
    let pretax = clamp(inputs.risk_free_rate + credit_spread(coverage), 0.03, 0.16);
    Some(CostOfDebt {
        coverage: Some(coverage),
        ..inputs.finish(pretax, CostOfDebtMethod::CoverageSpread)
    })
}

fn by_fallback_spread(inputs: &DebtInputs<'_>) -> CostOfDebt {
    let pretax = clamp(inputs.risk_free_rate + inputs.fallback_spread, 0.03, 0.12);
    inputs.finish(pretax, CostOfDebtMethod::Fallback)
}

/// After-tax cost of debt from the first applicable route.
pub fn cost_of_debt(inputs: &DebtInputs<'_>) -> CostOfDebt {
    let chain = [
        by_interest_over_debt as Strategy<DebtInputs<'_>, CostOfDebt>,
        by_coverage_spread as Strategy<DebtInputs<'_>, CostOfDebt>,
    ];
    resolve(inputs, &chain, by_fallback_spread)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CapitalWeights {
    pub equity: f64,
    pub debt: f64,
}

/// Market-value weights, `None` when there is no capital to weight.
pub fn capital_weights(market_cap: Option<f64>, total_debt: Option<f64>) -> Option<CapitalWeights> {
    let e = market_cap.unwrap_or(0.0).max(0.0);
    let d = total_debt.unwrap_or(0.0).max(0.0);
    let v = e + d;
    if !(v > 0.0) {
        return None;
    }
    Some(CapitalWeights {
        equity: e / v,
        debt: d / v,
    })
}

/// Static WACC. Without weights the cost of equity is returned as is.
pub fn wacc(cost_of_equity: f64, cost_of_debt_after_tax: f64, weights: Option<CapitalWeights>) -> f64 {
    match weights {
        Some(w) => clamp(
            w.equity * cost_of_equity + w.debt * cost_of_debt_after_tax,
            WACC_BOUNDS.0,
            WACC_BOUNDS.1,
        ),
        None => cost_of_equity,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathWeights {
    pub we: f64,
    pub wd: f64,
    pub beta_t: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaccPath {
    pub wacc: Vec<f64>,
    pub cost_of_equity: Vec<f64>,
    pub weights: Vec<PathWeights>,
}

/// Per-year WACC with beta decaying toward 1 and mega caps deleveraging.
#[allow(clippy::too_many_arguments)]
pub fn wacc_path(
    beta: f64,
    risk_free_rate: f64,
    erp: f64,
    cost_of_debt_after_tax: f64,
    market_cap: Option<f64>,
    total_debt: Option<f64>,
    years: usize,
    policy: &ValuationPolicy,
) -> WaccPath {
    let e = market_cap.unwrap_or(0.0).max(0.0);
    let d = total_debt.unwrap_or(0.0).max(0.0);
    let v0 = if e + d > 0.0 { e + d } else { 1.0 };
    let wd0 = d / v0;
    let factor = if e >= policy.mega_cap {
        policy.mega_cap_leverage_factor
    } else {
        1.0
    };
    let wd_target = clamp(wd0 * factor, 0.0, 0.95);

    let mut path = WaccPath {
        wacc: Vec::with_capacity(years),
        cost_of_equity: Vec::with_capacity(years),
        weights: Vec::with_capacity(years),
    };
    for t in 1..=years {
        let beta_t = 1.0 + (beta - 1.0) * policy.wacc_beta_decay.powi(t as i32);
        let coe_t = cost_of_equity(risk_free_rate, beta_t, erp);
        let wd_t = clamp(wd0 + (wd_target - wd0) * (t as f64 / years as f64), 0.0, 0.95);
        let we_t = clamp(1.0 - wd_t, 0.05, 0.99);
        let wacc_t = clamp(
            we_t * coe_t + wd_t * cost_of_debt_after_tax,
            WACC_BOUNDS.0,
            WACC_BOUNDS.1,
        );
        path.wacc.push(wacc_t);
        path.cost_of_equity.push(coe_t);
        path.weights.push(PathWeights {
            we: we_t,
            wd: wd_t,
            beta_t,
        });
    }
    path
}

/// Everything the capital-cost estimator needs for one ticker.
pub struct CapitalCostInputs<'a> {
    pub profile: &'a CompanyProfile,
    pub statements: &'a FinancialStatementSet,
    pub security_closes: &'a [PricePoint],
    pub benchmark_closes: &'a [PricePoint],
    pub rate_quotes: &'a [PricePoint],
    pub tax_rate: TaxRate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostOfCapital {
    pub risk_free_rate: f64,
    pub risk_free_source: RiskFreeSource,
    pub beta: f64,
    pub beta_details: BetaEstimate,
    pub equity_risk_premium: f64,
    pub cost_of_equity: f64,
    pub cost_of_debt_pretax: f64,
    pub cost_of_debt_after_tax: f64,
    pub cost_of_debt_details: CostOfDebt,
    pub tax_rate: TaxRate,
    pub weights: Option<CapitalWeights>,
    pub wacc: f64,
}

impl CostOfCapital {
    pub fn wacc_path(&self, profile: &CompanyProfile, years: usize, policy: &ValuationPolicy) -> WaccPath {
        wacc_path(
            self.beta,
            self.risk_free_rate,
            self.equity_risk_premium,
            self.cost_of_debt_after_tax,
            profile.market_cap,
            profile.total_debt,
            years,
            policy,
        )
    }
}

pub fn estimate_cost_of_capital(inputs: &CapitalCostInputs<'_>, policy: &ValuationPolicy) -> CostOfCapital {
    let rf = risk_free_rate(inputs.rate_quotes, policy);
    let beta = estimate_beta(
        inputs.security_closes,
        inputs.benchmark_closes,
        inputs.profile.beta,
        policy,
    );
    let erp = equity_risk_premium(inputs.profile.market_cap, policy);
    let coe = cost_of_equity(rf.rate, beta.beta, erp);
    let cod = cost_of_debt(&DebtInputs {
        statements: inputs.statements,
        risk_free_rate: rf.rate,
        tax_rate: inputs.tax_rate.rate,
        fallback_spread: policy.fallback_debt_spread,
    });
    let weights = capital_weights(inputs.profile.market_cap, inputs.profile.total_debt);
    let wacc = wacc(coe, cod.after_tax, weights);

    debug!(
        ticker = %inputs.profile.ticker,
        rf = rf.rate,
        beta = beta.beta,
        erp,
        coe,
        cod_after_tax = cod.after_tax,
        wacc,
        "Estimated cost of capital"
    );

    CostOfCapital {
        risk_free_rate: rf.rate,
        risk_free_source: rf.source,
        beta: beta.beta,
        beta_details: beta,
        equity_risk_premium: erp,
        cost_of_equity: coe,
        cost_of_debt_pretax: cod.pretax,
        cost_of_debt_after_tax: cod.after_tax,
        cost_of_debt_details: cod,
        tax_rate: inputs.tax_rate,
        weights,
        wacc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn weekly(closes: &[f64], offset_days: i64) -> Vec<PricePoint> {
        let start = Utc.with_ymd_and_hms(2023, 1, 6, 21, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint {
                timestamp: start + Duration::days(7 * i as i64 + offset_days),
                close: *c,
            })
            .collect()
    }

    fn correlated_series(n: usize, beta: f64) -> (Vec<f64>, Vec<f64>) {
        let mut m = vec![100.0];
        let mut s = vec![100.0];
        for i in 1..n {
            let r = 0.02 * ((i as f64) * 1.3).sin();
            m.push(m[i - 1] * r.exp());
            s.push(s[i - 1] * (beta * r).exp());
        }
        (s, m)
    }

    fn table(label: &str, step_months: u32, values: &[Option<f64>]) -> StatementTable {
        let mut t = StatementTable::new();
        let latest = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        t.insert_values(label, latest, step_months, values);
        t
    }

    #[test]
    fn test_risk_free_rate_from_quotes() {
        let policy = ValuationPolicy::default();
        let rf = risk_free_rate(&weekly(&[4.0, 4.25], 0), &policy);
        assert!((rf.rate - 0.0425).abs() < 1e-12);
        assert_eq!(rf.source, RiskFreeSource::YieldQuote);

        assert_eq!(risk_free_rate(&weekly(&[9.5], 0), &policy).rate, 0.07);
        assert_eq!(risk_free_rate(&weekly(&[1.0], 0), &policy).rate, 0.02);

        let fallback = risk_free_rate(&[], &policy);
        assert_eq!(fallback.rate, 0.04);
        assert_eq!(fallback.source, RiskFreeSource::Fallback);
    }

    #[test]
    fn test_regression_beta_recovers_slope() {
        let (s, m) = correlated_series(60, 1.5);
        let reg = regression_beta(&weekly(&s, 0), &weekly(&m, 0), 26);
        assert_eq!(reg.observations, 59);
        assert!((reg.beta.unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_regression_beta_clamped() {
        let (s, m) = correlated_series(60, 4.0);
        let reg = regression_beta(&weekly(&s, 0), &weekly(&m, 0), 26);
        assert_eq!(reg.beta, Some(3.0));
    }

    #[test]
    fn test_regression_beta_requires_aligned_history() {
        let (s, m) = correlated_series(20, 1.2);
        assert!(regression_beta(&weekly(&s, 0), &weekly(&m, 0), 26).beta.is_none());

        let (s, m) = correlated_series(60, 1.2);
        let reg = regression_beta(&weekly(&s, 0), &weekly(&m, 2), 26);
        assert!(reg.beta.is_none());
        assert_eq!(reg.observations, 0);
    }

    #[test]
    fn test_estimate_beta_needs_26_aligned_closes() {
        let policy = ValuationPolicy::default();

        let (s, m) = correlated_series(25, 1.2);
        let short = estimate_beta(&weekly(&s, 0), &weekly(&m, 0), Some(0.9), &policy);
        assert!(short.regression.beta.is_none());
        assert_eq!(short.source, BetaSource::Provider);
        assert!((short.beta - 0.9).abs() < 1e-12);

        let (s, m) = correlated_series(26, 1.2);
        let enough = estimate_beta(&weekly(&s, 0), &weekly(&m, 0), Some(0.9), &policy);
        assert_eq!(enough.regression.observations, 25);
        assert!((enough.regression.beta.unwrap() - 1.2).abs() < 1e-9);
        assert_eq!(enough.source, BetaSource::Blend);
        assert!((enough.beta - (0.7 * 1.2 + 0.3 * 0.9)).abs() < 1e-9);
    }

    #[test]
    fn test_blend_beta() {
        let policy = ValuationPolicy::default();
        let (b, src) = blend_beta(Some(1.4), Some(1.0), &policy);
        assert!((b - 1.28).abs() < 1e-12);
        assert_eq!(src, BetaSource::Blend);

        assert_eq!(blend_beta(Some(1.4), None, &policy), (1.4, BetaSource::Historical));
        assert_eq!(blend_beta(None, Some(5.0), &policy), (3.0, BetaSource::Provider));
        assert_eq!(blend_beta(None, None, &policy), (1.0, BetaSource::Fallback));
    }

    #[test]
    fn test_equity_risk_premium_size_tilt() {
        let policy = ValuationPolicy::default();
        assert!((equity_risk_premium(Some(6e11), &policy) - 0.0425).abs() < 1e-12);
        assert!((equity_risk_premium(Some(5e9), &policy) - 0.0575).abs() < 1e-12);
        assert!((equity_risk_premium(Some(5e10), &policy) - 0.0475).abs() < 1e-12);
        assert!((equity_risk_premium(None, &policy) - 0.0475).abs() < 1e-12);
        assert!((equity_risk_premium(Some(0.0), &policy) - 0.0475).abs() < 1e-12);
    }

    #[test]
    fn test_cost_of_equity_clamped() {
        assert!((cost_of_equity(0.04, 1.2, 0.05) - 0.10).abs() < 1e-12);
        assert_eq!(cost_of_equity(0.04, 3.0, 0.07), 0.16);
        assert_eq!(cost_of_equity(0.02, 0.2, 0.035), 0.05);
    }

    #[test]
    fn test_effective_tax_rate_sources() {
        let policy = ValuationPolicy::default();
        let mut income = table("Income Tax Expense", 12, &[Some(20.0)]);
        income.insert_values(
            "Income Before Tax",
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            12,
            &[Some(100.0)],
        );
        let t = effective_tax_rate(&income, None, &policy);
        assert!((t.rate - 0.2).abs() < 1e-12);
        assert_eq!(t.source, TaxRateSource::Statements);

        let t = effective_tax_rate(&StatementTable::new(), Some(0.15), &policy);
        assert_eq!((t.rate, t.source), (0.15, TaxRateSource::CompanyAssumptions));

        let t = effective_tax_rate(&StatementTable::new(), None, &policy);
        assert_eq!((t.rate, t.source), (0.21, TaxRateSource::Default));
    }

    #[test]
    fn test_credit_spread_table() {
        assert_eq!(credit_spread(15.0), 0.010);
        assert_eq!(credit_spread(12.0), 0.010);
        assert_eq!(credit_spread(10.0), 0.015);
        assert_eq!(credit_spread(2.5), 0.040);
        assert_eq!(credit_spread(1.0), 0.060);
        assert_eq!(credit_spread(0.5), 0.080);
    }

    #[test]
    fn test_cost_of_debt_from_interest_and_debt() {
        let mut statements = FinancialStatementSet::default();
        statements.income_quarterly = table("Interest Expense", 3, &[Some(-25.0); 4]);
        statements.balance_quarterly =
            table("Total Debt", 3, &[Some(900.0), Some(1000.0), Some(1100.0), Some(1000.0)]);
        let cod = cost_of_debt(&DebtInputs {
            statements: &statements,
            risk_free_rate: 0.04,
            tax_rate: 0.2,
            fallback_spread: 0.015,
        });
        assert_eq!(cod.method, CostOfDebtMethod::InterestOverAverageDebt);
        assert!((cod.pretax - 0.10).abs() < 1e-12);
        assert!((cod.after_tax - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_cost_of_debt_coverage_route() {
        let mut statements = FinancialStatementSet::default();
        let mut income = table("Operating Income", 12, &[Some(500.0)]);
        income.insert_values(
            "Interest Expense",
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            12,
            &[Some(50.0)],
        );
        statements.income_annual = income;
        let cod = cost_of_debt(&DebtInputs {
            statements: &statements,
            risk_free_rate: 0.04,
            tax_rate: 0.0,
            fallback_spread: 0.015,
        });
        assert_eq!(cod.method, CostOfDebtMethod::CoverageSpread);
        assert_eq!(cod.coverage, Some(10.0));
        assert!((cod.pretax - 0.055).abs() < 1e-12);
    }

    #[test]
    fn test_cost_of_debt_fallback() {
        let statements = FinancialStatementSet::default();
        let cod = cost_of_debt(&DebtInputs {
            statements: &statements,
            risk_free_rate: 0.04,
            tax_rate: 0.25,
            fallback_spread: 0.015,
        });
        assert_eq!(cod.method, CostOfDebtMethod::Fallback);
        assert!((cod.pretax - 0.055).abs() < 1e-12);
        assert!((cod.after_tax - 0.04125).abs() < 1e-12);
    }

    #[test]
    fn test_static_wacc() {
        let w = capital_weights(Some(800.0), Some(200.0));
        assert!((wacc(0.10, 0.04, w) - 0.088).abs() < 1e-12);
        assert!(capital_weights(Some(0.0), None).is_none());
        assert_eq!(wacc(0.11, 0.04, None), 0.11);
        assert_eq!(wacc(0.30, 0.04, capital_weights(Some(1.0), Some(0.0))), 0.15);
    }

    #[test]
    fn test_wacc_path_decays_beta_and_deleverages_mega_caps() {
        let policy = ValuationPolicy::default();
        let path = wacc_path(1.5, 0.04, 0.05, 0.03, Some(9e11), Some(1e11), 10, &policy);
        assert_eq!(path.wacc.len(), 10);
        assert!((path.weights[0].beta_t - (1.0 + 0.5 * 0.85)).abs() < 1e-12);
        assert!(path.weights.windows(2).all(|w| w[1].beta_t < w[0].beta_t));
        assert!((path.weights[9].wd - 0.09).abs() < 1e-12);
        assert!(path.wacc.iter().all(|w| (0.05..=0.15).contains(w)));

        let small = wacc_path(1.5, 0.04, 0.05, 0.03, Some(9e10), Some(1e10), 5, &policy);
        assert!(small.weights.iter().all(|w| (w.wd - 0.1).abs() < 1e-12));
    }
}
