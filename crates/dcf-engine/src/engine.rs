//! Request-level orchestration: fetch provider data concurrently, run the
//! estimators, and assemble the valuation report.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use valuation_core::numeric::clamp;
use valuation_core::{
    AssumptionSource, CapitalStructureInputs, CompanyAssumptions, CompanyProfile, EnrichmentProvider,
    FinancialStatementSet, MarketDataProvider, PricePoint, ValuationError,
};

use crate::assumptions::{dynamic_assumptions, wacc_from_assumptions, WaccBreakdown};
use crate::capital_cost::{
    effective_tax_rate, estimate_cost_of_capital, BetaEstimate, CapitalCostInputs, CostOfCapital, CostOfDebt,
    PathWeights,
};
use crate::capital_structure::{capital_structure_inputs, cash_like};
use crate::fcff::{estimate_fcff_base, FcffBase, FcffInputs};
use crate::growth::{
    auto_terminal_growth, estimate_growth, project_fcff, terminal_growth_override, FcffProjection, GrowthEstimate,
    TERMINAL_GROWTH_OVERRIDE_BOUNDS,
};
use crate::policy::ValuationPolicy;
use crate::sensitivity::{sensitivity_grid, SensitivityGrid};
use crate::snapshot::{financials_snapshot, FinancialsSnapshot};
use crate::valuation::{value_firm, DiscountRate, EquityBridge, ValuationResult};

pub const MIN_YEARS: usize = 3;
pub const MAX_YEARS: usize = 20;
pub const WACC_OVERRIDE_BOUNDS: (f64, f64) = (0.03, 0.20);

pub const DEFAULT_BENCHMARK_SYMBOL: &str = "^GSPC";
pub const DEFAULT_RATE_SYMBOL: &str = "^TNX";

const DISCLAIMER: &str =
    "Educational DCF with automatic, ticker-specific assumptions derived from public data.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub ticker: String,
    pub years: usize,
    pub midyear: bool,
    pub terminal_growth_override: Option<f64>,
    pub wacc_override: Option<f64>,
    pub debug: bool,
}

impl ValuationRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            years: 10,
            midyear: true,
            terminal_growth_override: None,
            wacc_override: None,
            debug: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValuationError> {
        if self.ticker.trim().is_empty() {
            return Err(ValuationError::invalid_parameter("ticker", "must not be empty"));
        }
        if !(MIN_YEARS..=MAX_YEARS).contains(&self.years) {
            return Err(ValuationError::invalid_parameter(
                "years",
                format!("must be between {} and {}, got {}", MIN_YEARS, MAX_YEARS, self.years),
            ));
        }
        if let Some(tg) = self.terminal_growth_override {
            terminal_growth_override(tg)?;
        }
        if self.wacc_override.is_some_and(|w| !w.is_finite()) {
            return Err(ValuationError::invalid_parameter("wacc_override", "must be a finite number"));
        }
        Ok(())
    }

    fn normalized_ticker(&self) -> String {
        self.ticker.trim().to_uppercase()
    }
}

/// Where a headline assumption came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionOrigin {
    Estimated,
    CompanyAssumptions,
    ManualOverride,
}

/// Provider data for one ticker, fetched once per request.
#[derive(Debug, Clone, Default)]
pub struct MarketInputs {
    pub profile: CompanyProfile,
    pub statements: FinancialStatementSet,
    pub security_closes: Vec<PricePoint>,
    pub benchmark_closes: Vec<PricePoint>,
    pub rate_quotes: Vec<PricePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicValuation {
    #[serde(flatten)]
    pub result: ValuationResult,
    pub wacc_path: Vec<f64>,
    pub coe_path: Vec<f64>,
    pub weights_path: Vec<PathWeights>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationSection {
    pub base_constant_wacc: ValuationResult,
    pub dynamic_wacc: DynamicValuation,
    pub sensitivity: SensitivityGrid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssumptionTrail {
    pub cost_of_capital: CostOfCapital,
    pub wacc_base: f64,
    pub wacc_source: AssumptionOrigin,
    pub terminal_growth_used: f64,
    pub terminal_growth_source: AssumptionOrigin,
    pub years_forecasted: usize,
    pub midyear: bool,
    pub operating_margin: Option<f64>,
    pub effective_tax_rate: f64,
    pub growths: GrowthEstimate,
    pub fcff_start: FcffBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_assumptions: Option<CompanyAssumptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSource {
    pub name: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightInputs {
    pub market_cap: f64,
    pub total_debt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub cost_of_debt: CostOfDebt,
    pub wacc_weights_now: WeightInputs,
    pub beta: BetaEstimate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationReport {
    pub ticker: String,
    pub company_name: Option<String>,
    pub currency: String,
    pub valuation: ValuationSection,
    pub assumptions: AssumptionTrail,
    pub capital_structure: CapitalStructureInputs,
    pub fcff_projection: FcffProjection,
    pub financials_snapshot: FinancialsSnapshot,
    pub data_sources: Vec<DataSource>,
    pub disclaimer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyAssumptionsView {
    pub ticker: String,
    pub company_name: String,
    pub profile: String,
    /// WACC in percent, two decimals.
    pub wacc_calculated: f64,
    pub parameters: CompanyAssumptions,
    pub wacc_breakdown: WaccBreakdown,
    pub source: AssumptionOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssumptionComparison {
    pub company_name: String,
    pub beta: f64,
    pub wacc: f64,
    pub cost_of_equity: f64,
    pub terminal_growth: f64,
    pub debt_to_equity: f64,
    pub tax_rate: f64,
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableCompany {
    pub ticker: String,
    pub name: String,
    pub profile: String,
    pub beta: f64,
    pub terminal_growth: f64,
}

fn percent(x: f64) -> f64 {
    (x * 10_000.0).round() / 100.0
}

/// Run every estimator over already-fetched data and assemble the report.
pub fn compute_report(
    inputs: &MarketInputs,
    request: &ValuationRequest,
    company: Option<&CompanyAssumptions>,
    policy: &ValuationPolicy,
) -> Result<ValuationReport, ValuationError> {
    request.validate()?;
    let ticker = request.normalized_ticker();
    let profile = &inputs.profile;
    let statements = &inputs.statements;
    let years = request.years;

    let tax = effective_tax_rate(&statements.income_annual, company.map(|c| c.tax_rate), policy);

    let (cost, fcff_base) = rayon::join(
        || {
            estimate_cost_of_capital(
                &CapitalCostInputs {
                    profile,
                    statements,
                    security_closes: &inputs.security_closes,
                    benchmark_closes: &inputs.benchmark_closes,
                    rate_quotes: &inputs.rate_quotes,
                    tax_rate: tax,
                },
                policy,
            )
        },
        || {
            estimate_fcff_base(&FcffInputs {
                statements,
                profile,
                tax_rate: tax.rate,
            })
        },
    );
    debug!(ticker = %ticker, fcff0 = fcff_base.value, method = ?fcff_base.method, "FCFF base");

    let growths = estimate_growth(statements, years, policy);

    let (terminal_growth, terminal_growth_source) = match (request.terminal_growth_override, company) {
        (Some(tg), _) => (terminal_growth_override(tg)?, AssumptionOrigin::ManualOverride),
        (None, Some(c)) => (
            clamp(
                c.terminal_growth,
                TERMINAL_GROWTH_OVERRIDE_BOUNDS.0,
                TERMINAL_GROWTH_OVERRIDE_BOUNDS.1,
            ),
            AssumptionOrigin::CompanyAssumptions,
        ),
        (None, None) => (
            auto_terminal_growth(
                cost.risk_free_rate,
                growths.fcff_cagr_hist,
                growths.revenue_cagr,
                profile.operating_margin,
                policy,
            ),
            AssumptionOrigin::Estimated,
        ),
    };

    let (wacc_base, wacc_source) = match (request.wacc_override, company) {
        (Some(w), _) => (
            clamp(w, WACC_OVERRIDE_BOUNDS.0, WACC_OVERRIDE_BOUNDS.1),
            AssumptionOrigin::ManualOverride,
        ),
        (None, Some(c)) => (wacc_from_assumptions(c).0, AssumptionOrigin::CompanyAssumptions),
        (None, None) => (cost.wacc, AssumptionOrigin::Estimated),
    };

    let projection = project_fcff(
        fcff_base.value,
        tax.rate,
        &growths.projection_growth_path,
        profile,
        statements,
    );

    let bridge = EquityBridge {
        cash: cash_like(profile, &statements.balance_annual),
        debt: profile.total_debt.unwrap_or(0.0),
        shares_outstanding: profile.shares_outstanding,
    };

    let base = value_firm(
        &projection.values,
        &DiscountRate::Constant(wacc_base),
        terminal_growth,
        request.midyear,
        &bridge,
    )?;

    let path = cost.wacc_path(profile, years, policy);
    let dynamic = value_firm(
        &projection.values,
        &DiscountRate::Path(path.wacc.clone()),
        terminal_growth,
        request.midyear,
        &bridge,
    )?;

    let sensitivity = sensitivity_grid(
        &projection.values,
        wacc_base,
        terminal_growth,
        request.midyear,
        &bridge,
        policy,
    );

    let diagnostics = request.debug.then(|| Diagnostics {
        cost_of_debt: cost.cost_of_debt_details.clone(),
        wacc_weights_now: WeightInputs {
            market_cap: profile.market_cap.unwrap_or(0.0),
            total_debt: profile.total_debt.unwrap_or(0.0),
        },
        beta: cost.beta_details.clone(),
    });

    info!(
        ticker = %ticker,
        wacc = wacc_base,
        terminal_growth,
        enterprise_value = base.enterprise_value,
        per_share = ?base.intrinsic_value_per_share,
        projection = ?projection.mode,
        "DCF valuation complete"
    );

    Ok(ValuationReport {
        company_name: profile
            .company_name
            .clone()
            .or_else(|| company.map(|c| c.company_name.clone())),
        currency: profile.currency.clone().unwrap_or_else(|| "USD".to_string()),
        valuation: ValuationSection {
            base_constant_wacc: base,
            dynamic_wacc: DynamicValuation {
                result: dynamic,
                wacc_path: path.wacc,
                coe_path: path.cost_of_equity,
                weights_path: path.weights,
            },
            sensitivity,
        },
        assumptions: AssumptionTrail {
            effective_tax_rate: tax.rate,
            cost_of_capital: cost,
            wacc_base,
            wacc_source,
            terminal_growth_used: terminal_growth,
            terminal_growth_source,
            years_forecasted: years,
            midyear: request.midyear,
            operating_margin: profile.operating_margin,
            growths,
            fcff_start: fcff_base,
            company_assumptions: company.cloned(),
        },
        capital_structure: capital_structure_inputs(profile, statements),
        fcff_projection: projection,
        financials_snapshot: financials_snapshot(profile, statements),
        data_sources: data_sources(),
        disclaimer: DISCLAIMER.to_string(),
        diagnostics,
        ticker,
    })
}

fn data_sources() -> Vec<DataSource> {
    let source = |name: &str, fields: &[&str]| DataSource {
        name: name.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
    };
    vec![
        source(
            "Market data provider",
            &[
                "income statement (annual, quarterly)",
                "balance sheet (annual, quarterly)",
                "cash flow statement (annual, quarterly)",
                "market cap, total debt, total cash, shares outstanding",
                "beta, operating margin, trailing EPS, currency",
            ],
        ),
        source("10Y Treasury yield", &["risk-free rate"]),
        source("Broad market index", &["weekly returns for historical beta"]),
    ]
}

/// The DCF engine bound to its collaborators.
#[derive(Clone)]
pub struct DcfEngine {
    provider: Arc<dyn MarketDataProvider>,
    enrichment: Option<Arc<dyn EnrichmentProvider>>,
    assumptions: Option<Arc<dyn AssumptionSource>>,
    policy: ValuationPolicy,
    benchmark_symbol: String,
    rate_symbol: String,
}

impl DcfEngine {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            enrichment: None,
            assumptions: None,
            policy: ValuationPolicy::default(),
            benchmark_symbol: DEFAULT_BENCHMARK_SYMBOL.to_string(),
            rate_symbol: DEFAULT_RATE_SYMBOL.to_string(),
        }
    }

    pub fn with_enrichment(mut self, enrichment: Arc<dyn EnrichmentProvider>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    pub fn with_assumptions(mut self, source: Arc<dyn AssumptionSource>) -> Self {
        self.assumptions = Some(source);
        self
    }

    pub fn with_policy(mut self, policy: ValuationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_benchmark_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark_symbol = symbol.into();
        self
    }

    pub fn with_rate_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.rate_symbol = symbol.into();
        self
    }

    pub fn policy(&self) -> &ValuationPolicy {
        &self.policy
    }

    fn lookup(&self, ticker: &str) -> Option<CompanyAssumptions> {
        self.assumptions.as_ref().and_then(|s| s.lookup(ticker))
    }

    /// Fetch everything a valuation needs. Individual failures are logged and
    /// treated as missing data; only losing both the profile and the
    /// statements aborts.
    pub async fn fetch_inputs(&self, ticker: &str) -> Result<MarketInputs, ValuationError> {
        let provider = self.provider.as_ref();
        let (profile, statements, security, benchmark, rates) = tokio::join!(
            provider.company_profile(ticker),
            provider.statements(ticker),
            provider.weekly_closes(ticker),
            provider.weekly_closes(&self.benchmark_symbol),
            provider.rate_quotes(&self.rate_symbol),
        );

        if let (Err(profile_err), Err(statements_err)) = (&profile, &statements) {
            warn!(ticker, %profile_err, %statements_err, "No profile or statements available");
            return Err(profile_err.clone());
        }

        let mut profile = absorb(ticker, "company profile", profile).unwrap_or_else(|| CompanyProfile::new(ticker));
        let statements = absorb(ticker, "statements", statements).unwrap_or_default();
        let security_closes = absorb(ticker, "price history", security).unwrap_or_default();
        let benchmark_closes = absorb(ticker, "benchmark history", benchmark).unwrap_or_default();
        let rate_quotes = absorb(ticker, "risk-free quotes", rates).unwrap_or_default();

        if let Some(enrichment) = &self.enrichment {
            if needs_enrichment(&profile) {
                if let Err(e) = enrichment.enrich(ticker, &mut profile).await {
                    warn!(ticker, error = %e, "Profile enrichment failed");
                }
            }
        }

        Ok(MarketInputs {
            profile,
            statements,
            security_closes,
            benchmark_closes,
            rate_quotes,
        })
    }

    /// Full DCF valuation for one ticker.
    pub async fn valuate(&self, request: &ValuationRequest) -> Result<ValuationReport, ValuationError> {
        request.validate()?;
        let ticker = request.normalized_ticker();
        info!(ticker = %ticker, years = request.years, midyear = request.midyear, "Starting DCF valuation");

        let inputs = self.fetch_inputs(&ticker).await?;
        let company = self.lookup(&ticker);
        let request = request.clone();
        let policy = self.policy.clone();

        tokio::task::spawn_blocking(move || compute_report(&inputs, &request, company.as_ref(), &policy))
            .await
            .map_err(|e| ValuationError::Calculation(format!("valuation task failed: {}", e)))?
    }

    /// Assumption set for a ticker: the curated entry when there is one,
    /// otherwise derived from live data.
    pub async fn company_assumptions(&self, ticker: &str) -> Result<CompanyAssumptionsView, ValuationError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(ValuationError::invalid_parameter("ticker", "must not be empty"));
        }

        let (parameters, source) = match self.lookup(&ticker) {
            Some(a) => (a, AssumptionOrigin::CompanyAssumptions),
            None => {
                let inputs = self.fetch_inputs(&ticker).await?;
                let tax = effective_tax_rate(&inputs.statements.income_annual, None, &self.policy);
                let cost = estimate_cost_of_capital(
                    &CapitalCostInputs {
                        profile: &inputs.profile,
                        statements: &inputs.statements,
                        security_closes: &inputs.security_closes,
                        benchmark_closes: &inputs.benchmark_closes,
                        rate_quotes: &inputs.rate_quotes,
                        tax_rate: tax,
                    },
                    &self.policy,
                );
                (dynamic_assumptions(&inputs.profile, &cost), AssumptionOrigin::Estimated)
            }
        };

        let (wacc, wacc_breakdown) = wacc_from_assumptions(&parameters);
        Ok(CompanyAssumptionsView {
            company_name: parameters.company_name.clone(),
            profile: parameters.profile.clone(),
            wacc_calculated: percent(wacc),
            parameters,
            wacc_breakdown,
            source,
            ticker,
        })
    }

    /// Side-by-side assumptions for several tickers, rates in percent.
    pub async fn compare_assumptions(
        &self,
        tickers: &[String],
    ) -> Result<BTreeMap<String, AssumptionComparison>, ValuationError> {
        let mut comparison = BTreeMap::new();
        for ticker in tickers {
            let view = self.company_assumptions(ticker).await?;
            let p = &view.parameters;
            comparison.insert(
                view.ticker.clone(),
                AssumptionComparison {
                    company_name: p.company_name.clone(),
                    beta: p.beta,
                    wacc: view.wacc_calculated,
                    cost_of_equity: percent(view.wacc_breakdown.cost_of_equity),
                    terminal_growth: percent(p.terminal_growth),
                    debt_to_equity: p.debt_to_equity,
                    tax_rate: percent(p.tax_rate),
                    profile: p.profile.clone(),
                },
            );
        }
        Ok(comparison)
    }

    /// Companies in the configured assumption source.
    pub fn available_companies(&self) -> Vec<AvailableCompany> {
        let Some(source) = &self.assumptions else {
            return Vec::new();
        };
        source
            .tickers()
            .into_iter()
            .filter_map(|ticker| {
                source.lookup(&ticker).map(|a| AvailableCompany {
                    ticker,
                    name: a.company_name,
                    profile: a.profile,
                    beta: a.beta,
                    terminal_growth: a.terminal_growth,
                })
            })
            .collect()
    }
}

fn needs_enrichment(profile: &CompanyProfile) -> bool {
    profile.market_cap.is_none()
        || profile.shares_outstanding.is_none()
        || profile.current_price.is_none()
        || profile.total_debt.is_none()
        || profile.total_cash.is_none()
}

fn absorb<T>(ticker: &str, what: &str, result: Result<T, ValuationError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(ticker, error = %e, "Failed to fetch {}; continuing without it", what);
            None
        }
    }
}
