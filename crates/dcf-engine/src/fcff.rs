//! Base-year free cash flow to firm.

use serde::Serialize;
use valuation_core::numeric::finite;
use valuation_core::{CompanyProfile, FinancialStatementSet, StatementTable};

use crate::chain::{resolve, Strategy};
use crate::statements::{labels, latest, recent_values, ttm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FcffMethod {
    /// EBIT(1-T) + D&A - CapEx - ΔNWC over the trailing four quarters.
    TtmStatements,
    AnnualFreeCashFlow,
    OperatingCashFlowLessCapex,
    ProviderFreeCashFlow,
    ProviderOperatingCashFlow,
    Unavailable,
}

/// TTM sub-components; each is `None` when it could not be derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TtmComponents {
    pub ebit_ttm: Option<f64>,
    pub depreciation_ttm: Option<f64>,
    pub capex_ttm: Option<f64>,
    pub delta_nwc_ttm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FcffBase {
    pub value: f64,
    pub method: FcffMethod,
    pub components: TtmComponents,
}

pub struct FcffInputs<'a> {
    pub statements: &'a FinancialStatementSet,
    pub profile: &'a CompanyProfile,
    pub tax_rate: f64,
}

/// Change in operating working capital between the two latest quarters.
///
/// NWC is (current assets - cash) - (current liabilities - short-term debt).
/// Without two quarters of current assets and liabilities the change is zero;
/// cash and short-term debt count as zero when not reported.
pub fn delta_nwc(balance_quarterly: &StatementTable) -> Option<f64> {
    let pair = |labels: &[&str]| recent_values(balance_quarterly, labels, 2);

    let ca = pair(labels::CURRENT_ASSETS);
    let cl = pair(labels::CURRENT_LIABILITIES);
    if ca.len() < 2 || cl.len() < 2 {
        return Some(0.0);
    }
    let cash = pair(labels::CASH);
    let std = pair(labels::SHORT_TERM_DEBT);
    let at = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0);

    let nwc0 = (ca[0] - at(&cash, 0)) - (cl[0] - at(&std, 0));
    let nwc1 = (ca[1] - at(&cash, 1)) - (cl[1] - at(&std, 1));
    finite(nwc0 - nwc1)
}

pub fn ttm_components(statements: &FinancialStatementSet) -> TtmComponents {
    TtmComponents {
        ebit_ttm: ttm(&statements.income_quarterly, labels::EBIT),
        depreciation_ttm: ttm(&statements.cashflow_quarterly, labels::DEPRECIATION),
        capex_ttm: ttm(&statements.cashflow_quarterly, labels::CAPITAL_EXPENDITURES).map(f64::abs),
        delta_nwc_ttm: delta_nwc(&statements.balance_quarterly),
    }
}

fn from_ttm_statements(inputs: &FcffInputs<'_>) -> Option<FcffBase> {
    let c = ttm_components(inputs.statements);
    let value = c.ebit_ttm? * (1.0 - inputs.tax_rate) + c.depreciation_ttm? - c.capex_ttm? - c.delta_nwc_ttm?;
    Some(FcffBase {
        value: finite(value)?,
        method: FcffMethod::TtmStatements,
        components: c,
    })
}

fn from_annual_free_cash_flow(inputs: &FcffInputs<'_>) -> Option<FcffBase> {
    let value = latest(&inputs.statements.cashflow_annual, labels::FREE_CASH_FLOW)?;
    Some(FcffBase {
        value,
        method: FcffMethod::AnnualFreeCashFlow,
        components: ttm_components(inputs.statements),
    })
}

fn from_operating_cash_flow(inputs: &FcffInputs<'_>) -> Option<FcffBase> {
    let components = ttm_components(inputs.statements);
    let ocf = latest(&inputs.statements.cashflow_annual, labels::OPERATING_CASH_FLOW)?;
    let capex = components.capex_ttm?;
    Some(FcffBase {
        value: ocf - capex,
        method: FcffMethod::OperatingCashFlowLessCapex,
        components,
    })
}

fn from_provider(inputs: &FcffInputs<'_>) -> FcffBase {
    let components = ttm_components(inputs.statements);
    let profile = inputs.profile;
    let (value, method) = match (profile.free_cashflow, profile.operating_cashflow) {
        (Some(fcf), _) => (fcf, FcffMethod::ProviderFreeCashFlow),
        (None, Some(ocf)) => (ocf, FcffMethod::ProviderOperatingCashFlow),
        (None, None) => (0.0, FcffMethod::Unavailable),
    };
    FcffBase {
        value,
        method,
        components,
    }
}

/// Base-year FCFF from the first applicable method.
pub fn estimate_fcff_base(inputs: &FcffInputs<'_>) -> FcffBase {
    let chain = [
        from_ttm_statements as Strategy<FcffInputs<'_>, FcffBase>,
        from_annual_free_cash_flow as Strategy<FcffInputs<'_>, FcffBase>,
        from_operating_cash_flow as Strategy<FcffInputs<'_>, FcffBase>,
    ];
    resolve(inputs, &chain, from_provider)
}
