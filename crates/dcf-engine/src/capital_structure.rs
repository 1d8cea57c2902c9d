use valuation_core::{CapitalStructureInputs, CompanyProfile, FinancialStatementSet, StatementTable};

use crate::statements::{labels, latest};

/// Cash-like assets: the larger of the provider's total cash and the sum of
/// cash, short-term investment and marketable-security rows on `balance`.
pub fn cash_like(profile: &CompanyProfile, balance: &StatementTable) -> f64 {
    let reported = profile.total_cash.unwrap_or(0.0);
    if balance.is_empty() {
        return reported;
    }
    let components: f64 = labels::CASH_LIKE_COMPONENTS
        .iter()
        .filter_map(|label| latest(balance, &[*label]))
        .sum();
    reported.max(components)
}

/// Equity-bridge and weighting inputs for one ticker.
pub fn capital_structure_inputs(
    profile: &CompanyProfile,
    statements: &FinancialStatementSet,
) -> CapitalStructureInputs {
    CapitalStructureInputs {
        market_cap: profile.market_cap,
        total_debt: profile.total_debt,
        cash_and_equivalents: Some(cash_like(profile, &statements.balance_annual)),
        shares_outstanding: profile.shares_outstanding,
        beta: profile.beta,
        sector: profile.sector.clone(),
    }
}
