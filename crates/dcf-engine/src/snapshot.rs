use serde::Serialize;
use valuation_core::{CompanyProfile, FinancialStatementSet};

use crate::capital_structure::cash_like;
use crate::growth::revenue_cagr;
use crate::statements::{labels, latest};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotTotals {
    pub total_revenue: Option<f64>,
    pub ebitda: Option<f64>,
    pub ebit: Option<f64>,
    pub net_income: Option<f64>,
    pub capex: Option<f64>,
    pub cash_and_st_invest: f64,
    pub total_debt: Option<f64>,
    pub total_assets: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_out: Option<f64>,
    pub price: Option<f64>,
    pub trailing_eps: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Multiples {
    pub tev_to_revenue: Option<f64>,
    pub tev_to_ebitda: Option<f64>,
    pub price_to_eps: Option<f64>,
}

/// Display-only trading multiples; independent of the DCF result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialsSnapshot {
    pub currency: String,
    pub units: String,
    pub totals: SnapshotTotals,
    pub tev: Option<f64>,
    pub multiples: Multiples,
    pub revenue_cagr: Option<f64>,
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d).filter(|r| r.is_finite()),
        _ => None,
    }
}

pub fn financials_snapshot(profile: &CompanyProfile, statements: &FinancialStatementSet) -> FinancialsSnapshot {
    let income = &statements.income_annual;
    let totals = SnapshotTotals {
        total_revenue: latest(income, labels::TOTAL_REVENUE),
        ebitda: latest(income, labels::EBITDA),
        ebit: latest(income, labels::EBIT),
        net_income: latest(income, labels::NET_INCOME),
        capex: latest(&statements.cashflow_annual, labels::CAPITAL_EXPENDITURES),
        cash_and_st_invest: cash_like(profile, &statements.balance_annual),
        total_debt: profile.total_debt,
        total_assets: latest(&statements.balance_annual, labels::TOTAL_ASSETS),
        market_cap: profile.market_cap,
        shares_out: profile.shares_outstanding,
        price: profile.current_price,
        trailing_eps: profile.trailing_eps,
    };

    let tev = match (totals.market_cap, totals.total_debt) {
        (Some(mc), Some(debt)) => Some(mc + debt - totals.cash_and_st_invest),
        _ => None,
    };
    let multiples = Multiples {
        tev_to_revenue: ratio(tev, totals.total_revenue),
        tev_to_ebitda: ratio(tev, totals.ebitda),
        price_to_eps: ratio(totals.price, totals.trailing_eps),
    };

    FinancialsSnapshot {
        currency: profile.currency.clone().unwrap_or_else(|| "USD".to_string()),
        units: "USD".to_string(),
        totals,
        tev,
        multiples,
        revenue_cagr: revenue_cagr(income),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use valuation_core::StatementTable;

    fn annual(rows: &[(&str, f64)]) -> StatementTable {
        let mut t = StatementTable::new();
        let year_end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        for (label, v) in rows {
            t.insert_values(*label, year_end, 12, &[Some(*v)]);
        }
        t
    }

    #[test]
    fn test_multiples() {
        let mut profile = CompanyProfile::new("TEST");
        profile.market_cap = Some(1000.0);
        profile.total_debt = Some(200.0);
        profile.total_cash = Some(100.0);
        profile.current_price = Some(50.0);
        profile.trailing_eps = Some(2.5);
        let statements = FinancialStatementSet {
            income_annual: annual(&[("Total Revenue", 550.0), ("Ebitda", 110.0), ("Operating Income", 80.0)]),
            ..Default::default()
        };

        let snap = financials_snapshot(&profile, &statements);
        assert_eq!(snap.tev, Some(1100.0));
        assert_eq!(snap.multiples.tev_to_revenue, Some(2.0));
        assert_eq!(snap.multiples.tev_to_ebitda, Some(10.0));
        assert_eq!(snap.multiples.price_to_eps, Some(20.0));
        assert_eq!(snap.totals.ebit, Some(80.0));
        assert_eq!(snap.currency, "USD");
        assert!(snap.revenue_cagr.is_none());
    }

    #[test]
    fn test_multiples_need_known_nonzero_denominators() {
        let mut profile = CompanyProfile::new("TEST");
        profile.market_cap = Some(1000.0);
        profile.current_price = Some(50.0);
        profile.trailing_eps = Some(0.0);
        profile.currency = Some("EUR".into());
        let statements = FinancialStatementSet {
            income_annual: annual(&[("Total Revenue", 0.0)]),
            ..Default::default()
        };

        let snap = financials_snapshot(&profile, &statements);
        assert!(snap.tev.is_none());
        assert!(snap.multiples.tev_to_revenue.is_none());
        assert!(snap.multiples.price_to_eps.is_none());
        assert_eq!(snap.currency, "EUR");
    }
}
