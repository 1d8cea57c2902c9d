//! Curated per-company assumptions and their dynamic counterpart.

use serde::Serialize;
use valuation_core::numeric::clamp;
use valuation_core::{AssumptionSource, CompanyAssumptions, CompanyProfile};

use crate::capital_cost::{CostOfCapital, WACC_BOUNDS};
use crate::growth::TERMINAL_GROWTH_OVERRIDE_BOUNDS;

struct Entry {
    ticker: &'static str,
    company_name: &'static str,
    beta: f64,
    cost_of_debt_pretax: f64,
    tax_rate: f64,
    debt_to_equity: f64,
    terminal_growth: f64,
    market_cap: f64,
    total_debt: f64,
    profile: &'static str,
}

const TABLE_RISK_FREE: f64 = 0.045;
const TABLE_ERP: f64 = 0.055;

const ENTRIES: [Entry; 5] = [
    Entry {
        ticker: "AAPL",
        company_name: "Apple Inc.",
        beta: 1.25,
        cost_of_debt_pretax: 0.035,
        tax_rate: 0.15,
        debt_to_equity: 1.57,
        terminal_growth: 0.035,
        market_cap: 3.5e12,
        total_debt: 1.1e11,
        profile: "mature, low-risk, stable cash flows",
    },
    Entry {
        ticker: "TSLA",
        company_name: "Tesla Inc.",
        beta: 2.05,
        cost_of_debt_pretax: 0.065,
        tax_rate: 0.21,
        debt_to_equity: 0.15,
        terminal_growth: 0.045,
        market_cap: 8e11,
        total_debt: 1.2e10,
        profile: "high-growth, high-risk, volatile",
    },
    Entry {
        ticker: "KO",
        company_name: "The Coca-Cola Company",
        beta: 0.65,
        cost_of_debt_pretax: 0.030,
        tax_rate: 0.21,
        debt_to_equity: 1.85,
        terminal_growth: 0.025,
        market_cap: 2.5e11,
        total_debt: 4.0e10,
        profile: "defensive, very low-risk, saturated market",
    },
    Entry {
        ticker: "MSFT",
        company_name: "Microsoft Corporation",
        beta: 1.15,
        cost_of_debt_pretax: 0.032,
        tax_rate: 0.16,
        debt_to_equity: 0.45,
        terminal_growth: 0.035,
        market_cap: 3.1e12,
        total_debt: 7.5e10,
        profile: "mature tech, moderate-risk, steady growth",
    },
    Entry {
        ticker: "GOOGL",
        company_name: "Alphabet Inc.",
        beta: 1.10,
        cost_of_debt_pretax: 0.028,
        tax_rate: 0.15,
        debt_to_equity: 0.08,
        terminal_growth: 0.040,
        market_cap: 2.0e12,
        total_debt: 1.3e10,
        profile: "tech giant, low debt, moderate growth",
    },
];

impl Entry {
    fn to_assumptions(&self) -> CompanyAssumptions {
        CompanyAssumptions {
            company_name: self.company_name.to_string(),
            beta: self.beta,
            risk_free_rate: TABLE_RISK_FREE,
            equity_risk_premium: TABLE_ERP,
            cost_of_debt_pretax: self.cost_of_debt_pretax,
            tax_rate: self.tax_rate,
            debt_to_equity: self.debt_to_equity,
            terminal_growth: self.terminal_growth,
            market_cap: Some(self.market_cap),
            total_debt: Some(self.total_debt),
            profile: self.profile.to_string(),
        }
    }
}

/// The built-in five-company assumption table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAssumptionTable;

impl AssumptionSource for StaticAssumptionTable {
    fn lookup(&self, ticker: &str) -> Option<CompanyAssumptions> {
        let ticker = ticker.to_uppercase();
        ENTRIES
            .iter()
            .find(|e| e.ticker == ticker)
            .map(Entry::to_assumptions)
    }

    fn tickers(&self) -> Vec<String> {
        ENTRIES.iter().map(|e| e.ticker.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaccBreakdown {
    pub cost_of_equity: f64,
    pub cost_of_debt_pretax: f64,
    pub cost_of_debt_after_tax: f64,
    pub equity_weight: f64,
    pub debt_weight: f64,
    pub beta: f64,
    pub risk_free_rate: f64,
    pub equity_risk_premium: f64,
    pub tax_rate: f64,
    pub debt_to_equity_ratio: f64,
}

/// WACC implied by an assumption set, weighting by its debt-to-equity ratio.
pub fn wacc_from_assumptions(a: &CompanyAssumptions) -> (f64, WaccBreakdown) {
    let cost_of_equity = a.risk_free_rate + a.beta * a.equity_risk_premium;
    let cost_of_debt_after_tax = a.cost_of_debt_pretax * (1.0 - a.tax_rate);
    let total_capital = 1.0 + a.debt_to_equity;
    let equity_weight = 1.0 / total_capital;
    let debt_weight = a.debt_to_equity / total_capital;
    let wacc = clamp(
        equity_weight * cost_of_equity + debt_weight * cost_of_debt_after_tax,
        WACC_BOUNDS.0,
        WACC_BOUNDS.1,
    );
    (
        wacc,
        WaccBreakdown {
            cost_of_equity,
            cost_of_debt_pretax: a.cost_of_debt_pretax,
            cost_of_debt_after_tax,
            equity_weight,
            debt_weight,
            beta: a.beta,
            risk_free_rate: a.risk_free_rate,
            equity_risk_premium: a.equity_risk_premium,
            tax_rate: a.tax_rate,
            debt_to_equity_ratio: a.debt_to_equity,
        },
    )
}

/// Terminal growth by sector: defensive sectors grow slower, technology faster.
pub fn sector_terminal_growth(sector: Option<&str>) -> f64 {
    let sector = sector.unwrap_or_default().to_lowercase();
    let any = |keys: &[&str]| keys.iter().any(|k| sector.contains(k));
    let tg = if any(&["utilities", "consumer defensive", "staples", "telecom"]) {
        0.025
    } else if any(&["technology", "semiconductor", "software"]) {
        0.035
    } else {
        0.03
    };
    clamp(tg, TERMINAL_GROWTH_OVERRIDE_BOUNDS.0, TERMINAL_GROWTH_OVERRIDE_BOUNDS.1)
}

/// Assumption set derived from live provider data for tickers outside the
/// curated table.
pub fn dynamic_assumptions(profile: &CompanyProfile, cost: &CostOfCapital) -> CompanyAssumptions {
    let debt_to_equity = match profile.market_cap {
        Some(mc) if mc > 0.0 => clamp(profile.total_debt.unwrap_or(0.0) / mc, 0.0, 5.0),
        _ => 0.3,
    };
    let sector = profile.sector.as_deref().unwrap_or("Unknown");
    let industry = profile.industry.as_deref().unwrap_or("Unknown");

    CompanyAssumptions {
        company_name: profile
            .company_name
            .clone()
            .unwrap_or_else(|| profile.ticker.to_uppercase()),
        beta: cost.beta,
        risk_free_rate: cost.risk_free_rate,
        equity_risk_premium: cost.equity_risk_premium,
        cost_of_debt_pretax: cost.cost_of_debt_pretax,
        tax_rate: cost.tax_rate.rate,
        debt_to_equity,
        terminal_growth: sector_terminal_growth(profile.sector.as_deref()),
        market_cap: profile.market_cap,
        total_debt: profile.total_debt,
        profile: format!("{} / {}", sector, industry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_table_lookup() {
        let table = StaticAssumptionTable;
        assert_eq!(table.tickers(), vec!["AAPL", "TSLA", "KO", "MSFT", "GOOGL"]);
        let ko = table.lookup("ko").unwrap();
        assert_eq!(ko.company_name, "The Coca-Cola Company");
        assert_eq!(ko.terminal_growth, 0.025);
        assert!(table.lookup("NVDA").is_none());
    }

    #[test]
    fn test_wacc_from_assumptions_aapl() {
        let aapl = StaticAssumptionTable.lookup("AAPL").unwrap();
        let (wacc, b) = wacc_from_assumptions(&aapl);
        let coe = 0.045 + 1.25 * 0.055;
        let cod = 0.035 * 0.85;
        let expected = (coe + 1.57 * cod) / 2.57;
        assert!((b.cost_of_equity - coe).abs() < 1e-12);
        assert!((wacc - expected).abs() < 1e-12);
        assert!((b.equity_weight + b.debt_weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_wacc_from_assumptions_is_clamped() {
        let tsla = StaticAssumptionTable.lookup("TSLA").unwrap();
        let (wacc, b) = wacc_from_assumptions(&tsla);
        assert!(b.cost_of_equity > 0.15);
        assert!(wacc <= 0.15);
    }

    #[test]
    fn test_sector_terminal_growth() {
        assert_eq!(sector_terminal_growth(Some("Utilities")), 0.025);
        assert_eq!(sector_terminal_growth(Some("Consumer Defensive")), 0.025);
        assert_eq!(sector_terminal_growth(Some("Technology")), 0.035);
        assert_eq!(sector_terminal_growth(Some("Financial Services")), 0.03);
        assert_eq!(sector_terminal_growth(None), 0.03);
    }
}
