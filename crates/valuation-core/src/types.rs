use std::collections::BTreeMap;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One reported figure for one fiscal period. `None` means the provider had no
/// usable number for that period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodValue {
    pub period: NaiveDate,
    pub value: Option<f64>,
}

impl PeriodValue {
    pub fn new(period: NaiveDate, value: Option<f64>) -> Self {
        Self { period, value }
    }
}

/// A single financial statement (income, balance sheet or cash flow) keyed by
/// line-item label. Every row is kept ordered most-recent-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    rows: BTreeMap<String, Vec<PeriodValue>>,
}

impl StatementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row. Periods are re-sorted newest first and
    /// non-finite values are stored as unknown.
    pub fn insert(&mut self, label: impl Into<String>, mut series: Vec<PeriodValue>) {
        for pv in series.iter_mut() {
            pv.value = pv.value.filter(|v| v.is_finite());
        }
        series.sort_by(|a, b| b.period.cmp(&a.period));
        self.rows.insert(label.into(), series);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_row(mut self, label: impl Into<String>, series: Vec<PeriodValue>) -> Self {
        self.insert(label, series);
        self
    }

    /// Insert a row from values ordered most-recent-first, stamping periods
    /// backwards from `latest` every `step_months` months.
    pub fn insert_values(
        &mut self,
        label: impl Into<String>,
        latest: NaiveDate,
        step_months: u32,
        values: &[Option<f64>],
    ) {
        let series = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let period = latest
                    .checked_sub_months(Months::new(step_months * i as u32))
                    .unwrap_or(latest);
                PeriodValue::new(period, *v)
            })
            .collect();
        self.insert(label, series);
    }

    pub fn row(&self, label: &str) -> Option<&[PeriodValue]> {
        self.rows.get(label).map(|r| r.as_slice())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Annual and quarterly statements for one ticker, as supplied by the market
/// data provider. Read-only for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatementSet {
    pub income_annual: StatementTable,
    pub income_quarterly: StatementTable,
    pub balance_annual: StatementTable,
    pub balance_quarterly: StatementTable,
    pub cashflow_annual: StatementTable,
    pub cashflow_quarterly: StatementTable,
}

impl FinancialStatementSet {
    pub fn is_empty(&self) -> bool {
        self.income_annual.is_empty()
            && self.income_quarterly.is_empty()
            && self.balance_annual.is_empty()
            && self.balance_quarterly.is_empty()
            && self.cashflow_annual.is_empty()
            && self.cashflow_quarterly.is_empty()
    }
}

/// Company metadata and point-in-time market figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub ticker: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub currency: Option<String>,
    pub market_cap: Option<f64>,
    pub total_debt: Option<f64>,
    pub total_cash: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub current_price: Option<f64>,
    pub trailing_eps: Option<f64>,
    pub beta: Option<f64>,
    pub operating_margin: Option<f64>,
    pub free_cashflow: Option<f64>,
    pub operating_cashflow: Option<f64>,
}

impl CompanyProfile {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into().to_uppercase(),
            ..Default::default()
        }
    }

    /// Fill every field that is still unknown from `other`. Known fields are
    /// never overwritten.
    pub fn fill_missing(&mut self, other: &CompanyProfile) {
        fn fill<T: Clone>(slot: &mut Option<T>, from: &Option<T>) {
            if slot.is_none() {
                *slot = from.clone();
            }
        }
        fill(&mut self.company_name, &other.company_name);
        fill(&mut self.sector, &other.sector);
        fill(&mut self.industry, &other.industry);
        fill(&mut self.currency, &other.currency);
        fill(&mut self.market_cap, &other.market_cap);
        fill(&mut self.total_debt, &other.total_debt);
        fill(&mut self.total_cash, &other.total_cash);
        fill(&mut self.shares_outstanding, &other.shares_outstanding);
        fill(&mut self.current_price, &other.current_price);
        fill(&mut self.trailing_eps, &other.trailing_eps);
        fill(&mut self.beta, &other.beta);
        fill(&mut self.operating_margin, &other.operating_margin);
        fill(&mut self.free_cashflow, &other.free_cashflow);
        fill(&mut self.operating_cashflow, &other.operating_cashflow);
    }
}

/// Weekly (or daily) closing price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// Figures that size the equity bridge and the capital weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapitalStructureInputs {
    pub market_cap: Option<f64>,
    pub total_debt: Option<f64>,
    pub cash_and_equivalents: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub beta: Option<f64>,
    pub sector: Option<String>,
}

/// Per-company valuation assumptions, either from the curated table or
/// derived from live data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyAssumptions {
    pub company_name: String,
    pub beta: f64,
    pub risk_free_rate: f64,
    pub equity_risk_premium: f64,
    pub cost_of_debt_pretax: f64,
    pub tax_rate: f64,
    pub debt_to_equity: f64,
    pub terminal_growth: f64,
    pub market_cap: Option<f64>,
    pub total_debt: Option<f64>,
    pub profile: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_insert_sorts_newest_first_and_drops_nan() {
        let mut table = StatementTable::new();
        table.insert(
            "Total Revenue",
            vec![
                PeriodValue::new(date(2022, 12, 31), Some(80.0)),
                PeriodValue::new(date(2024, 12, 31), Some(f64::NAN)),
                PeriodValue::new(date(2023, 12, 31), Some(90.0)),
            ],
        );
        let row = table.row("Total Revenue").unwrap();
        assert_eq!(row[0].period, date(2024, 12, 31));
        assert_eq!(row[0].value, None);
        assert_eq!(row[1].value, Some(90.0));
        assert_eq!(row[2].value, Some(80.0));
        assert!(table.row("EBIT").is_none());
    }

    #[test]
    fn test_insert_values_steps_back() {
        let mut table = StatementTable::new();
        table.insert_values("Interest Expense", date(2024, 9, 30), 3, &[Some(1.0), Some(2.0), None]);
        let row = table.row("Interest Expense").unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row[1].period, date(2024, 6, 30));
        assert_eq!(row[2].period, date(2024, 3, 30));
        assert_eq!(row[2].value, None);
    }

    #[test]
    fn test_profile_fill_missing_keeps_known() {
        let mut primary = CompanyProfile::new("aapl");
        primary.market_cap = Some(100.0);
        let mut secondary = CompanyProfile::new("AAPL");
        secondary.market_cap = Some(999.0);
        secondary.shares_outstanding = Some(10.0);

        primary.fill_missing(&secondary);
        assert_eq!(primary.ticker, "AAPL");
        assert_eq!(primary.market_cap, Some(100.0));
        assert_eq!(primary.shares_outstanding, Some(10.0));
    }
}
