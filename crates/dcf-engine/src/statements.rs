//! Lookups over provider statements. Missing rows and missing periods are
//! reported as `None`, never as zero.

use valuation_core::{PeriodValue, StatementTable};

pub use valuation_core::numeric::{clean_for_output, safe_number};

/// Line-item labels, in lookup priority order.
pub mod labels {
    pub const TOTAL_REVENUE: &[&str] = &["Total Revenue"];
    pub const EBIT: &[&str] = &["Ebit", "Operating Income"];
    pub const EBITDA: &[&str] = &["Ebitda"];
    pub const NET_INCOME: &[&str] = &["Net Income"];
    pub const INTEREST_EXPENSE: &[&str] = &["Interest Expense"];
    pub const INCOME_TAX_EXPENSE: &[&str] = &["Income Tax Expense"];
    pub const INCOME_BEFORE_TAX: &[&str] = &["Income Before Tax"];

    pub const DEPRECIATION: &[&str] = &[
        "Depreciation",
        "Depreciation & Amortization",
        "Depreciation Amortization Depletion",
        "DepreciationAndAmortization",
    ];
    pub const CAPITAL_EXPENDITURES: &[&str] = &["Capital Expenditures"];
    pub const FREE_CASH_FLOW: &[&str] = &["Free Cash Flow"];
    pub const OPERATING_CASH_FLOW: &[&str] =
        &["Total Cash From Operating Activities", "Operating Cash Flow"];

    pub const TOTAL_ASSETS: &[&str] = &["Total Assets"];
    pub const TOTAL_DEBT: &[&str] = &["Total Debt"];
    pub const CURRENT_ASSETS: &[&str] = &["Total Current Assets"];
    pub const CURRENT_LIABILITIES: &[&str] = &["Total Current Liabilities"];
    pub const CASH: &[&str] = &["Cash And Cash Equivalents", "Cash"];
    pub const SHORT_TERM_DEBT: &[&str] = &["Short Long Term Debt", "Short/Current Long Term Debt"];
    pub const CASH_LIKE_COMPONENTS: &[&str] = &[
        "Cash And Short Term Investments",
        "Short Term Investments",
        "Marketable Securities",
    ];
}

/// The row for `label`, or `None` when the table is empty or lacks it.
pub fn row_by_label<'a>(table: &'a StatementTable, label: &str) -> Option<&'a [PeriodValue]> {
    if table.is_empty() {
        return None;
    }
    table.row(label)
}

/// The first row present among `labels`.
pub fn row_by_labels<'a>(table: &'a StatementTable, labels: &[&str]) -> Option<&'a [PeriodValue]> {
    labels.iter().find_map(|label| row_by_label(table, label))
}

/// Most recent known value of a row.
pub fn most_recent_value(series: &[PeriodValue]) -> Option<f64> {
    known(series).next()
}

/// Sum of the first `n` known values. `None` when no value is known.
pub fn trailing_sum(series: &[PeriodValue], n: usize) -> Option<f64> {
    let values: Vec<f64> = known(series).take(n).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum())
    }
}

/// Up to `max_n` known values, most recent first.
pub fn series_values(series: &[PeriodValue], max_n: usize) -> Vec<f64> {
    known(series).take(max_n).collect()
}

/// Latest known value under the first label that has one.
pub fn latest(table: &StatementTable, labels: &[&str]) -> Option<f64> {
    labels
        .iter()
        .filter_map(|label| row_by_label(table, label))
        .find_map(most_recent_value)
}

/// Trailing-four-quarter sum under the first label that yields one.
pub fn ttm(table: &StatementTable, labels: &[&str]) -> Option<f64> {
    labels
        .iter()
        .filter_map(|label| row_by_label(table, label))
        .find_map(|row| trailing_sum(row, 4))
}

/// Up to `max_n` known values of the first label with any.
pub fn recent_values(table: &StatementTable, labels: &[&str], max_n: usize) -> Vec<f64> {
    labels
        .iter()
        .filter_map(|label| row_by_label(table, label))
        .map(|row| series_values(row, max_n))
        .find(|values| !values.is_empty())
        .unwrap_or_default()
}

fn known(series: &[PeriodValue]) -> impl Iterator<Item = f64> + '_ {
    series.iter().filter_map(|pv| pv.value.filter(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn quarters(values: &[Option<f64>]) -> StatementTable {
        let mut table = StatementTable::new();
        let latest = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        table.insert_values("Operating Income", latest, 3, values);
        table
    }

    #[test]
    fn test_trailing_sum_skips_unknown() {
        let table = quarters(&[Some(10.0), None, Some(20.0), Some(30.0), Some(40.0)]);
        let row = row_by_label(&table, "Operating Income").unwrap();
        assert_eq!(trailing_sum(row, 4), Some(100.0));
        assert_eq!(trailing_sum(row, 2), Some(30.0));

        let empty = quarters(&[None, None]);
        let row = row_by_label(&empty, "Operating Income").unwrap();
        assert_eq!(trailing_sum(row, 4), None);
    }

    #[test]
    fn test_most_recent_value_and_series_values() {
        let table = quarters(&[None, Some(5.0), Some(6.0), Some(7.0)]);
        let row = row_by_label(&table, "Operating Income").unwrap();
        assert_eq!(most_recent_value(row), Some(5.0));
        assert_eq!(series_values(row, 2), vec![5.0, 6.0]);
        assert_eq!(series_values(row, 10), vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_label_fallback_order() {
        let table = quarters(&[Some(1.0), Some(1.0)]);
        assert!(row_by_label(&table, "Ebit").is_none());
        assert!(row_by_labels(&table, labels::EBIT).is_some());
        assert_eq!(ttm(&table, labels::EBIT), Some(2.0));
        assert_eq!(latest(&table, labels::EBIT), Some(1.0));
        assert_eq!(latest(&table, labels::TOTAL_DEBT), None);
    }

    #[test]
    fn test_ebit_label_without_values_falls_through() {
        let mut table = quarters(&[Some(3.0)]);
        let latest_q = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        table.insert_values("Ebit", latest_q, 3, &[None, None]);
        assert_eq!(ttm(&table, labels::EBIT), Some(3.0));
        assert_eq!(recent_values(&table, labels::EBIT, 5), vec![3.0]);
    }

    #[test]
    fn test_empty_table_is_absent() {
        let table = StatementTable::new();
        assert!(row_by_label(&table, "Total Revenue").is_none());
        assert!(recent_values(&table, labels::TOTAL_REVENUE, 5).is_empty());
    }
}
