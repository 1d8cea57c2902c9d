//! Yahoo Finance adapter: company profile from quote summary, statements from
//! the fundamentals time series, closes from the chart endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde_json::Value;
use valuation_core::numeric::coerce_number;
use valuation_core::{
    CompanyProfile, FinancialStatementSet, MarketDataProvider, PeriodValue, PricePoint, StatementTable,
    ValuationError,
};

use crate::rate_limiter::{send_with_retry, RateLimiter};

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const TIMESERIES_URL: &str = "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";
const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

const SUMMARY_MODULES: &str = "price,summaryProfile,summaryDetail,financialData,defaultKeyStatistics";
const CACHE_TTL_SECS: i64 = 300;
const STATEMENT_HISTORY_YEARS: i64 = 6;
const RETRY_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Income,
    Balance,
    CashFlow,
}

/// Fundamentals time-series keys and the row labels they populate.
const SERIES: &[(&str, &str, Statement)] = &[
    ("TotalRevenue", "Total Revenue", Statement::Income),
    ("EBIT", "Ebit", Statement::Income),
    ("OperatingIncome", "Operating Income", Statement::Income),
    ("EBITDA", "Ebitda", Statement::Income),
    ("NetIncome", "Net Income", Statement::Income),
    ("InterestExpense", "Interest Expense", Statement::Income),
    ("TaxProvision", "Income Tax Expense", Statement::Income),
    ("PretaxIncome", "Income Before Tax", Statement::Income),
    ("TotalAssets", "Total Assets", Statement::Balance),
    ("TotalDebt", "Total Debt", Statement::Balance),
    ("CurrentAssets", "Total Current Assets", Statement::Balance),
    ("CurrentLiabilities", "Total Current Liabilities", Statement::Balance),
    ("CashAndCashEquivalents", "Cash And Cash Equivalents", Statement::Balance),
    (
        "CashCashEquivalentsAndShortTermInvestments",
        "Cash And Short Term Investments",
        Statement::Balance,
    ),
    ("OtherShortTermInvestments", "Short Term Investments", Statement::Balance),
    ("CurrentDebt", "Short Long Term Debt", Statement::Balance),
    ("DepreciationAndAmortization", "Depreciation & Amortization", Statement::CashFlow),
    ("CapitalExpenditure", "Capital Expenditures", Statement::CashFlow),
    ("FreeCashFlow", "Free Cash Flow", Statement::CashFlow),
    ("OperatingCashFlow", "Operating Cash Flow", Statement::CashFlow),
];

struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

fn cached<T: Clone>(cache: &DashMap<String, CacheEntry<T>>, key: &str) -> Option<T> {
    let entry = cache.get(key)?;
    let age = (Utc::now() - entry.cached_at).num_seconds();
    (age < CACHE_TTL_SECS).then(|| entry.data.clone())
}

fn store<T: Clone>(cache: &DashMap<String, CacheEntry<T>>, key: String, data: &T) {
    cache.insert(
        key,
        CacheEntry {
            data: data.clone(),
            cached_at: Utc::now(),
        },
    );
}

#[derive(Clone)]
pub struct YahooFinanceClient {
    client: Client,
    rate_limiter: RateLimiter,
    profiles: Arc<DashMap<String, CacheEntry<CompanyProfile>>>,
    statements: Arc<DashMap<String, CacheEntry<FinancialStatementSet>>>,
    closes: Arc<DashMap<String, CacheEntry<Vec<PricePoint>>>>,
}

impl YahooFinanceClient {
    /// Client allowing `requests_per_minute` calls to Yahoo.
    pub fn new(requests_per_minute: usize) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            rate_limiter: RateLimiter::per_minute(requests_per_minute),
            profiles: Arc::new(DashMap::new()),
            statements: Arc::new(DashMap::new()),
            closes: Arc::new(DashMap::new()),
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ValuationError> {
        let response = send_with_retry(
            &self.client,
            &self.rate_limiter,
            self.client.get(url).query(query),
            "Yahoo Finance",
            RETRY_WAIT,
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValuationError::DataProvider(format!(
                "Yahoo Finance returned {} for {}",
                status, url
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ValuationError::DataProvider(format!("invalid Yahoo Finance payload: {}", e)))
    }

    async fn chart(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<PricePoint>, ValuationError> {
        let key = format!("{}:{}:{}", symbol, range, interval);
        if let Some(hit) = cached(&self.closes, &key) {
            return Ok(hit);
        }

        let url = format!("{}/{}", CHART_URL, symbol);
        let json = self
            .get_json(
                &url,
                &[("range", range.to_string()), ("interval", interval.to_string())],
            )
            .await?;
        let closes = parse_chart(&json)?;
        tracing::debug!(symbol, points = closes.len(), range, interval, "Fetched chart closes");

        store(&self.closes, key, &closes);
        Ok(closes)
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, ValuationError> {
        if let Some(hit) = cached(&self.profiles, ticker) {
            return Ok(hit);
        }

        let url = format!("{}/{}", QUOTE_SUMMARY_URL, ticker);
        let json = self.get_json(&url, &[("modules", SUMMARY_MODULES.to_string())]).await?;
        let profile = parse_quote_summary(ticker, &json)?;

        store(&self.profiles, ticker.to_string(), &profile);
        Ok(profile)
    }

    async fn statements(&self, ticker: &str) -> Result<FinancialStatementSet, ValuationError> {
        if let Some(hit) = cached(&self.statements, ticker) {
            return Ok(hit);
        }

        let types = SERIES
            .iter()
            .flat_map(|(key, _, _)| [format!("annual{}", key), format!("quarterly{}", key)])
            .collect::<Vec<_>>()
            .join(",");
        let now = Utc::now();
        let start = now - chrono::Duration::days(365 * STATEMENT_HISTORY_YEARS);

        let url = format!("{}/{}", TIMESERIES_URL, ticker);
        let json = self
            .get_json(
                &url,
                &[
                    ("type", types),
                    ("period1", start.timestamp().to_string()),
                    ("period2", now.timestamp().to_string()),
                ],
            )
            .await?;
        let statements = parse_timeseries(&json);
        if statements.is_empty() {
            return Err(ValuationError::DataProvider(format!(
                "no financial statements returned for {}",
                ticker
            )));
        }

        store(&self.statements, ticker.to_string(), &statements);
        Ok(statements)
    }

    async fn weekly_closes(&self, symbol: &str) -> Result<Vec<PricePoint>, ValuationError> {
        self.chart(symbol, "2y", "1wk").await
    }

    async fn rate_quotes(&self, symbol: &str) -> Result<Vec<PricePoint>, ValuationError> {
        self.chart(symbol, "5d", "1d").await
    }
}

/// Number at `key`, unwrapping Yahoo's `{raw, fmt}` objects.
fn raw(module: Option<&Value>, key: &str) -> Option<f64> {
    let v = module?.get(key)?;
    let v = v.get("raw").unwrap_or(v);
    coerce_number(v).filter(|x| x.is_finite())
}

fn text(module: Option<&Value>, key: &str) -> Option<String> {
    module?
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn parse_quote_summary(ticker: &str, json: &Value) -> Result<CompanyProfile, ValuationError> {
    let summary = &json["quoteSummary"];
    if let Some(description) = summary["error"]["description"].as_str() {
        return Err(ValuationError::DataProvider(format!(
            "quote summary for {}: {}",
            ticker, description
        )));
    }
    let result = summary["result"]
        .as_array()
        .and_then(|r| r.first())
        .ok_or_else(|| ValuationError::DataProvider(format!("no quote summary for {}", ticker)))?;

    let price = result.get("price");
    let profile_module = result.get("summaryProfile");
    let detail = result.get("summaryDetail");
    let financial = result.get("financialData");
    let stats = result.get("defaultKeyStatistics");

    Ok(CompanyProfile {
        ticker: ticker.to_uppercase(),
        company_name: text(price, "longName").or_else(|| text(price, "shortName")),
        sector: text(profile_module, "sector"),
        industry: text(profile_module, "industry"),
        currency: text(price, "currency").or_else(|| text(financial, "financialCurrency")),
        market_cap: raw(price, "marketCap").or_else(|| raw(detail, "marketCap")),
        total_debt: raw(financial, "totalDebt"),
        total_cash: raw(financial, "totalCash"),
        shares_outstanding: raw(stats, "sharesOutstanding"),
        current_price: raw(financial, "currentPrice").or_else(|| raw(price, "regularMarketPrice")),
        trailing_eps: raw(stats, "trailingEps"),
        beta: raw(detail, "beta").or_else(|| raw(stats, "beta")),
        operating_margin: raw(financial, "operatingMargins"),
        free_cashflow: raw(financial, "freeCashflow"),
        operating_cashflow: raw(financial, "operatingCashflow"),
    })
}

/// Build statement tables from a fundamentals time-series payload. Unknown
/// series are ignored.
pub fn parse_timeseries(json: &Value) -> FinancialStatementSet {
    let mut set = FinancialStatementSet::default();
    let Some(results) = json["timeseries"]["result"].as_array() else {
        return set;
    };

    for result in results {
        let Some(type_name) = result["meta"]["type"].as_array().and_then(|t| t.first()).and_then(Value::as_str)
        else {
            continue;
        };
        let (annual, key) = if let Some(key) = type_name.strip_prefix("annual") {
            (true, key)
        } else if let Some(key) = type_name.strip_prefix("quarterly") {
            (false, key)
        } else {
            continue;
        };
        let Some((_, label, statement)) = SERIES.iter().find(|(k, _, _)| *k == key) else {
            continue;
        };
        let Some(points) = result[type_name].as_array() else {
            continue;
        };

        let series: Vec<PeriodValue> = points
            .iter()
            .filter(|p| !p.is_null())
            .filter_map(|p| {
                let period = NaiveDate::parse_from_str(p["asOfDate"].as_str()?, "%Y-%m-%d").ok()?;
                let value = coerce_number(&p["reportedValue"]["raw"]);
                Some(PeriodValue::new(period, value))
            })
            .collect();
        if series.is_empty() {
            continue;
        }

        table_for(&mut set, *statement, annual).insert(*label, series);
    }
    set
}

fn table_for(set: &mut FinancialStatementSet, statement: Statement, annual: bool) -> &mut StatementTable {
    match (statement, annual) {
        (Statement::Income, true) => &mut set.income_annual,
        (Statement::Income, false) => &mut set.income_quarterly,
        (Statement::Balance, true) => &mut set.balance_annual,
        (Statement::Balance, false) => &mut set.balance_quarterly,
        (Statement::CashFlow, true) => &mut set.cashflow_annual,
        (Statement::CashFlow, false) => &mut set.cashflow_quarterly,
    }
}

/// Closes from a chart payload, oldest first, skipping null bars.
pub fn parse_chart(json: &Value) -> Result<Vec<PricePoint>, ValuationError> {
    let chart = &json["chart"];
    if let Some(description) = chart["error"]["description"].as_str() {
        return Err(ValuationError::DataProvider(format!("chart: {}", description)));
    }
    let result = chart["result"]
        .as_array()
        .and_then(|r| r.first())
        .ok_or_else(|| ValuationError::DataProvider("chart returned no result".to_string()))?;

    let timestamps = result["timestamp"].as_array().cloned().unwrap_or_default();
    let closes = result["indicators"]["quote"][0]["close"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let mut points: Vec<PricePoint> = timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let timestamp = DateTime::from_timestamp(ts.as_i64()?, 0)?;
            let close = close.as_f64().filter(|c| c.is_finite())?;
            Some(PricePoint { timestamp, close })
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}
