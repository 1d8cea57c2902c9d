//! Financial Modeling Prep enrichment: fills market cap, share count, price,
//! debt and cash when the primary provider left them empty.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use valuation_core::numeric::{coerce_number, safe_number};
use valuation_core::{CompanyProfile, EnrichmentProvider, ValuationError};

use crate::rate_limiter::{send_with_retry, RateLimiter};

const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
const RETRY_WAIT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct FmpClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl FmpClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::per_minute(250),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ValuationError> {
        let url = format!("{}/{}", BASE_URL, path);
        let response = send_with_retry(
            &self.client,
            &self.rate_limiter,
            self.client
                .get(&url)
                .query(query)
                .query(&[("apikey", self.api_key.as_str())]),
            "FMP",
            RETRY_WAIT,
        )
        .await?;

        if !response.status().is_success() {
            return Err(ValuationError::DataProvider(format!(
                "FMP returned {} for {}",
                response.status(),
                path
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ValuationError::DataProvider(format!("invalid FMP payload: {}", e)))
    }
}

fn first_record(json: &Value) -> Option<&Value> {
    json.as_array()?.first()
}

fn number(record: &Value, key: &str) -> Option<f64> {
    coerce_number(record.get(key)?).filter(|x| x.is_finite())
}

fn nonzero(record: &Value, key: &str) -> Option<f64> {
    number(record, key).filter(|x| *x != 0.0)
}

/// Market cap and share count from `/profile`.
pub fn parse_profile(json: &Value) -> CompanyProfile {
    let mut patch = CompanyProfile::default();
    if let Some(p) = first_record(json) {
        patch.market_cap = number(p, "mktCap");
        patch.shares_outstanding = number(p, "sharesOutstanding");
    }
    patch
}

/// Current price from `/quote`.
pub fn parse_quote(json: &Value) -> CompanyProfile {
    let mut patch = CompanyProfile::default();
    if let Some(q) = first_record(json) {
        patch.current_price = number(q, "price");
    }
    patch
}

/// Debt and cash from the latest quarterly balance sheet. Total debt falls
/// back to short plus long-term debt; zero cash counts as unknown.
pub fn parse_balance_sheet(json: &Value) -> CompanyProfile {
    let mut patch = CompanyProfile::default();
    if let Some(bs) = first_record(json) {
        patch.total_debt = nonzero(bs, "totalDebt")
            .or_else(|| Some(safe_number(bs.get("shortTermDebt"), 0.0) + safe_number(bs.get("longTermDebt"), 0.0)));
        let cash_like =
            safe_number(bs.get("cashAndCashEquivalents"), 0.0) + safe_number(bs.get("shortTermInvestments"), 0.0);
        patch.total_cash = Some(cash_like).filter(|c| *c != 0.0);
    }
    patch
}

#[async_trait]
impl EnrichmentProvider for FmpClient {
    async fn enrich(&self, ticker: &str, profile: &mut CompanyProfile) -> Result<(), ValuationError> {
        let symbol = ticker.to_uppercase();
        let profile_path = format!("profile/{}", symbol);
        let quote_path = format!("quote/{}", symbol);
        let balance_path = format!("balance-sheet-statement/{}", symbol);
        let (prof, quote, balance) = tokio::join!(
            self.get(&profile_path, &[]),
            self.get(&quote_path, &[]),
            self.get(&balance_path, &[("period", "quarter"), ("limit", "2")]),
        );

        let mut fetched = 0;
        for (name, result, parse) in [
            ("profile", prof, parse_profile as fn(&Value) -> CompanyProfile),
            ("quote", quote, parse_quote),
            ("balance sheet", balance, parse_balance_sheet),
        ] {
            match result {
                Ok(json) => {
                    profile.fill_missing(&parse(&json));
                    fetched += 1;
                }
                Err(e) => tracing::warn!(ticker = %symbol, error = %e, "FMP {} unavailable", name),
            }
        }

        if fetched == 0 {
            return Err(ValuationError::DataProvider(format!(
                "FMP enrichment failed for {}",
                symbol
            )));
        }
        tracing::debug!(ticker = %symbol, endpoints = fetched, "Enriched profile from FMP");
        Ok(())
    }
}
