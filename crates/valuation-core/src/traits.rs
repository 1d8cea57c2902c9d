use async_trait::async_trait;

use crate::{CompanyAssumptions, CompanyProfile, FinancialStatementSet, PricePoint, ValuationError};

/// Source of statements, company metadata and price history.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, ValuationError>;

    async fn statements(&self, ticker: &str) -> Result<FinancialStatementSet, ValuationError>;

    /// Roughly two years of weekly closes, oldest first.
    async fn weekly_closes(&self, symbol: &str) -> Result<Vec<PricePoint>, ValuationError>;

    /// Recent closes of a yield index quoted in percent (e.g. 4.25 for 4.25%).
    async fn rate_quotes(&self, symbol: &str) -> Result<Vec<PricePoint>, ValuationError>;
}

/// Secondary provider used to fill profile fields the primary one left empty.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Fill unknown fields of `profile` in place. Known fields must be kept.
    async fn enrich(&self, ticker: &str, profile: &mut CompanyProfile) -> Result<(), ValuationError>;
}

/// Lookup of curated per-company assumptions.
pub trait AssumptionSource: Send + Sync {
    fn lookup(&self, ticker: &str) -> Option<CompanyAssumptions>;

    /// All tickers the source knows, in a stable order.
    fn tickers(&self) -> Vec<String>;
}
