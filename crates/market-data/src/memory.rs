use std::collections::HashMap;

use async_trait::async_trait;
use valuation_core::{
    CompanyProfile, EnrichmentProvider, FinancialStatementSet, MarketDataProvider, PricePoint, ValuationError,
};

/// Provider backed by hardcoded data. Serves offline runs and tests; also
/// usable as an enrichment source.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    profiles: HashMap<String, CompanyProfile>,
    statements: HashMap<String, FinancialStatementSet>,
    closes: HashMap<String, Vec<PricePoint>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: CompanyProfile) -> Self {
        self.profiles.insert(profile.ticker.to_uppercase(), profile);
        self
    }

    pub fn with_statements(mut self, ticker: &str, statements: FinancialStatementSet) -> Self {
        self.statements.insert(ticker.to_uppercase(), statements);
        self
    }

    /// Closes for a ticker, benchmark or yield index. Stored oldest first.
    pub fn with_closes(mut self, symbol: &str, mut closes: Vec<PricePoint>) -> Self {
        closes.sort_by_key(|p| p.timestamp);
        self.closes.insert(symbol.to_uppercase(), closes);
        self
    }

    fn missing(what: &str, symbol: &str) -> ValuationError {
        ValuationError::DataProvider(format!("no {} for {}", what, symbol))
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryProvider {
    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, ValuationError> {
        self.profiles
            .get(&ticker.to_uppercase())
            .cloned()
            .ok_or_else(|| Self::missing("company profile", ticker))
    }

    async fn statements(&self, ticker: &str) -> Result<FinancialStatementSet, ValuationError> {
        self.statements
            .get(&ticker.to_uppercase())
            .cloned()
            .ok_or_else(|| Self::missing("statements", ticker))
    }

    async fn weekly_closes(&self, symbol: &str) -> Result<Vec<PricePoint>, ValuationError> {
        self.closes
            .get(&symbol.to_uppercase())
            .cloned()
            .ok_or_else(|| Self::missing("price history", symbol))
    }

    async fn rate_quotes(&self, symbol: &str) -> Result<Vec<PricePoint>, ValuationError> {
        self.weekly_closes(symbol).await
    }
}

#[async_trait]
impl EnrichmentProvider for InMemoryProvider {
    async fn enrich(&self, ticker: &str, profile: &mut CompanyProfile) -> Result<(), ValuationError> {
        let stored = self
            .profiles
            .get(&ticker.to_uppercase())
            .ok_or_else(|| Self::missing("company profile", ticker))?;
        profile.fill_missing(stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let mut profile = CompanyProfile::new("msft");
        profile.market_cap = Some(3.0e12);
        let provider = InMemoryProvider::new().with_profile(profile);

        let found = provider.company_profile("Msft").await.unwrap();
        assert_eq!(found.market_cap, Some(3.0e12));
        assert!(matches!(
            provider.statements("MSFT").await,
            Err(ValuationError::DataProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_closes_are_sorted_oldest_first() {
        let later = PricePoint {
            timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            close: 2.0,
        };
        let earlier = PricePoint {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            close: 1.0,
        };
        let provider = InMemoryProvider::new().with_closes("^tnx", vec![later, earlier]);
        let quotes = provider.rate_quotes("^TNX").await.unwrap();
        assert_eq!(quotes[0].close, 1.0);
        assert_eq!(quotes[1].close, 2.0);
    }

    #[tokio::test]
    async fn test_enrich_fills_only_missing_fields() {
        let mut stored = CompanyProfile::new("KO");
        stored.market_cap = Some(2.5e11);
        stored.total_debt = Some(4.0e10);
        let provider = InMemoryProvider::new().with_profile(stored);

        let mut live = CompanyProfile::new("KO");
        live.total_debt = Some(3.9e10);
        provider.enrich("KO", &mut live).await.unwrap();
        assert_eq!(live.market_cap, Some(2.5e11));
        assert_eq!(live.total_debt, Some(3.9e10));
    }
}
