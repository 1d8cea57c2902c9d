//! Market-data adapters that feed the valuation engine.

pub mod fmp;
pub mod memory;
pub mod rate_limiter;
pub mod yahoo;

pub use fmp::FmpClient;
pub use memory::InMemoryProvider;
pub use rate_limiter::RateLimiter;
pub use yahoo::YahooFinanceClient;
