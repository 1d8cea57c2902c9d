use std::str::FromStr;

use anyhow::{Context, Result};
use dcf_engine::engine::{DEFAULT_BENCHMARK_SYMBOL, DEFAULT_RATE_SYMBOL};
use dcf_engine::ValuationPolicy;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Enables FMP enrichment when set.
    pub fmp_api_key: Option<String>,
    /// Ignore the curated assumption table.
    pub dynamic_only: bool,
    pub yahoo_rate_limit: usize,
    pub benchmark_symbol: String,
    pub rate_symbol: String,
    pub policy: ValuationPolicy,
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key)
        .map(|v| v.trim() == "1" || v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ValuationPolicy::default();
        let policy = ValuationPolicy {
            base_erp: parsed(&lookup, "DCF_BASE_ERP", defaults.base_erp)?,
            hist_beta_weight: parsed(&lookup, "DCF_HIST_BETA_WEIGHT", defaults.hist_beta_weight)?,
            fcff_growth_weight: parsed(&lookup, "DCF_FCFF_GROWTH_WEIGHT", defaults.fcff_growth_weight)?,
            wacc_beta_decay: parsed(&lookup, "DCF_WACC_BETA_DECAY", defaults.wacc_beta_decay)?,
            growth_decay: parsed(&lookup, "DCF_GROWTH_DECAY", defaults.growth_decay)?,
            mega_cap: parsed(&lookup, "DCF_MEGA_CAP", defaults.mega_cap)?,
            small_cap: parsed(&lookup, "DCF_SMALL_CAP", defaults.small_cap)?,
            sens_wacc_step: parsed(&lookup, "DCF_SENS_WACC_STEP", defaults.sens_wacc_step)?,
            sens_growth_step: parsed(&lookup, "DCF_SENS_GROWTH_STEP", defaults.sens_growth_step)?,
            ..defaults
        };
        policy.validate().context("invalid valuation policy")?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&lookup, "PORT", 3030)?,
            fmp_api_key: lookup("FMP_API_KEY").filter(|k| !k.trim().is_empty()),
            dynamic_only: flag(&lookup, "DCF_DYNAMIC_ONLY"),
            yahoo_rate_limit: parsed(&lookup, "YAHOO_RATE_LIMIT", 120)?,
            benchmark_symbol: lookup("DCF_BENCHMARK_SYMBOL").unwrap_or_else(|| DEFAULT_BENCHMARK_SYMBOL.to_string()),
            rate_symbol: lookup("DCF_RATE_SYMBOL").unwrap_or_else(|| DEFAULT_RATE_SYMBOL.to_string()),
            policy,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
