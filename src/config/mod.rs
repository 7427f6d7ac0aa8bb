//! Configuration management for PriceBot
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub sources: SourcesConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Version tag for logging
    pub tag: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Hard ceiling on any single HTTP request in milliseconds.
    /// Per-attempt timeouts in `sources` are always shorter.
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Quote freshness window in seconds
    pub ttl_secs: u64,
}

/// Providers in priority order: CoinGecko first, then Binance, then Coinbase.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub coingecko: SourceRetryConfig,
    pub binance: SourceRetryConfig,
    pub coinbase: SourceRetryConfig,
}

/// Retry/backoff policy for one provider
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRetryConfig {
    /// Whether this provider participates in the chain
    pub enabled: bool,
    /// Per-attempt timeout in milliseconds
    pub attempt_timeout_ms: u64,
    /// Retries after the first attempt on retryable failures
    pub max_retries: u32,
    /// Fixed delay between retries in milliseconds
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Scheduler tick interval in seconds
    pub tick_interval_secs: u64,
    /// Periodic per-owner price digest
    pub digest: DigestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    pub enabled: bool,
    /// Digest broadcast interval in seconds
    pub interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("bot.tag", env!("CARGO_PKG_VERSION"))?
            // HTTP defaults
            .set_default("http.request_timeout_ms", 10_000)?
            // Cache defaults
            .set_default("cache.ttl_secs", 45)?
            // Source defaults (chain order is fixed: coingecko, binance, coinbase)
            .set_default("sources.coingecko.enabled", true)?
            .set_default("sources.coingecko.attempt_timeout_ms", 3_000)?
            .set_default("sources.coingecko.max_retries", 2)?
            .set_default("sources.coingecko.backoff_ms", 750)?
            .set_default("sources.binance.enabled", true)?
            .set_default("sources.binance.attempt_timeout_ms", 2_000)?
            .set_default("sources.binance.max_retries", 1)?
            .set_default("sources.binance.backoff_ms", 500)?
            .set_default("sources.coinbase.enabled", true)?
            .set_default("sources.coinbase.attempt_timeout_ms", 2_000)?
            .set_default("sources.coinbase.max_retries", 1)?
            .set_default("sources.coinbase.backoff_ms", 500)?
            // Alert defaults
            .set_default("alerts.tick_interval_secs", 60)?
            .set_default("alerts.digest.enabled", false)?
            .set_default("alerts.digest.interval_secs", 3_600)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (PRICEBOT_*)
            .add_source(Environment::with_prefix("PRICEBOT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config for startup logging
    pub fn digest(&self) -> String {
        format!(
            "bot={} ttl={}s tick={}s sources=[coingecko:{} binance:{} coinbase:{}]",
            self.bot.tag,
            self.cache.ttl_secs,
            self.alerts.tick_interval_secs,
            self.sources.coingecko.enabled,
            self.sources.binance.enabled,
            self.sources.coinbase.enabled,
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

impl SourceRetryConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
