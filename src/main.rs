//! PriceBot runner
//!
//! Wires the quote engine and background alert loops together. The chat
//! transport is a separate deployment concern; it consumes `PriceBot` from
//! the library crate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use pricebot::alerts::{AlertScheduler, AlertStore, DigestBroadcaster, LogNotifier, MemoryAlertStore, Notifier};
use pricebot::config::AppConfig;
use pricebot::quotes::QuoteService;
use pricebot::sources::{BinanceSource, CoinGeckoSource, CoinbaseSource, SourceChain};
use pricebot::symbols::SymbolResolver;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(config = %config.digest(), "PriceBot starting");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http.request_timeout_ms))
        .build()
        .context("Failed to create HTTP client")?;

    // Chain order is fixed: CoinGecko, then Binance, then Coinbase
    let mut chain = SourceChain::new();
    if config.sources.coingecko.enabled {
        chain = chain.with_source(
            Arc::new(CoinGeckoSource::new(client.clone())),
            (&config.sources.coingecko).into(),
        );
    }
    if config.sources.binance.enabled {
        chain = chain.with_source(
            Arc::new(BinanceSource::new(client.clone())),
            (&config.sources.binance).into(),
        );
    }
    if config.sources.coinbase.enabled {
        chain = chain.with_source(
            Arc::new(CoinbaseSource::new(client.clone())),
            (&config.sources.coinbase).into(),
        );
    }
    anyhow::ensure!(!chain.is_empty(), "No price sources enabled");

    let quotes = QuoteService::new(chain, Duration::from_secs(config.cache.ttl_secs));
    let resolver = Arc::new(SymbolResolver::new());
    let store: Arc<dyn AlertStore> = Arc::new(MemoryAlertStore::new());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let scheduler = AlertScheduler::new(
        Arc::clone(&store),
        Arc::clone(&notifier),
        quotes.clone(),
        Arc::clone(&resolver),
        Duration::from_secs(config.alerts.tick_interval_secs),
    );
    tokio::spawn(scheduler.run());

    if config.alerts.digest.enabled {
        let digest = DigestBroadcaster::new(
            store,
            notifier,
            quotes,
            resolver,
            Duration::from_secs(config.alerts.digest.interval_secs),
        );
        tokio::spawn(digest.run());
    }

    tracing::info!("✅ PriceBot running, Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");

    Ok(())
}
