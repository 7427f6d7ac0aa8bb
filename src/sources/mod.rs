//! Price sources - ordered fallback chain over unreliable upstreams
//!
//! Providers are tried strictly in priority order, never concurrently. Each
//! provider gets a per-attempt timeout and a bounded retry budget with fixed
//! backoff for retryable failures (rate limiting, transport blips); anything
//! else moves the chain to the next provider. The first success
//! short-circuits the rest of the chain.

mod binance;
mod coinbase;
mod coingecko;

pub use binance::BinanceSource;
pub use coinbase::CoinbaseSource;
pub use coingecko::CoinGeckoSource;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::config::SourceRetryConfig;
use crate::error::{AllSourcesExhausted, SourceError};
use crate::types::{InstrumentSpec, PriceQuote};

/// One price provider. Implementations normalize their own response shape
/// into the common `PriceQuote`; a provider with no 24h-change figure leaves
/// that field `None`, never zero.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider name for logs and quote attribution
    fn name(&self) -> &'static str;

    /// Fetch a quote for one instrument
    async fn fetch(&self, spec: &InstrumentSpec) -> Result<PriceQuote, SourceError>;
}

/// Retry/backoff policy applied to one provider in the chain.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Budget for a single attempt; an attempt past this is abandoned
    pub attempt_timeout: Duration,
    /// Retries allowed after the first attempt, retryable failures only
    pub max_retries: u32,
    /// Fixed delay between retries
    pub backoff: Duration,
}

impl From<&SourceRetryConfig> for RetryPolicy {
    fn from(cfg: &SourceRetryConfig) -> Self {
        Self {
            attempt_timeout: cfg.attempt_timeout(),
            max_retries: cfg.max_retries,
            backoff: cfg.backoff(),
        }
    }
}

struct ChainEntry {
    provider: Arc<dyn PriceProvider>,
    policy: RetryPolicy,
}

/// Ordered list of providers with per-provider retry policies.
///
/// The order is fixed configuration: it is set once at construction and the
/// fetch loop walks it as data, which keeps the fallback order testable with
/// injected fake providers.
pub struct SourceChain {
    entries: Vec<ChainEntry>,
}

impl SourceChain {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a provider at the lowest priority so far.
    pub fn with_source(mut self, provider: Arc<dyn PriceProvider>, policy: RetryPolicy) -> Self {
        self.entries.push(ChainEntry { provider, policy });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a quote, falling through the chain until one provider answers.
    pub async fn fetch(&self, spec: &InstrumentSpec) -> Result<PriceQuote, AllSourcesExhausted> {
        let mut failures = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let name = entry.provider.name();
            let mut attempt = 0u32;

            let terminal = loop {
                attempt += 1;
                let outcome = match timeout(entry.policy.attempt_timeout, entry.provider.fetch(spec))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(SourceError::Timeout {
                        provider: name,
                        timeout_ms: entry.policy.attempt_timeout.as_millis() as u64,
                    }),
                };

                match outcome {
                    Ok(quote) => {
                        tracing::debug!(
                            source = name,
                            instrument = %spec.id,
                            price = %quote.price,
                            attempt,
                            "Quote resolved"
                        );
                        return Ok(quote);
                    }
                    Err(err) if err.retryable() && attempt <= entry.policy.max_retries => {
                        tracing::debug!(
                            source = name,
                            instrument = %spec.id,
                            attempt,
                            error = %err,
                            "Retryable failure, backing off"
                        );
                        tokio::time::sleep(entry.policy.backoff).await;
                    }
                    Err(err) => break err,
                }
            };

            tracing::warn!(
                source = name,
                instrument = %spec.id,
                error = %terminal,
                "Source failed, falling through"
            );
            failures.push(terminal);
        }

        Err(AllSourcesExhausted {
            instrument: spec.id.clone(),
            failures,
        })
    }
}

impl Default for SourceChain {
    fn default() -> Self {
        Self::new()
    }
}
