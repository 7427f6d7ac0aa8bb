//! CoinGecko REST adapter - primary price source
//!
//! GET /simple/price returns a body keyed by coin id, with the USD price and
//! an optional 24h change percentage. The free tier rate-limits aggressively
//! (HTTP 429), which is the retryable condition this chain was built around.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::SourceError;
use crate::sources::PriceProvider;
use crate::types::{InstrumentSpec, PriceQuote};

const SOURCE: &str = "coingecko";
const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SimplePriceEntry {
    usd: Decimal,
    /// Absent for assets CoinGecko has no 24h figure for
    usd_24h_change: Option<Decimal>,
}

impl CoinGeckoSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, spec: &InstrumentSpec) -> Result<PriceQuote, SourceError> {
        let url = format!("{}/simple/price", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[
                ("ids", spec.coingecko_id),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                provider: SOURCE,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited { provider: SOURCE });
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                provider: SOURCE,
                status: status.as_u16(),
            });
        }

        let body: HashMap<String, SimplePriceEntry> =
            response.json().await.map_err(|_| SourceError::Malformed {
                provider: SOURCE,
                instrument: spec.id.clone(),
            })?;

        let entry = body
            .get(spec.coingecko_id)
            .ok_or_else(|| SourceError::Malformed {
                provider: SOURCE,
                instrument: spec.id.clone(),
            })?;

        Ok(PriceQuote {
            instrument: spec.id.clone(),
            price: entry.usd,
            change_24h: entry.usd_24h_change,
            observed_at: chrono::Utc::now(),
            source: SOURCE,
        })
    }
}
