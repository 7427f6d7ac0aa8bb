//! Binance REST adapter - exchange fallback source
//!
//! GET /api/v3/ticker/24hr returns prices as decimal strings. Binance
//! signals rate limiting with 429 and IP bans with 418; both are retryable
//! here. Instruments without a Binance listing (gold) fall through
//! immediately as unsupported.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::SourceError;
use crate::sources::PriceProvider;
use crate::types::{InstrumentSpec, PriceQuote};

const SOURCE: &str = "binance";
const DEFAULT_BASE_URL: &str = "https://api.binance.com";

#[derive(Debug, Clone)]
pub struct BinanceSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: Decimal,
    price_change_percent: Decimal,
}

impl BinanceSource {
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
impl PriceProvider for BinanceSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, spec: &InstrumentSpec) -> Result<PriceQuote, SourceError> {
        let symbol = spec.binance_symbol.ok_or_else(|| SourceError::Unsupported {
            provider: SOURCE,
            instrument: spec.id.clone(),
        })?;

        let url = format!(
            "{}/api/v3/ticker/24hr",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                provider: SOURCE,
                message: e.to_string(),
            })?;

        let status = response.status();
        // 418 is Binance's "banned for repeated 429s"
        if status.as_u16() == 429 || status.as_u16() == 418 {
            return Err(SourceError::RateLimited { provider: SOURCE });
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                provider: SOURCE,
                status: status.as_u16(),
            });
        }

        let ticker: Ticker24h = response.json().await.map_err(|_| SourceError::Malformed {
            provider: SOURCE,
            instrument: spec.id.clone(),
        })?;

        Ok(PriceQuote {
            instrument: spec.id.clone(),
            price: ticker.last_price,
            change_24h: Some(ticker.price_change_percent),
            observed_at: chrono::Utc::now(),
            source: SOURCE,
        })
    }
}
