//! Coinbase REST adapter - last-resort fallback source
//!
//! GET /v2/prices/{pair}/spot returns only a spot amount; no 24h figure
//! exists at this endpoint, so quotes from here carry `change_24h: None`.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::SourceError;
use crate::sources::PriceProvider;
use crate::types::{InstrumentSpec, PriceQuote};

const SOURCE: &str = "coinbase";
const DEFAULT_BASE_URL: &str = "https://api.coinbase.com";

#[derive(Debug, Clone)]
pub struct CoinbaseSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotData,
}

#[derive(Debug, Deserialize)]
struct SpotData {
    amount: Decimal,
}

impl CoinbaseSource {
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
impl PriceProvider for CoinbaseSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, spec: &InstrumentSpec) -> Result<PriceQuote, SourceError> {
        let product = spec
            .coinbase_product
            .ok_or_else(|| SourceError::Unsupported {
                provider: SOURCE,
                instrument: spec.id.clone(),
            })?;

        let url = format!(
            "{}/v2/prices/{}/spot",
            self.base_url.trim_end_matches('/'),
            product
        );

        let response = self
            .client
            .get(&url)
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

        let spot: SpotResponse = response.json().await.map_err(|_| SourceError::Malformed {
            provider: SOURCE,
            instrument: spec.id.clone(),
        })?;

        Ok(PriceQuote {
            instrument: spec.id.clone(),
            price: spot.data.amount,
            // Spot endpoint has no 24h figure; absent, not zero
            change_24h: None,
            observed_at: chrono::Utc::now(),
            source: SOURCE,
        })
    }
}
