//! Symbol resolution - maps user tokens to canonical instruments
//!
//! The alias table is static configuration built once at startup; resolution
//! is a pure lookup with no side effects and no network access. Aliases
//! include localized forms (the bot's user base types Thai) alongside the
//! usual tickers and full names.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::LookupError;
use crate::types::{InstrumentId, InstrumentSpec};

/// Built-in instrument catalog.
///
/// CoinGecko ids double as the canonical ids since every entry is quotable
/// there; the other per-source identifiers are filled in where the venue
/// lists the asset. Gold rides the tether-gold token, as the original bot
/// did, and is not listed on the exchange venues.
fn default_catalog() -> Vec<InstrumentSpec> {
    vec![
        InstrumentSpec {
            id: InstrumentId::new("bitcoin"),
            display: "BTC",
            coingecko_id: "bitcoin",
            binance_symbol: Some("BTCUSDT"),
            coinbase_product: Some("BTC-USD"),
            aliases: &["btc", "bitcoin", "xbt", "บิทคอยน์"],
        },
        InstrumentSpec {
            id: InstrumentId::new("ethereum"),
            display: "ETH",
            coingecko_id: "ethereum",
            binance_symbol: Some("ETHUSDT"),
            coinbase_product: Some("ETH-USD"),
            aliases: &["eth", "ethereum", "ether", "อีเธอเรียม"],
        },
        InstrumentSpec {
            id: InstrumentId::new("solana"),
            display: "SOL",
            coingecko_id: "solana",
            binance_symbol: Some("SOLUSDT"),
            coinbase_product: Some("SOL-USD"),
            aliases: &["sol", "solana"],
        },
        InstrumentSpec {
            id: InstrumentId::new("ripple"),
            display: "XRP",
            coingecko_id: "ripple",
            binance_symbol: Some("XRPUSDT"),
            coinbase_product: Some("XRP-USD"),
            aliases: &["xrp", "ripple"],
        },
        InstrumentSpec {
            id: InstrumentId::new("dogecoin"),
            display: "DOGE",
            coingecko_id: "dogecoin",
            binance_symbol: Some("DOGEUSDT"),
            coinbase_product: Some("DOGE-USD"),
            aliases: &["doge", "dogecoin"],
        },
        InstrumentSpec {
            id: InstrumentId::new("tether-gold"),
            display: "GOLD",
            coingecko_id: "tether-gold",
            binance_symbol: None,
            coinbase_product: None,
            aliases: &["gold", "xaut", "tether-gold", "ทอง", "ทองคำ"],
        },
    ]
}

/// Immutable alias → instrument lookup table.
pub struct SymbolResolver {
    by_alias: HashMap<String, Arc<InstrumentSpec>>,
    by_id: HashMap<InstrumentId, Arc<InstrumentSpec>>,
}

impl SymbolResolver {
    /// Build the resolver from the built-in catalog.
    pub fn new() -> Self {
        Self::from_catalog(default_catalog())
    }

    /// Build the resolver from an explicit catalog (tests inject their own).
    pub fn from_catalog(catalog: Vec<InstrumentSpec>) -> Self {
        let mut by_alias = HashMap::new();
        let mut by_id = HashMap::new();

        for spec in catalog {
            let spec = Arc::new(spec);
            by_id.insert(spec.id.clone(), Arc::clone(&spec));
            for alias in spec.aliases {
                by_alias.insert(normalize(alias), Arc::clone(&spec));
            }
        }

        Self { by_alias, by_id }
    }

    /// Resolve a raw user token to a catalog entry.
    pub fn resolve(&self, raw: &str) -> Result<Arc<InstrumentSpec>, LookupError> {
        self.by_alias
            .get(&normalize(raw))
            .cloned()
            .ok_or_else(|| LookupError::UnknownSymbol {
                token: raw.trim().to_string(),
            })
    }

    /// Look up a catalog entry by its canonical id (scheduler path).
    pub fn spec_of(&self, id: &InstrumentId) -> Option<Arc<InstrumentSpec>> {
        self.by_id.get(id).cloned()
    }
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-folding + trimming applied before every alias lookup.
fn normalize(token: &str) -> String {
    token.trim().to_lowercase()
}
