//! Core types used throughout PriceBot
//!
//! Defines the canonical instrument identity, price quotes, and alert rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Canonical identifier for one tradable asset.
///
/// Produced once by the symbol resolver; the sole key used by the cache,
/// the coalescer, and alert rules. Two aliases for the same asset map to
/// the same `InstrumentId` and therefore share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog record for one instrument: canonical identity plus the
/// source-specific identifiers each provider needs to quote it.
#[derive(Debug, Clone)]
pub struct InstrumentSpec {
    /// Canonical identifier (stable, opaque to callers)
    pub id: InstrumentId,
    /// Short display ticker (e.g. "BTC", "GOLD")
    pub display: &'static str,
    /// CoinGecko coin id (every catalog entry has one)
    pub coingecko_id: &'static str,
    /// Binance spot symbol, if listed there
    pub binance_symbol: Option<&'static str>,
    /// Coinbase currency pair, if listed there
    pub coinbase_product: Option<&'static str>,
    /// Textual aliases accepted from users, including localized forms
    pub aliases: &'static [&'static str],
}

/// A resolved price observation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Instrument this quote belongs to
    pub instrument: InstrumentId,
    /// Last traded price in USD
    pub price: Decimal,
    /// 24-hour change in percent; `None` when the source has no figure
    pub change_24h: Option<Decimal>,
    /// When the quote was observed
    pub observed_at: DateTime<Utc>,
    /// Name of the provider that produced it
    pub source: &'static str,
}

/// Threshold comparison for an alert rule. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// Fires once price >= threshold
    AtLeast,
    /// Fires once price <= threshold
    AtMost,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::AtLeast => write!(f, ">="),
            Comparator::AtMost => write!(f, "<="),
        }
    }
}

/// Identifier of the user that owns an alert rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One standing watch condition. One-shot: evaluated every scheduler tick
/// until satisfied, then notified exactly once and removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique rule id
    pub id: Uuid,
    /// Owning user
    pub owner: OwnerId,
    /// Instrument watched
    pub instrument: InstrumentId,
    /// Comparison direction
    pub comparator: Comparator,
    /// Threshold price in USD
    pub threshold: Decimal,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn new(
        owner: OwnerId,
        instrument: InstrumentId,
        comparator: Comparator,
        threshold: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            instrument,
            comparator,
            threshold,
            created_at: Utc::now(),
        }
    }

    /// Inclusive on both sides: a price exactly equal to the threshold
    /// satisfies either comparator.
    pub fn is_satisfied_by(&self, price: Decimal) -> bool {
        match self.comparator {
            Comparator::AtLeast => price >= self.threshold,
            Comparator::AtMost => price <= self.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rule(comparator: Comparator, threshold: Decimal) -> AlertRule {
        AlertRule::new(
            OwnerId::new("u1"),
            InstrumentId::new("bitcoin"),
            comparator,
            threshold,
        )
    }

    #[test]
    fn test_at_least_is_inclusive() {
        let r = rule(Comparator::AtLeast, dec!(70000));
        assert!(!r.is_satisfied_by(dec!(69999.99)));
        assert!(r.is_satisfied_by(dec!(70000)));
        assert!(r.is_satisfied_by(dec!(70001)));
    }

    #[test]
    fn test_at_most_is_inclusive() {
        let r = rule(Comparator::AtMost, dec!(2500));
        assert!(r.is_satisfied_by(dec!(2500)));
        assert!(r.is_satisfied_by(dec!(2400)));
        assert!(!r.is_satisfied_by(dec!(2500.01)));
    }
}
