//! Error taxonomy for the lookup and alert paths
//!
//! Transient upstream errors are recovered inside the source chain and never
//! reach callers; only total exhaustion surfaces, as `PriceUnavailable`.

use thiserror::Error;

use crate::types::InstrumentId;

/// Failures a single provider attempt can produce.
///
/// `retryable()` is the per-provider retry predicate: only conditions worth
/// burning retry budget on return true, everything else falls through to the
/// next provider immediately.
// The field is `provider`, not `source`: thiserror reserves that name for
// the error cause chain.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("{provider} rate limited the request")]
    RateLimited { provider: &'static str },

    #[error("{provider} attempt timed out after {timeout_ms}ms")]
    Timeout {
        provider: &'static str,
        timeout_ms: u64,
    },

    #[error("{provider} returned HTTP {status}")]
    Http { provider: &'static str, status: u16 },

    #[error("transport error talking to {provider}: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} response had no usable price for {instrument}")]
    Malformed {
        provider: &'static str,
        instrument: InstrumentId,
    },

    #[error("{provider} does not list {instrument}")]
    Unsupported {
        provider: &'static str,
        instrument: InstrumentId,
    },
}

impl SourceError {
    /// Name of the provider that produced this failure.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::RateLimited { provider }
            | Self::Timeout { provider, .. }
            | Self::Http { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Malformed { provider, .. }
            | Self::Unsupported { provider, .. } => provider,
        }
    }

    /// Whether the same provider is worth retrying after a backoff.
    /// Timeouts are not: the attempt was already given its full budget.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport { .. })
    }
}

/// Every provider in the chain terminally failed for this resolution.
#[derive(Debug, Clone, Error)]
#[error("all {} sources exhausted for {instrument}", .failures.len())]
pub struct AllSourcesExhausted {
    pub instrument: InstrumentId,
    /// Final failure recorded per provider, in chain order
    pub failures: Vec<SourceError>,
}

/// Failures surfaced to lookup callers.
///
/// `Clone` because the coalescer delivers one outcome to every waiter.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("unknown symbol '{token}'")]
    UnknownSymbol { token: String },

    #[error("no source could quote {instrument} right now")]
    PriceUnavailable { instrument: InstrumentId },
}

/// Alert store failures. The store is an external collaborator; the concrete
/// backend decides what goes in the message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alert store unavailable: {0}")]
    Unavailable(String),

    #[error("alert rule {0} not found")]
    NotFound(uuid::Uuid),
}

/// Failures from the bot facade: either side of registration can fail.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_error_names_its_provider_with_no_cause_chain() {
        let err = SourceError::RateLimited {
            provider: "coingecko",
        };

        assert_eq!(err.provider_name(), "coingecko");
        assert_eq!(err.to_string(), "coingecko rate limited the request");
        // The provider name is payload, not a wrapped cause
        assert!(err.source().is_none());
    }

    #[test]
    fn test_exhaustion_reports_failure_count() {
        let err = AllSourcesExhausted {
            instrument: InstrumentId::new("bitcoin"),
            failures: vec![
                SourceError::Http {
                    provider: "coingecko",
                    status: 502,
                },
                SourceError::Timeout {
                    provider: "binance",
                    timeout_ms: 2000,
                },
            ],
        };

        assert_eq!(err.to_string(), "all 2 sources exhausted for bitcoin");
    }
}
