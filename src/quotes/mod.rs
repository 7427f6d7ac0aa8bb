//! Quote service - TTL cache and request coalescing over the source chain
//!
//! Both lookup traffic and the alert scheduler come through here. For any
//! instrument there is at most one in-flight chain resolution at a time:
//! concurrent callers clone one shared future and all observe the same
//! outcome. Failures are delivered to every waiter and are never cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::error::LookupError;
use crate::sources::SourceChain;
use crate::types::{InstrumentId, InstrumentSpec, PriceQuote};

type SharedResolution = Shared<BoxFuture<'static, Result<PriceQuote, LookupError>>>;

struct CacheEntry {
    quote: PriceQuote,
    expires_at: Instant,
}

#[derive(Default)]
struct State {
    cache: HashMap<InstrumentId, CacheEntry>,
    pending: HashMap<InstrumentId, SharedResolution>,
}

struct Inner {
    chain: SourceChain,
    ttl: Duration,
    state: tokio::sync::Mutex<State>,
}

/// Shared quote resolution service. Cheap to clone; clones share one cache
/// and one pending map.
#[derive(Clone)]
pub struct QuoteService {
    inner: Arc<Inner>,
}

impl QuoteService {
    pub fn new(chain: SourceChain, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                chain,
                ttl,
                state: tokio::sync::Mutex::new(State::default()),
            }),
        }
    }

    /// Return a fresh cached quote, join an in-flight resolution, or start
    /// a new one. The cache check, pending check, and pending insertion all
    /// happen under one lock acquisition, so no two callers can start a
    /// resolution for the same instrument.
    pub async fn get_or_resolve(
        &self,
        spec: &Arc<InstrumentSpec>,
    ) -> Result<PriceQuote, LookupError> {
        let resolution = {
            let mut state = self.inner.state.lock().await;

            if let Some(entry) = state.cache.get(&spec.id) {
                if Instant::now() < entry.expires_at {
                    tracing::debug!(instrument = %spec.id, "Cache hit");
                    return Ok(entry.quote.clone());
                }
            }

            if let Some(pending) = state.pending.get(&spec.id) {
                tracing::debug!(instrument = %spec.id, "Joining in-flight resolution");
                pending.clone()
            } else {
                let resolution = Self::resolution(Arc::clone(&self.inner), Arc::clone(spec));
                state.pending.insert(spec.id.clone(), resolution.clone());
                resolution
            }
        };

        resolution.await
    }

    /// The single upstream round trip for one instrument. Removes itself
    /// from the pending map on completion, success or failure, before any
    /// waiter sees the outcome.
    fn resolution(inner: Arc<Inner>, spec: Arc<InstrumentSpec>) -> SharedResolution {
        async move {
            let outcome = inner.chain.fetch(&spec).await;

            let mut state = inner.state.lock().await;
            state.pending.remove(&spec.id);

            match outcome {
                Ok(quote) => {
                    state.cache.insert(
                        spec.id.clone(),
                        CacheEntry {
                            quote: quote.clone(),
                            expires_at: Instant::now() + inner.ttl,
                        },
                    );
                    Ok(quote)
                }
                Err(exhausted) => {
                    let sources: Vec<&str> = exhausted
                        .failures
                        .iter()
                        .map(|f| f.provider_name())
                        .collect();
                    tracing::warn!(
                        instrument = %exhausted.instrument,
                        failed_sources = ?sources,
                        "All sources exhausted, quote unavailable"
                    );
                    Err(LookupError::PriceUnavailable {
                        instrument: exhausted.instrument,
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    #[cfg(test)]
    pub(crate) async fn has_fresh(&self, id: &InstrumentId) -> bool {
        let state = self.inner.state.lock().await;
        state
            .cache
            .get(id)
            .map(|entry| Instant::now() < entry.expires_at)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::sources::testing::{policy, quote, test_spec, ScriptedProvider};
    use crate::sources::PriceProvider;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers after a delay, to hold a resolution in flight.
    struct DelayedProvider {
        delay: Duration,
        outcome: Result<Decimal, SourceError>,
        calls: AtomicUsize,
    }

    impl DelayedProvider {
        fn new(delay: Duration, outcome: Result<Decimal, SourceError>) -> Self {
            Self {
                delay,
                outcome,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceProvider for DelayedProvider {
        fn name(&self) -> &'static str {
            "delayed"
        }

        async fn fetch(
            &self,
            spec: &crate::types::InstrumentSpec,
        ) -> Result<PriceQuote, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone().map(|price| quote(spec, "delayed", price))
        }
    }

    fn service_with(provider: Arc<dyn PriceProvider>, ttl: Duration) -> QuoteService {
        let chain = SourceChain::new().with_source(provider, policy(0));
        QuoteService::new(chain, ttl)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_avoids_second_upstream_call() {
        let provider = Arc::new(ScriptedProvider::new("primary", [Ok(dec!(68000))]));
        let service = service_with(
            Arc::clone(&provider) as Arc<dyn PriceProvider>,
            Duration::from_secs(45),
        );
        let spec = Arc::new(test_spec());

        let first = service.get_or_resolve(&spec).await.unwrap();
        let second = service.get_or_resolve(&spec).await.unwrap();

        assert_eq!(first.price, second.price);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_treated_as_absent() {
        let provider = Arc::new(ScriptedProvider::new(
            "primary",
            [Ok(dec!(68000)), Ok(dec!(68500))],
        ));
        let service = service_with(
            Arc::clone(&provider) as Arc<dyn PriceProvider>,
            Duration::from_secs(45),
        );
        let spec = Arc::new(test_spec());

        service.get_or_resolve(&spec).await.unwrap();
        tokio::time::advance(Duration::from_secs(46)).await;
        let refreshed = service.get_or_resolve(&spec).await.unwrap();

        assert_eq!(refreshed.price, dec!(68500));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_coalesce_into_one_resolution() {
        let provider = Arc::new(DelayedProvider::new(
            Duration::from_millis(200),
            Ok(dec!(68000)),
        ));
        let service = service_with(
            Arc::clone(&provider) as Arc<dyn PriceProvider>,
            Duration::from_secs(45),
        );
        let spec = Arc::new(test_spec());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            let spec = Arc::clone(&spec);
            handles.push(tokio::spawn(
                async move { service.get_or_resolve(&spec).await },
            ));
        }

        for handle in handles {
            let quote = handle.await.unwrap().unwrap();
            assert_eq!(quote.price, dec!(68000));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_failure_reaches_all_waiters_and_is_not_cached() {
        let provider = Arc::new(DelayedProvider::new(
            Duration::from_millis(100),
            Err(SourceError::Http {
                provider: "delayed",
                status: 503,
            }),
        ));
        let service = service_with(
            Arc::clone(&provider) as Arc<dyn PriceProvider>,
            Duration::from_secs(45),
        );
        let spec = Arc::new(test_spec());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let service = service.clone();
            let spec = Arc::clone(&spec);
            handles.push(tokio::spawn(
                async move { service.get_or_resolve(&spec).await },
            ));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, LookupError::PriceUnavailable { .. }));
        }
        // One chain invocation for all three waiters, and no entry written
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(!service.has_fresh(&spec.id).await);

        // Next caller re-drives the chain instead of seeing a stale failure
        let err = service.get_or_resolve(&spec).await.unwrap_err();
        assert!(matches!(err, LookupError::PriceUnavailable { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_instruments_resolve_independently() {
        let provider = Arc::new(ScriptedProvider::new("primary", [Ok(dec!(1))]));
        let service = service_with(
            Arc::clone(&provider) as Arc<dyn PriceProvider>,
            Duration::from_secs(45),
        );

        let btc = Arc::new(test_spec());
        let eth = Arc::new(crate::types::InstrumentSpec {
            id: InstrumentId::new("ethereum"),
            display: "ETH",
            coingecko_id: "ethereum",
            binance_symbol: Some("ETHUSDT"),
            coinbase_product: Some("ETH-USD"),
            aliases: &["eth"],
        });

        service.get_or_resolve(&btc).await.unwrap();
        service.get_or_resolve(&eth).await.unwrap();

        // Disjoint cache keys: one upstream call each
        assert_eq!(provider.call_count(), 2);
        assert!(service.has_fresh(&btc.id).await);
        assert!(service.has_fresh(&eth.id).await);
    }
}
