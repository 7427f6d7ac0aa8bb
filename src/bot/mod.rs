//! Bot facade - the entry points the transport layer calls
//!
//! The webhook/command layer lives outside this crate; it hands over a
//! pre-parsed token (and for alerts a comparator/threshold pair) and gets
//! back typed results it can render however the chat platform needs.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::alerts::AlertStore;
use crate::error::{BotError, LookupError};
use crate::quotes::QuoteService;
use crate::symbols::SymbolResolver;
use crate::types::{AlertRule, Comparator, OwnerId, PriceQuote};

pub struct PriceBot {
    resolver: Arc<SymbolResolver>,
    quotes: QuoteService,
    store: Arc<dyn AlertStore>,
}

impl PriceBot {
    pub fn new(
        resolver: Arc<SymbolResolver>,
        quotes: QuoteService,
        store: Arc<dyn AlertStore>,
    ) -> Self {
        Self {
            resolver,
            quotes,
            store,
        }
    }

    /// Resolve a user token to a current quote.
    pub async fn lookup(&self, raw_token: &str) -> Result<PriceQuote, LookupError> {
        let spec = self.resolver.resolve(raw_token)?;
        self.quotes.get_or_resolve(&spec).await
    }

    /// Register a standing one-shot alert for an owner.
    pub async fn register_alert(
        &self,
        owner: OwnerId,
        raw_token: &str,
        comparator: Comparator,
        threshold: Decimal,
    ) -> Result<AlertRule, BotError> {
        let spec = self.resolver.resolve(raw_token)?;
        let rule = AlertRule::new(owner, spec.id.clone(), comparator, threshold);

        self.store.insert(rule.clone()).await?;
        tracing::info!(
            rule = %rule.id,
            owner = %rule.owner,
            instrument = %rule.instrument,
            comparator = %rule.comparator,
            threshold = %rule.threshold,
            "Alert registered"
        );
        Ok(rule)
    }

    /// List an owner's standing alerts (the bot's "myalert" command).
    pub async fn alerts_for(&self, owner: &OwnerId) -> Result<Vec<AlertRule>, BotError> {
        Ok(self.store.list_by_owner(owner).await?)
    }

    /// Remove all of an owner's alerts; returns how many were removed.
    pub async fn clear_alerts(&self, owner: &OwnerId) -> Result<usize, BotError> {
        Ok(self.store.delete_by_owner(owner).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::MemoryAlertStore;
    use crate::sources::testing::{policy, ScriptedProvider};
    use crate::sources::{PriceProvider, SourceChain};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn bot_with(provider: Arc<ScriptedProvider>) -> PriceBot {
        let chain =
            SourceChain::new().with_source(provider as Arc<dyn PriceProvider>, policy(0));
        PriceBot::new(
            Arc::new(SymbolResolver::new()),
            QuoteService::new(chain, Duration::from_secs(45)),
            Arc::new(MemoryAlertStore::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_aliases_share_one_cache_entry() {
        let provider = Arc::new(ScriptedProvider::new("primary", [Ok(dec!(68000))]));
        let bot = bot_with(Arc::clone(&provider));

        let a = bot.lookup("btc").await.unwrap();
        let b = bot.lookup(" BITCOIN ").await.unwrap();

        assert_eq!(a.instrument, b.instrument);
        assert_eq!(a.price, b.price);
        // Second alias hit the cache entry written by the first
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_unknown_symbol_never_touches_upstream() {
        let provider = Arc::new(ScriptedProvider::new("primary", [Ok(dec!(1))]));
        let bot = bot_with(Arc::clone(&provider));

        let err = bot.lookup("not-a-thing").await.unwrap_err();

        assert!(matches!(err, LookupError::UnknownSymbol { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_alert_resolves_token_to_canonical_instrument() {
        let provider = Arc::new(ScriptedProvider::new("primary", [Ok(dec!(1))]));
        let bot = bot_with(provider);
        let owner = OwnerId::new("u1");

        let rule = bot
            .register_alert(owner.clone(), "ทอง", Comparator::AtLeast, dec!(2500))
            .await
            .unwrap();

        assert_eq!(rule.instrument.as_str(), "tether-gold");
        let mine = bot.alerts_for(&owner).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, rule.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_alert_with_unknown_token_is_rejected() {
        let provider = Arc::new(ScriptedProvider::new("primary", [Ok(dec!(1))]));
        let bot = bot_with(provider);

        let err = bot
            .register_alert(
                OwnerId::new("u1"),
                "mystery-coin",
                Comparator::AtLeast,
                dec!(1),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BotError::Lookup(LookupError::UnknownSymbol { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_alerts_removes_only_that_owner() {
        let provider = Arc::new(ScriptedProvider::new("primary", [Ok(dec!(1))]));
        let bot = bot_with(provider);

        bot.register_alert(OwnerId::new("u1"), "btc", Comparator::AtLeast, dec!(1))
            .await
            .unwrap();
        bot.register_alert(OwnerId::new("u1"), "eth", Comparator::AtMost, dec!(2))
            .await
            .unwrap();
        bot.register_alert(OwnerId::new("u2"), "btc", Comparator::AtLeast, dec!(3))
            .await
            .unwrap();

        let removed = bot.clear_alerts(&OwnerId::new("u1")).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(bot.alerts_for(&OwnerId::new("u2")).await.unwrap().len(), 1);
    }
}
