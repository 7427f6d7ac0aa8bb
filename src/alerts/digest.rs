//! Digest broadcaster - periodic per-owner price summary
//!
//! On a slow cadence (hourly by default), every owner with standing rules
//! gets one message listing the current price of each instrument they
//! follow. Instruments that fail to resolve are omitted from the digest
//! rather than failing the broadcast.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::alerts::{resolve_referenced, AlertStore, Notifier};
use crate::error::StoreError;
use crate::quotes::QuoteService;
use crate::symbols::SymbolResolver;
use crate::types::{InstrumentId, InstrumentSpec, OwnerId, PriceQuote};

pub struct DigestBroadcaster {
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    quotes: QuoteService,
    resolver: Arc<SymbolResolver>,
    interval: Duration,
}

impl DigestBroadcaster {
    pub fn new(
        store: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
        quotes: QuoteService,
        resolver: Arc<SymbolResolver>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            quotes,
            resolver,
            interval,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Digest broadcaster started"
        );

        loop {
            ticker.tick().await;
            if let Err(err) = self.broadcast().await {
                tracing::warn!(error = %err, "Digest broadcast failed, retrying next interval");
            }
        }
    }

    /// One broadcast pass. Public so tests can drive it directly.
    pub async fn broadcast(&self) -> Result<(), StoreError> {
        let rules = self.store.list_all().await?;
        if rules.is_empty() {
            return Ok(());
        }

        // BTree maps keep message ordering stable across broadcasts
        let mut by_owner: BTreeMap<OwnerId, BTreeSet<InstrumentId>> = BTreeMap::new();
        for rule in &rules {
            by_owner
                .entry(rule.owner.clone())
                .or_default()
                .insert(rule.instrument.clone());
        }

        let resolved = resolve_referenced(&self.quotes, &self.resolver, &rules).await;

        for (owner, instruments) in by_owner {
            let lines: Vec<String> = instruments
                .iter()
                .filter_map(|id| resolved.get(id))
                .map(|(spec, quote)| digest_line(spec, quote))
                .collect();

            if lines.is_empty() {
                continue;
            }

            let text = format!("📊 Latest prices\n{}", lines.join("\n"));
            self.notifier.send(&owner, &text).await;
        }

        Ok(())
    }
}

fn digest_line(spec: &Arc<InstrumentSpec>, quote: &PriceQuote) -> String {
    match quote.change_24h {
        Some(change) => format!("{} ${} ({:.2}%)", spec.display, quote.price, change),
        None => format!("{} ${}", spec.display, quote.price),
    }
}
