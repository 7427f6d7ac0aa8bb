//! Alert scheduler - fixed-cadence evaluation of standing rules
//!
//! Each tick reads every pending rule, resolves the distinct instruments
//! they reference through the shared quote service, evaluates thresholds
//! inclusively, and for each newly satisfied rule dispatches one
//! notification and removes the rule. Ticks never overlap: a tick still
//! running when the next is due makes the scheduler skip ahead rather than
//! run two ticks concurrently, which is what keeps every rule one-shot.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::alerts::{resolve_referenced, AlertStore, Notifier};
use crate::error::StoreError;
use crate::quotes::QuoteService;
use crate::symbols::SymbolResolver;
use crate::types::{AlertRule, InstrumentSpec, PriceQuote};

pub struct AlertScheduler {
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    quotes: QuoteService,
    resolver: Arc<SymbolResolver>,
    tick_interval: Duration,
}

impl AlertScheduler {
    pub fn new(
        store: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
        quotes: QuoteService,
        resolver: Arc<SymbolResolver>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            quotes,
            resolver,
            tick_interval,
        }
    }

    /// Run the tick loop forever. Tick-level failures are logged and the
    /// loop continues; nothing here is fatal to the process.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.tick_interval.as_secs(),
            "Alert scheduler started"
        );

        loop {
            ticker.tick().await;
            if let Err(err) = self.tick().await {
                tracing::warn!(error = %err, "Alert tick failed, retrying next interval");
            }
        }
    }

    /// One evaluation pass. Public so tests can drive ticks directly.
    pub async fn tick(&self) -> Result<(), StoreError> {
        let rules = self.store.list_all().await?;
        if rules.is_empty() {
            return Ok(());
        }

        let resolved = resolve_referenced(&self.quotes, &self.resolver, &rules).await;

        for rule in rules {
            // Unresolved instrument: rule stays pending, not an error
            let Some((spec, quote)) = resolved.get(&rule.instrument) else {
                continue;
            };

            if !rule.is_satisfied_by(quote.price) {
                continue;
            }

            // Dispatch then delete, back to back. The tick body is
            // sequential and ticks never overlap, so the rule cannot be
            // seen as pending again after dispatch.
            self.notifier
                .send(&rule.owner, &trigger_message(&rule, spec, quote))
                .await;
            tracing::info!(
                rule = %rule.id,
                owner = %rule.owner,
                instrument = %rule.instrument,
                price = %quote.price,
                threshold = %rule.threshold,
                "🔔 Alert triggered"
            );

            if let Err(err) = self.store.delete_by_id(rule.id).await {
                tracing::error!(rule = %rule.id, error = %err, "Failed to remove triggered rule");
            }
        }

        Ok(())
    }
}

fn trigger_message(rule: &AlertRule, spec: &Arc<InstrumentSpec>, quote: &PriceQuote) -> String {
    format!(
        "{} is now ${}, your {} {} alert was hit",
        spec.display, quote.price, rule.comparator, rule.threshold
    )
}
