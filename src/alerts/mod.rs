//! Alerts - standing one-shot watch conditions
//!
//! The store and notifier are external collaborators specified as traits;
//! an in-memory store ships here for default wiring and tests. Persistence
//! technology behind the trait is the embedding application's choice.

mod digest;
mod scheduler;

pub use digest::DigestBroadcaster;
pub use scheduler::AlertScheduler;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::quotes::QuoteService;
use crate::symbols::SymbolResolver;
use crate::types::{AlertRule, InstrumentId, InstrumentSpec, OwnerId, PriceQuote};

/// Persistence contract for standing alert rules. Per-call atomicity only;
/// no multi-row transactions are required of implementations.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert(&self, rule: AlertRule) -> Result<Uuid, StoreError>;
    async fn list_all(&self) -> Result<Vec<AlertRule>, StoreError>;
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<AlertRule>, StoreError>;
    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError>;
    async fn delete_by_owner(&self, owner: &OwnerId) -> Result<usize, StoreError>;
}

/// Delivery contract. Fire-and-forget: no acknowledgment is available to
/// the core, so implementations swallow their own transport errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, owner: &OwnerId, text: &str);
}

/// Notifier that only logs, used when no transport is wired up.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, owner: &OwnerId, text: &str) {
        tracing::info!(owner = %owner, text, "Notification dispatched");
    }
}

/// In-memory alert store.
#[derive(Default)]
pub struct MemoryAlertStore {
    rules: RwLock<Vec<AlertRule>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn insert(&self, rule: AlertRule) -> Result<Uuid, StoreError> {
        let id = rule.id;
        self.rules.write().await.push(rule);
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<AlertRule>, StoreError> {
        Ok(self.rules.read().await.clone())
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<AlertRule>, StoreError> {
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|r| &r.owner == owner)
            .cloned()
            .collect())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_by_owner(&self, owner: &OwnerId) -> Result<usize, StoreError> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| &r.owner != owner);
        Ok(before - rules.len())
    }
}

/// Resolve the distinct instruments referenced by a rule set, cache-first.
/// N rules on one instrument cost at most one upstream round trip; an
/// instrument that fails to resolve is simply absent from the result and
/// its rules stay pending until the next pass.
pub(crate) async fn resolve_referenced(
    quotes: &QuoteService,
    resolver: &SymbolResolver,
    rules: &[AlertRule],
) -> HashMap<InstrumentId, (Arc<InstrumentSpec>, PriceQuote)> {
    let distinct: BTreeSet<&InstrumentId> = rules.iter().map(|r| &r.instrument).collect();

    let mut resolved = HashMap::new();
    for id in distinct {
        let Some(spec) = resolver.spec_of(id) else {
            tracing::warn!(instrument = %id, "Rule references an instrument missing from the catalog");
            continue;
        };
        match quotes.get_or_resolve(&spec).await {
            Ok(quote) => {
                resolved.insert(id.clone(), (spec, quote));
            }
            Err(err) => {
                tracing::debug!(
                    instrument = %id,
                    error = %err,
                    "Instrument unresolved this pass, rules stay pending"
                );
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Comparator;
    use rust_decimal_macros::dec;

    fn rule(owner: &str, instrument: &str) -> AlertRule {
        AlertRule::new(
            OwnerId::new(owner),
            InstrumentId::new(instrument),
            Comparator::AtLeast,
            dec!(100),
        )
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = MemoryAlertStore::new();
        let r = rule("u1", "bitcoin");
        let id = store.insert(r.clone()).await.unwrap();

        assert_eq!(id, r.id);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_by_owner_is_scoped() {
        let store = MemoryAlertStore::new();
        store.insert(rule("u1", "bitcoin")).await.unwrap();
        store.insert(rule("u1", "ethereum")).await.unwrap();
        store.insert(rule("u2", "bitcoin")).await.unwrap();

        let mine = store.list_by_owner(&OwnerId::new("u1")).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|r| r.owner == OwnerId::new("u1")));
    }

    #[tokio::test]
    async fn test_delete_by_id_removes_exactly_one() {
        let store = MemoryAlertStore::new();
        let keep = rule("u1", "bitcoin");
        let gone = rule("u1", "ethereum");
        store.insert(keep.clone()).await.unwrap();
        store.insert(gone.clone()).await.unwrap();

        store.delete_by_id(gone.id).await.unwrap();

        let remaining = store.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);

        // Deleting again reports the absence
        assert!(matches!(
            store.delete_by_id(gone.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_by_owner_reports_count() {
        let store = MemoryAlertStore::new();
        store.insert(rule("u1", "bitcoin")).await.unwrap();
        store.insert(rule("u1", "ethereum")).await.unwrap();
        store.insert(rule("u2", "bitcoin")).await.unwrap();

        let removed = store.delete_by_owner(&OwnerId::new("u1")).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
