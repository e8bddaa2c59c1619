//! Reputation Registry: owns per-address reputation records. Behavior
//! updates, fraud penalties, and temporal decay all flow through here;
//! everyone else (gas policy, opcode policy, consensus validator) only
//! ever reads the resulting score and tier.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use shared::database::KvStore;
use shared::types::{ContractAddress, FraudSeverity, ReputationRecord};

use crate::error::{RegistryError, RegistryResult};

const KEY_PREFIX: &[u8] = b"reputation/";

fn record_key(address: &ContractAddress) -> Vec<u8> {
    let mut key = KEY_PREFIX.to_vec();
    key.extend_from_slice(address.as_bytes());
    key
}

/// A single observed behavior event, folded into the behavior sub-score.
/// Positive events (a settled honest vote, a successfully validated
/// transaction) push it up; negative events pull it down.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorEvent {
    pub delta: f64,
}

impl BehaviorEvent {
    pub fn positive(magnitude: f64) -> Self {
        Self { delta: magnitude.abs() }
    }

    pub fn negative(magnitude: f64) -> Self {
        Self { delta: -magnitude.abs() }
    }
}

/// Fraction of the behavior sub-score decayed away per day of inactivity.
/// Mirrors the reputation-service decay processor's per-day decay curve,
/// applied here to the behavior component only: web-of-trust, economic,
/// and temporal components are recomputed from their own inputs instead.
pub const DECAY_RATE_PER_DAY: f64 = 0.01;

pub struct ReputationRegistry {
    records: RwLock<HashMap<ContractAddress, ReputationRecord>>,
    store: Arc<dyn KvStore>,
}

impl ReputationRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            store,
        }
    }

    pub async fn register(&self, address: ContractAddress) -> RegistryResult<ReputationRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&address) {
            return Err(RegistryError::AlreadyRegistered);
        }

        let record = ReputationRecord::new(address);
        self.persist(&record).await?;
        records.insert(address, record.clone());
        Ok(record)
    }

    pub async fn get(&self, address: &ContractAddress) -> RegistryResult<ReputationRecord> {
        if let Some(record) = self.records.read().await.get(address) {
            return Ok(record.clone());
        }

        let key = record_key(address);
        let bytes = self.store.get(&key).await?.ok_or(RegistryError::NotFound)?;
        let record: ReputationRecord = serde_json::from_slice(&bytes)?;
        self.records.write().await.insert(*address, record.clone());
        Ok(record)
    }

    /// Get-or-register: most callers don't care whether an address has
    /// been seen before, they just want its current record.
    pub async fn get_or_register(&self, address: ContractAddress) -> RegistryResult<ReputationRecord> {
        match self.get(&address).await {
            Ok(record) => Ok(record),
            Err(RegistryError::NotFound) => self.register(address).await,
            Err(other) => Err(other),
        }
    }

    pub async fn record_behavior(
        &self,
        address: &ContractAddress,
        event: BehaviorEvent,
    ) -> RegistryResult<ReputationRecord> {
        let mut record = self.get(address).await?;
        record.score.behavior = (record.score.behavior + event.delta).clamp(0.0, 100.0);
        record.transaction_count += 1;
        record.last_seen = Utc::now();
        record.updated_at = Utc::now();
        self.store_updated(record).await
    }

    pub async fn set_web_of_trust(&self, address: &ContractAddress, value: f64) -> RegistryResult<ReputationRecord> {
        let mut record = self.get(address).await?;
        record.score.web_of_trust = value.clamp(0.0, 100.0);
        record.updated_at = Utc::now();
        self.store_updated(record).await
    }

    pub async fn set_economic(&self, address: &ContractAddress, value: f64) -> RegistryResult<ReputationRecord> {
        let mut record = self.get(address).await?;
        record.score.economic = value.clamp(0.0, 100.0);
        record.updated_at = Utc::now();
        self.store_updated(record).await
    }

    /// Apply a graded fraud penalty to the behavior component and bump the
    /// fraud-flag counter. Called by the consensus/dispute layer once a
    /// fraud record has been recorded.
    #[instrument(skip(self), fields(%address))]
    pub async fn apply_fraud_penalty(
        &self,
        address: &ContractAddress,
        severity: FraudSeverity,
    ) -> RegistryResult<ReputationRecord> {
        let mut record = self.get(address).await?;
        record.score.behavior = (record.score.behavior - severity.penalty_points()).clamp(0.0, 100.0);
        record.fraud_flags += 1;
        record.updated_at = Utc::now();
        info!(?severity, new_behavior = record.score.behavior, fraud_flags = record.fraud_flags, "fraud penalty applied");
        self.store_updated(record).await
    }

    /// Decay the behavior component for every tracked address whose last
    /// activity predates `now`, proportional to days elapsed. Temporal
    /// component is recomputed directly from account age rather than
    /// decayed, since it already measures time since first activity.
    pub async fn apply_decay(&self) -> RegistryResult<usize> {
        let mut records = self.records.write().await;
        let mut updated = Vec::new();

        for record in records.values_mut() {
            let days_inactive = (Utc::now() - record.last_seen).num_days().max(0) as f64;
            if days_inactive <= 0.0 {
                continue;
            }

            let decay = (1.0 - DECAY_RATE_PER_DAY * days_inactive).max(0.0);
            record.score.behavior *= decay;
            record.score.temporal = temporal_component(record.account_age_days());
            record.updated_at = Utc::now();
            updated.push(record.clone());
        }

        for record in &updated {
            self.persist(record).await?;
        }

        debug!(decayed = updated.len(), "applied behavior decay pass");
        Ok(updated.len())
    }

    pub async fn top_by_score(&self, limit: usize) -> Vec<ReputationRecord> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by(|a, b| b.score.composite().partial_cmp(&a.score.composite()).unwrap());
        all.truncate(limit);
        all
    }

    async fn store_updated(&self, record: ReputationRecord) -> RegistryResult<ReputationRecord> {
        self.persist(&record).await?;
        self.records.write().await.insert(record.address, record.clone());
        Ok(record)
    }

    async fn persist(&self, record: &ReputationRecord) -> RegistryResult<()> {
        let key = record_key(&record.address);
        let bytes = serde_json::to_vec(record)?;
        self.store.put(&key, &bytes).await?;
        Ok(())
    }
}

/// Temporal sub-score grows with account age, saturating at 100 after a
/// year: a brand-new address contributes nothing to its own trust tier
/// through longevity alone.
fn temporal_component(age_days: i64) -> f64 {
    ((age_days as f64 / 365.0) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::database::DatabaseResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryKv {
        data: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl KvStore for InMemoryKv {
        async fn get(&self, key: &[u8]) -> DatabaseResult<Option<Vec<u8>>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, key: &[u8], value: &[u8]) -> DatabaseResult<()> {
            self.data.lock().unwrap().insert(key.to_vec(), value.to_vec());
            Ok(())
        }

        async fn delete(&self, key: &[u8]) -> DatabaseResult<()> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list_keys_with_prefix(&self, prefix: &[u8]) -> DatabaseResult<Vec<Vec<u8>>> {
            Ok(self
                .data
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    fn addr(n: u64) -> ContractAddress {
        ethers::types::Address::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn register_then_duplicate_fails() {
        let registry = ReputationRegistry::new(Arc::new(InMemoryKv::default()));
        let a = addr(1);
        assert!(registry.register(a).await.is_ok());
        assert!(matches!(registry.register(a).await, Err(RegistryError::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn behavior_events_clamp_to_range() {
        let registry = ReputationRegistry::new(Arc::new(InMemoryKv::default()));
        let a = addr(2);
        registry.register(a).await.unwrap();

        for _ in 0..50 {
            registry.record_behavior(&a, BehaviorEvent::positive(10.0)).await.unwrap();
        }

        let record = registry.get(&a).await.unwrap();
        assert_eq!(record.score.behavior, 100.0);
    }

    #[tokio::test]
    async fn fraud_penalty_reduces_score_and_flags() {
        let registry = ReputationRegistry::new(Arc::new(InMemoryKv::default()));
        let a = addr(3);
        registry.register(a).await.unwrap();
        registry.record_behavior(&a, BehaviorEvent::positive(50.0)).await.unwrap();

        let before = registry.get(&a).await.unwrap().score.behavior;
        let record = registry.apply_fraud_penalty(&a, FraudSeverity::Severe).await.unwrap();

        assert!(record.score.behavior < before);
        assert_eq!(record.fraud_flags, 1);
    }

    #[tokio::test]
    async fn get_or_register_registers_on_first_access() {
        let registry = ReputationRegistry::new(Arc::new(InMemoryKv::default()));
        let a = addr(4);
        let record = registry.get_or_register(a).await.unwrap();
        assert_eq!(record.address, a);
        assert_eq!(record.transaction_count, 0);
    }
}
