//! Dispute / DAO Arbitration: packages evidence when consensus fails to
//! reach a decision, and records the governance resolution once it
//! arrives.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use shared::database::KvStore;
use shared::messaging::{PeerEvent, PeerNetwork};
use shared::types::{ContractAddress, Dispute, DisputeStatus, Verdict};

use crate::error::{ConsensusError, ConsensusResult};

const KEY_PREFIX: &[u8] = b"dispute/";

fn dispute_key(id: &Uuid) -> Vec<u8> {
    let mut key = KEY_PREFIX.to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}

pub struct DisputeArbitration {
    disputes: RwLock<HashMap<Uuid, Dispute>>,
    store: Arc<dyn KvStore>,
    peers: Arc<dyn PeerNetwork>,
}

impl DisputeArbitration {
    pub fn new(store: Arc<dyn KvStore>, peers: Arc<dyn PeerNetwork>) -> Self {
        Self {
            disputes: RwLock::new(HashMap::new()),
            store,
            peers,
        }
    }

    /// Package a dispute once a consensus session fails to reach a
    /// decision or a reached verdict is contested.
    pub async fn open(
        &self,
        session_id: Uuid,
        initiator: ContractAddress,
        disputed_verdict: Verdict,
        claimed_verdict: Verdict,
        reason: String,
        evidence: Option<serde_json::Value>,
    ) -> ConsensusResult<Dispute> {
        let dispute = Dispute {
            id: Uuid::new_v4(),
            session_id,
            initiator,
            disputed_verdict,
            claimed_verdict,
            reason,
            evidence,
            status: DisputeStatus::Open,
            resolution: None,
            resolved_by: None,
            resolved_at: None,
            created_at: Utc::now(),
        };

        self.persist(&dispute).await?;
        self.disputes.write().await.insert(dispute.id, dispute.clone());
        info!(dispute_id = %dispute.id, %session_id, "dispute opened for dao review");
        let _ = self.peers.broadcast(&PeerEvent::DisputeOpened(dispute.clone())).await;

        Ok(dispute)
    }

    pub async fn get(&self, id: &Uuid) -> ConsensusResult<Dispute> {
        self.disputes
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(ConsensusError::DisputeNotFound)
    }

    pub async fn mark_under_review(&self, id: &Uuid) -> ConsensusResult<Dispute> {
        let mut dispute = self.get(id).await?;
        dispute.status = DisputeStatus::UnderReview;
        self.store_updated(dispute).await
    }

    /// Apply a governance resolution: approve (the disputed verdict
    /// stands) or reject it (the claimed alternative wins instead).
    pub async fn resolve(
        &self,
        id: &Uuid,
        approved: bool,
        resolved_by: ContractAddress,
        resolution: String,
    ) -> ConsensusResult<Dispute> {
        let mut dispute = self.get(id).await?;
        dispute.status = if approved { DisputeStatus::Resolved } else { DisputeStatus::Rejected };
        dispute.resolution = Some(resolution);
        dispute.resolved_by = Some(resolved_by);
        dispute.resolved_at = Some(Utc::now());

        let updated = self.store_updated(dispute).await?;
        info!(dispute_id = %id, approved, status = ?updated.status, "dispute resolved");
        let _ = self.peers.broadcast(&PeerEvent::DisputeResolved(updated.clone())).await;
        Ok(updated)
    }

    /// The verdict a resolved dispute settles on: the disputed verdict
    /// when governance approved it, otherwise the claimant's alternative.
    pub fn settled_verdict(dispute: &Dispute) -> Option<Verdict> {
        match dispute.status {
            DisputeStatus::Resolved => Some(dispute.disputed_verdict.clone()),
            DisputeStatus::Rejected => Some(dispute.claimed_verdict.clone()),
            _ => None,
        }
    }

    async fn store_updated(&self, dispute: Dispute) -> ConsensusResult<Dispute> {
        self.persist(&dispute).await?;
        self.disputes.write().await.insert(dispute.id, dispute.clone());
        Ok(dispute)
    }

    async fn persist(&self, dispute: &Dispute) -> ConsensusResult<()> {
        let key = dispute_key(&dispute.id);
        let bytes = serde_json::to_vec(dispute).map_err(|e| ConsensusError::FraudClaimRejected(e.to_string()))?;
        self.store
            .put(&key, &bytes)
            .await
            .map_err(|e| ConsensusError::FraudClaimRejected(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::database::DatabaseResult;
    use shared::messaging::MessageError;
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
            Ok(self.data.lock().unwrap().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
        }
    }

    struct NoopPeers;
    #[async_trait::async_trait]
    impl PeerNetwork for NoopPeers {
        async fn broadcast(&self, _event: &PeerEvent) -> Result<(), MessageError> {
            Ok(())
        }
    }

    fn addr(n: u64) -> ContractAddress {
        ethers::types::Address::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn open_then_resolve_approved() {
        let arbitration = DisputeArbitration::new(Arc::new(InMemoryKv::default()), Arc::new(NoopPeers));
        let dispute = arbitration
            .open(Uuid::new_v4(), addr(1), Verdict::Reject, Verdict::Accept, "disagreement".into(), None)
            .await
            .unwrap();

        let resolved = arbitration.resolve(&dispute.id, true, addr(2), "upheld".into()).await.unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert_eq!(DisputeArbitration::settled_verdict(&resolved), Some(Verdict::Reject));
    }

    #[tokio::test]
    async fn resolve_rejected_settles_on_claimed_verdict() {
        let arbitration = DisputeArbitration::new(Arc::new(InMemoryKv::default()), Arc::new(NoopPeers));
        let dispute = arbitration
            .open(Uuid::new_v4(), addr(1), Verdict::Reject, Verdict::Accept, "disagreement".into(), None)
            .await
            .unwrap();

        let resolved = arbitration.resolve(&dispute.id, false, addr(2), "overturned".into()).await.unwrap();
        assert_eq!(DisputeArbitration::settled_verdict(&resolved), Some(Verdict::Accept));
    }

    #[tokio::test]
    async fn unknown_dispute_errors() {
        let arbitration = DisputeArbitration::new(Arc::new(InMemoryKv::default()), Arc::new(NoopPeers));
        assert!(matches!(arbitration.get(&Uuid::new_v4()).await, Err(ConsensusError::DisputeNotFound)));
    }
}
