//! Fraud Record & Reputation Penalty: validates a fraud claim before it
//! is ever written, then grades the reputation penalty and bond slash
//! by how far the claimed score diverged from the recomputed one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use shared::database::KvStore;
use shared::messaging::{PeerEvent, PeerNetwork};
use shared::types::{ContractAddress, FraudRecord, FraudSeverity, TxHash};

use crate::error::ConsensusError;

const KEY_PREFIX: &[u8] = b"fraud/";

fn fraud_key(id: &Uuid) -> Vec<u8> {
    let mut key = KEY_PREFIX.to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}

/// The two provenances a fraud claim is allowed to come from; nothing
/// else may write a fraud record, per spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FraudClaimOrigin {
    DaoResolution,
    ReachedRejectConsensus,
}

pub struct FraudClaim {
    pub origin: FraudClaimOrigin,
    pub tx_hash: TxHash,
    pub fraudster: ContractAddress,
    pub fraudster_stake: u64,
    pub claimed_score: f64,
    pub actual_score: f64,
    pub claim_timestamp: DateTime<Utc>,
    pub block_height: u64,
    pub current_height: u64,
    pub fraudster_cluster_size: usize,
    pub fraudster_cluster_recent_frauds: u32,
}

pub const MIN_SCORE_DIFFERENCE: f64 = 5.0;
const MAX_FUTURE_SKEW_MINUTES: i64 = 5;
const MAX_PAST_SKEW_HOURS: i64 = 24;
const MAX_BLOCK_LAG: u64 = 144;
const SYBIL_SELF_ACCUSATION_CLUSTER_SIZE: usize = 10;
const SYBIL_SELF_ACCUSATION_FRAUD_COUNT: u32 = 5;

fn penalty_for(score_difference: f64) -> (FraudSeverity, Option<u64>) {
    if score_difference <= 10.0 {
        (FraudSeverity::Minor, None)
    } else if score_difference <= 30.0 {
        (FraudSeverity::Moderate, Some(20))
    } else {
        (FraudSeverity::Severe, Some(10))
    }
}

/// Validate a fraud claim against every gate in spec.md §4.6 before it's
/// allowed to become a persisted `FraudRecord`.
pub fn validate_claim(claim: &FraudClaim) -> Result<f64, ConsensusError> {
    let difference = (claim.claimed_score - claim.actual_score).abs();
    if difference < MIN_SCORE_DIFFERENCE {
        return Err(ConsensusError::FraudClaimRejected(
            "score difference below measurement-variance floor".into(),
        ));
    }

    if !(0.0..=100.0).contains(&claim.claimed_score) || !(0.0..=100.0).contains(&claim.actual_score) {
        return Err(ConsensusError::FraudClaimRejected("score out of [0, 100] range".into()));
    }

    let now = Utc::now();
    let skew = claim.claim_timestamp - now;
    if skew > chrono::Duration::minutes(MAX_FUTURE_SKEW_MINUTES) {
        return Err(ConsensusError::FraudClaimRejected("timestamp too far in the future".into()));
    }
    if -skew > chrono::Duration::hours(MAX_PAST_SKEW_HOURS) {
        return Err(ConsensusError::FraudClaimRejected("timestamp too far in the past".into()));
    }

    if claim.block_height > claim.current_height {
        return Err(ConsensusError::FraudClaimRejected("block height ahead of chain tip".into()));
    }
    if claim.current_height - claim.block_height > MAX_BLOCK_LAG {
        return Err(ConsensusError::FraudClaimRejected("claim references a stale block height".into()));
    }

    if claim.fraudster_cluster_size > SYBIL_SELF_ACCUSATION_CLUSTER_SIZE
        && claim.fraudster_cluster_recent_frauds > SYBIL_SELF_ACCUSATION_FRAUD_COUNT
    {
        return Err(ConsensusError::FraudClaimRejected(
            "fraudster cluster shows self-accusation pattern, deferring to DAO review".into(),
        ));
    }

    Ok(difference)
}

pub struct GradedPenalty {
    pub severity: FraudSeverity,
    /// Bond divisor: slash = stake / divisor. `None` means no slash.
    pub bond_slash_divisor: Option<u64>,
}

pub fn grade(score_difference: f64) -> GradedPenalty {
    let (severity, bond_slash_divisor) = penalty_for(score_difference);
    GradedPenalty { severity, bond_slash_divisor }
}

pub fn bond_slash_amount(stake: u64, penalty: &GradedPenalty) -> u64 {
    match penalty.bond_slash_divisor {
        Some(divisor) if divisor > 0 => stake / divisor,
        _ => 0,
    }
}

pub struct FraudLedger {
    store: Arc<dyn KvStore>,
    peers: Arc<dyn PeerNetwork>,
}

impl FraudLedger {
    pub fn new(store: Arc<dyn KvStore>, peers: Arc<dyn PeerNetwork>) -> Self {
        Self { store, peers }
    }

    pub async fn record(
        &self,
        claim: &FraudClaim,
        evidence_hash: TxHash,
        description: String,
    ) -> Result<FraudRecord, ConsensusError> {
        let difference = validate_claim(claim)?;
        let penalty = grade(difference);
        let bond_slashed = bond_slash_amount(claim.fraudster_stake, &penalty);

        let record = FraudRecord {
            id: Uuid::new_v4(),
            tx_hash: claim.tx_hash,
            address: claim.fraudster,
            claimed_score: claim.claimed_score,
            actual_score: claim.actual_score,
            score_difference: difference,
            block_height: claim.block_height,
            severity: penalty.severity,
            evidence_hash,
            description,
            penalty_applied: penalty.severity.penalty_points(),
            bond_slashed,
            recorded_at: Utc::now(),
        };

        let key = fraud_key(&record.id);
        let bytes = serde_json::to_vec(&record).map_err(|e| ConsensusError::FraudClaimRejected(e.to_string()))?;
        self.store
            .put(&key, &bytes)
            .await
            .map_err(|e| ConsensusError::FraudClaimRejected(e.to_string()))?;

        warn!(
            tx_hash = %record.tx_hash,
            address = %record.address,
            severity = ?record.severity,
            bond_slashed = record.bond_slashed,
            "fraud record persisted"
        );
        let _ = self.peers.broadcast(&PeerEvent::FraudRecorded(record.clone())).await;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> ContractAddress {
        ethers::types::Address::from_low_u64_be(n)
    }

    fn base_claim() -> FraudClaim {
        FraudClaim {
            origin: FraudClaimOrigin::ReachedRejectConsensus,
            tx_hash: TxHash::zero(),
            fraudster: addr(1),
            fraudster_stake: 1000,
            claimed_score: 90.0,
            actual_score: 40.0,
            claim_timestamp: Utc::now(),
            block_height: 100,
            current_height: 110,
            fraudster_cluster_size: 2,
            fraudster_cluster_recent_frauds: 0,
        }
    }

    #[test]
    fn small_difference_rejected_as_variance() {
        let mut claim = base_claim();
        claim.actual_score = 88.0;
        assert!(validate_claim(&claim).is_err());
    }

    #[test]
    fn large_difference_grades_severe_with_slash() {
        let claim = base_claim();
        let difference = validate_claim(&claim).unwrap();
        let penalty = grade(difference);
        assert_eq!(penalty.severity, FraudSeverity::Severe);
        assert_eq!(bond_slash_amount(1000, &penalty), 100);
    }

    #[test]
    fn moderate_difference_grades_correctly() {
        let mut claim = base_claim();
        claim.actual_score = 70.0; // difference 20
        let difference = validate_claim(&claim).unwrap();
        let penalty = grade(difference);
        assert_eq!(penalty.severity, FraudSeverity::Moderate);
        assert_eq!(bond_slash_amount(1000, &penalty), 50);
    }

    #[test]
    fn stale_block_height_rejected() {
        let mut claim = base_claim();
        claim.current_height = 10_000;
        assert!(validate_claim(&claim).is_err());
    }

    #[test]
    fn self_accusation_cluster_pattern_rejected() {
        let mut claim = base_claim();
        claim.fraudster_cluster_size = 20;
        claim.fraudster_cluster_recent_frauds = 8;
        assert!(validate_claim(&claim).is_err());
    }
}
