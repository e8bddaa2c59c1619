use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ContractAddress, Dispute, ExecutionReceipt, FraudRecord, SybilRiskScore, Verdict};

/// Peer broadcast events exchanged between node instances: new reputation
/// updates, consensus votes, finalized executions, disputes, and fraud
/// records. Each event is topic-scoped (see `topic_for_event`) so a peer
/// can subscribe only to the streams it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum PeerEvent {
    ExecutionFinalized(ExecutionFinalizedEvent),
    ConsensusVoteCast(ConsensusVoteCastEvent),
    ConsensusFinalized(ConsensusFinalizedEvent),
    ReputationUpdated(ReputationUpdatedEvent),
    DisputeOpened(Dispute),
    DisputeResolved(Dispute),
    FraudRecorded(FraudRecord),
    SybilRiskFlagged(SybilRiskScore),
    ValidationChallenge(ValidationChallengeEvent),
    ValidatorAnnounce(ValidatorAnnounceEvent),
}

/// Broadcast when a node opens a validation session, inviting the
/// selected validator set to submit signed `ValidatorVote`s back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationChallengeEvent {
    pub session_id: Uuid,
    pub tx_hash: crate::types::TxHash,
    pub selected: Vec<ContractAddress>,
    pub occurred_at: DateTime<Utc>,
}

/// Broadcast by a validator announcing itself as eligible and available,
/// so peers can include it in future selection rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorAnnounceEvent {
    pub validator: ContractAddress,
    pub stake: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFinalizedEvent {
    pub receipt: ExecutionReceipt,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusVoteCastEvent {
    pub session_id: Uuid,
    pub validator: ContractAddress,
    pub verdict: Verdict,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusFinalizedEvent {
    pub session_id: Uuid,
    pub final_verdict: Verdict,
    pub agreement_ratio: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationUpdatedEvent {
    pub address: ContractAddress,
    pub old_composite: f64,
    pub new_composite: f64,
    pub occurred_at: DateTime<Utc>,
}

impl PeerEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            PeerEvent::ExecutionFinalized(_) => "execution",
            PeerEvent::ConsensusVoteCast(_) => "consensus.votes",
            PeerEvent::ConsensusFinalized(_) => "consensus.final",
            PeerEvent::ReputationUpdated(_) => "reputation",
            PeerEvent::DisputeOpened(_) | PeerEvent::DisputeResolved(_) => "disputes",
            PeerEvent::FraudRecorded(_) => "fraud",
            PeerEvent::SybilRiskFlagged(_) => "sybil",
            PeerEvent::ValidationChallenge(_) => "consensus.challenge",
            PeerEvent::ValidatorAnnounce(_) => "validators.announce",
        }
    }
}
