//! HAT Consensus Validator: runs one validation session end to end —
//! initiate, broadcast, collect signed responses, tally weighted votes,
//! decide consensus or DAO escalation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared::messaging::{ConsensusFinalizedEvent, ConsensusVoteCastEvent, PeerEvent, PeerNetwork};
use shared::types::{
    ContractAddress, ConsensusOutcome, TxHash, ValidatorVote, Verdict,
    CONSENSUS_MIN_WOT_COVERAGE, CONSENSUS_SUPERMAJORITY_THRESHOLD,
};

use crate::error::{ConsensusError, ConsensusResult};

/// Wall-clock budget for a session to collect responses before closing
/// and penalizing non-responders.
pub const VALIDATION_TIMEOUT_SECS: i64 = 30;

struct Session {
    tx_hash: TxHash,
    selected: Vec<ContractAddress>,
    responses: HashMap<ContractAddress, ValidatorVote>,
    opened_at: DateTime<Utc>,
}

/// Tracks in-flight validation sessions and tallies them into a
/// `ConsensusOutcome` once enough responses have arrived or the session
/// times out.
pub struct HatConsensusValidator {
    sessions: RwLock<HashMap<Uuid, Session>>,
    peers: Arc<dyn PeerNetwork>,
}

impl HatConsensusValidator {
    pub fn new(peers: Arc<dyn PeerNetwork>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            peers,
        }
    }

    #[instrument(skip(self, selected), fields(%tx_hash, validators = selected.len()))]
    pub async fn open_session(&self, tx_hash: TxHash, selected: Vec<ContractAddress>) -> Uuid {
        let session_id = Uuid::new_v4();
        self.sessions.write().await.insert(
            session_id,
            Session {
                tx_hash,
                selected,
                responses: HashMap::new(),
                opened_at: Utc::now(),
            },
        );
        debug!(%session_id, "consensus session opened");
        session_id
    }

    /// Record one validator's signed response. Duplicate addresses and
    /// validators outside the selected set are rejected outright.
    pub async fn submit_response(&self, session_id: Uuid, vote: ValidatorVote) -> ConsensusResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&session_id).ok_or(ConsensusError::SessionNotFound)?;

        if !session.selected.contains(&vote.validator) {
            return Err(ConsensusError::NotSelected);
        }
        if session.responses.contains_key(&vote.validator) {
            return Err(ConsensusError::DuplicateResponse);
        }

        session.responses.insert(vote.validator, vote.clone());
        let _ = self
            .peers
            .broadcast(&PeerEvent::ConsensusVoteCast(ConsensusVoteCastEvent {
                session_id,
                validator: vote.validator,
                verdict: vote.verdict,
                occurred_at: Utc::now(),
            }))
            .await;

        Ok(())
    }

    pub async fn is_timed_out(&self, session_id: Uuid) -> ConsensusResult<bool> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(&session_id).ok_or(ConsensusError::SessionNotFound)?;
        Ok((Utc::now() - session.opened_at).num_seconds() >= VALIDATION_TIMEOUT_SECS)
    }

    /// Tally the session's responses into a `ConsensusOutcome`. Returns
    /// `needs_dao = true` without a verdict decision if the session
    /// hasn't reached minimum web-of-trust coverage.
    #[instrument(skip(self, has_wot), fields(%session_id))]
    pub async fn finalize(&self, session_id: Uuid, has_wot: &HashMap<ContractAddress, bool>) -> ConsensusResult<ConsensusOutcome> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.remove(&session_id).ok_or(ConsensusError::SessionNotFound)?;

        let votes: Vec<ValidatorVote> = session.responses.into_values().collect();
        let outcome = tally(session_id, votes, has_wot);
        info!(final_verdict = ?outcome.final_verdict, finalized = outcome.is_finalized, "consensus session finalized");

        let _ = self
            .peers
            .broadcast(&PeerEvent::ConsensusFinalized(ConsensusFinalizedEvent {
                session_id,
                final_verdict: outcome.final_verdict.clone(),
                agreement_ratio: outcome.agreement_ratio,
                occurred_at: Utc::now(),
            }))
            .await;

        Ok(outcome)
    }
}

fn weight(vote: &ValidatorVote, connected: bool) -> f64 {
    (if connected { 1.0 } else { 0.5 }) * vote.weight
}

/// Pure tally function: weight each vote by web-of-trust connection and
/// confidence, then compare accept/reject shares against the
/// supermajority threshold. Exposed standalone so it can be unit tested
/// without the session bookkeeping.
pub fn tally(session_id: Uuid, votes: Vec<ValidatorVote>, has_wot: &HashMap<ContractAddress, bool>) -> ConsensusOutcome {
    let wot_count = votes.iter().filter(|v| *has_wot.get(&v.validator).unwrap_or(&false)).count();
    let wot_coverage = if votes.is_empty() {
        0.0
    } else {
        wot_count as f64 / votes.len() as f64
    };

    if wot_coverage < CONSENSUS_MIN_WOT_COVERAGE {
        return ConsensusOutcome {
            session_id,
            final_verdict: Verdict::Abstain,
            agreement_ratio: 0.0,
            web_of_trust_coverage: wot_coverage,
            votes,
            is_finalized: false,
            finalized_at: None,
        };
    }

    let mut weighted_accept = 0.0;
    let mut weighted_reject = 0.0;
    let mut weighted_abstain = 0.0;

    for vote in &votes {
        let connected = *has_wot.get(&vote.validator).unwrap_or(&false);
        let w = weight(vote, connected);
        match vote.verdict {
            Verdict::Accept => weighted_accept += w,
            Verdict::Reject => weighted_reject += w,
            Verdict::Abstain => weighted_abstain += w,
        }
    }

    let total = weighted_accept + weighted_reject + weighted_abstain;
    let accept_ratio = if total > 0.0 { weighted_accept / total } else { 0.0 };
    let reject_ratio = if total > 0.0 { weighted_reject / total } else { 0.0 };

    let (final_verdict, is_finalized) = if accept_ratio >= CONSENSUS_SUPERMAJORITY_THRESHOLD {
        (Verdict::Accept, true)
    } else if reject_ratio >= CONSENSUS_SUPERMAJORITY_THRESHOLD {
        (Verdict::Reject, true)
    } else {
        (Verdict::Abstain, false)
    };

    ConsensusOutcome {
        session_id,
        final_verdict,
        agreement_ratio: accept_ratio,
        web_of_trust_coverage: wot_coverage,
        votes,
        is_finalized,
        finalized_at: if is_finalized { Some(Utc::now()) } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn vote(n: u64, verdict: Verdict, weight: f64) -> ValidatorVote {
        ValidatorVote {
            validator: Address::from_low_u64_be(n),
            verdict,
            weight,
            signature: Vec::new(),
            cast_at: Utc::now(),
        }
    }

    #[test]
    fn low_wot_coverage_defers_to_dao() {
        let votes = vec![vote(1, Verdict::Accept, 1.0), vote(2, Verdict::Accept, 1.0)];
        let has_wot = HashMap::new();
        let outcome = tally(Uuid::new_v4(), votes, &has_wot);
        assert!(!outcome.is_finalized);
    }

    #[test]
    fn supermajority_accept_finalizes() {
        let votes = vec![
            vote(1, Verdict::Accept, 1.0),
            vote(2, Verdict::Accept, 1.0),
            vote(3, Verdict::Accept, 1.0),
            vote(4, Verdict::Reject, 1.0),
        ];
        let mut has_wot = HashMap::new();
        for v in &votes {
            has_wot.insert(v.validator, true);
        }

        let outcome = tally(Uuid::new_v4(), votes, &has_wot);
        assert!(outcome.is_finalized);
        assert_eq!(outcome.final_verdict, Verdict::Accept);
    }

    #[test]
    fn split_vote_needs_dao() {
        let votes = vec![
            vote(1, Verdict::Accept, 1.0),
            vote(2, Verdict::Reject, 1.0),
        ];
        let mut has_wot = HashMap::new();
        for v in &votes {
            has_wot.insert(v.validator, true);
        }

        let outcome = tally(Uuid::new_v4(), votes, &has_wot);
        assert!(!outcome.is_finalized);
    }
}
