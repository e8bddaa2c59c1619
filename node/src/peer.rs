//! Peer-message glue: wraps the shared `PeerNetwork` gossip trait with
//! the two node-level announcements the consensus/validator crates don't
//! originate themselves (session challenge, validator announce).

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use shared::messaging::{PeerEvent, PeerNetwork, ValidationChallengeEvent, ValidatorAnnounceEvent};
use shared::types::{ContractAddress, TxHash};

pub struct PeerRelay {
    peers: Arc<dyn PeerNetwork>,
}

impl PeerRelay {
    pub fn new(peers: Arc<dyn PeerNetwork>) -> Self {
        Self { peers }
    }

    /// Broadcast a newly opened validation session to the selected
    /// validator set (and anyone else listening on the challenge topic).
    pub async fn broadcast_challenge(&self, session_id: Uuid, tx_hash: TxHash, selected: Vec<ContractAddress>) {
        let _ = self
            .peers
            .broadcast(&PeerEvent::ValidationChallenge(ValidationChallengeEvent {
                session_id,
                tx_hash,
                selected,
                occurred_at: Utc::now(),
            }))
            .await;
    }

    pub async fn announce_validator(&self, validator: ContractAddress, stake: u64) {
        let _ = self
            .peers
            .broadcast(&PeerEvent::ValidatorAnnounce(ValidatorAnnounceEvent {
                validator,
                stake,
                occurred_at: Utc::now(),
            }))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::messaging::MessageError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPeers {
        count: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PeerNetwork for CountingPeers {
        async fn broadcast(&self, _event: &PeerEvent) -> Result<(), MessageError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn broadcast_challenge_calls_peer_network() {
        let peers = Arc::new(CountingPeers { count: AtomicUsize::new(0) });
        let relay = PeerRelay::new(peers.clone());

        relay
            .broadcast_challenge(Uuid::new_v4(), TxHash::zero(), vec![ethers::types::Address::from_low_u64_be(1)])
            .await;

        assert_eq!(peers.count.load(Ordering::SeqCst), 1);
    }
}
