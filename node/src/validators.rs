//! In-memory validator pool: the validator-stake service is an external
//! collaborator per spec, but `HatConsensusValidator` needs a candidate
//! list to select from. Seeded with a fixed demo set at startup, mirroring
//! `InMemoryChainClient`'s role as a stand-in for a real chain backend.

use chrono::Utc;
use consensus_validator::ValidatorStats;
use ethers::types::Address;
use tokio::sync::RwLock;

pub struct ValidatorPool {
    validators: RwLock<Vec<ValidatorStats>>,
}

impl ValidatorPool {
    /// Seed `count` validators, each well above the eligibility floor, at
    /// distinct network prefixes so the diversity filter doesn't strip the
    /// bootstrap set down to nothing.
    pub fn bootstrap(count: u64) -> Self {
        let now = Utc::now();
        let validators = (0..count)
            .map(|n| ValidatorStats {
                address: Address::from_low_u64_be(10_000 + n),
                total: 100,
                accurate: 95,
                inaccurate: 5,
                abstentions: 0,
                validator_reputation: 90.0,
                stake: 10_000,
                last_activity: now,
                network_prefix: format!("10.{}.0.0", n % 255),
                stake_cluster: None,
                trust_cluster: None,
            })
            .collect();
        Self { validators: RwLock::new(validators) }
    }

    pub async fn snapshot(&self) -> Vec<ValidatorStats> {
        self.validators.read().await.clone()
    }
}
