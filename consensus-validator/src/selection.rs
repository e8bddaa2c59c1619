//! Deterministic validator selection for a HAT consensus session: filter
//! the candidate pool by eligibility, seed a PRNG from
//! `(tx_hash, block_height)`, Fisher-Yates shuffle, take the first
//! `MIN_VALIDATORS`.

use chrono::{DateTime, Utc};
use tracing::debug;

use shared::crypto::hashing::blake3_hash;
use shared::types::{ContractAddress, TxHash};

pub const MIN_VALIDATORS: usize = 10;
pub const MIN_VALIDATOR_REPUTATION: f64 = 70.0;
pub const MIN_VALIDATOR_STAKE: u64 = 1;
/// A validator idle longer than this is treated as unavailable and
/// dropped from the eligible pool.
pub const MAX_INACTIVITY: chrono::Duration = chrono::Duration::hours(41);

#[derive(Debug, Clone)]
pub struct ValidatorStats {
    pub address: ContractAddress,
    pub total: u64,
    pub accurate: u64,
    pub inaccurate: u64,
    pub abstentions: u64,
    pub validator_reputation: f64,
    pub stake: u64,
    pub last_activity: DateTime<Utc>,
    pub network_prefix: String,
    pub stake_cluster: Option<uuid::Uuid>,
    pub trust_cluster: Option<uuid::Uuid>,
}

impl ValidatorStats {
    pub fn accuracy_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.accurate as f64 / self.total as f64
        }
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.validator_reputation >= MIN_VALIDATOR_REPUTATION
            && self.stake >= MIN_VALIDATOR_STAKE
            && (now - self.last_activity) <= MAX_INACTIVITY
    }
}

/// Seed bytes for the deterministic PRNG: `hash(tx_hash || block_height ||
/// "VALIDATOR_SELECTION")`.
pub fn selection_seed(tx_hash: TxHash, block_height: u64) -> [u8; 32] {
    let mut input = Vec::with_capacity(32 + 8 + 18);
    input.extend_from_slice(tx_hash.as_bytes());
    input.extend_from_slice(&block_height.to_be_bytes());
    input.extend_from_slice(b"VALIDATOR_SELECTION");

    let digest = blake3_hash(&input);
    let bytes = hex::decode(digest).expect("blake3_hash always returns valid hex");
    bytes.try_into().expect("blake3_hash always returns 32 bytes")
}

/// Minimal xorshift-style PRNG driven by a fixed 32-byte seed, so
/// selection is reproducible across every node without sharing state.
struct SeededRng {
    state: [u64; 4],
}

impl SeededRng {
    fn new(seed: [u8; 32]) -> Self {
        let mut state = [0u64; 4];
        for i in 0..4 {
            state[i] = u64::from_le_bytes(seed[i * 8..i * 8 + 8].try_into().unwrap());
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        // xoshiro256**-style mixing, good enough for deterministic shuffles.
        let result = self.state[0]
            .wrapping_add(self.state[3])
            .rotate_left(23)
            .wrapping_add(self.state[0]);
        let t = self.state[1] << 17;

        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);

        result
    }

    fn gen_range(&mut self, bound: usize) -> usize {
        if bound == 0 {
            0
        } else {
            (self.next_u64() % bound as u64) as usize
        }
    }
}

/// Fisher-Yates shuffle of the eligible candidate pool, seeded
/// deterministically from the session, then apply the C9 diversity/Sybil
/// filters: any validator belonging to a concentrated network-prefix,
/// stake-cluster, or trust-cluster group is dropped and replaced by the
/// next candidate in the shuffled pool, repeating until the set is
/// diverse or the pool runs dry.
pub fn select_validators(
    candidates: &[ValidatorStats],
    tx_hash: TxHash,
    block_height: u64,
    now: DateTime<Utc>,
) -> Vec<ContractAddress> {
    let eligible: Vec<&ValidatorStats> = candidates.iter().filter(|c| c.is_eligible(now)).collect();

    let mut shuffled: Vec<&ValidatorStats> = eligible.clone();
    let mut rng = SeededRng::new(selection_seed(tx_hash, block_height));
    let len = shuffled.len();
    for i in (1..len).rev() {
        let j = rng.gen_range(i + 1);
        shuffled.swap(i, j);
    }

    let mut selected: Vec<ValidatorStats> = shuffled.iter().take(MIN_VALIDATORS).map(|v| (*v).clone()).collect();
    let mut pool_cursor = selected.len().min(shuffled.len());

    loop {
        let to_drop = crate::sybil::concentrated_members(&selected);
        if to_drop.is_empty() {
            break;
        }
        selected.retain(|v| !to_drop.contains(&v.address));

        while selected.len() < MIN_VALIDATORS && pool_cursor < shuffled.len() {
            let candidate = shuffled[pool_cursor];
            pool_cursor += 1;
            if !selected.iter().any(|v| v.address == candidate.address) {
                selected.push(candidate.clone());
            }
        }

        if pool_cursor >= shuffled.len() {
            break;
        }
    }

    debug!(%tx_hash, block_height, selected = selected.len(), "validator set selected for session");
    selected.into_iter().map(|v| v.address).collect()
}

/// Re-derive the same selection output for a given validator to confirm
/// self-selection, per the response procedure's step 2.
pub fn is_selected(
    candidates: &[ValidatorStats],
    tx_hash: TxHash,
    block_height: u64,
    now: DateTime<Utc>,
    validator: &ContractAddress,
) -> bool {
    select_validators(candidates, tx_hash, block_height, now).contains(validator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn stats(n: u64, reputation: f64, stake: u64, last_activity: DateTime<Utc>) -> ValidatorStats {
        ValidatorStats {
            address: Address::from_low_u64_be(n),
            total: 0,
            accurate: 0,
            inaccurate: 0,
            abstentions: 0,
            validator_reputation: reputation,
            stake,
            last_activity,
            network_prefix: format!("10.0.{}.0", n),
            stake_cluster: None,
            trust_cluster: None,
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let now = Utc::now();
        let candidates: Vec<_> = (0..20).map(|n| stats(n, 90.0, 10, now)).collect();
        let tx_hash = TxHash::zero();

        let a = select_validators(&candidates, tx_hash, 100, now);
        let b = select_validators(&candidates, tx_hash, 100, now);
        assert_eq!(a, b);
        assert_eq!(a.len(), MIN_VALIDATORS);
    }

    #[test]
    fn ineligible_validators_are_excluded() {
        let now = Utc::now();
        let mut candidates: Vec<_> = (0..12).map(|n| stats(n, 90.0, 10, now)).collect();
        candidates[0].validator_reputation = 10.0;
        candidates[1].stake = 0;
        candidates[2].last_activity = now - chrono::Duration::hours(200);

        let selected = select_validators(&candidates, TxHash::zero(), 1, now);
        assert!(!selected.contains(&candidates[0].address));
        assert!(!selected.contains(&candidates[1].address));
        assert!(!selected.contains(&candidates[2].address));
    }

    #[test]
    fn different_block_height_changes_order() {
        let now = Utc::now();
        let candidates: Vec<_> = (0..20).map(|n| stats(n, 90.0, 10, now)).collect();
        let a = select_validators(&candidates, TxHash::zero(), 1, now);
        let b = select_validators(&candidates, TxHash::zero(), 2, now);
        assert_ne!(a, b);
    }
}
