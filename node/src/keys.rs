//! Persisted-state key layout: single-byte prefix plus canonical
//! encoding of the identifier, over the `KvStore` every component
//! shares.

use ethers::types::Address;
use shared::types::TxHash;
use uuid::Uuid;

fn with_prefix(prefix: u8, id_bytes: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + id_bytes.len());
    key.push(prefix);
    key.extend_from_slice(id_bytes);
    key
}

pub fn transaction_state_key(tx_hash: TxHash) -> Vec<u8> {
    with_prefix(b'V', tx_hash.as_bytes())
}

pub fn dispute_key(dispute_id: Uuid) -> Vec<u8> {
    with_prefix(b'D', dispute_id.as_bytes())
}

pub fn fraud_record_key(tx_hash: TxHash) -> Vec<u8> {
    with_prefix(b'F', tx_hash.as_bytes())
}

pub fn validator_stats_key(address: Address) -> Vec<u8> {
    with_prefix(b'S', address.as_bytes())
}

pub fn validation_session_key(tx_hash: TxHash) -> Vec<u8> {
    with_prefix(b'E', tx_hash.as_bytes())
}

pub fn reputation_penalty_key(address: Address) -> Vec<u8> {
    with_prefix(b'P', address.as_bytes())
}

pub fn reputation_score_key(address: Address) -> Vec<u8> {
    let mut key = b"reputation_".to_vec();
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn validator_registration_key(address: Address) -> Vec<u8> {
    let mut key = b"validator_stats_".to_vec();
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn validator_peer_key(address: Address) -> Vec<u8> {
    let mut key = b"validator_peer_".to_vec();
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn dispute_lookup_key(dispute_id: Uuid) -> Vec<u8> {
    let mut key = b"dispute_".to_vec();
    key.extend_from_slice(dispute_id.as_bytes());
    key
}

pub fn sybil_alert_key(address: Address, timestamp: i64) -> Vec<u8> {
    let mut key = b"sybil_alert_".to_vec();
    key.extend_from_slice(address.as_bytes());
    key.push(b'_');
    key.extend_from_slice(&timestamp.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_prefixes_are_distinct() {
        let address = Address::from_low_u64_be(1);
        let tx_hash = TxHash::zero();

        assert_eq!(transaction_state_key(tx_hash)[0], b'V');
        assert_eq!(fraud_record_key(tx_hash)[0], b'F');
        assert_eq!(validator_stats_key(address)[0], b'S');
        assert_eq!(validation_session_key(tx_hash)[0], b'E');
        assert_eq!(reputation_penalty_key(address)[0], b'P');
    }

    #[test]
    fn sybil_alert_key_sorts_by_timestamp_within_address() {
        let address = Address::from_low_u64_be(1);
        let earlier = sybil_alert_key(address, 100);
        let later = sybil_alert_key(address, 200);
        assert!(earlier < later);
    }
}
