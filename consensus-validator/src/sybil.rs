//! Sybil/Eclipse Protection: constrains validator set diversity and scores
//! candidate wallet clusters for coordinated Sybil behavior.

use shared::types::{ContractAddress, SybilRiskFactors, SybilRiskScore};
use tracing::warn;
use uuid::Uuid;

use crate::selection::ValidatorStats;

/// Aggregate risk at or above this threshold is declared a Sybil network.
pub const SYBIL_NETWORK_THRESHOLD: f64 = 0.7;
/// At or above this risk, the automatic reputation penalty applies to
/// every cluster member without waiting for DAO review.
pub const AUTO_PENALTY_THRESHOLD: f64 = 0.9;
/// Confidence at or above this level escalates a detection to DAO even
/// below the auto-penalty threshold.
pub const DAO_ESCALATION_CONFIDENCE: f64 = 0.6;
/// Reputation points subtracted from every member of an auto-penalized
/// cluster.
pub const AUTO_PENALTY_POINTS: f64 = 50.0;

fn cluster_size_factor(size: usize) -> f64 {
    match size {
        0..=1 => 0.0,
        2..=5 => 0.3,
        6..=10 => 0.5,
        11..=20 => 0.8,
        _ => 1.0,
    }
}

fn cluster_age_factor(age_days: f64) -> f64 {
    if age_days < 1.0 {
        1.0
    } else if age_days < 7.0 {
        0.7
    } else if age_days < 30.0 {
        0.4
    } else {
        0.0
    }
}

/// Coefficient of variation: stddev / mean, 0 when the set is empty or
/// its mean is zero (perfectly uniform by convention).
fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean
}

fn tx_pattern_factor(tx_counts: &[f64]) -> f64 {
    let cv = coefficient_of_variation(tx_counts);
    if cv < 0.3 {
        0.9
    } else if cv < 0.5 {
        0.6
    } else if cv < 0.7 {
        0.3
    } else {
        0.0
    }
}

fn reputation_homogeneity_factor(reputations: &[f64]) -> f64 {
    let cv = coefficient_of_variation(reputations);
    if cv < 0.1 {
        1.0
    } else if cv < 0.2 {
        0.7
    } else if cv < 0.3 {
        0.4
    } else {
        0.0
    }
}

fn fraud_history_factor(recent_frauds: u32) -> f64 {
    if recent_frauds >= 5 {
        1.0
    } else if recent_frauds >= 3 {
        0.7
    } else if recent_frauds >= 1 {
        0.4
    } else {
        0.0
    }
}

/// Inputs a Sybil detection pass needs about one candidate cluster.
pub struct ClusterObservation {
    pub cluster_id: Uuid,
    pub member_count: usize,
    pub age_days: f64,
    pub member_tx_counts: Vec<f64>,
    pub member_reputations: Vec<f64>,
    pub recent_fraud_count: u32,
}

pub fn score_cluster(observation: &ClusterObservation) -> SybilRiskScore {
    let factors = SybilRiskFactors {
        cluster_size: cluster_size_factor(observation.member_count),
        cluster_age: cluster_age_factor(observation.age_days),
        tx_pattern_cv: tx_pattern_factor(&observation.member_tx_counts),
        reputation_homogeneity_cv: reputation_homogeneity_factor(&observation.member_reputations),
        fraud_history: fraud_history_factor(observation.recent_fraud_count),
    };

    SybilRiskScore {
        cluster_id: observation.cluster_id,
        composite: factors.composite(),
        factors,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SybilDisposition {
    Clear,
    EscalateToDao,
    AutoPenalize,
}

pub fn classify(score: &SybilRiskScore) -> SybilDisposition {
    let disposition = if score.composite >= AUTO_PENALTY_THRESHOLD {
        SybilDisposition::AutoPenalize
    } else if score.composite >= DAO_ESCALATION_CONFIDENCE {
        SybilDisposition::EscalateToDao
    } else {
        SybilDisposition::Clear
    };

    if disposition != SybilDisposition::Clear {
        warn!(cluster_id = %score.cluster_id, composite = score.composite, ?disposition, "sybil cluster flagged");
    }
    disposition
}

pub fn is_sybil_network(score: &SybilRiskScore) -> bool {
    score.composite >= SYBIL_NETWORK_THRESHOLD
}

/// Diversity guard over a validator set: no network-address prefix,
/// stake cluster, or trust cluster may dominate the set. Returns the
/// addresses to drop, if any; callers pull replacements from the pool.
pub fn concentrated_members(validators: &[ValidatorStats]) -> Vec<ContractAddress> {
    if validators.is_empty() {
        return Vec::new();
    }

    let max_share = 0.5;
    let threshold = ((validators.len() as f64) * max_share).ceil() as usize;

    let mut to_drop = Vec::new();
    to_drop.extend(dominant_group(validators, threshold, |v| v.network_prefix.clone()));
    to_drop.extend(dominant_group(validators, threshold, |v| {
        v.stake_cluster.map(|id| id.to_string()).unwrap_or_default()
    }));
    to_drop.extend(dominant_group(validators, threshold, |v| {
        v.trust_cluster.map(|id| id.to_string()).unwrap_or_default()
    }));

    to_drop.sort();
    to_drop.dedup();
    if !to_drop.is_empty() {
        warn!(dropped = to_drop.len(), "validator set diversity filter dropped concentrated members");
    }
    to_drop
}

fn dominant_group(
    validators: &[ValidatorStats],
    threshold: usize,
    key: impl Fn(&ValidatorStats) -> String,
) -> Vec<ContractAddress> {
    use std::collections::HashMap;
    let mut groups: HashMap<String, Vec<ContractAddress>> = HashMap::new();

    for v in validators {
        let k = key(v);
        if k.is_empty() {
            continue;
        }
        groups.entry(k).or_default().push(v.address);
    }

    groups
        .into_values()
        .find(|members| members.len() >= threshold.max(1))
        .unwrap_or_default()
}

pub fn validate_set_diversity(validators: &[ValidatorStats]) -> bool {
    concentrated_members(validators).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn observation(member_count: usize, age_days: f64, recent_fraud_count: u32) -> ClusterObservation {
        ClusterObservation {
            cluster_id: Uuid::new_v4(),
            member_count,
            age_days,
            member_tx_counts: vec![10.0; member_count],
            member_reputations: vec![50.0; member_count],
            recent_fraud_count,
        }
    }

    #[test]
    fn single_member_cluster_is_never_sybil() {
        let score = score_cluster(&observation(1, 100.0, 0));
        assert!(!is_sybil_network(&score));
    }

    #[test]
    fn large_young_uniform_fraud_cluster_is_sybil() {
        let score = score_cluster(&observation(25, 0.5, 6));
        assert!(is_sybil_network(&score));
        assert_eq!(classify(&score), SybilDisposition::AutoPenalize);
    }

    #[test]
    fn diversity_flags_concentrated_network_prefix() {
        let mut validators = Vec::new();
        for n in 0..10 {
            validators.push(ValidatorStats {
                address: Address::from_low_u64_be(n),
                total: 0,
                accurate: 0,
                inaccurate: 0,
                abstentions: 0,
                validator_reputation: 90.0,
                stake: 10,
                last_activity: chrono::Utc::now(),
                network_prefix: "10.0.0.0".to_string(),
                stake_cluster: None,
                trust_cluster: None,
            });
        }

        assert!(!validate_set_diversity(&validators));
        assert_eq!(concentrated_members(&validators).len(), 10);
    }

    #[test]
    fn diverse_set_passes() {
        let mut validators = Vec::new();
        for n in 0..10 {
            validators.push(ValidatorStats {
                address: Address::from_low_u64_be(n),
                total: 0,
                accurate: 0,
                inaccurate: 0,
                abstentions: 0,
                validator_reputation: 90.0,
                stake: 10,
                last_activity: chrono::Utc::now(),
                network_prefix: format!("10.0.{}.0", n),
                stake_cluster: None,
                trust_cluster: None,
            });
        }

        assert!(validate_set_diversity(&validators));
    }
}
