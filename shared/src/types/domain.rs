//! Core domain types shared by the execution and consensus crates.

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ContractAddress = Address;
pub type TxHash = H256;
pub type Wei = U256;

/// Trust tier derived from a composite reputation score. Mirrors the gas
/// discount / stake multiplier tiers the Sustainable Gas Policy consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrustTier {
    Suspicious,
    Unverified,
    Established,
    Trusted,
    Elite,
}

impl TrustTier {
    pub fn from_composite(score: f64) -> Self {
        match score {
            s if s < 0.0 => TrustTier::Suspicious,
            s if s < 20.0 => TrustTier::Unverified,
            s if s < 50.0 => TrustTier::Established,
            s if s < 80.0 => TrustTier::Trusted,
            _ => TrustTier::Elite,
        }
    }

    /// Gas discount in basis points applied on top of the base fee.
    pub fn gas_discount_bps(&self) -> u32 {
        match self {
            TrustTier::Suspicious => 0,
            TrustTier::Unverified => 0,
            TrustTier::Established => 500,
            TrustTier::Trusted => 1_500,
            TrustTier::Elite => 3_000,
        }
    }

    pub fn stake_multiplier(&self) -> f64 {
        match self {
            TrustTier::Suspicious => 5.0,
            TrustTier::Unverified => 3.0,
            TrustTier::Established => 1.5,
            TrustTier::Trusted => 1.0,
            TrustTier::Elite => 0.5,
        }
    }
}

/// Four-component reputation score. Weights are fixed by the behavior
/// contract: behavior 0.4, web-of-trust 0.3, economic 0.2, temporal 0.1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReputationScore {
    pub behavior: f64,
    pub web_of_trust: f64,
    pub economic: f64,
    pub temporal: f64,
}

pub const BEHAVIOR_WEIGHT: f64 = 0.4;
pub const WEB_OF_TRUST_WEIGHT: f64 = 0.3;
pub const ECONOMIC_WEIGHT: f64 = 0.2;
pub const TEMPORAL_WEIGHT: f64 = 0.1;

impl ReputationScore {
    pub fn zero() -> Self {
        Self {
            behavior: 0.0,
            web_of_trust: 0.0,
            economic: 0.0,
            temporal: 0.0,
        }
    }

    /// Weighted composite clamped to [0, 100].
    pub fn composite(&self) -> f64 {
        let raw = self.behavior * BEHAVIOR_WEIGHT
            + self.web_of_trust * WEB_OF_TRUST_WEIGHT
            + self.economic * ECONOMIC_WEIGHT
            + self.temporal * TEMPORAL_WEIGHT;
        raw.clamp(0.0, 100.0)
    }

    pub fn tier(&self) -> TrustTier {
        TrustTier::from_composite(self.composite())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub address: ContractAddress,
    pub score: ReputationScore,
    pub transaction_count: u64,
    pub fraud_flags: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReputationRecord {
    pub fn new(address: ContractAddress) -> Self {
        let now = Utc::now();
        Self {
            address,
            score: ReputationScore::zero(),
            transaction_count: 0,
            fraud_flags: 0,
            first_seen: now,
            last_seen: now,
            updated_at: now,
        }
    }

    pub fn account_age_days(&self) -> i64 {
        (Utc::now() - self.first_seen).num_days().max(0)
    }
}

/// A directed trust edge in the web-of-trust graph, weight in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustEdge {
    pub from: ContractAddress,
    pub to: ContractAddress,
    pub weight: f64,
}

/// A resolved path between two addresses in the trust graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustPath {
    pub hops: Vec<ContractAddress>,
    pub weight: f64,
}

impl TrustPath {
    pub fn depth(&self) -> usize {
        self.hops.len().saturating_sub(1)
    }
}

/// A cluster of addresses heuristically linked by shared funding, timing,
/// or on-chain behavior, as produced by the Wallet Clusterer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletCluster {
    pub id: Uuid,
    pub members: Vec<ContractAddress>,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletCluster {
    pub fn new(members: Vec<ContractAddress>, confidence: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            members,
            confidence,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Bytecode format as determined by the Bytecode Format Detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BytecodeFormat {
    Native,
    Evm,
    Hybrid,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub format: BytecodeFormat,
    pub confidence: f64,
}

/// Gas quote produced by the Sustainable Gas Policy for a given caller and
/// opcode sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasQuote {
    pub base_fee: u64,
    pub discount_bps: u32,
    pub final_fee: u64,
    pub tier: TrustTier,
}

impl GasQuote {
    pub fn compute(base_fee: u64, tier: TrustTier) -> Self {
        let discount_bps = tier.gas_discount_bps();
        let discount = (base_fee as u128 * discount_bps as u128) / 10_000;
        let final_fee = base_fee.saturating_sub(discount as u64);
        Self {
            base_fee,
            discount_bps,
            final_fee,
            tier,
        }
    }

    /// Quote from a raw reputation score (0-100) using the linear
    /// interpolation discount the Sustainable Gas Policy applies: 1.0x at
    /// reputation 0 down to 0.5x at reputation 100.
    pub fn compute_from_reputation(base_fee: u64, reputation: f64) -> Self {
        let multiplier = (1.0 - 0.005 * reputation.clamp(0.0, 100.0)).clamp(0.5, 1.0);
        let discount_bps = ((1.0 - multiplier) * 10_000.0).round() as u32;
        let final_fee = ((base_fee as f64) * multiplier).round() as u64;
        Self {
            base_fee,
            discount_bps,
            final_fee,
            tier: TrustTier::from_composite(reputation),
        }
    }
}

/// Decision returned by the Trust-Aware Opcode Policy for a single opcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcodeDecision {
    pub opcode: u8,
    pub allowed: bool,
    pub rate_limited: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Reverted(String),
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: ContractAddress,
    pub topics: Vec<TxHash>,
    pub data: Vec<u8>,
}

/// Outcome of a single coordinated VM execution, returned by the Enhanced
/// VM Coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub tx_hash: Option<TxHash>,
    pub contract: ContractAddress,
    /// Set only for `deploy()` calls, carrying the derived CREATE/CREATE2
    /// address of the new contract.
    pub contract_address: Option<ContractAddress>,
    pub gas_used: u64,
    pub status: ExecutionStatus,
    pub logs: Vec<LogEntry>,
    pub return_data: Vec<u8>,
    pub executed_format: BytecodeFormat,
    pub caller_reputation_before: f64,
    pub caller_reputation_after: f64,
    pub trust_gate_passed: bool,
    /// Fraction of the base gas cost the caller's reputation discounted
    /// away, in [0, 0.5].
    pub reputation_gas_discount: f64,
    pub used_free_gas: bool,
    pub cross_format_calls_made: u32,
    pub total_cross_calls: u32,
}

/// Weighted risk factors behind a Sybil/Eclipse risk score, each in [0, 1].
/// Weights: cluster_size 0.25, cluster_age 0.20, tx_pattern_cv 0.20,
/// reputation_homogeneity_cv 0.20, fraud_history 0.15.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SybilRiskFactors {
    pub cluster_size: f64,
    pub cluster_age: f64,
    pub tx_pattern_cv: f64,
    pub reputation_homogeneity_cv: f64,
    pub fraud_history: f64,
}

pub const SYBIL_CLUSTER_SIZE_WEIGHT: f64 = 0.25;
pub const SYBIL_CLUSTER_AGE_WEIGHT: f64 = 0.20;
pub const SYBIL_TX_PATTERN_WEIGHT: f64 = 0.20;
pub const SYBIL_REPUTATION_HOMOGENEITY_WEIGHT: f64 = 0.20;
pub const SYBIL_FRAUD_HISTORY_WEIGHT: f64 = 0.15;

impl SybilRiskFactors {
    pub fn composite(&self) -> f64 {
        (self.cluster_size * SYBIL_CLUSTER_SIZE_WEIGHT
            + self.cluster_age * SYBIL_CLUSTER_AGE_WEIGHT
            + self.tx_pattern_cv * SYBIL_TX_PATTERN_WEIGHT
            + self.reputation_homogeneity_cv * SYBIL_REPUTATION_HOMOGENEITY_WEIGHT
            + self.fraud_history * SYBIL_FRAUD_HISTORY_WEIGHT)
            .clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SybilRiskScore {
    pub cluster_id: Uuid,
    pub factors: SybilRiskFactors,
    pub composite: f64,
}

/// A validator's vote on a single consensus session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Reject,
    Abstain,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accept => "accept",
            Verdict::Reject => "reject",
            Verdict::Abstain => "abstain",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorVote {
    pub validator: ContractAddress,
    pub verdict: Verdict,
    pub weight: f64,
    pub signature: Vec<u8>,
    pub cast_at: DateTime<Utc>,
}

/// Result of tallying a HAT consensus session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub session_id: Uuid,
    pub final_verdict: Verdict,
    pub agreement_ratio: f64,
    pub web_of_trust_coverage: f64,
    pub votes: Vec<ValidatorVote>,
    pub is_finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
}

/// Consensus acceptance threshold: a verdict wins outright once its
/// weighted share of the vote reaches this ratio.
pub const CONSENSUS_SUPERMAJORITY_THRESHOLD: f64 = 0.70;
/// Minimum web-of-trust coverage a session must reach before consensus can
/// be finalized rather than left open for more validators.
pub const CONSENSUS_MIN_WOT_COVERAGE: f64 = 0.30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    Resolved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    pub session_id: Uuid,
    pub initiator: ContractAddress,
    pub disputed_verdict: Verdict,
    pub claimed_verdict: Verdict,
    pub reason: String,
    pub evidence: Option<serde_json::Value>,
    pub status: DisputeStatus,
    pub resolution: Option<String>,
    pub resolved_by: Option<ContractAddress>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FraudSeverity {
    Minor,
    Moderate,
    Severe,
    Critical,
}

impl FraudSeverity {
    /// Reputation penalty applied to the composite score, in points.
    pub fn penalty_points(&self) -> f64 {
        match self {
            FraudSeverity::Minor => 5.0,
            FraudSeverity::Moderate => 15.0,
            FraudSeverity::Severe => 35.0,
            FraudSeverity::Critical => 75.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudRecord {
    pub id: Uuid,
    pub tx_hash: TxHash,
    pub address: ContractAddress,
    pub claimed_score: f64,
    pub actual_score: f64,
    pub score_difference: f64,
    pub block_height: u64,
    pub severity: FraudSeverity,
    pub evidence_hash: TxHash,
    pub description: String,
    pub penalty_applied: f64,
    pub bond_slashed: u64,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_respects_weights() {
        let score = ReputationScore {
            behavior: 100.0,
            web_of_trust: 0.0,
            economic: 0.0,
            temporal: 0.0,
        };
        assert!((score.composite() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn composite_clamped_to_range() {
        let score = ReputationScore {
            behavior: 1000.0,
            web_of_trust: 1000.0,
            economic: 1000.0,
            temporal: 1000.0,
        };
        assert_eq!(score.composite(), 100.0);
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(TrustTier::from_composite(0.0), TrustTier::Unverified);
        assert_eq!(TrustTier::from_composite(-1.0), TrustTier::Suspicious);
        assert_eq!(TrustTier::from_composite(85.0), TrustTier::Elite);
    }

    #[test]
    fn gas_quote_applies_discount() {
        let quote = GasQuote::compute(100_000, TrustTier::Elite);
        assert_eq!(quote.discount_bps, 3_000);
        assert_eq!(quote.final_fee, 70_000);
    }

    #[test]
    fn sybil_factors_sum_to_weighted_average() {
        let factors = SybilRiskFactors {
            cluster_size: 1.0,
            cluster_age: 1.0,
            tx_pattern_cv: 1.0,
            reputation_homogeneity_cv: 1.0,
            fraud_history: 1.0,
        };
        assert!((factors.composite() - 1.0).abs() < 1e-9);
    }
}
