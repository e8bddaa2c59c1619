//! Collaborator traits for the chain/mempool subsystem the execution and
//! consensus core consumes but does not own: block/peer context, account
//! state lookups, and submission of finalized execution receipts back to
//! the chain.

pub mod transaction;

pub use transaction::{TransactionBuilder, TransactionInfo, TransactionStatus};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Errors surfaced by a `ChainClient` implementation.
#[derive(Debug, thiserror::Error)]
pub enum BlockchainError {
    #[error("Invalid address: {address}")]
    InvalidAddress { address: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("Network connection error: {reason}")]
    NetworkError { reason: String },

    #[error("Unauthorized operation")]
    Unauthorized,

    #[error("Timeout waiting for transaction confirmation")]
    TransactionTimeout,
}

pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Minimal block context an execution session needs from the chain: the
/// block a contract call is being evaluated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
    pub base_fee: U256,
    pub coinbase: Address,
}

/// Collaborator interface over the chain/mempool the core depends on:
/// account balances, code and storage lookups, and the ability to push a
/// finalized execution receipt on-chain. Concrete adapters (a full node's
/// RPC, a regtest harness) live outside this crate.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_balance(&self, address: Address) -> BlockchainResult<U256>;

    async fn get_code(&self, address: Address) -> BlockchainResult<Vec<u8>>;

    async fn get_storage_at(&self, address: Address, slot: H256) -> BlockchainResult<H256>;

    async fn current_block(&self) -> BlockchainResult<BlockContext>;

    async fn submit_receipt(&self, receipt_bytes: Vec<u8>) -> BlockchainResult<H256>;
}
