//! Default in-memory `ChainClient`: the block/chain layer is an external
//! collaborator per spec, but the RPC surface needs something to serve
//! against. Mirrors `vm-engine::evm_wrapper::InMemoryHost`'s shape.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use tokio::sync::RwLock;

use shared::blockchain::{BlockContext, BlockchainResult, ChainClient};

pub struct InMemoryChainClient {
    balances: RwLock<HashMap<Address, U256>>,
    code: RwLock<HashMap<Address, Vec<u8>>>,
    storage: RwLock<HashMap<(Address, H256), H256>>,
    block_number: AtomicU64,
    base_fee: U256,
}

impl InMemoryChainClient {
    pub fn new(base_fee: U256) -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            code: RwLock::new(HashMap::new()),
            storage: RwLock::new(HashMap::new()),
            block_number: AtomicU64::new(0),
            base_fee,
        }
    }

    pub async fn deploy_code(&self, address: Address, bytecode: Vec<u8>) {
        self.code.write().await.insert(address, bytecode);
    }

    pub async fn set_balance(&self, address: Address, balance: U256) {
        self.balances.write().await.insert(address, balance);
    }

    /// Regtest-only block mining: advances the height by `n` without any
    /// consensus, used to exercise code paths that depend on block
    /// progression. Not part of the production consensus contract.
    #[cfg(feature = "regtest")]
    pub fn mine(&self, n: u64) -> u64 {
        self.block_number.fetch_add(n, Ordering::SeqCst) + n
    }
}

#[async_trait]
impl ChainClient for InMemoryChainClient {
    async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        Ok(self.balances.read().await.get(&address).copied().unwrap_or_default())
    }

    async fn get_code(&self, address: Address) -> BlockchainResult<Vec<u8>> {
        Ok(self.code.read().await.get(&address).cloned().unwrap_or_default())
    }

    async fn get_storage_at(&self, address: Address, slot: H256) -> BlockchainResult<H256> {
        Ok(self.storage.read().await.get(&(address, slot)).copied().unwrap_or_default())
    }

    async fn current_block(&self) -> BlockchainResult<BlockContext> {
        Ok(BlockContext {
            number: self.block_number.load(Ordering::SeqCst),
            timestamp: chrono::Utc::now().timestamp() as u64,
            base_fee: self.base_fee,
            coinbase: Address::zero(),
        })
    }

    async fn submit_receipt(&self, _receipt_bytes: Vec<u8>) -> BlockchainResult<H256> {
        self.block_number.fetch_add(1, Ordering::SeqCst);
        Ok(H256::random())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deployed_code_is_retrievable() {
        let chain = InMemoryChainClient::new(U256::from(20_000_000_000u64));
        let addr = Address::from_low_u64_be(1);
        chain.deploy_code(addr, vec![0x60, 0x01]).await;

        let code = chain.get_code(addr).await.unwrap();
        assert_eq!(code, vec![0x60, 0x01]);
    }

    #[tokio::test]
    async fn unknown_address_has_zero_balance() {
        let chain = InMemoryChainClient::new(U256::zero());
        let balance = chain.get_balance(Address::from_low_u64_be(99)).await.unwrap();
        assert_eq!(balance, U256::zero());
    }
}
