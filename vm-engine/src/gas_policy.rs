//! Sustainable Gas Policy: turns a caller's raw reputation score, the
//! opcode/storage operation being charged, and current network congestion
//! into a gas cost. Reputation buys a discount (never a free ride except
//! under the free-gas allowance); congestion buys a surcharge regardless
//! of trust, so the discount never lets a well-reputed caller starve the
//! network of fee revenue under load.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use tracing::{debug, trace};

use shared::types::{ContractAddress, GasQuote};

/// Minimum gas a message may be sent with, regardless of discount.
pub const MIN_GAS_FLOOR: u64 = 21_000;

/// Reputation at and above which a caller draws from the free-gas
/// allowance instead of paying out of pocket.
pub const FREE_GAS_MIN_REPUTATION: f64 = 80.0;
const FREE_GAS_MIN_ALLOWANCE: u64 = 1_000_000;
const FREE_GAS_MAX_ALLOWANCE: u64 = 5_000_000;

/// Number of trailing blocks the congestion multiplier is averaged over.
pub const CONGESTION_WINDOW_BLOCKS: usize = 100;
/// Target gas-per-block the congestion multiplier is centered on.
pub const BLOCK_GAS_TARGET: u64 = 15_000_000;

/// Classifies an operation for the per-type reputation threshold a caller
/// must clear before the operation is allowed to proceed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Standard,
    HighFrequency,
    StorageIntensive,
    ComputeIntensive,
    CrossChain,
}

impl OperationType {
    pub fn min_reputation(&self) -> f64 {
        match self {
            OperationType::Standard => 0.0,
            OperationType::HighFrequency => 50.0,
            OperationType::StorageIntensive => 40.0,
            OperationType::ComputeIntensive => 30.0,
            OperationType::CrossChain => 60.0,
        }
    }
}

const OP_CALL: u8 = 0xf1;
const OP_DELEGATECALL: u8 = 0xf4;
const OP_CREATE: u8 = 0xf0;
const OP_CREATE2: u8 = 0xf5;
const OP_STATICCALL: u8 = 0xfa;

const BASE_OPCODE_COST: u64 = 3;
const BASE_CALL_COST: u64 = 700;
const BASE_CREATE_COST: u64 = 32_000;
const BASE_STORAGE_WRITE_COST: u64 = 20_000;
const BASE_STORAGE_READ_COST: u64 = 800;

/// Reputation multiplier used for any cost this policy doesn't grant a
/// dedicated discount tier to: 1.0x at reputation 0, 0.5x at reputation
/// 100, clamped to [0.5, 1.0].
pub fn reputation_multiplier(reputation: f64) -> f64 {
    (1.0 - 0.005 * reputation.clamp(0.0, 100.0)).clamp(0.5, 1.0)
}

/// Free-gas allowance available to a caller this block: zero below the
/// eligibility floor, scaling linearly from 1,000,000 at reputation 80 to
/// 5,000,000 at reputation 100.
pub fn free_allowance(reputation: f64) -> u64 {
    if reputation < FREE_GAS_MIN_REPUTATION {
        return 0;
    }
    let span = 100.0 - FREE_GAS_MIN_REPUTATION;
    let fraction = ((reputation - FREE_GAS_MIN_REPUTATION) / span).clamp(0.0, 1.0);
    FREE_GAS_MIN_ALLOWANCE + ((FREE_GAS_MAX_ALLOWANCE - FREE_GAS_MIN_ALLOWANCE) as f64 * fraction) as u64
}

/// Whether a caller may perform an operation of the given type at all.
pub fn threshold_check(reputation: f64, op_type: OperationType) -> bool {
    reputation >= op_type.min_reputation()
}

/// Per-opcode discount/surcharge tier for the handful of opcodes the
/// policy treats specially (calls and contract creation); falls back to
/// the general reputation multiplier for everything else.
fn call_opcode_multiplier(opcode: u8, reputation: f64) -> Option<f64> {
    match opcode {
        OP_CALL => Some(if reputation >= 80.0 {
            0.5
        } else if reputation >= 60.0 {
            0.75
        } else {
            1.0
        }),
        OP_DELEGATECALL => Some(if reputation < 60.0 { 1.5 } else { 1.0 }),
        OP_CREATE | OP_CREATE2 => Some(if reputation >= 80.0 {
            0.7
        } else if reputation < 50.0 {
            1.25
        } else {
            1.0
        }),
        OP_STATICCALL => Some(if reputation >= 60.0 {
            0.6
        } else {
            0.8
        }),
        _ => None,
    }
}

fn base_opcode_cost(opcode: u8) -> u64 {
    match opcode {
        OP_CALL | OP_DELEGATECALL | OP_STATICCALL => BASE_CALL_COST,
        OP_CREATE | OP_CREATE2 => BASE_CREATE_COST,
        _ => BASE_OPCODE_COST,
    }
}

/// A price guarantee overrides the computed price for one address until
/// it expires, so long as the caller still clears the reputation floor it
/// was issued at.
#[derive(Debug, Clone, Copy)]
pub struct PriceGuarantee {
    pub guaranteed_price: u64,
    pub expiration_block: u64,
    pub min_reputation: f64,
}

/// A community-funded gas pool callers above the reputation floor can
/// draw from instead of paying out of pocket.
#[derive(Debug, Default)]
struct GasPool {
    balance: u64,
}

const GAS_POOL_MIN_REPUTATION: f64 = 30.0;

pub struct SustainableGasPolicy {
    block_gas_history: RwLock<VecDeque<(u64, u64)>>,
    guarantees: RwLock<HashMap<ContractAddress, PriceGuarantee>>,
    pools: RwLock<HashMap<String, GasPool>>,
}

impl SustainableGasPolicy {
    pub fn new() -> Self {
        Self {
            block_gas_history: RwLock::new(VecDeque::with_capacity(CONGESTION_WINDOW_BLOCKS)),
            guarantees: RwLock::new(HashMap::new()),
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Cost to execute a single opcode under the given reputation,
    /// applying per-opcode discount tiers where defined and the general
    /// interpolated discount otherwise. Never charges below 10% of the
    /// opcode's base cost.
    pub fn opcode_cost(&self, opcode: u8, reputation: f64) -> u64 {
        let base = base_opcode_cost(opcode);
        let multiplier = call_opcode_multiplier(opcode, reputation).unwrap_or_else(|| reputation_multiplier(reputation));
        let cost = (base as f64 * multiplier).round() as u64;
        cost.max((base as f64 * 0.1).round() as u64)
    }

    /// Cost of a storage read or write under the given reputation.
    pub fn storage_cost(&self, is_write: bool, reputation: f64) -> u64 {
        let base = if is_write { BASE_STORAGE_WRITE_COST } else { BASE_STORAGE_READ_COST };
        let multiplier = reputation_multiplier(reputation);
        let cost = (base as f64 * multiplier).round() as u64;
        cost.max((base as f64 * 0.1).round() as u64)
    }

    /// Full gas quote for a message: reputation discount, congestion
    /// multiplier, and the 21,000 floor, with any active price guarantee
    /// taking priority.
    pub fn price(&self, caller: ContractAddress, reputation: f64, base_fee: u64, current_block: u64) -> GasQuote {
        if let Some(guarantee) = self.guaranteed_price(caller, reputation, current_block) {
            debug!(%caller, guarantee, "price guarantee applied");
            return GasQuote::compute_from_reputation(guarantee, reputation);
        }

        let congestion = self.current_price_multiplier();
        let mut quote = GasQuote::compute_from_reputation(base_fee, reputation);
        quote.final_fee = ((quote.final_fee as f64 * congestion).round() as u64).max(MIN_GAS_FLOOR);
        trace!(%caller, reputation, congestion, final_fee = quote.final_fee, "gas quote computed");
        quote
    }

    fn guaranteed_price(&self, caller: ContractAddress, reputation: f64, current_block: u64) -> Option<u64> {
        let guarantees = self.guarantees.read();
        let guarantee = guarantees.get(&caller)?;
        if current_block > guarantee.expiration_block || reputation < guarantee.min_reputation {
            return None;
        }
        Some(guarantee.guaranteed_price)
    }

    pub fn set_price_guarantee(&self, caller: ContractAddress, guarantee: PriceGuarantee) {
        self.guarantees.write().insert(caller, guarantee);
    }

    /// Whether a transaction from this caller should be prioritized for
    /// inclusion ahead of lower-trust traffic once the network is under
    /// load: the reputation bar a caller must clear rises with load.
    pub fn should_prioritize(&self, reputation: f64, network_load: f64) -> bool {
        let load = network_load.clamp(0.0, 100.0);
        reputation >= (100.0 - load)
    }

    /// Record one block's total gas usage into the sliding congestion
    /// window, evicting entries older than `CONGESTION_WINDOW_BLOCKS`.
    pub fn record_block_gas(&self, height: u64, gas_used: u64) {
        let mut history = self.block_gas_history.write();
        history.push_back((height, gas_used));
        while history.len() > CONGESTION_WINDOW_BLOCKS {
            history.pop_front();
        }
    }

    /// Congestion multiplier from the last 100 recorded blocks' average
    /// gas usage relative to the target: 0.5 at zero load, 1.0 at target,
    /// clamped to [0.5, 2.0].
    pub fn current_price_multiplier(&self) -> f64 {
        let history = self.block_gas_history.read();
        if history.is_empty() {
            return 1.0;
        }
        let avg = history.iter().map(|(_, gas)| *gas as f64).sum::<f64>() / history.len() as f64;
        (0.5 + 0.5 * (avg / BLOCK_GAS_TARGET as f64)).clamp(0.5, 2.0)
    }

    pub fn create_pool(&self, pool_id: impl Into<String>, initial_balance: u64) {
        self.pools.write().insert(pool_id.into(), GasPool { balance: initial_balance });
    }

    /// Draw `amount` from a community gas pool on the caller's behalf.
    /// Requires the caller to clear the pool's reputation floor and the
    /// pool to hold sufficient balance.
    pub fn draw_from_pool(&self, pool_id: &str, reputation: f64, amount: u64) -> Result<(), &'static str> {
        if reputation < GAS_POOL_MIN_REPUTATION {
            return Err("caller reputation below community gas pool floor");
        }
        let mut pools = self.pools.write();
        let pool = pools.get_mut(pool_id).ok_or("unknown gas pool")?;
        if pool.balance < amount {
            return Err("gas pool balance exhausted");
        }
        pool.balance -= amount;
        debug!(pool_id, amount, remaining = pool.balance, "drew from community gas pool");
        Ok(())
    }
}

impl Default for SustainableGasPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    #[test]
    fn reputation_multiplier_interpolates() {
        assert!((reputation_multiplier(0.0) - 1.0).abs() < 1e-9);
        assert!((reputation_multiplier(100.0) - 0.5).abs() < 1e-9);
        assert!((reputation_multiplier(50.0) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn free_allowance_scales_between_floor_and_ceiling() {
        assert_eq!(free_allowance(79.0), 0);
        assert_eq!(free_allowance(80.0), 1_000_000);
        assert_eq!(free_allowance(100.0), 5_000_000);
    }

    #[test]
    fn threshold_check_gates_by_operation_type() {
        assert!(!threshold_check(45.0, OperationType::HighFrequency));
        assert!(threshold_check(55.0, OperationType::HighFrequency));
        assert!(threshold_check(10.0, OperationType::Standard));
    }

    #[test]
    fn call_opcode_discount_applies_at_high_reputation() {
        let policy = SustainableGasPolicy::new();
        let discounted = policy.opcode_cost(OP_CALL, 90.0);
        let full = policy.opcode_cost(OP_CALL, 10.0);
        assert!(discounted < full);
    }

    #[test]
    fn delegatecall_surcharge_below_60() {
        let policy = SustainableGasPolicy::new();
        let surcharge = policy.opcode_cost(OP_DELEGATECALL, 30.0);
        assert!(surcharge > BASE_CALL_COST);
    }

    #[test]
    fn congestion_multiplier_rises_with_average_load() {
        let policy = SustainableGasPolicy::new();
        for h in 0..10 {
            policy.record_block_gas(h, BLOCK_GAS_TARGET * 2);
        }
        assert!((policy.current_price_multiplier() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn price_floor_never_below_min_gas() {
        let policy = SustainableGasPolicy::new();
        let quote = policy.price(Address::zero(), 100.0, 1, 0);
        assert!(quote.final_fee >= MIN_GAS_FLOOR);
    }

    #[test]
    fn price_guarantee_overrides_computed_price() {
        let policy = SustainableGasPolicy::new();
        let caller = Address::from_low_u64_be(1);
        policy.set_price_guarantee(caller, PriceGuarantee { guaranteed_price: 99_999, expiration_block: 100, min_reputation: 50.0 });
        let quote = policy.price(caller, 60.0, 10, 50);
        assert_eq!(quote.base_fee, 99_999);
    }

    #[test]
    fn gas_pool_draw_requires_reputation_floor() {
        let policy = SustainableGasPolicy::new();
        policy.create_pool("community", 1_000);
        assert!(policy.draw_from_pool("community", 10.0, 100).is_err());
        assert!(policy.draw_from_pool("community", 40.0, 100).is_ok());
    }
}
