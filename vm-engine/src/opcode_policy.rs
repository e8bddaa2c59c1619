//! Trust-Aware Opcode Policy: every opcode a session executes is gated by
//! the caller's raw reputation score (0-100), not just a coarse tier.
//! Jumps are range-limited by bytecode position, loops are capped by
//! iteration count, arithmetic operands are bounded, memory regions can be
//! trust-tagged or protected, and cryptographic opcodes get extra
//! scrutiny the lower a caller's reputation runs.

use std::collections::HashMap;

use ethers::types::{Address, U256};
use tracing::{debug, warn};

use shared::crypto::hashing::blake3_hash;
use shared::types::{ContractAddress, OpcodeDecision};

pub const OP_JUMP: u8 = 0x56;
pub const OP_JUMPI: u8 = 0x57;
pub const OP_ADD: u8 = 0x01;
pub const OP_MUL: u8 = 0x02;
pub const OP_DIV: u8 = 0x04;
pub const OP_CALL: u8 = 0xf1;
pub const OP_CALLCODE: u8 = 0xf2;
pub const OP_DELEGATECALL: u8 = 0xf4;
pub const OP_STATICCALL: u8 = 0xfa;
pub const OP_CREATE: u8 = 0xf0;
pub const OP_CREATE2: u8 = 0xf5;
pub const OP_SELFDESTRUCT: u8 = 0xff;

/// Pseudo-opcodes the policy gates the same way it would EVM precompile
/// calls, since the reference interpreter doesn't model precompile
/// addresses separately.
pub const OP_SHA3: u8 = 0x20;
pub const OP_ECRECOVER: u8 = 0xe1;
pub const OP_MODEXP: u8 = 0xe5;
pub const OP_ECADD: u8 = 0xe6;
pub const OP_ECMUL: u8 = 0xe7;
pub const OP_ECPAIRING: u8 = 0xe8;

/// Global ceiling on jump destinations regardless of reputation: no
/// bytecode longer than this can be a jump target.
pub const MAX_JUMP_TARGET: usize = 1_000_000;
const MAX_PROTECTED_REGIONS: usize = 256;

/// Reputation-indexed loop iteration cap: how many times a caller may
/// revisit the same jump destination within one execution.
pub fn loop_iteration_cap(reputation: f64) -> u64 {
    if reputation >= 90.0 {
        1_000_000_000
    } else if reputation >= 80.0 {
        100_000_000
    } else if reputation >= 70.0 {
        10_000_000
    } else if reputation >= 60.0 {
        1_000_000
    } else if reputation >= 50.0 {
        100_000
    } else if reputation >= 40.0 {
        10_000
    } else if reputation >= 30.0 {
        1_000
    } else {
        100
    }
}

/// Whether a JUMP/JUMPI to `target` is allowed from a bytecode of
/// `code_len` bytes: reputation widens the addressable range, and no
/// reputation lets a jump target past the global ceiling.
pub fn jump_allowed(reputation: f64, target: usize, code_len: usize) -> bool {
    if target >= MAX_JUMP_TARGET {
        return false;
    }
    if reputation < 30.0 {
        return false;
    }
    let limit = if reputation >= 80.0 {
        code_len
    } else if reputation >= 40.0 {
        code_len / 2
    } else {
        code_len / 4
    };
    target < limit
}

fn call_min_reputation(opcode: u8, value_is_nonzero: bool) -> f64 {
    match opcode {
        OP_CALL if value_is_nonzero => 60.0,
        OP_CALL => 40.0,
        OP_CALLCODE => 60.0,
        OP_DELEGATECALL => 80.0,
        OP_STATICCALL => 20.0,
        OP_CREATE | OP_CREATE2 => 70.0,
        OP_SELFDESTRUCT => 90.0,
        OP_JUMP | OP_JUMPI => 30.0,
        _ => 0.0,
    }
}

/// Operand bit-width permitted for trust-weighted arithmetic at a given
/// reputation: unrestricted at >=80, half-range at >=60, low 64 bits at
/// >=40, low 32 bits below that.
fn arithmetic_bit_width(reputation: f64) -> u32 {
    if reputation >= 80.0 {
        256
    } else if reputation >= 60.0 {
        128
    } else if reputation >= 40.0 {
        64
    } else {
        32
    }
}

fn truncate_to_bits(value: U256, bits: u32) -> U256 {
    if bits >= 256 {
        return value;
    }
    let mask = (U256::one() << bits) - U256::one();
    value & mask
}

/// Apply ADD/MUL/DIV with reputation-bounded operands: division by zero
/// returns zero, and multiplication overflow returns zero below the top
/// reputation tier rather than wrapping.
pub fn apply_arithmetic(opcode: u8, a: U256, b: U256, reputation: f64) -> U256 {
    let bits = arithmetic_bit_width(reputation);
    let a = truncate_to_bits(a, bits);
    let b = truncate_to_bits(b, bits);

    match opcode {
        OP_ADD => truncate_to_bits(a.overflowing_add(b).0, bits),
        OP_MUL => {
            let (result, overflowed) = a.overflowing_mul(b);
            if overflowed && reputation < 80.0 {
                U256::zero()
            } else {
                truncate_to_bits(result, bits)
            }
        }
        OP_DIV => {
            if b.is_zero() {
                U256::zero()
            } else {
                a / b
            }
        }
        _ => a,
    }
}

/// A reputation-tagged region of contract memory. Reads require
/// `min_reputation`; writes require `min_reputation + 10`. Protected
/// regions additionally require the original creator, or a caller whose
/// reputation clears the bar, and may only be created by a reputation-70+
/// caller.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub region_id: u32,
    pub offset: u64,
    pub size: u64,
    pub min_reputation: f64,
    pub creator: ContractAddress,
    pub is_protected: bool,
}

impl MemoryRegion {
    fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.offset + self.size
    }
}

#[derive(Debug, Default)]
pub struct MemoryRegionTable {
    regions: Vec<MemoryRegion>,
    next_id: u32,
}

impl MemoryRegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_region(
        &mut self,
        creator: ContractAddress,
        creator_reputation: f64,
        offset: u64,
        size: u64,
        min_reputation: f64,
        is_protected: bool,
    ) -> Result<u32, &'static str> {
        if creator_reputation < 70.0 {
            return Err("region creation requires reputation >= 70");
        }
        if self.regions.len() >= MAX_PROTECTED_REGIONS {
            return Err("protected region count at capacity");
        }
        let id = self.next_id;
        self.next_id += 1;
        self.regions.push(MemoryRegion { region_id: id, offset, size, min_reputation, creator, is_protected });
        Ok(id)
    }

    fn region_for(&self, offset: u64) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.contains(offset))
    }

    pub fn check_read(&self, offset: u64, caller_reputation: f64) -> bool {
        match self.region_for(offset) {
            None => caller_reputation >= 20.0,
            Some(region) => caller_reputation >= region.min_reputation,
        }
    }

    pub fn check_write(&self, offset: u64, caller: ContractAddress, caller_reputation: f64) -> bool {
        match self.region_for(offset) {
            None => caller_reputation >= 40.0,
            Some(region) => {
                let base_ok = caller_reputation >= region.min_reputation;
                if region.is_protected {
                    (region.creator == caller || caller_reputation >= region.min_reputation)
                        && caller_reputation >= region.min_reputation + 10.0
                } else {
                    base_ok
                }
            }
        }
    }
}

/// A stack entry tagged with the reputation a caller needs to pop it.
#[derive(Debug, Clone, Copy)]
pub struct WeightedStackEntry {
    pub value: U256,
    pub weight: f64,
}

/// Pop succeeds only if the caller's reputation clears the entry's
/// weight; a caller who doesn't clear it leaves the stack untouched.
pub fn weighted_pop(stack: &mut Vec<WeightedStackEntry>, caller_reputation: f64) -> Option<U256> {
    match stack.last() {
        Some(top) if caller_reputation >= top.weight => stack.pop().map(|e| e.value),
        _ => None,
    }
}

/// An array of (value, weight) pairs lazily sorted descending by weight
/// before the first read; reads below `min_access_reputation` are denied.
#[derive(Debug, Default)]
pub struct ReputationSortedArray {
    data: Vec<(U256, f64)>,
    is_sorted: bool,
    pub min_access_reputation: f64,
}

impl ReputationSortedArray {
    pub fn new(min_access_reputation: f64) -> Self {
        Self { data: Vec::new(), is_sorted: false, min_access_reputation }
    }

    pub fn push(&mut self, value: U256, weight: f64) {
        self.data.push((value, weight));
        self.is_sorted = false;
    }

    pub fn read(&mut self, index: usize, caller_reputation: f64) -> Option<U256> {
        if caller_reputation < self.min_access_reputation {
            return None;
        }
        if !self.is_sorted {
            self.data.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
            self.is_sorted = true;
        }
        self.data.get(index).map(|(v, _)| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    OutOfGas,
    Revert,
    Invalid,
    StackOverflow,
    StackUnderflow,
}

/// Gas refund after an abnormal exit, biased by reputation: higher trust
/// recovers a larger share of unused gas.
pub fn exception_refund(kind: ExceptionKind, reputation: f64, gas_used: u64, gas_remaining: u64) -> u64 {
    match kind {
        ExceptionKind::OutOfGas => {
            if reputation >= 80.0 {
                (gas_used as f64 * 0.10) as u64
            } else if reputation >= 60.0 {
                (gas_used as f64 * 0.05) as u64
            } else {
                0
            }
        }
        ExceptionKind::Revert => {
            if reputation >= 70.0 {
                (gas_remaining as f64 * 0.90) as u64
            } else if reputation >= 50.0 {
                (gas_remaining as f64 * 0.75) as u64
            } else {
                0
            }
        }
        ExceptionKind::Invalid => {
            if reputation >= 80.0 {
                (gas_remaining as f64 * 0.25) as u64
            } else {
                0
            }
        }
        ExceptionKind::StackOverflow | ExceptionKind::StackUnderflow => {
            if reputation < 40.0 {
                0
            } else {
                gas_remaining
            }
        }
    }
}

/// Cryptographic opcode scrutiny tier: standard hashes are unrestricted,
/// ECRECOVER and MODEXP are flagged below a reputation floor, and the
/// elliptic-curve opcodes are rejected outright below theirs.
pub fn crypto_opcode_scrutiny(opcode: u8, reputation: f64) -> Result<(), &'static str> {
    match opcode {
        OP_ECRECOVER if reputation < 40.0 => Err("ecrecover flagged for scrutiny below reputation 40"),
        OP_MODEXP if reputation < 50.0 => Err("modexp flagged for scrutiny below reputation 50"),
        OP_ECADD | OP_ECMUL | OP_ECPAIRING if reputation < 60.0 => {
            Err("elliptic-curve opcode requires reputation >= 60")
        }
        _ => Ok(()),
    }
}

/// Reputation-weighted ECDSA signature check: higher reputation accepts
/// looser encodings, lower reputation demands canonical 65-byte
/// signatures with a bounded, non-degenerate recovery id.
pub fn verify_signature(reputation: f64, signature: &[u8], recovery_id: u8) -> bool {
    if reputation >= 80.0 {
        return signature.len() == 64 || signature.len() == 65;
    }
    if signature.len() != 65 {
        return false;
    }
    if reputation >= 60.0 {
        return recovery_id <= 3;
    }
    let all_zero = signature.iter().all(|&b| b == 0);
    let all_constant = signature.windows(2).all(|w| w[0] == w[1]);
    if reputation >= 40.0 {
        return recovery_id <= 3 && !all_zero;
    }
    recovery_id <= 1 && !all_constant
}

/// Deterministic trust-enhanced hash: reputation, caller address,
/// timestamp, and payload are folded into one digest so the same inputs
/// under a different reputation produce a different hash.
pub fn trust_enhanced_hash(reputation: f64, caller: &Address, timestamp: i64, data: &[u8]) -> String {
    let mut input = Vec::with_capacity(8 + 20 + 8 + data.len());
    input.extend_from_slice(&reputation.to_be_bytes());
    input.extend_from_slice(caller.as_bytes());
    input.extend_from_slice(&timestamp.to_be_bytes());
    input.extend_from_slice(data);
    blake3_hash(&input)
}

/// Reputation-based key derivation parameters: key length shrinks and
/// iteration rounds drop as reputation falls, trading strength for
/// throughput for lower-trust callers.
pub fn derive_key_params(reputation: f64) -> (usize, u32) {
    let key_len = if reputation >= 80.0 {
        32
    } else if reputation >= 60.0 {
        24
    } else if reputation >= 40.0 {
        16
    } else {
        12
    };
    let rounds = 1 + (reputation / 20.0) as u32;
    (key_len, rounds)
}

/// Entropy sources mixed into trust-aware randomness: every tier gets a
/// system random value, the caller address, and the timestamp; higher
/// tiers add the current block hash and a second random draw.
pub fn trust_aware_entropy(reputation: f64, system_random: &[u8; 32], caller: &Address, timestamp: i64, block_hash: &[u8; 32]) -> Vec<u8> {
    let mut input = Vec::new();
    input.extend_from_slice(system_random);
    input.extend_from_slice(caller.as_bytes());
    input.extend_from_slice(&timestamp.to_be_bytes());
    if reputation >= 60.0 {
        input.extend_from_slice(block_hash);
    }
    if reputation >= 80.0 {
        input.extend_from_slice(system_random);
    }
    let rounds = 1 + (reputation / 25.0) as u32;
    let mut digest = blake3_hash(&input);
    for _ in 1..rounds {
        digest = blake3_hash(digest.as_bytes());
    }
    digest.into_bytes()
}

/// Mutable per-execution-session state the coordinator carries across an
/// opcode stream: how many times each jump destination has been revisited
/// this session, used to enforce the reputation-indexed loop cap.
#[derive(Debug, Default, Clone)]
pub struct OpcodeSessionState {
    jump_visits: HashMap<usize, u64>,
}

impl OpcodeSessionState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct TrustAwareOpcodePolicy;

impl TrustAwareOpcodePolicy {
    /// Evaluate one opcode at position `pc` in a bytecode of `code_len`
    /// bytes under the caller's reputation.
    pub fn evaluate(opcode: u8, reputation: f64, pc: usize, code_len: usize, session: &mut OpcodeSessionState) -> OpcodeDecision {
        match opcode {
            OP_JUMP | OP_JUMPI => {
                if !jump_allowed(reputation, pc, code_len) {
                    return deny(opcode, format!("jump to {} rejected for reputation {}", pc, reputation));
                }
                let visits = session.jump_visits.entry(pc).or_insert(0);
                *visits += 1;
                if *visits > loop_iteration_cap(reputation) {
                    return rate_limited(opcode, format!("loop at {} exceeded iteration cap", pc));
                }
                allow(opcode)
            }
            OP_CALL | OP_CALLCODE | OP_DELEGATECALL | OP_STATICCALL | OP_CREATE | OP_CREATE2 | OP_SELFDESTRUCT => {
                let min = call_min_reputation(opcode, false);
                if reputation < min {
                    return deny(opcode, format!("opcode 0x{:02x} requires reputation >= {}", opcode, min));
                }
                allow(opcode)
            }
            OP_ECRECOVER | OP_MODEXP | OP_ECADD | OP_ECMUL | OP_ECPAIRING => {
                match crypto_opcode_scrutiny(opcode, reputation) {
                    Ok(()) => allow(opcode),
                    Err(reason) => deny(opcode, reason.to_string()),
                }
            }
            _ => allow(opcode),
        }
    }

    /// Variant of `evaluate` for CALL with a non-zero value, which needs a
    /// higher reputation floor than a zero-value call.
    pub fn evaluate_call_with_value(reputation: f64, value_is_nonzero: bool) -> OpcodeDecision {
        let min = call_min_reputation(OP_CALL, value_is_nonzero);
        if reputation < min {
            deny(OP_CALL, format!("value-transferring call requires reputation >= {}", min))
        } else {
            allow(OP_CALL)
        }
    }
}

fn allow(opcode: u8) -> OpcodeDecision {
    OpcodeDecision { opcode, allowed: true, rate_limited: false, reason: None }
}

fn deny(opcode: u8, reason: String) -> OpcodeDecision {
    warn!(opcode, %reason, "opcode denied");
    OpcodeDecision { opcode, allowed: false, rate_limited: false, reason: Some(reason) }
}

fn rate_limited(opcode: u8, reason: String) -> OpcodeDecision {
    debug!(opcode, %reason, "opcode rate limited");
    OpcodeDecision { opcode, allowed: false, rate_limited: true, reason: Some(reason) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_opcode_always_allowed() {
        let mut session = OpcodeSessionState::new();
        let decision = TrustAwareOpcodePolicy::evaluate(0x01, 5.0, 0, 100, &mut session);
        assert!(decision.allowed);
    }

    #[test]
    fn selfdestruct_denied_below_90() {
        let mut session = OpcodeSessionState::new();
        let decision = TrustAwareOpcodePolicy::evaluate(OP_SELFDESTRUCT, 50.0, 0, 100, &mut session);
        assert!(!decision.allowed);
    }

    #[test]
    fn jump_range_widens_with_reputation() {
        assert!(!jump_allowed(20.0, 50, 100));
        assert!(jump_allowed(35.0, 20, 100));
        assert!(!jump_allowed(35.0, 30, 100));
        assert!(jump_allowed(85.0, 99, 100));
    }

    #[test]
    fn loop_cap_scales_with_reputation() {
        assert_eq!(loop_iteration_cap(95.0), 1_000_000_000);
        assert_eq!(loop_iteration_cap(10.0), 100);
    }

    #[test]
    fn division_by_zero_returns_zero() {
        let result = apply_arithmetic(OP_DIV, U256::from(10), U256::zero(), 90.0);
        assert_eq!(result, U256::zero());
    }

    #[test]
    fn low_reputation_truncates_operands() {
        let big = U256::from(u64::MAX) + U256::one();
        let result = apply_arithmetic(OP_ADD, big, U256::zero(), 10.0);
        assert!(result < U256::from(1u64) << 32);
    }

    #[test]
    fn memory_region_requires_creator_reputation() {
        let mut table = MemoryRegionTable::new();
        let creator = Address::from_low_u64_be(1);
        assert!(table.create_region(creator, 40.0, 0, 32, 50.0, false).is_err());
        assert!(table.create_region(creator, 80.0, 0, 32, 50.0, false).is_ok());
    }

    #[test]
    fn protected_region_requires_creator_or_elevated_reputation() {
        let mut table = MemoryRegionTable::new();
        let creator = Address::from_low_u64_be(1);
        let stranger = Address::from_low_u64_be(2);
        table.create_region(creator, 90.0, 0, 32, 60.0, true).unwrap();

        assert!(table.check_write(0, creator, 70.0));
        assert!(!table.check_write(0, stranger, 50.0));
    }

    #[test]
    fn weighted_stack_blocks_low_reputation_pop() {
        let mut stack = vec![WeightedStackEntry { value: U256::from(7), weight: 80.0 }];
        assert!(weighted_pop(&mut stack, 50.0).is_none());
        assert!(weighted_pop(&mut stack, 90.0).is_some());
    }

    #[test]
    fn sorted_array_denies_below_access_floor() {
        let mut array = ReputationSortedArray::new(60.0);
        array.push(U256::from(1), 10.0);
        array.push(U256::from(2), 90.0);
        assert!(array.read(0, 30.0).is_none());
        assert_eq!(array.read(0, 70.0), Some(U256::from(2)));
    }

    #[test]
    fn exception_refunds_scale_with_reputation() {
        assert_eq!(exception_refund(ExceptionKind::OutOfGas, 10.0, 1_000, 0), 0);
        assert_eq!(exception_refund(ExceptionKind::OutOfGas, 85.0, 1_000, 0), 100);
        assert_eq!(exception_refund(ExceptionKind::Revert, 75.0, 0, 1_000), 900);
    }

    #[test]
    fn crypto_scrutiny_rejects_ec_opcodes_below_60() {
        assert!(crypto_opcode_scrutiny(OP_ECADD, 59.0).is_err());
        assert!(crypto_opcode_scrutiny(OP_ECADD, 60.0).is_ok());
        assert!(crypto_opcode_scrutiny(OP_SHA3, 1.0).is_ok());
    }

    #[test]
    fn signature_checks_tighten_below_reputation_floors() {
        let sig65 = vec![1u8; 65];
        assert!(verify_signature(90.0, &sig65, 200));
        assert!(!verify_signature(50.0, &sig65, 5));
        assert!(verify_signature(65.0, &sig65, 2));
    }

    #[test]
    fn key_derivation_shrinks_with_reputation() {
        assert_eq!(derive_key_params(85.0), (32, 1 + 4));
        assert_eq!(derive_key_params(10.0), (12, 1));
    }
}
