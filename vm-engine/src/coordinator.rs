//! Enhanced VM Coordinator: the single entry point execution sessions go
//! through. It detects the bytecode format, trust-gates the request
//! against the caller's reputation, quotes gas, gates each opcode the
//! interpreter executes, routes NATIVE/EVM/HYBRID bytecode to the right
//! interpreter, and assembles the final execution receipt.

use ethers::types::{Address, H256, U256};
use tracing::{debug, instrument, warn};

use crate::detector::BytecodeFormatDetector;
use crate::error::{ExecutionError, ExecutionResult};
use crate::evm_wrapper::{EvmOutcome, ExecutionHost, OpcodeGate, ReferenceInterpreter};
use crate::gas_policy::SustainableGasPolicy;
use crate::opcode_policy::{OpcodeSessionState, TrustAwareOpcodePolicy};
use shared::crypto::hashing::blake3_hash;
use shared::types::{BytecodeFormat, ContractAddress, ExecutionReceipt, ExecutionStatus, GasQuote};

/// Hard ceiling on nested call depth regardless of reputation.
pub const MAX_CALL_DEPTH: usize = 1024;
/// Deployed (and init) bytecode larger than this is rejected outright.
pub const MAX_BYTECODE_SIZE: usize = 24 * 1024;

/// What kind of operation a request represents, for the reputation floor
/// `trust_gate` enforces before anything executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Deploy,
    Call,
    HighValueCall,
    CrossChain,
}

impl OperationKind {
    pub fn min_reputation(&self) -> f64 {
        match self {
            OperationKind::Deploy => 50.0,
            OperationKind::Call => 0.0,
            OperationKind::HighValueCall => 70.0,
            OperationKind::CrossChain => 80.0,
        }
    }
}

/// CREATE vs CREATE2 address derivation inputs.
#[derive(Debug, Clone, Copy)]
pub enum DeploymentKind {
    Create { nonce: u64 },
    Create2 { salt: H256 },
}

/// Reputation-tiered resource caps a request's own `gas_limit` is checked
/// against: lower-trust callers get a lower ceiling regardless of what
/// they ask for.
pub fn reputation_based_limits(reputation: f64) -> (u64, usize) {
    if reputation >= 90.0 {
        (30_000_000, 16 * 1024 * 1024)
    } else if reputation >= 70.0 {
        (15_000_000, 8 * 1024 * 1024)
    } else if reputation >= 50.0 {
        (8_000_000, 4 * 1024 * 1024)
    } else if reputation >= 30.0 {
        (3_000_000, 1024 * 1024)
    } else {
        (500_000, 256 * 1024)
    }
}

struct SessionGate {
    reputation: f64,
    session: OpcodeSessionState,
}

impl OpcodeGate for SessionGate {
    fn check(&mut self, opcode: u8, pc: usize, code_len: usize) -> ExecutionResult<()> {
        let decision = TrustAwareOpcodePolicy::evaluate(opcode, self.reputation, pc, code_len, &mut self.session);
        if decision.allowed {
            Ok(())
        } else {
            Err(ExecutionError::OpcodeRejected(
                decision.reason.unwrap_or_else(|| format!("opcode 0x{:02x} rejected", opcode)),
            ))
        }
    }
}

/// Parameters for a single coordinated execution.
pub struct ExecutionRequest<'a> {
    pub contract: ContractAddress,
    pub caller: ContractAddress,
    pub bytecode: &'a [u8],
    pub caller_reputation: f64,
    pub value: U256,
    pub call_depth: usize,
    pub network_utilization: f64,
    pub base_fee: u64,
    pub gas_limit: u64,
    pub current_block: u64,
}

pub struct EnhancedVmCoordinator {
    detector: BytecodeFormatDetector,
    gas_policy: SustainableGasPolicy,
}

impl EnhancedVmCoordinator {
    pub fn new() -> Self {
        Self {
            detector: BytecodeFormatDetector::new(),
            gas_policy: SustainableGasPolicy::new(),
        }
    }

    /// Quote gas for a request without executing it, so callers (and the
    /// mempool) can reject underpriced transactions before they reach the
    /// interpreter.
    pub fn quote_gas(&self, request: &ExecutionRequest<'_>) -> GasQuote {
        self.gas_policy.price(request.caller, request.caller_reputation, request.base_fee, request.current_block)
    }

    pub fn record_block_gas(&self, height: u64, gas_used: u64) {
        self.gas_policy.record_block_gas(height, gas_used);
    }

    /// Preconditions that must hold before any bytecode runs, per the
    /// operation's reputation floor and the caller's resource tier.
    fn trust_gate(&self, request: &ExecutionRequest<'_>, operation: OperationKind) -> ExecutionResult<()> {
        if request.call_depth >= MAX_CALL_DEPTH {
            return Err(ExecutionError::CallDepthExceeded(request.call_depth));
        }
        if request.gas_limit < crate::gas_policy::MIN_GAS_FLOOR {
            return Err(ExecutionError::Rejected(format!(
                "gas limit {} below floor {}",
                request.gas_limit,
                crate::gas_policy::MIN_GAS_FLOOR
            )));
        }
        if operation == OperationKind::Deploy && request.bytecode.len() > MAX_BYTECODE_SIZE {
            return Err(ExecutionError::Rejected(format!(
                "init code {} bytes exceeds {} byte cap",
                request.bytecode.len(),
                MAX_BYTECODE_SIZE
            )));
        }

        let required = operation.min_reputation();
        if request.caller_reputation < required {
            return Err(ExecutionError::Rejected(format!(
                "{:?} requires reputation >= {}, caller has {}",
                operation, required, request.caller_reputation
            )));
        }

        let high_value_floor = OperationKind::HighValueCall.min_reputation();
        if !request.value.is_zero() && request.caller_reputation < high_value_floor {
            return Err(ExecutionError::Rejected(format!(
                "value-transferring call requires reputation >= {}",
                high_value_floor
            )));
        }

        let (gas_cap, _memory_cap) = reputation_based_limits(request.caller_reputation);
        if request.gas_limit > gas_cap {
            return Err(ExecutionError::Rejected(format!(
                "gas limit {} exceeds tier cap {} for reputation {}",
                request.gas_limit, gas_cap, request.caller_reputation
            )));
        }

        Ok(())
    }

    /// Deploy a new contract: derives the CREATE/CREATE2 address, trust
    /// gates the request, and runs the init code through the appropriate
    /// interpreter.
    #[instrument(skip(self, request, host), fields(contract = %request.contract))]
    pub fn deploy(
        &self,
        request: ExecutionRequest<'_>,
        kind: DeploymentKind,
        host: &mut dyn ExecutionHost,
    ) -> ExecutionResult<ExecutionReceipt> {
        self.trust_gate(&request, OperationKind::Deploy)?;

        let contract_address = match kind {
            DeploymentKind::Create { nonce } => derive_create_address(request.caller, nonce),
            DeploymentKind::Create2 { salt } => derive_create2_address(request.caller, salt, request.bytecode),
        };
        debug!(%contract_address, "derived contract address for deployment");

        let mut receipt = self.run(&request, host)?;
        receipt.contract_address = Some(contract_address);
        Ok(receipt)
    }

    /// Call into an already-deployed contract.
    #[instrument(skip(self, request, host), fields(contract = %request.contract))]
    pub fn call(
        &self,
        request: ExecutionRequest<'_>,
        host: &mut dyn ExecutionHost,
    ) -> ExecutionResult<ExecutionReceipt> {
        let operation = if !request.value.is_zero() {
            OperationKind::HighValueCall
        } else {
            OperationKind::Call
        };
        self.trust_gate(&request, operation)?;
        self.run(&request, host)
    }

    /// Backward-compatible entry point: format-detects and executes
    /// without distinguishing deploy from call. Prefer `deploy`/`call`.
    pub fn execute(
        &self,
        request: ExecutionRequest<'_>,
        host: &mut dyn ExecutionHost,
    ) -> ExecutionResult<ExecutionReceipt> {
        self.trust_gate(&request, OperationKind::Call)?;
        self.run(&request, host)
    }

    fn run(&self, request: &ExecutionRequest<'_>, host: &mut dyn ExecutionHost) -> ExecutionResult<ExecutionReceipt> {
        let detection = self.detector.detect(request.bytecode);
        let free_allowance = crate::gas_policy::free_allowance(request.caller_reputation);

        let mut cross_format_calls_made = 0u32;
        let mut total_cross_calls = 0u32;

        let outcome = match detection.format {
            BytecodeFormat::Evm => self.run_evm(request, host)?,
            BytecodeFormat::Native => self.run_native(request)?,
            BytecodeFormat::Hybrid => {
                total_cross_calls += 1;
                match self.run_native(request) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(?err, "native path failed for hybrid bytecode, falling back to evm");
                        cross_format_calls_made += 1;
                        self.run_evm(request, host)?
                    }
                }
            }
            BytecodeFormat::Unknown => return Err(ExecutionError::UnsupportedFormat),
        };

        let used_free_gas = request.caller_reputation >= crate::gas_policy::FREE_GAS_MIN_REPUTATION
            && outcome.gas_used <= free_allowance;

        Ok(ExecutionReceipt {
            tx_hash: None,
            contract: request.contract,
            contract_address: None,
            gas_used: outcome.gas_used,
            status: outcome.status,
            logs: outcome.logs,
            return_data: outcome.return_data,
            executed_format: detection.format,
            caller_reputation_before: request.caller_reputation,
            caller_reputation_after: request.caller_reputation,
            trust_gate_passed: true,
            reputation_gas_discount: 1.0 - crate::gas_policy::reputation_multiplier(request.caller_reputation),
            used_free_gas,
            cross_format_calls_made,
            total_cross_calls,
        })
    }

    fn run_evm(&self, request: &ExecutionRequest<'_>, host: &mut dyn ExecutionHost) -> ExecutionResult<EvmOutcome> {
        let mut gate = SessionGate {
            reputation: request.caller_reputation,
            session: OpcodeSessionState::new(),
        };
        let interpreter = ReferenceInterpreter;
        match interpreter.execute(request.contract, request.bytecode, host, &mut gate, request.gas_limit) {
            Ok(outcome) => Ok(outcome),
            Err(ExecutionError::Reverted(reason)) => Ok(EvmOutcome {
                status: ExecutionStatus::Reverted(reason),
                gas_used: 0,
                return_data: Vec::new(),
                logs: Vec::new(),
            }),
            Err(other) => Err(other),
        }
    }

    /// Placeholder native-format execution: there is no production native
    /// interpreter behind this crate yet, so it validates the bytecode and
    /// charges flat gas proportional to its length.
    fn run_native(&self, request: &ExecutionRequest<'_>) -> ExecutionResult<EvmOutcome> {
        if request.bytecode.len() <= 4 {
            return Err(ExecutionError::InvalidInstruction);
        }
        let gas_used = (request.bytecode.len() as u64 * 10).min(request.gas_limit);
        Ok(EvmOutcome {
            status: ExecutionStatus::Success,
            gas_used,
            return_data: Vec::new(),
            logs: Vec::new(),
        })
    }
}

fn address_from_digest(input: &[u8]) -> ContractAddress {
    let digest = blake3_hash(input);
    let bytes = hex::decode(digest).expect("blake3_hash always returns valid hex");
    Address::from_slice(&bytes[12..32])
}

fn derive_create_address(sender: ContractAddress, nonce: u64) -> ContractAddress {
    let mut input = Vec::with_capacity(20 + 8);
    input.extend_from_slice(sender.as_bytes());
    input.extend_from_slice(&nonce.to_be_bytes());
    address_from_digest(&input)
}

fn derive_create2_address(sender: ContractAddress, salt: H256, init_code: &[u8]) -> ContractAddress {
    let init_code_digest = blake3_hash(init_code);
    let init_code_hash = hex::decode(init_code_digest).expect("blake3_hash always returns valid hex");

    let mut input = Vec::with_capacity(1 + 20 + 32 + 32);
    input.push(0xff);
    input.extend_from_slice(sender.as_bytes());
    input.extend_from_slice(salt.as_bytes());
    input.extend_from_slice(&init_code_hash);
    address_from_digest(&input)
}

impl Default for EnhancedVmCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm_wrapper::InMemoryHost;
    use ethers::types::Address;

    fn base_request(bytecode: &[u8]) -> ExecutionRequest<'_> {
        ExecutionRequest {
            contract: Address::zero(),
            caller: Address::from_low_u64_be(1),
            bytecode,
            caller_reputation: 90.0,
            value: U256::zero(),
            call_depth: 0,
            network_utilization: 0.2,
            base_fee: 10,
            gas_limit: 100_000,
            current_block: 1,
        }
    }

    #[test]
    fn executes_simple_evm_bytecode() {
        let coordinator = EnhancedVmCoordinator::new();
        let bytecode = vec![0x60, 0x01, 0x60, 0x02, 0x01, 0x00]; // PUSH1 1, PUSH1 2, ADD, STOP
        let mut host = InMemoryHost::default();

        let request = base_request(&bytecode);
        let receipt = coordinator.call(request, &mut host).unwrap();
        assert_eq!(receipt.status, ExecutionStatus::Success);
        assert_eq!(receipt.executed_format, BytecodeFormat::Evm);
    }

    #[test]
    fn rejects_unknown_bytecode() {
        let coordinator = EnhancedVmCoordinator::new();
        let bytecode = vec![0x11, 0x22, 0x33];
        let mut host = InMemoryHost::default();

        let request = base_request(&bytecode);
        let result = coordinator.call(request, &mut host);
        assert!(matches!(result, Err(ExecutionError::UnsupportedFormat)));
    }

    #[test]
    fn low_reputation_selfdestruct_rejected() {
        let coordinator = EnhancedVmCoordinator::new();
        let bytecode = vec![0x60, 0x00, 0xff]; // PUSH1 0, SELFDESTRUCT
        let mut host = InMemoryHost::default();

        let mut request = base_request(&bytecode);
        request.caller_reputation = 20.0;
        let result = coordinator.call(request, &mut host);
        assert!(matches!(result, Err(ExecutionError::OpcodeRejected(_))));
    }

    #[test]
    fn deploy_below_reputation_floor_rejected() {
        let coordinator = EnhancedVmCoordinator::new();
        let bytecode = vec![0x60, 0x00, 0x00];
        let mut host = InMemoryHost::default();

        let mut request = base_request(&bytecode);
        request.caller_reputation = 10.0;
        let result = coordinator.deploy(request, DeploymentKind::Create { nonce: 0 }, &mut host);
        assert!(matches!(result, Err(ExecutionError::Rejected(_))));
    }

    #[test]
    fn deploy_assigns_derived_create_address() {
        let coordinator = EnhancedVmCoordinator::new();
        let bytecode = vec![0x60, 0x00, 0x60, 0x01, 0x01, 0x00];
        let mut host = InMemoryHost::default();

        let request = base_request(&bytecode);
        let receipt = coordinator.deploy(request, DeploymentKind::Create { nonce: 3 }, &mut host).unwrap();
        assert!(receipt.contract_address.is_some());
    }

    #[test]
    fn create2_is_deterministic_for_same_inputs() {
        let sender = Address::from_low_u64_be(7);
        let salt = H256::zero();
        let code = vec![0x60, 0x00];
        let a = derive_create2_address(sender, salt, &code);
        let b = derive_create2_address(sender, salt, &code);
        assert_eq!(a, b);
    }

    #[test]
    fn call_depth_at_limit_rejected() {
        let coordinator = EnhancedVmCoordinator::new();
        let bytecode = vec![0x00];
        let mut host = InMemoryHost::default();

        let mut request = base_request(&bytecode);
        request.call_depth = MAX_CALL_DEPTH;
        let result = coordinator.call(request, &mut host);
        assert!(matches!(result, Err(ExecutionError::CallDepthExceeded(_))));
    }

    #[test]
    fn gas_limit_below_floor_rejected() {
        let coordinator = EnhancedVmCoordinator::new();
        let bytecode = vec![0x00];
        let mut host = InMemoryHost::default();

        let mut request = base_request(&bytecode);
        request.gas_limit = 1_000;
        let result = coordinator.call(request, &mut host);
        assert!(matches!(result, Err(ExecutionError::Rejected(_))));
    }
}
