//! Enhanced VM execution layer: bytecode format detection, trust-aware gas
//! and opcode policy, and the coordinator that ties them to an EVM
//! semantics engine wrapper.

pub mod coordinator;
pub mod detector;
pub mod error;
pub mod evm_wrapper;
pub mod gas_policy;
pub mod opcode_policy;

pub use coordinator::{
    DeploymentKind, EnhancedVmCoordinator, ExecutionRequest, OperationKind, MAX_BYTECODE_SIZE,
    MAX_CALL_DEPTH,
};
pub use detector::BytecodeFormatDetector;
pub use error::{ExecutionError, ExecutionResult};
pub use evm_wrapper::{ExecutionHost, InMemoryHost, OpcodeGate, ReferenceInterpreter};
pub use gas_policy::{OperationType, PriceGuarantee, SustainableGasPolicy};
pub use opcode_policy::{
    ExceptionKind, MemoryRegion, MemoryRegionTable, OpcodeSessionState, ReputationSortedArray,
    TrustAwareOpcodePolicy, WeightedStackEntry,
};
