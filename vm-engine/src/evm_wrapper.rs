//! EVM-Semantics Engine Wrapper: the coordinator does not reimplement EVM
//! semantics itself. It drives an `EvmInterpreter` collaborator through an
//! `ExecutionHost` that supplies chain state (balances, storage, code) and
//! records logs/self-destructs. `ReferenceInterpreter` is a minimal stack
//! machine covering arithmetic, storage, and control-flow opcodes, enough
//! to exercise the coordinator and its policies without a production EVM
//! dependency.

use crate::error::{ExecutionError, ExecutionResult};
use ethers::types::{Address, H256, U256};
use shared::types::{ContractAddress, ExecutionStatus, LogEntry, TxHash};
use std::collections::HashMap;

/// Chain/state surface the interpreter needs during execution: balances,
/// persistent storage, contract code, and logging/self-destruct effects.
/// The coordinator's host implementation fronts a `ChainClient` plus the
/// in-flight transaction's scratch state.
pub trait ExecutionHost {
    fn get_balance(&self, address: &Address) -> U256;
    fn get_storage(&self, address: &Address, slot: &H256) -> H256;
    fn set_storage(&mut self, address: &Address, slot: H256, value: H256);
    fn get_code(&self, address: &Address) -> Vec<u8>;
    fn emit_log(&mut self, log: LogEntry);
    fn self_destruct(&mut self, address: &Address, beneficiary: &Address);
}

/// An in-memory host suitable for testing and for sessions that don't need
/// a live chain connection.
#[derive(Default)]
pub struct InMemoryHost {
    pub balances: HashMap<Address, U256>,
    pub storage: HashMap<(Address, H256), H256>,
    pub code: HashMap<Address, Vec<u8>>,
    pub logs: Vec<LogEntry>,
    pub destructed: Vec<Address>,
}

impl ExecutionHost for InMemoryHost {
    fn get_balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn get_storage(&self, address: &Address, slot: &H256) -> H256 {
        self.storage.get(&(*address, *slot)).copied().unwrap_or_default()
    }

    fn set_storage(&mut self, address: &Address, slot: H256, value: H256) {
        self.storage.insert((*address, slot), value);
    }

    fn get_code(&self, address: &Address) -> Vec<u8> {
        self.code.get(address).cloned().unwrap_or_default()
    }

    fn emit_log(&mut self, log: LogEntry) {
        self.logs.push(log);
    }

    fn self_destruct(&mut self, address: &Address, _beneficiary: &Address) {
        self.destructed.push(*address);
    }
}

/// Opcode-level hook the coordinator's opcode policy runs against before
/// the interpreter executes each instruction. `pc`/`code_len` let the gate
/// range-check jump destinations against the bytecode being executed.
pub trait OpcodeGate {
    fn check(&mut self, opcode: u8, pc: usize, code_len: usize) -> ExecutionResult<()>;
}

pub struct EvmOutcome {
    pub status: ExecutionStatus,
    pub gas_used: u64,
    pub return_data: Vec<u8>,
    pub logs: Vec<LogEntry>,
}

const OP_STOP: u8 = 0x00;
const OP_ADD: u8 = 0x01;
const OP_PUSH1: u8 = 0x60;
const OP_SSTORE: u8 = 0x55;
const OP_SLOAD: u8 = 0x54;
const OP_JUMPDEST: u8 = 0x5b;
const OP_RETURN: u8 = 0xf3;
const OP_REVERT: u8 = 0xfd;

/// Minimal stack-machine interpreter: enough opcodes to drive real gas
/// accounting and opcode-gating through the coordinator.
pub struct ReferenceInterpreter;

impl ReferenceInterpreter {
    pub fn execute(
        &self,
        contract: ContractAddress,
        code: &[u8],
        host: &mut dyn ExecutionHost,
        gate: &mut dyn OpcodeGate,
        gas_limit: u64,
    ) -> ExecutionResult<EvmOutcome> {
        let mut stack: Vec<U256> = Vec::new();
        let mut pc = 0usize;
        let mut gas_used = 0u64;
        let mut logs = Vec::new();

        while pc < code.len() {
            if gas_used >= gas_limit {
                return Err(ExecutionError::OutOfGas);
            }

            let opcode = code[pc];
            gate.check(opcode, pc, code.len())?;
            gas_used += gas_cost(opcode);

            match opcode {
                OP_STOP => {
                    return Ok(EvmOutcome {
                        status: ExecutionStatus::Success,
                        gas_used,
                        return_data: Vec::new(),
                        logs,
                    });
                }
                OP_ADD => {
                    let a = stack.pop().unwrap_or_default();
                    let b = stack.pop().unwrap_or_default();
                    stack.push(a.overflowing_add(b).0);
                    pc += 1;
                }
                OP_PUSH1 => {
                    let value = *code.get(pc + 1).unwrap_or(&0);
                    stack.push(U256::from(value));
                    pc += 2;
                }
                OP_SSTORE => {
                    let slot = u256_to_h256(stack.pop().unwrap_or_default());
                    let value = u256_to_h256(stack.pop().unwrap_or_default());
                    host.set_storage(&contract, slot, value);
                    pc += 1;
                }
                OP_SLOAD => {
                    let slot = u256_to_h256(stack.pop().unwrap_or_default());
                    let value = host.get_storage(&contract, &slot);
                    stack.push(U256::from_big_endian(value.as_bytes()));
                    pc += 1;
                }
                OP_JUMPDEST => {
                    pc += 1;
                }
                OP_RETURN => {
                    let return_data = stack.iter().flat_map(|v| {
                        let mut buf = [0u8; 32];
                        v.to_big_endian(&mut buf);
                        buf.to_vec()
                    }).collect();
                    logs.append(&mut host_drain_logs(host));
                    return Ok(EvmOutcome {
                        status: ExecutionStatus::Success,
                        gas_used,
                        return_data,
                        logs,
                    });
                }
                OP_REVERT => {
                    return Err(ExecutionError::Reverted("REVERT opcode executed".to_string()));
                }
                _ => {
                    // Unknown opcode: charge base cost and continue. A
                    // production wrapper would forward to the underlying
                    // interpreter crate for full opcode coverage.
                    pc += 1;
                }
            }
        }

        Ok(EvmOutcome {
            status: ExecutionStatus::Success,
            gas_used,
            return_data: Vec::new(),
            logs,
        })
    }
}

fn host_drain_logs(host: &mut dyn ExecutionHost) -> Vec<LogEntry> {
    // InMemoryHost accumulates logs internally; a generic host may not,
    // so this is a best-effort hook for hosts that buffer logs themselves.
    let _ = host;
    Vec::new()
}

fn gas_cost(opcode: u8) -> u64 {
    match opcode {
        OP_STOP => 0,
        OP_PUSH1 => 3,
        OP_ADD => 3,
        OP_SLOAD => 800,
        OP_SSTORE => 5_000,
        OP_JUMPDEST => 1,
        OP_RETURN | OP_REVERT => 0,
        _ => 3,
    }
}

fn u256_to_h256(value: U256) -> H256 {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    H256::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopGate;
    impl OpcodeGate for NoopGate {
        fn check(&mut self, _opcode: u8, _pc: usize, _code_len: usize) -> ExecutionResult<()> {
            Ok(())
        }
    }

    #[test]
    fn executes_push_add_stop() {
        let code = vec![OP_PUSH1, 0x02, OP_PUSH1, 0x03, OP_ADD, OP_STOP];
        let mut host = InMemoryHost::default();
        let mut gate = NoopGate;
        let interpreter = ReferenceInterpreter;

        let outcome = interpreter
            .execute(Address::zero(), &code, &mut host, &mut gate, 1_000)
            .unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert!(outcome.gas_used > 0);
    }

    #[test]
    fn reverts_on_revert_opcode() {
        let code = vec![OP_REVERT];
        let mut host = InMemoryHost::default();
        let mut gate = NoopGate;
        let interpreter = ReferenceInterpreter;

        let result = interpreter.execute(Address::zero(), &code, &mut host, &mut gate, 1_000);
        assert!(matches!(result, Err(ExecutionError::Reverted(_))));
    }

    #[test]
    fn out_of_gas_when_limit_too_low() {
        let code = vec![OP_PUSH1, 0x01, OP_PUSH1, 0x01, OP_ADD, OP_STOP];
        let mut host = InMemoryHost::default();
        let mut gate = NoopGate;
        let interpreter = ReferenceInterpreter;

        let result = interpreter.execute(Address::zero(), &code, &mut host, &mut gate, 2);
        assert!(matches!(result, Err(ExecutionError::OutOfGas)));
    }

    #[test]
    fn storage_roundtrips() {
        let code = vec![
            OP_PUSH1, 0x2a, // value
            OP_PUSH1, 0x01, // slot
            OP_SSTORE, OP_PUSH1, 0x01, OP_SLOAD, OP_STOP,
        ];
        let mut host = InMemoryHost::default();
        let mut gate = NoopGate;
        let interpreter = ReferenceInterpreter;

        let outcome = interpreter
            .execute(Address::zero(), &code, &mut host, &mut gate, 10_000)
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
    }
}
