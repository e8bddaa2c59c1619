use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("opcode rejected: {0}")]
    OpcodeRejected(String),

    #[error("out of gas")]
    OutOfGas,

    #[error("call stack depth exceeded: {0}")]
    StackDepthExceeded(usize),

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("unsupported bytecode format")]
    UnsupportedFormat,

    #[error("invalid instruction")]
    InvalidInstruction,

    #[error("call depth exceeded: {0}")]
    CallDepthExceeded(usize),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("host error: {0}")]
    Host(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
