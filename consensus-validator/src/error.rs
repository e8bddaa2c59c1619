#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("duplicate response from validator")]
    DuplicateResponse,
    #[error("challenge nonce mismatch")]
    NonceMismatch,
    #[error("validator not selected for this session")]
    NotSelected,
    #[error("session not found")]
    SessionNotFound,
    #[error("fraud claim rejected: {0}")]
    FraudClaimRejected(String),
    #[error("dispute not found")]
    DisputeNotFound,
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
