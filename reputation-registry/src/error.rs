use shared::database::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("address already registered")]
    AlreadyRegistered,
    #[error("address not found")]
    NotFound,
    #[error("persistence error: {0}")]
    Storage(#[from] DatabaseError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
