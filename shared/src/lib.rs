//! Shared utilities and types for the trust-gated execution and consensus
//! core: data model, cryptography, persistence, observability, and the
//! collaborator traits (chain client, peer network) the core crates depend
//! on without owning.

// Re-export common dependencies
pub use anyhow;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
pub use uuid;

pub mod blockchain;
pub mod crypto;
pub mod database;
pub mod messaging;
pub mod observability;
pub mod types;

pub use types::CommonError;

pub type Result<T> = std::result::Result<T, CommonError>;
