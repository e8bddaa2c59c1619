//! Shared type definitions for the trust-gated execution and consensus core.
//!
//! - Core domain types: reputation, trust graph, wallet clusters, gas
//!   quotes, opcode decisions, execution receipts, consensus and dispute
//!   records.
//! - Common API envelope and pagination types.
//! - The closed error taxonomy shared across services.

pub mod common;
pub mod domain;
pub mod error;

pub use common::{ApiError, ApiResponse, PaginatedResponse, PaginationParams};
pub use domain::*;
pub use error::CommonError;

pub type Result<T> = std::result::Result<T, CommonError>;
pub type ApiResult<T> = std::result::Result<ApiResponse<T>, CommonError>;
