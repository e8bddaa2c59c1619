//! Transaction lifecycle state, tracked per `tx_hash` across validation,
//! execution, and (if contested) dispute resolution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    PendingValidation,
    Validated,
    Disputed,
    Rejected,
}
