//! Sybil/Eclipse protection, the HAT Consensus Validator, dispute/DAO
//! arbitration, and fraud record penalties: the distributed half of the
//! trust-gated execution and consensus core.

pub mod dispute;
pub mod error;
pub mod fraud;
pub mod scoring;
pub mod selection;
pub mod session;
pub mod sybil;

pub use dispute::DisputeArbitration;
pub use error::{ConsensusError, ConsensusResult};
pub use fraud::{FraudClaim, FraudClaimOrigin, FraudLedger, GradedPenalty};
pub use scoring::ClaimedScore;
pub use selection::{select_validators, ValidatorStats, MIN_VALIDATORS};
pub use session::HatConsensusValidator;
pub use sybil::{score_cluster, ClusterObservation, SybilDisposition};
