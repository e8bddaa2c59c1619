//! Node process wiring: on-chain envelope codec, persisted-state key
//! layout, transaction lifecycle state, in-memory chain client, RPC
//! surface, and peer-message glue.

pub mod chain;
pub mod envelope;
pub mod keys;
pub mod peer;
pub mod rpc;
pub mod transaction;
pub mod validators;

pub use chain::InMemoryChainClient;
pub use envelope::{Envelope, EnvelopeError, OpType, TrustEdgeBody};
pub use peer::PeerRelay;
pub use rpc::AppState;
pub use transaction::TransactionState;
pub use validators::ValidatorPool;
