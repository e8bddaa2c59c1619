//! Reputation Registry, Trust Graph Oracle, and Wallet Clusterer: the
//! per-address trust data the rest of the execution and consensus core
//! reads from but only this crate writes to.

pub mod clusterer;
pub mod error;
pub mod registry;
pub mod trust_graph;

pub use clusterer::{CoOccurrence, WalletClusterer};
pub use error::{RegistryError, RegistryResult};
pub use registry::{BehaviorEvent, ReputationRegistry};
pub use trust_graph::{web_of_trust_coverage, InMemoryTrustGraph, TrustGraphOracle};
