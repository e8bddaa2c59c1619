//! Peer broadcast abstraction standing in for the P2P transport: the core
//! depends on a `PeerNetwork` to gossip consensus votes, reputation
//! updates, and fraud records, without owning the network stack itself.

pub mod event_types;
pub mod publisher;

pub use event_types::*;
pub use publisher::RedisPeerNetwork;

use async_trait::async_trait;

/// Broadcast/subscribe interface a node uses to gossip `PeerEvent`s. The
/// default adapter is Redis pub/sub (`RedisPeerNetwork`); a real P2P
/// transport would implement the same trait.
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    async fn broadcast(&self, event: &PeerEvent) -> Result<(), MessageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Topic error: {0}")]
    Topic(String),
}

pub type MessageResult<T> = Result<T, MessageError>;
