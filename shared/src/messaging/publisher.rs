use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;

use super::event_types::PeerEvent;
use super::{MessageError, MessageResult, PeerNetwork};

const EVENT_CHANNEL_PREFIX: &str = "peer:";

/// `PeerNetwork` backed by Redis pub/sub, standing in for the real P2P
/// gossip transport.
pub struct RedisPeerNetwork {
    redis_client: redis::Client,
}

impl RedisPeerNetwork {
    pub fn new(redis_client: redis::Client) -> Self {
        Self { redis_client }
    }

    pub fn from_url(redis_url: &str) -> MessageResult<Self> {
        let redis_client = redis::Client::open(redis_url)
            .map_err(|e| MessageError::Connection(e.to_string()))?;
        Ok(Self { redis_client })
    }

    fn channel_for(&self, event: &PeerEvent) -> String {
        format!("{}{}", EVENT_CHANNEL_PREFIX, event.topic())
    }
}

#[async_trait]
impl PeerNetwork for RedisPeerNetwork {
    async fn broadcast(&self, event: &PeerEvent) -> MessageResult<()> {
        let channel = self.channel_for(event);
        let payload =
            serde_json::to_string(event).map_err(|e| MessageError::Serialization(e.to_string()))?;

        let mut conn = self
            .redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| MessageError::Connection(e.to_string()))?;

        conn.publish::<_, _, ()>(&channel, payload)
            .await
            .map_err(|e| MessageError::Topic(format!("publish to {}: {}", channel, e)))?;

        info!(channel = %channel, "broadcast peer event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_naming_is_topic_scoped() {
        let redis_client = redis::Client::open("redis://localhost:6379").unwrap();
        let net = RedisPeerNetwork::new(redis_client);

        let event = PeerEvent::ReputationUpdated(super::super::event_types::ReputationUpdatedEvent {
            address: ethers::types::Address::zero(),
            old_composite: 10.0,
            new_composite: 12.0,
            occurred_at: chrono::Utc::now(),
        });

        assert_eq!(net.channel_for(&event), "peer:reputation");
    }
}
