//! Wallet Clusterer: groups addresses heuristically controlled by one
//! entity from shared funding sources and co-occurring transaction
//! timing, and reports a confidence that degrades with cluster size and
//! is boosted by high transaction volume between members.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use shared::types::{ContractAddress, WalletCluster};

/// Co-occurrence observation: two addresses active within the same
/// short window, e.g. funded from the same source in the same block.
#[derive(Debug, Clone, Copy)]
pub struct CoOccurrence {
    pub a: ContractAddress,
    pub b: ContractAddress,
    pub shared_tx_volume: u64,
}

/// Confidence floor clusters never drop below once formed, and the
/// per-member decay applied for every address beyond the first two.
const BASE_CONFIDENCE: f64 = 0.9;
const SIZE_DECAY_PER_MEMBER: f64 = 0.05;
const MIN_CONFIDENCE: f64 = 0.2;
/// Volume (in wei-equivalent smallest units) above which the volume boost
/// saturates.
const VOLUME_BOOST_SATURATION: u64 = 1_000_000;
const MAX_VOLUME_BOOST: f64 = 0.15;

pub struct WalletClusterer {
    clusters: RwLock<Vec<WalletCluster>>,
    links: RwLock<HashMap<ContractAddress, Vec<CoOccurrence>>>,
}

impl WalletClusterer {
    pub fn new() -> Self {
        Self {
            clusters: RwLock::new(Vec::new()),
            links: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn observe(&self, co: CoOccurrence) {
        let mut links = self.links.write().await;
        links.entry(co.a).or_default().push(co);
        links.entry(co.b).or_default().push(CoOccurrence { a: co.b, b: co.a, shared_tx_volume: co.shared_tx_volume });
    }

    /// Build clusters by connected components over the co-occurrence
    /// graph, folding each component into one `WalletCluster` with a
    /// confidence derived from its size and total observed volume.
    pub async fn recompute(&self) -> Vec<WalletCluster> {
        let links = self.links.read().await;
        let mut visited = std::collections::HashSet::new();
        let mut clusters = Vec::new();

        for &start in links.keys() {
            if visited.contains(&start) {
                continue;
            }

            let mut members = Vec::new();
            let mut volume_total: u64 = 0;
            let mut queue = std::collections::VecDeque::new();
            queue.push_back(start);
            visited.insert(start);

            while let Some(node) = queue.pop_front() {
                members.push(node);
                if let Some(neighbors) = links.get(&node) {
                    for link in neighbors {
                        volume_total = volume_total.saturating_add(link.shared_tx_volume);
                        if visited.insert(link.b) {
                            queue.push_back(link.b);
                        }
                    }
                }
            }

            if members.len() < 2 {
                continue;
            }

            let confidence = cluster_confidence(members.len(), volume_total);
            clusters.push(WalletCluster::new(members, confidence));
        }

        let mut stored = self.clusters.write().await;
        *stored = clusters.clone();
        clusters
    }

    pub async fn clusters(&self) -> Vec<WalletCluster> {
        self.clusters.read().await.clone()
    }

    pub async fn cluster_containing(&self, address: &ContractAddress) -> Option<WalletCluster> {
        self.clusters
            .read()
            .await
            .iter()
            .find(|c| c.members.contains(address))
            .cloned()
    }
}

impl Default for WalletClusterer {
    fn default() -> Self {
        Self::new()
    }
}

/// Larger clusters are reported with lower confidence (loose heuristic
/// links compound), offset by a boost when the members have transacted
/// heavily with each other, capped so volume alone can't restore full
/// confidence to a large, weakly-evidenced cluster.
fn cluster_confidence(size: usize, volume_total: u64) -> f64 {
    let decay = SIZE_DECAY_PER_MEMBER * (size.saturating_sub(2) as f64);
    let volume_fraction = (volume_total as f64 / VOLUME_BOOST_SATURATION as f64).clamp(0.0, 1.0);
    let boost = volume_fraction * MAX_VOLUME_BOOST;

    (BASE_CONFIDENCE - decay + boost).clamp(MIN_CONFIDENCE, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> ContractAddress {
        ethers::types::Address::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn pairs_form_a_cluster() {
        let clusterer = WalletClusterer::new();
        let (a, b) = (addr(1), addr(2));
        clusterer.observe(CoOccurrence { a, b, shared_tx_volume: 100 }).await;

        let clusters = clusterer.recompute().await;
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 2);
    }

    #[tokio::test]
    async fn singletons_never_cluster() {
        let clusterer = WalletClusterer::new();
        let clusters = clusterer.recompute().await;
        assert!(clusters.is_empty());
    }

    #[tokio::test]
    async fn larger_clusters_have_lower_base_confidence() {
        let small = cluster_confidence(2, 0);
        let large = cluster_confidence(10, 0);
        assert!(large < small);
    }

    #[tokio::test]
    async fn high_volume_boosts_confidence() {
        let low_volume = cluster_confidence(5, 0);
        let high_volume = cluster_confidence(5, VOLUME_BOOST_SATURATION * 2);
        assert!(high_volume > low_volume);
    }

    #[tokio::test]
    async fn cluster_containing_finds_member() {
        let clusterer = WalletClusterer::new();
        let (a, b) = (addr(1), addr(2));
        clusterer.observe(CoOccurrence { a, b, shared_tx_volume: 10 }).await;
        clusterer.recompute().await;

        assert!(clusterer.cluster_containing(&a).await.is_some());
        assert!(clusterer.cluster_containing(&addr(99)).await.is_none());
    }
}
