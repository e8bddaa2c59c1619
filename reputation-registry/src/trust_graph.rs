//! Trust Graph Oracle: answers "is there a trust path from A to B within
//! depth D, and what is its aggregate weight?" The graph storage and
//! traversal implementation itself is out of scope for the core (it is an
//! external collaborator); `InMemoryTrustGraph` is the adapter this crate
//! ships so the oracle contract has a working default.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;

use shared::types::{ContractAddress, TrustEdge, TrustPath};

/// `find_paths(from, to, max_depth)` contract the HAT Consensus Validator
/// and Enhanced VM Coordinator consult to compute web-of-trust coverage.
#[async_trait::async_trait]
pub trait TrustGraphOracle: Send + Sync {
    async fn add_edge(&self, edge: TrustEdge);
    async fn find_paths(&self, from: ContractAddress, to: ContractAddress, max_depth: usize) -> Vec<TrustPath>;
    async fn has_path(&self, from: ContractAddress, to: ContractAddress, max_depth: usize) -> bool {
        !self.find_paths(from, to, max_depth).await.is_empty()
    }
}

/// Maximum number of disjoint paths returned per query, so a densely
/// connected graph can't make a single lookup unbounded.
const MAX_PATHS: usize = 8;

#[derive(Default)]
pub struct InMemoryTrustGraph {
    edges: RwLock<HashMap<ContractAddress, Vec<TrustEdge>>>,
}

impl InMemoryTrustGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait::async_trait]
impl TrustGraphOracle for InMemoryTrustGraph {
    async fn add_edge(&self, edge: TrustEdge) {
        self.edges.write().await.entry(edge.from).or_default().push(edge);
    }

    /// Breadth-first search bounded by `max_depth`, collecting up to
    /// `MAX_PATHS` distinct node-disjoint-ish paths (a node may recur
    /// across returned paths, just not within one). Weight of a path is
    /// the product of its edge weights, normalized to [0, 1] on the way
    /// in: callers keep depth short, so compounding error stays small.
    async fn find_paths(&self, from: ContractAddress, to: ContractAddress, max_depth: usize) -> Vec<TrustPath> {
        let edges = self.edges.read().await;
        let mut results = Vec::new();
        let mut queue: VecDeque<(Vec<ContractAddress>, f64)> = VecDeque::new();
        queue.push_back((vec![from], 1.0));

        while let Some((path, weight)) = queue.pop_front() {
            if results.len() >= MAX_PATHS {
                break;
            }

            let current = *path.last().unwrap();
            if current == to && path.len() > 1 {
                results.push(TrustPath { hops: path.clone(), weight });
                continue;
            }

            if path.len() - 1 >= max_depth {
                continue;
            }

            if let Some(out_edges) = edges.get(&current) {
                for edge in out_edges {
                    if path.contains(&edge.to) {
                        continue;
                    }
                    let mut next_path = path.clone();
                    next_path.push(edge.to);
                    let normalized = (edge.weight / 100.0).clamp(-1.0, 1.0);
                    queue.push_back((next_path, weight * normalized));
                }
            }
        }

        results
    }
}

/// Fraction of a validator set that has at least one trust path to the
/// transaction sender within `max_depth`. The HAT Consensus Validator
/// requires this to clear `CONSENSUS_MIN_WOT_COVERAGE` before finalizing.
pub async fn web_of_trust_coverage(
    oracle: &dyn TrustGraphOracle,
    sender: ContractAddress,
    validators: &[ContractAddress],
    max_depth: usize,
) -> f64 {
    if validators.is_empty() {
        return 0.0;
    }

    let mut connected = 0usize;
    for validator in validators {
        if oracle.has_path(*validator, sender, max_depth).await {
            connected += 1;
        }
    }

    connected as f64 / validators.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> ContractAddress {
        ethers::types::Address::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn finds_direct_path() {
        let graph = InMemoryTrustGraph::new();
        let (a, b) = (addr(1), addr(2));
        graph.add_edge(TrustEdge { from: a, to: b, weight: 80.0 }).await;

        let paths = graph.find_paths(a, b, 3).await;
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].hops, vec![a, b]);
    }

    #[tokio::test]
    async fn finds_transitive_path_within_depth() {
        let graph = InMemoryTrustGraph::new();
        let (a, b, c) = (addr(1), addr(2), addr(3));
        graph.add_edge(TrustEdge { from: a, to: b, weight: 100.0 }).await;
        graph.add_edge(TrustEdge { from: b, to: c, weight: 50.0 }).await;

        assert!(graph.find_paths(a, c, 2).await.len() == 1);
        assert!(graph.find_paths(a, c, 1).await.is_empty());
    }

    #[tokio::test]
    async fn no_path_returns_empty() {
        let graph = InMemoryTrustGraph::new();
        let (a, b) = (addr(1), addr(2));
        assert!(graph.find_paths(a, b, 5).await.is_empty());
    }

    #[tokio::test]
    async fn coverage_counts_connected_validators() {
        let graph = InMemoryTrustGraph::new();
        let sender = addr(99);
        let (v1, v2) = (addr(1), addr(2));
        graph.add_edge(TrustEdge { from: v1, to: sender, weight: 90.0 }).await;

        let coverage = web_of_trust_coverage(&graph, sender, &[v1, v2], 2).await;
        assert!((coverage - 0.5).abs() < 1e-9);
    }
}
