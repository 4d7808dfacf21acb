//! Spreading activation: seeded breadth-first spread over the entity/edge
//! graph with exponential hop decay, a lateral-inhibition cap on total
//! activation, a minimum-activation cutoff, and path-uniqueness cycle
//! prevention.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::Result;
use crate::graph::Direction;
use crate::storage::Storage;

#[derive(Debug, Clone, Copy)]
pub struct SpreadingActivationConfig {
    pub max_hops: u32,
    pub decay: f64,
    pub lateral_inhibition_cap: f64,
    pub min_activation: f64,
}

impl Default for SpreadingActivationConfig {
    fn default() -> Self {
        Self { max_hops: 3, decay: 0.5, lateral_inhibition_cap: 1.0, min_activation: 0.05 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivationResult {
    pub activations: HashMap<String, f64>,
}

/// Breadth-first spread from `seeds` (memory ids, each given activation
/// `1.0`) outward along edges in both directions. Each hop multiplies
/// inbound activation by `decay`. A node's total activation is the sum of
/// every path's contribution, capped at `lateral_inhibition_cap`. A node is
/// only expanded once per distinct path to the root (tracked by the visited
/// set keyed on node id), which prevents infinite cycles while still
/// allowing a node to accumulate activation from multiple seeds.
pub fn spreading_activation(
    storage: &Storage,
    project_id: &str,
    seeds: &[String],
    config: SpreadingActivationConfig,
) -> Result<ActivationResult> {
    let mut activations: HashMap<String, f64> = HashMap::new();
    let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
    let mut visited_at_hop: HashSet<(String, u32)> = HashSet::new();

    for seed in seeds {
        activations.insert(seed.clone(), 1.0);
        frontier.push_back((seed.clone(), 0));
        visited_at_hop.insert((seed.clone(), 0));
    }

    while let Some((node, hop)) = frontier.pop_front() {
        if hop >= config.max_hops {
            continue;
        }
        let activation = activations.get(&node).copied().unwrap_or(0.0);
        if activation < config.min_activation {
            continue;
        }
        let edges = storage.edge_query(&node, Direction::Both, project_id, false)?;
        // Split this node's outgoing activation evenly across its incident
        // edges so a high-degree hub can't funnel its full activation down
        // a single neighbor.
        let out = activation * config.decay;
        let per_edge = out / (edges.len().max(1) as f64);

        for edge in edges {
            let neighbor = if edge.from_id == node { edge.to_id.clone() } else { edge.from_id.clone() };
            if neighbor == node {
                continue;
            }
            let next_hop = hop + 1;
            let gain = per_edge * edge.confidence;
            if gain < config.min_activation {
                continue;
            }
            let entry = activations.entry(neighbor.clone()).or_insert(0.0);
            let updated = (*entry + gain).min(config.lateral_inhibition_cap);
            let improved = updated > *entry;
            *entry = updated;

            if improved && visited_at_hop.insert((neighbor.clone(), next_hop)) {
                frontier.push_back((neighbor, next_hop));
            }
        }
    }

    activations.retain(|_, v| *v >= config.min_activation);
    Ok(ActivationResult { activations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryType, StoreInput};

    fn seed_memory(storage: &Storage, content: &str) -> String {
        storage
            .store(StoreInput {
                content: content.into(),
                memory_type: MemoryType::Fact,
                tags: vec![],
                importance: 0.5,
                confidence: 0.5,
                project_id: "p1".into(),
            })
            .unwrap()
            .id
    }

    #[test]
    fn activation_decays_with_hop_distance() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed_memory(&storage, "a");
        let b = seed_memory(&storage, "b");
        let c = seed_memory(&storage, "c");
        storage.edge_create(&a, &b, "related_to", 1.0, serde_json::json!({}), "p1").unwrap();
        storage.edge_create(&b, &c, "related_to", 1.0, serde_json::json!({}), "p1").unwrap();

        let result = spreading_activation(&storage, "p1", &[a.clone()], SpreadingActivationConfig::default()).unwrap();
        let act_b = result.activations.get(&b).copied().unwrap_or(0.0);
        let act_c = result.activations.get(&c).copied().unwrap_or(0.0);
        assert!(act_b > act_c);
    }

    #[test]
    fn cycle_does_not_infinite_loop() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed_memory(&storage, "a");
        let b = seed_memory(&storage, "b");
        storage.edge_create(&a, &b, "related_to", 1.0, serde_json::json!({}), "p1").unwrap();
        storage.edge_create(&b, &a, "related_to", 1.0, serde_json::json!({}), "p1").unwrap();

        let result = spreading_activation(&storage, "p1", &[a], SpreadingActivationConfig::default()).unwrap();
        assert!(result.activations.contains_key(&b));
    }

    #[test]
    fn below_threshold_nodes_are_dropped() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed_memory(&storage, "a");
        let b = seed_memory(&storage, "b");
        storage.edge_create(&a, &b, "related_to", 0.01, serde_json::json!({}), "p1").unwrap();

        let result = spreading_activation(&storage, "p1", &[a], SpreadingActivationConfig::default()).unwrap();
        assert!(!result.activations.contains_key(&b));
    }
}
