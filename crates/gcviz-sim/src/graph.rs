//! Reference graph synthesis.
//!
//! Collectors only report aggregate counts, so the graph handed to the
//! renderer is reconstructed: node liveness comes from `objects_left`, and
//! the edge shape comes from the scenario. The result is a plausible heap
//! that shows the scenario's failure mode, not the collector's real heap.
//!
//! ```text
//! ring (cycle_leak)        chain (cascade_delete, linear, default)
//!
//!   0 ──▶ 1                 0 ──▶ 1 ──▶ 2 ──▶ 3
//!   ▲     │
//!   │     ▼
//!   3 ◀── 2
//! ```

use crate::model::{
    Algorithm, EdgeStatus, HeapGraph, LinkType, MemoryObjectNode, NodeStatus, ReferenceEdge,
};
use tracing::{debug, info};

/// Edge layout for a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// `i -> (i + 1) % n`, closing back to node 0
    Ring,
    /// `i - 1 -> i`, a deletion cascade
    Cascade,
    /// `i - 1 -> i`, the fallback layout
    Linear,
}

impl Topology {
    /// Pick the topology for a scenario identifier.
    ///
    /// `cyclic` and `cascade` are accepted as short synonyms.
    pub fn for_scenario(scenario: &str) -> Self {
        match scenario {
            "cycle_leak" | "cyclic" => Topology::Ring,
            "cascade_delete" | "cascade" => Topology::Cascade,
            _ => Topology::Linear,
        }
    }

    /// Number of edges this topology produces for `n` objects.
    pub fn edge_count(&self, n: u64) -> u64 {
        match self {
            Topology::Ring => n,
            Topology::Cascade | Topology::Linear => n.saturating_sub(1),
        }
    }
}

/// Build the node and edge lists for one collector run.
pub fn synthesize(
    algorithm: Algorithm,
    objects_created: u64,
    objects_left: u64,
    scenario: &str,
    object_size: u64,
) -> HeapGraph {
    let topology = Topology::for_scenario(scenario);
    let objects = build_nodes(algorithm, objects_created, objects_left, object_size);
    let references = match topology {
        Topology::Ring => ring_edges(objects_created, objects_left),
        Topology::Cascade | Topology::Linear => chain_edges(objects_created, objects_left),
    };

    info!(
        "{} graph for '{}': {:?} topology, {} objects, {} references",
        algorithm,
        scenario,
        topology,
        objects.len(),
        references.len()
    );

    HeapGraph { objects, references }
}

fn build_nodes(
    algorithm: Algorithm,
    objects_created: u64,
    objects_left: u64,
    size: u64,
) -> Vec<MemoryObjectNode> {
    (0..objects_created)
        .map(|id| {
            let status = if id < objects_left {
                algorithm.surviving_status()
            } else {
                NodeStatus::Deleted
            };
            MemoryObjectNode {
                id,
                size,
                status,
                is_root: id == 0 && !status.is_deleted(),
            }
        })
        .collect()
}

fn edge_status(from_id: u64, to_id: u64, objects_left: u64) -> EdgeStatus {
    if from_id < objects_left && to_id < objects_left {
        EdgeStatus::Active
    } else {
        EdgeStatus::Removed
    }
}

// A single object yields the self-loop 0 -> 0, kept as the closing edge.
fn ring_edges(objects_created: u64, objects_left: u64) -> Vec<ReferenceEdge> {
    (0..objects_created)
        .map(|from_id| {
            let to_id = (from_id + 1) % objects_created;
            let edge = ReferenceEdge {
                from_id,
                to_id,
                status: edge_status(from_id, to_id, objects_left),
                link_type: LinkType::Cycle,
                is_cycle_closure: to_id == 0,
            };
            if edge.is_cycle_closure {
                debug!("Cycle closure edge: {} -> {} ({:?})", from_id, to_id, edge.status);
            }
            edge
        })
        .collect()
}

fn chain_edges(objects_created: u64, objects_left: u64) -> Vec<ReferenceEdge> {
    (1..objects_created)
        .map(|to_id| {
            let from_id = to_id - 1;
            ReferenceEdge {
                from_id,
                to_id,
                status: edge_status(from_id, to_id, objects_left),
                link_type: LinkType::Normal,
                is_cycle_closure: false,
            }
        })
        .collect()
}
