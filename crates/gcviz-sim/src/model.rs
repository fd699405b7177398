//! Simulation data model.
//!
//! Everything here is serialized as-is into result artifacts and history
//! snapshots, so field names double as the JSON schema consumed by the
//! renderer.

use crate::stats::CollectorStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes per MiB, used to convert heap capacity for the collector CLI.
pub const MIB: u64 = 1024 * 1024;

/// Collector algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Reference counting; cannot reclaim cycles
    #[serde(rename = "RC")]
    ReferenceCounting,
    /// Mark-and-sweep; traces from roots
    #[serde(rename = "MS")]
    MarkSweep,
}

impl Algorithm {
    /// Both algorithms in run order.
    pub const ALL: [Algorithm; 2] = [Algorithm::ReferenceCounting, Algorithm::MarkSweep];

    /// Tag used in output markers (`[RC_STATS]`).
    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::ReferenceCounting => "RC",
            Algorithm::MarkSweep => "MS",
        }
    }

    /// Lowercase prefix for artifact file names.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Algorithm::ReferenceCounting => "rc",
            Algorithm::MarkSweep => "ms",
        }
    }

    /// Status given to an object that survived collection.
    ///
    /// Reference counting only frees acyclic garbage, so whatever it leaves
    /// behind is a leak by definition.
    pub fn surviving_status(&self) -> NodeStatus {
        match self {
            Algorithm::ReferenceCounting => NodeStatus::Leaked,
            Algorithm::MarkSweep => NodeStatus::Alive,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parameters of one simulation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Heap capacity in bytes
    pub heap_size: u64,
    /// Number of objects to allocate
    pub num_objects: u64,
    /// Size of each object in bytes
    pub object_size: u64,
    /// Scenario identifier (`basic`, `cycle_leak`, ...)
    pub scenario_type: String,
}

impl SimulationParameters {
    pub fn new(
        heap_size: u64,
        num_objects: u64,
        object_size: u64,
        scenario_type: impl Into<String>,
    ) -> Self {
        Self {
            heap_size,
            num_objects,
            object_size,
            scenario_type: scenario_type.into(),
        }
    }

    /// Heap capacity as whole MiB, the unit the collectors expect.
    pub fn heap_size_mib(&self) -> u64 {
        self.heap_size / MIB
    }

    /// Check the invariants every run depends on.
    ///
    /// Range limits are the caller's business (see
    /// [`SimulationLimits`](crate::config::SimulationLimits)).
    pub fn validate(&self) -> Result<(), String> {
        if self.num_objects == 0 {
            return Err("num_objects must be positive".to_string());
        }
        if self.object_size == 0 {
            return Err("object_size must be positive".to_string());
        }
        if self.scenario_type.trim().is_empty() {
            return Err("scenario_type must not be empty".to_string());
        }
        Ok(())
    }
}

/// Liveness of a heap object after collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Alive,
    Leaked,
    Deleted,
}

impl NodeStatus {
    pub fn is_deleted(&self) -> bool {
        matches!(self, NodeStatus::Deleted)
    }
}

/// A heap object in the synthesized graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryObjectNode {
    pub id: u64,
    pub size: u64,
    pub status: NodeStatus,
    pub is_root: bool,
}

/// Edge liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
    Active,
    Removed,
}

/// Topology tag carried by each edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Normal,
    Cycle,
}

/// A reference between two heap objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub from_id: u64,
    pub to_id: u64,
    pub status: EdgeStatus,
    pub link_type: LinkType,
    pub is_cycle_closure: bool,
}

/// Synthesized object graph for one collector run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapGraph {
    pub objects: Vec<MemoryObjectNode>,
    pub references: Vec<ReferenceEdge>,
}

/// Result of running one collector for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorRunResult {
    #[serde(rename = "type")]
    pub algorithm: Algorithm,
    pub scenario: String,
    /// Scenario name as reported by the collector itself, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_label: Option<String>,
    pub success: bool,
    pub stats: CollectorStats,
    pub objects: Vec<MemoryObjectNode>,
    pub references: Vec<ReferenceEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectorRunResult {
    /// A successful run with its parsed stats and synthesized graph.
    pub fn success(
        algorithm: Algorithm,
        scenario: impl Into<String>,
        scenario_label: Option<String>,
        stats: CollectorStats,
        graph: HeapGraph,
    ) -> Self {
        Self {
            algorithm,
            scenario: scenario.into(),
            scenario_label,
            success: true,
            stats,
            objects: graph.objects,
            references: graph.references,
            error: None,
        }
    }

    /// A failed run: zeroed stats, empty graph, human-readable message.
    pub fn failure(
        algorithm: Algorithm,
        scenario: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            algorithm,
            scenario: scenario.into(),
            scenario_label: None,
            success: false,
            stats: CollectorStats::default(),
            objects: Vec::new(),
            references: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// One completed simulation in the history ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub parameters: SimulationParameters,
    pub rc_result: CollectorRunResult,
    pub ms_result: CollectorRunResult,
}
