//! gcviz Simulation Core
//!
//! Drives two external collector simulators (reference counting and
//! mark-and-sweep), parses the statistics they print, and rebuilds a
//! renderable object graph for each.
//!
//! # Pipeline
//!
//! ```text
//! GcSimulator ──▶ ProcessRunner (RC, then MS)
//!                      │ stdout
//!                      ▼
//!                 parse_stats ──▶ synthesize ──▶ ResultPersister
//!                                                    │
//!                                                    ▼
//!                                              HistoryLedger
//! ```
//!
//! The graph is a reconstruction from aggregate counts, not a dump of the
//! collector's heap.

mod config;
mod error;
mod graph;
mod history;
mod model;
mod persist;
mod runner;
mod simulator;
mod stats;

pub use config::{
    ParameterDefaults, ScenarioProfile, SimulationLimits, SimulatorConfig, BASIC_SCENARIO_CODE,
    DEFAULT_TIMEOUT_SECS,
};
pub use error::{ConfigError, LimitError, ParseWarning, PersistenceError, SimulationError};
pub use graph::{synthesize, Topology};
pub use history::HistoryLedger;
pub use model::{
    Algorithm, CollectorRunResult, EdgeStatus, HeapGraph, HistoryEntry, LinkType,
    MemoryObjectNode, NodeStatus, ReferenceEdge, SimulationParameters, MIB,
};
pub use persist::ResultPersister;
pub use runner::{CollectorInvocation, ProcessRunner};
pub use simulator::{CollectorOutcome, GcSimulator, SimulationState};
pub use stats::{extract_block, parse_stats, recovery_percent, CollectorStats, ParsedStats};
