//! Simulation Orchestrator
//!
//! Runs both collectors for one request and turns their output into
//! renderable results.
//!
//! ```text
//! Idle ──▶ RunningRc ──▶ RunningMs ──▶ Persisting ──▶ Completed
//!   │          │             │
//!   └──────────┴─────────────┴──────▶ Failed
//! ```
//!
//! A collector failure only affects that collector's result: the RC run
//! failing still lets the MS run go ahead. Only invalid parameters take the
//! whole request to `Failed`.
//!
//! # Usage
//!
//! ```rust,ignore
//! let simulator = GcSimulator::new(SimulatorConfig::load(path)?);
//! let (rc, ms) = simulator
//!     .run_simulation(32 * MIB, 20, 64, "cycle_leak")
//!     .await;
//! let history = simulator.get_history().await;
//! ```

use crate::config::SimulatorConfig;
use crate::error::SimulationError;
use crate::graph::synthesize;
use crate::history::HistoryLedger;
use crate::model::{Algorithm, CollectorRunResult, HeapGraph, HistoryEntry, SimulationParameters};
use crate::persist::ResultPersister;
use crate::runner::{CollectorInvocation, ProcessRunner};
use crate::stats::{parse_stats, CollectorStats};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Where the most recent simulation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationState {
    /// Nothing has run yet
    Idle,
    /// Reference-counting collector is running
    RunningRc,
    /// Mark-and-sweep collector is running
    RunningMs,
    /// Writing result artifacts
    Persisting,
    /// Both results delivered and recorded
    Completed,
    /// Request rejected before any collector ran
    Failed,
}

impl SimulationState {
    fn running(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::ReferenceCounting => SimulationState::RunningRc,
            Algorithm::MarkSweep => SimulationState::RunningMs,
        }
    }

    /// Check if a collector is running
    pub fn is_running(&self) -> bool {
        matches!(self, SimulationState::RunningRc | SimulationState::RunningMs)
    }

    /// Check if the run is over, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, SimulationState::Completed | SimulationState::Failed)
    }
}

/// What one collector run produced
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorOutcome {
    Success {
        stats: CollectorStats,
        scenario_label: Option<String>,
        graph: HeapGraph,
    },
    Failure {
        reason: SimulationError,
    },
}

impl CollectorOutcome {
    /// Flatten into the result shape the renderer consumes.
    pub fn into_result(self, algorithm: Algorithm, scenario: &str) -> CollectorRunResult {
        match self {
            CollectorOutcome::Success {
                stats,
                scenario_label,
                graph,
            } => CollectorRunResult::success(algorithm, scenario, scenario_label, stats, graph),
            CollectorOutcome::Failure { reason } => {
                CollectorRunResult::failure(algorithm, scenario, reason.to_string())
            }
        }
    }
}

/// Drives both collectors and keeps the run history.
///
/// Methods take `&self`; share one instance behind an `Arc` to serve
/// concurrent requests.
pub struct GcSimulator {
    config: SimulatorConfig,
    runner: ProcessRunner,
    persister: ResultPersister,
    history: HistoryLedger,
    state: RwLock<SimulationState>,
}

impl GcSimulator {
    /// Create a simulator from an explicit configuration
    pub fn new(config: SimulatorConfig) -> Self {
        let runner = ProcessRunner::new(config.timeout());
        let persister = ResultPersister::new(config.output_dir.clone());

        info!("GcSimulator initialized");
        info!(" RC executable: {}", config.rc_executable.display());
        info!(" MS executable: {}", config.ms_executable.display());

        Self {
            config,
            runner,
            persister,
            history: HistoryLedger::new(),
            state: RwLock::new(SimulationState::Idle),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// State of the most recent run
    pub async fn state(&self) -> SimulationState {
        *self.state.read().await
    }

    /// Run both collectors for one request.
    ///
    /// Always returns two well-formed results; failures are reported inside
    /// them.
    pub async fn run_simulation(
        &self,
        heap_size: u64,
        num_objects: u64,
        object_size: u64,
        scenario_type: &str,
    ) -> (CollectorRunResult, CollectorRunResult) {
        self.run(SimulationParameters::new(heap_size, num_objects, object_size, scenario_type))
            .await
    }

    /// [`run_simulation`](Self::run_simulation) taking a parameter struct.
    pub async fn run(
        &self,
        params: SimulationParameters,
    ) -> (CollectorRunResult, CollectorRunResult) {
        let scenario = params.scenario_type.as_str();

        info!(
            "Starting simulation: scenario={} (code {}), heap={} MB, objects={}, size={} bytes",
            scenario,
            self.config.scenario_code(scenario),
            params.heap_size_mib(),
            params.num_objects,
            params.object_size
        );

        if let Err(msg) = params.validate() {
            let err = SimulationError::InvalidParameters(msg);
            error!("Simulation failed: {}", err);
            self.set_state(SimulationState::Failed).await;
            let message = err.to_string();
            return (
                CollectorRunResult::failure(
                    Algorithm::ReferenceCounting,
                    scenario,
                    message.clone(),
                ),
                CollectorRunResult::failure(Algorithm::MarkSweep, scenario, message),
            );
        }

        let rc_result = self
            .run_collector(Algorithm::ReferenceCounting, &params)
            .await
            .into_result(Algorithm::ReferenceCounting, scenario);

        let ms_result = self
            .run_collector(Algorithm::MarkSweep, &params)
            .await
            .into_result(Algorithm::MarkSweep, scenario);

        // One clock reading names the artifacts and stamps the history entry.
        let timestamp = Utc::now();
        self.set_state(SimulationState::Persisting).await;
        self.persister
            .persist_all(&[&rc_result, &ms_result], &timestamp)
            .await;

        let total = self
            .history
            .append(HistoryEntry {
                timestamp,
                parameters: params.clone(),
                rc_result: rc_result.clone(),
                ms_result: ms_result.clone(),
            })
            .await;

        self.set_state(SimulationState::Completed).await;
        info!(
            "Simulation completed: RC {}, MS {} ({} runs recorded)",
            outcome_word(&rc_result),
            outcome_word(&ms_result),
            total
        );

        (rc_result, ms_result)
    }

    /// Every completed run, oldest first
    pub async fn get_history(&self) -> Vec<HistoryEntry> {
        self.history.snapshot().await
    }

    /// The last `count` completed runs, oldest first
    pub async fn recent_history(&self, count: usize) -> Vec<HistoryEntry> {
        self.history.recent(count).await
    }

    async fn run_collector(
        &self,
        algorithm: Algorithm,
        params: &SimulationParameters,
    ) -> CollectorOutcome {
        self.set_state(SimulationState::running(algorithm)).await;

        let invocation = CollectorInvocation {
            algorithm,
            executable: self.executable(algorithm),
            scenario_code: self.config.scenario_code(&params.scenario_type),
            num_objects: params.num_objects,
            object_size: params.object_size,
            heap_size_mib: params.heap_size_mib(),
        };

        let stdout = match self.runner.run(&invocation).await {
            Ok(stdout) => stdout,
            Err(reason) => return CollectorOutcome::Failure { reason },
        };

        let mut parsed = parse_stats(&stdout, algorithm, params.num_objects, params.object_size);

        // Reported counts size the graph, so they cannot exceed what the
        // limits allow a request to ask for.
        let cap = params.num_objects.max(self.config.limits.max_num_objects);
        let reported = (parsed.stats.objects_created, parsed.stats.objects_left);
        if parsed.stats.cap_objects(cap) {
            warn!(
                "{} reported created={} left={}, capped to created={} left={}",
                algorithm,
                reported.0,
                reported.1,
                parsed.stats.objects_created,
                parsed.stats.objects_left
            );
        }

        let graph = synthesize(
            algorithm,
            parsed.stats.objects_created,
            parsed.stats.objects_left,
            &params.scenario_type,
            params.object_size,
        );

        CollectorOutcome::Success {
            stats: parsed.stats,
            scenario_label: parsed.scenario_label,
            graph,
        }
    }

    fn executable(&self, algorithm: Algorithm) -> &Path {
        match algorithm {
            Algorithm::ReferenceCounting => &self.config.rc_executable,
            Algorithm::MarkSweep => &self.config.ms_executable,
        }
    }

    async fn set_state(&self, state: SimulationState) {
        *self.state.write().await = state;
    }
}

fn outcome_word(result: &CollectorRunResult) -> &'static str {
    if result.success { "ok" } else { "failed" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationLimits;
    use crate::model::{EdgeStatus, NodeStatus, MIB};
    use std::path::PathBuf;

    /// Mimics the unified collector binary: prints both stats blocks.
    /// Scenario code 2 leaves every object behind for RC.
    #[cfg(unix)]
    const FAKE_COLLECTOR: &str = r#"
echo "[MAIN] Starting simulation with params: scenario=$1, objects=$2, size=$3, heap=$4MB"
rc_left=0
if [ "$1" = "2" ]; then rc_left=$2; fi
echo "[RC_STATS]"
echo "type:RC"
echo "scenario:Scenario $1"
echo "objects_created:$2"
echo "objects_left:$rc_left"
echo "memory_freed:$(( ($2 - rc_left) * $3 ))"
echo "memory_leaked:$(( rc_left * $3 ))"
echo "execution_time_ms:0.250"
echo "[/RC_STATS]"
echo "[MS_STATS]"
echo "type:MS"
echo "scenario:Scenario $1"
echo "objects_created:$2"
echo "objects_left:0"
echo "memory_freed:$(( $2 * $3 ))"
echo "memory_leaked:0"
echo "execution_time_ms:0.500"
echo "[/MS_STATS]"
"#;

    fn config(rc: PathBuf, ms: PathBuf, output_dir: PathBuf) -> SimulatorConfig {
        SimulatorConfig {
            rc_executable: rc,
            ms_executable: ms,
            output_dir,
            timeout_secs: 10,
            ..SimulatorConfig::default()
        }
    }

    fn artifact_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_state_helpers() {
        assert!(SimulationState::RunningRc.is_running());
        assert!(!SimulationState::Persisting.is_running());
        assert!(SimulationState::Failed.is_terminal());
        assert!(!SimulationState::Idle.is_terminal());
    }

    #[test]
    fn test_outcome_into_result() {
        let failure = CollectorOutcome::Failure {
            reason: SimulationError::ProcessTimeout {
                algorithm: Algorithm::MarkSweep,
                timeout: std::time::Duration::from_secs(30),
            },
        };
        let result = failure.into_result(Algorithm::MarkSweep, "basic");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("MS simulator timed out after 30s"));
    }

    #[tokio::test]
    async fn test_missing_executables_still_complete() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("logs");
        let simulator = GcSimulator::new(config(
            dir.path().join("missing_rc"),
            dir.path().join("missing_ms"),
            out.clone(),
        ));
        assert_eq!(simulator.state().await, SimulationState::Idle);

        let (rc, ms) = simulator.run_simulation(32 * MIB, 10, 64, "basic").await;

        for (result, algorithm) in [(&rc, Algorithm::ReferenceCounting), (&ms, Algorithm::MarkSweep)] {
            assert_eq!(result.algorithm, algorithm);
            assert!(!result.success);
            assert!(result.error.as_deref().unwrap().contains("executable not found"));
            assert_eq!(result.stats, CollectorStats::default());
            assert!(result.objects.is_empty());
            assert!(result.references.is_empty());
        }

        assert_eq!(simulator.state().await, SimulationState::Completed);
        assert_eq!(simulator.get_history().await.len(), 1);
        assert_eq!(artifact_count(&out), 2);
    }

    #[tokio::test]
    async fn test_invalid_parameters_fail_whole_run() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("logs");
        let simulator = GcSimulator::new(config(
            dir.path().join("rc"),
            dir.path().join("ms"),
            out.clone(),
        ));

        let (rc, ms) = simulator.run_simulation(32 * MIB, 0, 64, "basic").await;

        assert!(!rc.success && !ms.success);
        assert_eq!(rc.error, ms.error);
        assert!(rc.error.as_deref().unwrap().contains("num_objects"));
        assert_eq!(simulator.state().await, SimulationState::Failed);
        assert!(simulator.get_history().await.is_empty());
        assert_eq!(artifact_count(&out), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cycle_leak_run() {
        let dir = tempfile::tempdir().unwrap();
        let exe = crate::runner::tests::write_script(dir.path(), "gc_unified", FAKE_COLLECTOR);
        let out = dir.path().join("logs");
        let simulator = GcSimulator::new(config(exe.clone(), exe, out.clone()));

        let (rc, ms) = simulator.run_simulation(32 * MIB, 4, 64, "cycle_leak").await;

        assert!(rc.success, "{:?}", rc.error);
        assert_eq!(rc.scenario, "cycle_leak");
        assert_eq!(rc.scenario_label.as_deref(), Some("Scenario 2"));
        assert_eq!(rc.stats.objects_left, 4);
        assert_eq!(rc.stats.memory_leaked, 256);
        assert_eq!(rc.stats.recovery_percent, 0.0);
        assert!(rc.objects.iter().all(|n| n.status == NodeStatus::Leaked && n.size == 64));
        assert_eq!(rc.references.len(), 4);
        assert!(rc.references.iter().all(|e| e.status == EdgeStatus::Active));
        assert!(rc.references[3].is_cycle_closure);

        assert!(ms.success);
        assert_eq!(ms.stats.recovery_percent, 100.0);
        assert_eq!(ms.stats.execution_time_ms, 0.5);
        assert!(ms.objects.iter().all(|n| n.status == NodeStatus::Deleted && !n.is_root));
        assert!(ms.references.iter().all(|e| e.status == EdgeStatus::Removed));

        let history = simulator.get_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].parameters.scenario_type, "cycle_leak");
        assert_eq!(history[0].rc_result, rc);
        assert_eq!(history[0].ms_result, ms);
        assert_eq!(artifact_count(&out), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rc_failure_does_not_stop_ms() {
        let dir = tempfile::tempdir().unwrap();
        let ms_exe = crate::runner::tests::write_script(dir.path(), "ms_gc", FAKE_COLLECTOR);
        let simulator = GcSimulator::new(config(
            dir.path().join("no_such_rc"),
            ms_exe,
            dir.path().join("logs"),
        ));

        let (rc, ms) = simulator.run_simulation(8 * MIB, 5, 16, "cascade_delete").await;

        assert!(!rc.success);
        assert!(rc.error.as_deref().unwrap().starts_with("RC executable not found"));
        assert!(ms.success);
        assert_eq!(ms.objects.len(), 5);
        assert_eq!(ms.references.len(), 4);
        assert_eq!(simulator.state().await, SimulationState::Completed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_oversized_counts_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let exe = crate::runner::tests::write_script(
            dir.path(),
            "huge_gc",
            "echo '[RC_STATS]'\n\
             echo 'objects_created:18446744073709551615'\n\
             echo 'objects_left:18446744073709551615'\n\
             echo '[/RC_STATS]'",
        );
        let mut config = config(exe.clone(), exe, dir.path().join("logs"));
        config.limits = SimulationLimits {
            max_num_objects: 50,
            ..SimulationLimits::default()
        };
        let simulator = GcSimulator::new(config);

        let (rc, ms) = simulator.run_simulation(4 * MIB, 5, 8, "cycle_leak").await;

        assert!(rc.success);
        assert_eq!(rc.stats.objects_created, 50);
        assert_eq!(rc.stats.objects_left, 50);
        assert_eq!(rc.objects.len(), 50);
        assert_eq!(rc.references.len(), 50);

        // No MS block: fallback counts from the request
        assert!(ms.success);
        assert_eq!(ms.objects.len(), 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_artifacts_and_history_share_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let exe = crate::runner::tests::write_script(dir.path(), "gc_unified", FAKE_COLLECTOR);
        let out = dir.path().join("logs");
        let simulator = GcSimulator::new(config(exe.clone(), exe, out.clone()));

        simulator.run_simulation(4 * MIB, 3, 8, "basic").await;

        let entry = &simulator.get_history().await[0];
        let stamp = entry.timestamp.format("%Y%m%d_%H%M%S_%6f").to_string();
        let mut names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![format!("ms_basic_{}.json", stamp), format!("rc_basic_{}.json", stamp)]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_history_keeps_run_order() {
        let dir = tempfile::tempdir().unwrap();
        let exe = crate::runner::tests::write_script(dir.path(), "gc_unified", FAKE_COLLECTOR);
        let simulator = GcSimulator::new(config(exe.clone(), exe, dir.path().join("logs")));

        for scenario in ["basic", "cycle_leak", "cascade_delete"] {
            simulator.run_simulation(4 * MIB, 3, 8, scenario).await;
        }

        let scenarios: Vec<_> = simulator
            .get_history()
            .await
            .into_iter()
            .map(|e| e.parameters.scenario_type)
            .collect();
        assert_eq!(scenarios, vec!["basic", "cycle_leak", "cascade_delete"]);

        let recent = simulator.recent_history(1).await;
        assert_eq!(recent[0].parameters.scenario_type, "cascade_delete");
    }
}
