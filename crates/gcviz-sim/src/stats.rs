//! Collector statistics and the stats block parser.
//!
//! Collectors print a block like
//!
//! ```text
//! [RC_STATS]
//! type:RC
//! scenario:Cyclic Graph
//! objects_created:20
//! objects_left:20
//! memory_freed:0
//! memory_leaked:1280
//! execution_time_ms:0.042
//! [/RC_STATS]
//! ```
//!
//! Parsing never fails: a missing block or a malformed value degrades to
//! the fallback table built from the requested parameters.

use crate::error::ParseWarning;
use crate::model::Algorithm;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Statistics reported by one collector run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorStats {
    /// Objects allocated by the scenario
    pub objects_created: u64,
    /// Objects still on the heap after collection
    pub objects_left: u64,
    /// Bytes reclaimed
    pub memory_freed: u64,
    /// Bytes unreachable but not reclaimed
    pub memory_leaked: u64,
    /// Wall time spent in the collector
    pub execution_time_ms: f64,
    /// Share of created objects that were reclaimed, 0..=100
    pub recovery_percent: f64,
    /// Bytes allocated by the scenario
    pub total_allocated: u64,
    /// Highest heap usage seen
    pub peak_memory: u64,
}

impl CollectorStats {
    /// Stats assumed when the collector reports nothing: every requested
    /// object allocated, nothing freed.
    pub fn fallback(num_objects: u64, object_size: u64) -> Self {
        let allocated = num_objects.saturating_mul(object_size);
        Self {
            objects_created: num_objects,
            total_allocated: allocated,
            peak_memory: allocated,
            ..Self::default()
        }
    }

    /// Recompute `recovery_percent` from the object counts.
    pub fn update_recovery(&mut self) {
        self.recovery_percent = recovery_percent(self.objects_created, self.objects_left);
    }

    /// Bound the object counts to `max`, keeping `objects_left <= objects_created`.
    ///
    /// Returns `true` if anything was lowered.
    pub fn cap_objects(&mut self, max: u64) -> bool {
        let created = self.objects_created.min(max);
        let left = self.objects_left.min(created);
        let capped = created != self.objects_created || left != self.objects_left;
        self.objects_created = created;
        self.objects_left = left;
        self.update_recovery();
        capped
    }

    /// Format memory size for display.
    pub fn format_bytes(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}

/// `(created - left) / created * 100`, clamped to 0..=100.
pub fn recovery_percent(objects_created: u64, objects_left: u64) -> f64 {
    if objects_created == 0 {
        return 0.0;
    }
    let freed = objects_created.saturating_sub(objects_left);
    (freed as f64 / objects_created as f64 * 100.0).clamp(0.0, 100.0)
}

/// Output of [`parse_stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStats {
    pub stats: CollectorStats,
    /// `scenario:` line from the block, if present
    pub scenario_label: Option<String>,
    /// Everything that was skipped or defaulted
    pub warnings: Vec<ParseWarning>,
}

/// A single recognized `key: value` line.
#[derive(Debug, Clone, PartialEq)]
enum StatField {
    ObjectsCreated(u64),
    ObjectsLeft(u64),
    MemoryFreed(u64),
    MemoryLeaked(u64),
    ExecutionTimeMs(f64),
    Scenario(String),
}

impl StatField {
    /// Parse one line's value. `Ok(None)` means the key is not ours.
    fn parse(key: &str, value: &str) -> Result<Option<Self>, ParseWarning> {
        let field = match key {
            "objects_created" => StatField::ObjectsCreated(parse_count(key, value)?),
            "objects_left" => StatField::ObjectsLeft(parse_count(key, value)?),
            "memory_freed" => StatField::MemoryFreed(parse_count(key, value)?),
            "memory_leaked" => StatField::MemoryLeaked(parse_count(key, value)?),
            "execution_time_ms" => StatField::ExecutionTimeMs(parse_millis(key, value)?),
            "scenario" => StatField::Scenario(value.to_string()),
            _ => return Ok(None),
        };
        Ok(Some(field))
    }

    fn apply(self, parsed: &mut ParsedStats) {
        let stats = &mut parsed.stats;
        match self {
            StatField::ObjectsCreated(v) => stats.objects_created = v,
            StatField::ObjectsLeft(v) => stats.objects_left = v,
            StatField::MemoryFreed(v) => stats.memory_freed = v,
            StatField::MemoryLeaked(v) => stats.memory_leaked = v,
            StatField::ExecutionTimeMs(v) => stats.execution_time_ms = v,
            StatField::Scenario(label) => parsed.scenario_label = Some(label),
        }
    }
}

fn parse_count(key: &str, value: &str) -> Result<u64, ParseWarning> {
    value.parse::<u64>().map_err(|e| invalid(key, value, e.to_string()))
}

fn parse_millis(key: &str, value: &str) -> Result<f64, ParseWarning> {
    let ms = value
        .parse::<f64>()
        .map_err(|e| invalid(key, value, e.to_string()))?;
    if !ms.is_finite() || ms < 0.0 {
        return Err(invalid(key, value, "expected a finite, non-negative number".to_string()));
    }
    Ok(ms)
}

fn invalid(key: &str, value: &str, reason: String) -> ParseWarning {
    ParseWarning::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}

/// Slice the text between `[<TAG>_STATS]` and `[/<TAG>_STATS]`.
///
/// Both markers are required. Output cut off before the closing marker is
/// treated as having no block at all.
pub fn extract_block(output: &str, algorithm: Algorithm) -> Result<&str, ParseWarning> {
    let start_marker = format!("[{}_STATS]", algorithm.tag());
    let end_marker = format!("[/{}_STATS]", algorithm.tag());

    let start = output
        .find(&start_marker)
        .ok_or(ParseWarning::MissingBlock { algorithm })?
        + start_marker.len();
    let rest = &output[start..];
    let end = rest
        .find(&end_marker)
        .ok_or(ParseWarning::UnterminatedBlock { algorithm })?;
    Ok(&rest[..end])
}

/// Parse a collector's stats block out of its raw stdout.
pub fn parse_stats(
    output: &str,
    algorithm: Algorithm,
    num_objects: u64,
    object_size: u64,
) -> ParsedStats {
    let mut parsed = ParsedStats {
        stats: CollectorStats::fallback(num_objects, object_size),
        scenario_label: None,
        warnings: Vec::new(),
    };

    match extract_block(output, algorithm) {
        Err(warning) => {
            warn!("{}", warning);
            parsed.warnings.push(warning);
        }
        Ok(block) => {
            for line in block.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('[') {
                    continue;
                }
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                match StatField::parse(key.trim(), value.trim()) {
                    Ok(Some(field)) => field.apply(&mut parsed),
                    Ok(None) => {}
                    Err(warning) => {
                        warn!("{}", warning);
                        parsed.warnings.push(warning);
                    }
                }
            }
        }
    }

    parsed.stats.update_recovery();

    let stats = &parsed.stats;
    info!(
        "{} stats parsed: created={} left={} leaked={} time={:.3}ms recovery={:.1}%",
        algorithm,
        stats.objects_created,
        stats.objects_left,
        CollectorStats::format_bytes(stats.memory_leaked),
        stats.execution_time_ms,
        stats.recovery_percent
    );

    parsed
}
