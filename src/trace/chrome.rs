//! Chrome Trace Event rendering of a [`DistBuildTrace`].
//!
//! Each minion becomes a process and each reconstructed lane a thread. Rule
//! windows are emitted as complete (`X`) events in microseconds relative to the
//! earliest start in the build.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::dist_build_trace::DistBuildTrace;
use crate::core::errors::{DistBuildError, Result};
use crate::distbuild_error;

const RULE_CATEGORY: &str = "buildrule";
const MICROS_PER_MILLI: i64 = 1_000;

/// Chrome trace JSON object format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    pub trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    pub display_time_unit: &'static str,
    #[serde(rename = "otherData")]
    pub other_data: serde_json::Value,
}

/// Single event in Chrome Trace format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChromeTraceEvent {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<&'static str>,
    /// Phase (M=metadata, X=complete)
    pub ph: &'static str,
    /// Timestamp in microseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    /// Duration in microseconds (for X events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dur: Option<i64>,
    /// Minion position in the trace
    pub pid: usize,
    /// Lane index within the minion
    pub tid: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

impl ChromeTraceEvent {
    fn metadata(name: &str, pid: usize, tid: usize, label: &str) -> Self {
        Self {
            name: name.to_string(),
            cat: None,
            ph: "M",
            ts: None,
            dur: None,
            pid,
            tid,
            args: Some(json!({ "name": label })),
        }
    }
}

impl ChromeTrace {
    /// Build the event list for a trace. Pure: equal traces give equal output.
    ///
    /// Fails when two rules are so far apart that the offset of the later one
    /// does not fit in `i64` microseconds.
    pub fn from_trace(trace: &DistBuildTrace) -> Result<Self> {
        let origin = trace.time_bounds().map_or(0, |(start, _)| start);

        let mut metadata = Vec::new();
        let mut rules = Vec::new();
        for (pid, minion) in trace.minions().iter().enumerate() {
            metadata.push(ChromeTraceEvent::metadata(
                "process_name",
                pid,
                0,
                minion.minion_id(),
            ));
            for (tid, lane) in minion.lanes().iter().enumerate() {
                metadata.push(ChromeTraceEvent::metadata(
                    "thread_name",
                    pid,
                    tid,
                    &format!("lane {}", tid),
                ));
                for rule in lane.rule_traces() {
                    let ts = rule
                        .start_epoch_millis()
                        .checked_sub(origin)
                        .and_then(to_micros)
                        .ok_or_else(|| {
                            let message = format!(
                                "rule {} starts too far after {} to render",
                                rule.rule_name(),
                                origin
                            );
                            distbuild_error!(internal, message)
                        })?;
                    let dur = to_micros(rule.duration_millis()).ok_or_else(|| {
                        let message = format!("rule {} is too long to render", rule.rule_name());
                        distbuild_error!(internal, message)
                    })?;
                    rules.push(ChromeTraceEvent {
                        name: rule.rule_name().to_string(),
                        cat: Some(RULE_CATEGORY),
                        ph: "X",
                        ts: Some(ts),
                        dur: Some(dur),
                        pid,
                        tid,
                        args: None,
                    });
                }
            }
        }

        // Stable, so rules within one lane keep their lane order.
        rules.sort_by_key(|event| (event.ts, event.pid, event.tid));

        let mut trace_events = metadata;
        trace_events.extend(rules);

        Ok(Self {
            trace_events,
            display_time_unit: "ms",
            other_data: json!({
                "build_id": trace.build_id().as_str(),
                "trace_origin_epoch_millis": origin,
            }),
        })
    }
}

fn to_micros(millis: i64) -> Option<i64> {
    millis.checked_mul(MICROS_PER_MILLI)
}

/// Serialize `trace` to `writer` as Chrome trace JSON.
pub fn render<W: Write>(trace: &DistBuildTrace, writer: W) -> Result<()> {
    write_chrome(&ChromeTrace::from_trace(trace)?, writer)
}

fn write_chrome<W: Write>(chrome: &ChromeTrace, mut writer: W) -> Result<()> {
    serde_json::to_writer(&mut writer, chrome).map_err(|e| {
        if e.is_io() {
            DistBuildError::io("write chrome trace", e.into())
        } else {
            DistBuildError::serialization("chrome trace json", e)
        }
    })?;
    writer
        .flush()
        .map_err(|e| DistBuildError::io("flush chrome trace", e))
}

/// Render to a file, creating or truncating it. A trace that cannot be
/// rendered leaves the file untouched.
pub fn render_to_path(trace: &DistBuildTrace, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let chrome = ChromeTrace::from_trace(trace)?;
    let file = File::create(path)
        .map_err(|e| DistBuildError::io(format!("create {}", path.display()), e))?;
    write_chrome(&chrome, BufWriter::new(file))?;
    info!(
        "Wrote chrome trace for build {} to {}",
        trace.build_id(),
        path.display()
    );
    Ok(())
}
