//! Deterministic replay of recorded world events.
//!
//! A recording is a JSON-lines file.  Each line carries the offset in
//! seconds from the start of the recording and the world event:
//!
//! ```text
//! {"at": 0.00, "event": {"event": "upserted", "payload": { ... }}}
//! {"at": 0.35, "event": {"event": "deleted", "payload": "cube_1"}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.  The clock is
//! synthetic: ticks fall every `1 / reasoning_frequency` seconds and every
//! event stamped at or before a tick is ingested right before it.  Replay
//! keeps ticking for one perception window (plus a few cycles) past the last
//! event so that releases of objects that left the scene are reported.

use std::io::BufRead;

use chrono::{DateTime, TimeDelta, Utc};
use gravitas_middleware::SceneStore;
use gravitas_reasoner::Reasoner;
use gravitas_types::{ChangeSet, WorldEvent};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Extra cycles run after the perception window has elapsed.
const TAIL_CYCLES: u32 = 10;

/// One line of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Seconds since the start of the recording.
    pub at: f64,
    pub event: WorldEvent,
}

/// Totals reported after a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub ticks: usize,
    pub change_sets: usize,
    pub actions: usize,
    pub facts: usize,
}

/// Parse a recording.  Events must be in non-decreasing time order.
pub fn parse(reader: impl BufRead) -> Result<Vec<ReplayRecord>, String> {
    let mut records: Vec<ReplayRecord> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| format!("line {line_no}: {e}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(trimmed).map_err(|e| format!("line {line_no}: {e}"))?;
        if !record.at.is_finite() || record.at < 0.0 {
            return Err(format!("line {line_no}: invalid time offset {}", record.at));
        }
        if let Some(prev) = records.last()
            && record.at < prev.at
        {
            return Err(format!("line {line_no}: time offset {} goes backwards", record.at));
        }
        records.push(record);
    }
    Ok(records)
}

/// Drive `reasoner` through `records` on a synthetic clock starting at
/// `start`.  Every non-empty change set is mirrored into `store` and passed
/// to `sink`.
pub fn run(
    records: &[ReplayRecord],
    reasoner: &mut Reasoner,
    store: &mut SceneStore,
    start: DateTime<Utc>,
    mut sink: impl FnMut(&ChangeSet),
) -> ReplaySummary {
    let config = reasoner.config().clone();
    let input_world = config.input_world.clone();
    let period = f64::from(config.tick_period().as_secs_f32());
    let last_at = records.last().map_or(0.0, |r| r.at);
    let horizon = last_at + f64::from(config.perception_duration) + period * f64::from(TAIL_CYCLES);

    let mut summary = ReplaySummary::default();
    let mut pending = records.iter().peekable();
    let mut tick_no: u32 = 0;
    loop {
        let t = period * f64::from(tick_no);
        if t > horizon {
            break;
        }
        while let Some(record) = pending.next_if(|r| r.at <= t) {
            let at = offset(start, record.at);
            store.apply_event(&input_world, &record.event);
            reasoner.ingest(&record.event, at);
            summary.events += 1;
        }

        let changes = reasoner.tick(offset(start, t));
        summary.ticks += 1;
        if !changes.is_empty() {
            store.apply_changes(&input_world, &changes);
            summary.change_sets += 1;
            summary.actions += changes.actions().count();
            summary.facts += changes.facts().count();
            sink(&changes);
        }
        tick_no += 1;
    }
    debug!(?summary, "replay finished");
    summary
}

fn offset(start: DateTime<Utc>, secs: f64) -> DateTime<Utc> {
    start + TimeDelta::microseconds((secs * 1e6).round() as i64)
}
