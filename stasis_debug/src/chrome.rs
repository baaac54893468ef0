// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] takes events from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::RecordedEvent;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Trace events carry frame counters rather than timestamps, so each event
/// is placed at `frame_index * frame_interval_us`. Partition events go on a
/// thread per partition; frame-wide events go on thread 0.
pub fn export(
    events: &[RecordedEvent],
    frame_interval_us: f64,
    writer: &mut dyn Write,
) -> io::Result<()> {
    let mut out: Vec<Value> = Vec::with_capacity(events.len());

    for recorded in events {
        let ts = recorded.frame_index() as f64 * frame_interval_us;
        let value = match recorded {
            RecordedEvent::ElementRedraw(e) => json!({
                "ph": "i",
                "name": "Redraw",
                "cat": "Element",
                "ts": ts,
                "pid": 0,
                "tid": e.partition + 1,
                "s": "t",
                "args": {
                    "frame_index": e.frame_index,
                    "layers": e.layers,
                    "forced": e.forced,
                    "empty": e.empty,
                    "snapshot": e.snapshot,
                    "rejected_blends": e.rejected_blends,
                }
            }),
            RecordedEvent::Check(e) => json!({
                "ph": "C",
                "name": format!("partition {}", e.partition),
                "cat": "Scheduler",
                "ts": ts,
                "pid": 0,
                "tid": e.partition + 1,
                "args": {
                    "render_hz": e.render_frequency,
                    "check_hz": e.check_frequency,
                    "streak": e.streak,
                }
            }),
            RecordedEvent::Fallback(e) => json!({
                "ph": "i",
                "name": "Fallback",
                "cat": "Element",
                "ts": ts,
                "pid": 0,
                "tid": e.partition.map_or(0, |p| p + 1),
                "s": "t",
                "args": {
                    "frame_index": e.frame_index,
                    "reason": format!("{:?}", e.reason),
                }
            }),
            RecordedEvent::Repartition(e) => json!({
                "ph": "i",
                "name": format!("{:?}", e.kind),
                "cat": "Partition",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "g",
                "args": {
                    "frame_index": e.frame_index,
                    "partitions": e.partitions,
                    "layers": e.layers,
                }
            }),
            RecordedEvent::Composite(e) => json!({
                "ph": "i",
                "name": "Composite",
                "cat": "Frame",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "t",
                "args": {
                    "frame_index": e.frame_index,
                    "textures": e.textures,
                    "draws": e.draws,
                }
            }),
            RecordedEvent::Teardown(e) => json!({
                "ph": "i",
                "name": "Teardown",
                "cat": "Partition",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "g",
                "args": {
                    "frame_index": e.frame_index,
                    "elements": e.elements,
                    "reason": format!("{:?}", e.reason),
                }
            }),
        };
        out.push(value);
    }

    serde_json::to_writer_pretty(writer, &out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use stasis_core::trace::{
        CheckEvent, CompositeEvent, RepartitionEvent, RepartitionKind, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_repartition(&RepartitionEvent {
            frame_index: 0,
            kind: RepartitionKind::Rebuild,
            partitions: 4,
            layers: 12,
        });
        rec.on_check(&CheckEvent {
            frame_index: 2,
            partition: 1,
            matched: true,
            render_frequency: 20.0,
            check_frequency: 20.0,
            streak: -1,
        });
        rec.on_composite(&CompositeEvent {
            frame_index: 2,
            textures: 4,
            draws: 1,
        });

        let mut out = Vec::new();
        export(rec.events(), 1000.0, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["name"], "Rebuild");
        assert_eq!(parsed[0]["tid"], 0);

        // Counter events sit on the partition's own thread.
        assert_eq!(parsed[1]["ph"], "C");
        assert_eq!(parsed[1]["tid"], 2);
        assert_eq!(parsed[1]["ts"], 2000.0);

        assert_eq!(parsed[2]["name"], "Composite");
        assert_eq!(parsed[2]["args"]["draws"], 1);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], 1000.0, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
