// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use stasis_core::trace::{
    CheckEvent, CompositeEvent, ElementRedrawEvent, FallbackEvent, FallbackReason,
    RepartitionEvent, RepartitionKind, TeardownEvent, TeardownReason, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    quiet_checks: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("quiet_checks", &self.quiet_checks)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            quiet_checks: false,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            quiet_checks: false,
        }
    }

    /// Suppresses lines for comparisons that matched.
    #[must_use]
    pub fn quiet_checks(mut self, quiet: bool) -> Self {
        self.quiet_checks = quiet;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn fallback_name(reason: FallbackReason) -> &'static str {
    match reason {
        FallbackReason::Disabled => "disabled",
        FallbackReason::TargetUnavailable => "target-unavailable",
        FallbackReason::NoTexture => "no-texture",
    }
}

fn teardown_name(reason: TeardownReason) -> &'static str {
    match reason {
        TeardownReason::Disabled => "disabled",
        TeardownReason::Resize => "resize",
        TeardownReason::Invalidate => "invalidate",
        TeardownReason::Rebuild => "rebuild",
    }
}

fn repartition_name(kind: RepartitionKind) -> &'static str {
    match kind {
        RepartitionKind::Rebuild => "rebuild",
        RepartitionKind::Split => "split",
        RepartitionKind::Merge => "merge",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_element_redraw(&mut self, e: &ElementRedrawEvent) {
        let _ = writeln!(
            self.writer,
            "[redraw] frame={} partition={} layers={}{}{}{} rejected={}",
            e.frame_index,
            e.partition,
            e.layers,
            if e.forced { " forced" } else { "" },
            if e.empty { " empty" } else { "" },
            if e.snapshot { " snapshot" } else { "" },
            e.rejected_blends,
        );
    }

    fn on_check(&mut self, e: &CheckEvent) {
        if self.quiet_checks && e.matched {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[check] frame={} partition={} {} render={:.1}/s check={:.1}/s streak={}",
            e.frame_index,
            e.partition,
            if e.matched { "match" } else { "changed" },
            e.render_frequency,
            e.check_frequency,
            e.streak,
        );
    }

    fn on_fallback(&mut self, e: &FallbackEvent) {
        match e.partition {
            Some(p) => {
                let _ = writeln!(
                    self.writer,
                    "[fallback] frame={} partition={p} {}",
                    e.frame_index,
                    fallback_name(e.reason),
                );
            }
            None => {
                let _ = writeln!(
                    self.writer,
                    "[fallback] frame={} all {}",
                    e.frame_index,
                    fallback_name(e.reason),
                );
            }
        }
    }

    fn on_repartition(&mut self, e: &RepartitionEvent) {
        let _ = writeln!(
            self.writer,
            "[repartition] frame={} {} partitions={} layers={}",
            e.frame_index,
            repartition_name(e.kind),
            e.partitions,
            e.layers,
        );
    }

    fn on_composite(&mut self, e: &CompositeEvent) {
        let _ = writeln!(
            self.writer,
            "[composite] frame={} textures={} draws={}",
            e.frame_index, e.textures, e.draws,
        );
    }

    fn on_teardown(&mut self, e: &TeardownEvent) {
        let _ = writeln!(
            self.writer,
            "[teardown] frame={} elements={} {}",
            e.frame_index,
            e.elements,
            teardown_name(e.reason),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut PrettyPrintSink<Vec<u8>>)) -> String {
        let mut sink = PrettyPrintSink::with_writer(Vec::new());
        f(&mut sink);
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn redraw_line_lists_flags() {
        let out = render(|s| {
            s.on_element_redraw(&ElementRedrawEvent {
                frame_index: 3,
                partition: 1,
                layers: 2,
                forced: true,
                empty: false,
                snapshot: true,
                rejected_blends: 0,
            });
        });
        assert_eq!(
            out,
            "[redraw] frame=3 partition=1 layers=2 forced snapshot rejected=0\n"
        );
    }

    #[test]
    fn fallback_without_partition_says_all() {
        let out = render(|s| {
            s.on_fallback(&FallbackEvent {
                frame_index: 0,
                partition: None,
                reason: FallbackReason::Disabled,
            });
        });
        assert_eq!(out, "[fallback] frame=0 all disabled\n");
    }

    #[test]
    fn quiet_checks_hides_matches_only() {
        let check = |matched| CheckEvent {
            frame_index: 1,
            partition: 0,
            matched,
            render_frequency: 20.0,
            check_frequency: 20.0,
            streak: 0,
        };
        let mut sink = PrettyPrintSink::with_writer(Vec::new()).quiet_checks(true);
        sink.on_check(&check(true));
        sink.on_check(&check(false));
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 1, "only the change is printed");
        assert!(out.contains("changed"), "got {out}");
    }
}
