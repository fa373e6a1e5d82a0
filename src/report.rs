//! Human-readable journey rendering for the CLI.

use std::fmt::Write as _;

use funnelprobe_core_types::{FeatureKind, Journey, JourneyStatus};

/// Render one finished journey as a terminal-friendly summary.
pub fn render(journey: &Journey) -> String {
    let mut out = String::new();

    let status = match journey.status {
        JourneyStatus::Pending => "pending",
        JourneyStatus::Running => "running",
        JourneyStatus::Completed => "completed",
        JourneyStatus::Failed => "FAILED",
    };
    let _ = writeln!(out, "journey {}  {}", journey.id, journey.target);
    let _ = write!(out, "status: {status}");
    if let Some(finished) = journey.finished_at {
        let elapsed = finished - journey.started_at;
        let _ = write!(out, "  ({:.1}s)", elapsed.num_milliseconds() as f64 / 1000.0);
    }
    let _ = writeln!(out);

    if let Some(error) = &journey.error {
        let _ = writeln!(out, "error: {error}");
    }

    for stage in &journey.stages {
        let _ = writeln!(out);
        let _ = writeln!(out, "[{}] {}", stage.stage, stage.url);
        if let Some(shot) = &stage.screenshot {
            let _ = writeln!(out, "  capture: {shot}");
        }
        for note in &stage.notes {
            let _ = writeln!(out, "  note: {note}");
        }
        if let Some(detections) = &stage.detections {
            for kind in FeatureKind::ALL {
                let detection = detections.get(kind);
                if !detection.present {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "  {} ({:.2}): {}",
                    kind,
                    detection.confidence,
                    detection.evidence.join(" | ")
                );
            }
        }
    }
    out
}
