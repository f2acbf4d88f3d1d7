//! Presentation categories for quarters, story statuses and products.
//!
//! All lookups are total: unknown labels land on a fixed fallback tone, so every
//! timeline view colours the same value the same way.

use serde::{Serialize, Serializer};

use crate::models::{Quarter, StoryStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    QuarterQ1,
    QuarterQ2,
    QuarterQ3,
    QuarterQ4,
    /// Unknown quarter
    Muted,
    StatusDraft,
    StatusReady,
    StatusInProgress,
    StatusDone,
    ProductHorizon,
    ProductPulse,
    ProductAlphaRisk,
    /// Product outside the catalog
    Primary,
}

impl Tone {
    /// Stable token the renderer maps to a concrete colour
    pub fn token(self) -> &'static str {
        match self {
            Tone::QuarterQ1 => "quarter-q1",
            Tone::QuarterQ2 => "quarter-q2",
            Tone::QuarterQ3 => "quarter-q3",
            Tone::QuarterQ4 => "quarter-q4",
            Tone::Muted => "muted",
            Tone::StatusDraft => "status-draft",
            Tone::StatusReady => "status-ready",
            Tone::StatusInProgress => "status-in-progress",
            Tone::StatusDone => "status-done",
            Tone::ProductHorizon => "product-horizon",
            Tone::ProductPulse => "product-pulse",
            Tone::ProductAlphaRisk => "product-alpharisk",
            Tone::Primary => "primary",
        }
    }
}

impl Serialize for Tone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

pub fn quarter_tone(quarter: Quarter) -> Tone {
    match quarter {
        Quarter::Q1 => Tone::QuarterQ1,
        Quarter::Q2 => Tone::QuarterQ2,
        Quarter::Q3 => Tone::QuarterQ3,
        Quarter::Q4 => Tone::QuarterQ4,
    }
}

/// Tone for a raw quarter label; anything but Q1..Q4 is muted
pub fn quarter_label_tone(label: &str) -> Tone {
    Quarter::parse(label).map(quarter_tone).unwrap_or(Tone::Muted)
}

pub fn status_tone(status: StoryStatus) -> Tone {
    match status {
        StoryStatus::Draft => Tone::StatusDraft,
        StoryStatus::Ready => Tone::StatusReady,
        StoryStatus::InProgress => Tone::StatusInProgress,
        StoryStatus::Done => Tone::StatusDone,
    }
}

/// Tone for a raw status label; unknown labels share Draft's tone
pub fn status_label_tone(label: &str) -> Tone {
    StoryStatus::parse(label)
        .map(status_tone)
        .unwrap_or(Tone::StatusDraft)
}

pub fn product_tone(product_id: &str) -> Tone {
    match product_id {
        "horizon" => Tone::ProductHorizon,
        "pulse-sdg" => Tone::ProductPulse,
        "alpharisk-studio" => Tone::ProductAlphaRisk,
        _ => Tone::Primary,
    }
}
