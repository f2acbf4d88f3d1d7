//! ASCII rendition of the timeline model.
//!
//! Percent positions from the core are mapped onto a fixed number of terminal
//! cells; colours come from the palette tones.

use colored::{Color, ColoredString, Colorize};

use roadmap_core::timeline::view::{EpicRow, StoryRow, TimelineHeader};
use roadmap_core::timeline::BarGeometry;
use roadmap_core::Tone;

/// Cells used for the year track
pub const TRACK_WIDTH: usize = 60;

/// Characters reserved for row labels
pub const LABEL_WIDTH: usize = 30;

const BAR: char = '█';
const STORY_BAR: char = '▒';
const TODAY: char = '┆';

pub fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::QuarterQ1 => Color::Blue,
        Tone::QuarterQ2 => Color::Green,
        Tone::QuarterQ3 => Color::Yellow,
        Tone::QuarterQ4 => Color::Magenta,
        Tone::Muted => Color::BrightBlack,
        Tone::StatusDraft => Color::BrightBlack,
        Tone::StatusReady => Color::Cyan,
        Tone::StatusInProgress => Color::Yellow,
        Tone::StatusDone => Color::Green,
        Tone::ProductHorizon => Color::BrightBlue,
        Tone::ProductPulse => Color::BrightGreen,
        Tone::ProductAlphaRisk => Color::BrightMagenta,
        Tone::Primary => Color::White,
    }
}

/// First cell and cell count covered by a bar of `start`/`width` percent.
///
/// Any bar with a positive width gets at least one cell, and the span never
/// runs past the track.
pub fn bar_cells(start: f64, width: f64, cells: usize) -> (usize, usize) {
    let scale = cells as f64 / 100.0;
    let first = ((start * scale).floor() as usize).min(cells);
    if width <= 0.0 || first >= cells {
        return (first, 0);
    }
    let last = ((start + width) * scale).ceil() as usize;
    let len = last.saturating_sub(first).max(1).min(cells - first);
    (first, len)
}

/// Cell holding the today marker, if it is on this track
pub fn today_cell(today: Option<f64>, cells: usize) -> Option<usize> {
    today.map(|pos| ((pos / 100.0 * cells as f64).floor() as usize).min(cells.saturating_sub(1)))
}

/// Uncoloured track: bar cells filled with `fill`, the today marker in empty cells
pub fn plain_track(bar: BarGeometry, display_width: f64, today: Option<f64>, fill: char) -> String {
    let (first, len) = bar_cells(bar.start, display_width, TRACK_WIDTH);
    let marker = today_cell(today, TRACK_WIDTH);
    (0..TRACK_WIDTH)
        .map(|cell| {
            if cell >= first && cell < first + len {
                fill
            } else if Some(cell) == marker {
                TODAY
            } else {
                ' '
            }
        })
        .collect()
}

fn colored_track(
    bar: BarGeometry,
    display_width: f64,
    today: Option<f64>,
    fill: char,
    tone: Tone,
) -> String {
    let plain = plain_track(bar, display_width, today, fill);
    let (first, len) = bar_cells(bar.start, display_width, TRACK_WIDTH);
    let chars: Vec<char> = plain.chars().collect();
    let before: String = chars[..first].iter().collect();
    let body: String = chars[first..first + len].iter().collect();
    let after: String = chars[first + len..].iter().collect();
    format!(
        "{}{}{}",
        before.bright_black(),
        body.color(tone_color(tone)),
        after.bright_black()
    )
}

/// Shortens `text` to `max` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

fn label(text: &str, width: usize) -> String {
    format!("{:<width$}", truncate(text, width), width = width)
}

/// Quarter and month header lines
pub fn header_lines(header: &TimelineHeader) -> Vec<String> {
    let mut quarters = vec![' '; TRACK_WIDTH];
    for column in &header.quarters {
        let (first, _) = bar_cells(column.start, column.width, TRACK_WIDTH);
        for (offset, c) in column.label.chars().enumerate() {
            if let Some(slot) = quarters.get_mut(first + offset) {
                *slot = c;
            }
        }
    }

    let mut months = vec![' '; TRACK_WIDTH];
    for column in &header.months {
        let (first, _) = bar_cells(column.start, column.width, TRACK_WIDTH);
        for (offset, c) in column.label.chars().take(3).enumerate() {
            if let Some(slot) = months.get_mut(first + offset) {
                *slot = c;
            }
        }
    }

    let mut lines = vec![
        format!(
            "{} {}",
            label("", LABEL_WIDTH),
            quarters.into_iter().collect::<String>().bold()
        ),
        format!(
            "{} {}",
            label("", LABEL_WIDTH),
            months.into_iter().collect::<String>().bright_black()
        ),
    ];
    if let Some(cell) = today_cell(header.today, TRACK_WIDTH) {
        lines.push(format!(
            "{} {}{}",
            label("", LABEL_WIDTH),
            " ".repeat(cell),
            "▼ today".red()
        ));
    }
    lines
}

/// One epic row: label, coloured bar, progress
pub fn epic_line(row: &EpicRow, today: Option<f64>) -> String {
    let marker = if row.expandable { "▸ " } else { "  " };
    let title = format!("{}{}", marker, row.title);
    let track = colored_track(row.bar, row.display_width, today, BAR, row.tone);
    let progress: ColoredString = match row.progress {
        100 => format!("{:>3}%", row.progress).green(),
        0 => format!("{:>3}%", row.progress).bright_black(),
        _ => format!("{:>3}%", row.progress).yellow(),
    };
    let hidden = if row.visible { "" } else { " (outside year)" };
    format!(
        "{} {} {}{}",
        label(&title, LABEL_WIDTH),
        track,
        progress,
        hidden.bright_black()
    )
}

/// One story row, indented under its epic
pub fn story_line(row: &StoryRow, today: Option<f64>) -> String {
    let title = format!("    {}", row.title);
    let track = colored_track(row.bar, row.display_width, today, STORY_BAR, row.tone);
    format!(
        "{} {} {}",
        label(&title, LABEL_WIDTH),
        track,
        row.status.to_string().color(tone_color(row.tone))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_cells_quarter() {
        assert_eq!(bar_cells(50.0, 25.0, 60), (30, 15));
        assert_eq!(bar_cells(0.0, 100.0, 60), (0, 60));
    }

    #[test]
    fn test_bar_cells_slivers_get_one_cell() {
        assert_eq!(bar_cells(40.0, 0.1, 60), (24, 1));
        assert_eq!(bar_cells(40.0, 0.0, 60), (24, 0));
    }

    #[test]
    fn test_bar_cells_stay_on_track() {
        let (first, len) = bar_cells(99.9, 5.0, 60);
        assert_eq!(first, 59);
        assert_eq!(first + len, 60);
        assert_eq!(bar_cells(100.0, 0.0, 60), (60, 0));
    }

    #[test]
    fn test_today_cell() {
        assert_eq!(today_cell(None, 60), None);
        assert_eq!(today_cell(Some(50.0), 60), Some(30));
        assert_eq!(today_cell(Some(100.0), 60), Some(59));
    }

    #[test]
    fn test_plain_track_draws_bar_and_marker() {
        let track = plain_track(BarGeometry::new(0.0, 25.0), 25.0, Some(75.0), BAR);
        let chars: Vec<char> = track.chars().collect();
        assert_eq!(chars.len(), TRACK_WIDTH);
        assert_eq!(chars.iter().filter(|c| **c == BAR).count(), 15);
        assert_eq!(chars[45], TODAY);
    }

    #[test]
    fn test_marker_hidden_under_bar() {
        let track = plain_track(BarGeometry::new(0.0, 100.0), 100.0, Some(50.0), BAR);
        assert!(!track.contains(TODAY));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Regime detection engine", 10), "Regime de…");
        assert_eq!(truncate("Überprüfung", 5).chars().count(), 5);
    }
}
