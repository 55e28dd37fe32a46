//! Plain-text rendering of the dashboard view.

use std::fmt::Write as _;

use scan_client::display::{DashboardView, ScanRow};
use shared::domain::Theme;

const HISTORY_ROWS_SHOWN: usize = 10;

pub fn render_dashboard(view: &DashboardView) -> String {
    let mut out = String::new();
    let (rule, heavy) = match view.theme {
        Theme::Light => ('-', '='),
        Theme::Dark => ('·', '#'),
    };
    let heavy_line: String = std::iter::repeat(heavy).take(72).collect();
    let rule_line: String = std::iter::repeat(rule).take(72).collect();

    let _ = writeln!(out, "{heavy_line}");
    let _ = writeln!(
        out,
        "Today {}  [{}]{}",
        view.date,
        view.status_badge,
        if view.submit_enabled { "" } else { "  saving..." }
    );
    let _ = writeln!(
        out,
        "Calories {:>6}   Protein {:>6} g   Carbs {:>6} g   Fat {:>6} g   Scans {}",
        view.calories, view.protein, view.carbs, view.fat, view.scan_count
    );
    if let Some(error) = &view.error {
        let _ = writeln!(out, "! {error}");
    }

    let _ = writeln!(out, "{rule_line}");
    match &view.last_scan {
        Some(last) => {
            let _ = writeln!(out, "Last scan: {} ({})", last.name, last.barcode);
            let _ = writeln!(
                out,
                "  {} kcal  P {} g  C {} g  F {} g  per 100 g",
                last.calories, last.protein, last.carbs, last.fat
            );
        }
        None => {
            let _ = writeln!(out, "No scans yet.");
        }
    }

    if !view.history.is_empty() {
        let _ = writeln!(out, "{rule_line}");
        let _ = writeln!(
            out,
            "{:<6} {:<16} {:<24} {:>6} {:>6} {:>6} {:>6}",
            "time", "barcode", "name", "kcal", "P", "C", "F"
        );
        for row in view.history.iter().take(HISTORY_ROWS_SHOWN) {
            let _ = writeln!(out, "{}", history_line(row));
        }
        if view.history.len() > HISTORY_ROWS_SHOWN {
            let _ = writeln!(
                out,
                "... {} older scans",
                view.history.len() - HISTORY_ROWS_SHOWN
            );
        }
    }
    let _ = write!(out, "{heavy_line}");
    out
}

fn history_line(row: &ScanRow) -> String {
    format!(
        "{:<6} {:<16} {:<24} {:>6} {:>6} {:>6} {:>6}",
        row.time,
        truncate(&row.barcode, 16),
        truncate(&row.name, 24),
        row.calories,
        row.protein,
        row.carbs,
        row.fat
    )
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
