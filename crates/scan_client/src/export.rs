//! History export to CSV and JSON, built from already-loaded rows only.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use shared::{
    domain::{DailySummary, ScanRecord},
    protocol::HistoryExport,
};

pub const CSV_HEADER: [&str; 9] = [
    "id", "ts", "barcode", "name", "calories", "protein", "carbs", "fat", "image_url",
];
const FILE_STEM: &str = "nutrition-scans";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow!("unsupported export format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub contents: String,
}

const DATE_TAG_FORMAT: &str = "%Y-%m-%d";

/// Summary date when one is loaded and parses as a calendar date, otherwise `today`.
pub fn date_tag(summary: Option<&DailySummary>, today: NaiveDate) -> String {
    summary
        .and_then(|summary| NaiveDate::parse_from_str(summary.date.trim(), DATE_TAG_FORMAT).ok())
        .unwrap_or(today)
        .format(DATE_TAG_FORMAT)
        .to_string()
}

pub fn export_file_name(format: ExportFormat, date_tag: &str) -> String {
    format!("{FILE_STEM}-{date_tag}.{}", format.extension())
}

pub fn history_to_csv(rows: &[ScanRecord]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([
            row.id.0.to_string(),
            row.ts.clone(),
            row.barcode.clone(),
            optional_text(row.name.as_deref()),
            optional_number(row.calories),
            optional_number(row.protein),
            optional_number(row.carbs),
            optional_number(row.fat),
            optional_text(row.image_url.as_deref()),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("failed to flush csv export: {e}"))?;
    String::from_utf8(bytes).context("csv export is not valid utf-8")
}

pub fn history_to_json(rows: &[ScanRecord]) -> Result<String> {
    let envelope = HistoryExport {
        ok: true,
        rows: rows.to_vec(),
    };
    serde_json::to_string_pretty(&envelope).context("failed to encode json export")
}

pub fn render_export(
    rows: &[ScanRecord],
    format: ExportFormat,
    date_tag: &str,
) -> Result<ExportedFile> {
    let contents = match format {
        ExportFormat::Csv => history_to_csv(rows)?,
        ExportFormat::Json => history_to_json(rows)?,
    };
    Ok(ExportedFile {
        file_name: export_file_name(format, date_tag),
        contents,
    })
}

pub async fn write_export(dir: &Path, file: &ExportedFile) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create export dir '{}'", dir.display()))?;
    let path = dir.join(&file.file_name);
    tokio::fs::write(&path, file.contents.as_bytes())
        .await
        .with_context(|| format!("failed to write export '{}'", path.display()))?;
    Ok(path)
}

fn optional_text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/export_tests.rs"]
mod tests;
