//! Output formatting and persistence for rendered pages.
//!
//! Supports a plain-text bar chart, JSON chart export, and CSV table export.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::types::RankedEntry;
use crate::chart::{ChartSpec, format_count};

const BAR_WIDTH: usize = 40;

/// One row of the table shown under the chart.
#[derive(Debug, Serialize)]
pub struct TableRow<'a> {
    pub rank: usize,
    pub entity: &'a str,
    pub outbound: u64,
    pub inbound: u64,
    pub combined: u64,
    pub categories: String,
    pub color: &'a str,
}

impl<'a> From<&'a RankedEntry> for TableRow<'a> {
    fn from(entry: &'a RankedEntry) -> Self {
        TableRow {
            rank: entry.rank,
            entity: &entry.total.entity,
            outbound: entry.total.outbound,
            inbound: entry.total.inbound,
            combined: entry.total.combined,
            categories: entry.total.categories.join(", "),
            color: entry.color.as_str(),
        }
    }
}

/// Logs the chart using Rust's debug pretty-print format.
pub fn print_pretty(chart: &ChartSpec) {
    debug!("{:#?}", chart);
}

/// Renders the chart as text, one bar per line in rank order.
pub fn render_text(chart: &ChartSpec) -> String {
    let mut out = format!("{}\n", chart.title);
    let max = chart.bars.iter().map(|b| b.value).max().unwrap_or(0);
    let label_width = chart
        .bars
        .iter()
        .map(|b| b.label.chars().count())
        .max()
        .unwrap_or(0);

    for bar in &chart.bars {
        let filled = if max == 0 {
            0
        } else {
            ((bar.value as f64 / max as f64) * BAR_WIDTH as f64).round() as usize
        };
        let pad = label_width - bar.label.chars().count();
        out.push_str(&format!(
            "{:>2}. {}{} {:<width$} {} {}\n",
            bar.rank,
            bar.label,
            " ".repeat(pad),
            "█".repeat(filled),
            format_count(bar.value),
            bar.color,
            width = BAR_WIDTH,
        ));
    }
    out
}

/// Writes the chart as pretty-printed JSON to `path`.
pub fn write_chart_json(path: &Path, chart: &ChartSpec) -> Result<()> {
    let mut file = File::create(path)?;
    serde_json::to_writer_pretty(&mut file, chart)?;
    file.write_all(b"\n")?;
    info!(path = %path.display(), bars = chart.bars.len(), "Chart JSON written");
    Ok(())
}

/// Writes the ranked table as CSV with a header row.
pub fn write_table<W: Write>(writer: W, ranked: &[RankedEntry]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for entry in ranked {
        writer.serialize(TableRow::from(entry))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the ranked table to a CSV file at `path`, replacing it.
pub fn write_table_file(path: &Path, ranked: &[RankedEntry]) -> Result<()> {
    write_table(File::create(path)?, ranked)?;
    info!(path = %path.display(), rows = ranked.len(), "Table CSV written");
    Ok(())
}
