//! One filter → aggregate → rank pass over an in-memory record set.

use serde::Serialize;
use tracing::info;

use crate::analyzers::aggregate::aggregate;
use crate::analyzers::rank::rank;
use crate::analyzers::types::RankedEntry;
use crate::error::PipelineResult;
use crate::filter::{FilterStage, Selection, filter_records};
use crate::profile::PageProfile;
use crate::records::Record;

/// Whether a run produced something to chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "emptied_by", rename_all = "snake_case")]
pub enum Status {
    Ranked,
    /// Nothing matched; `Some` names the filter that removed the last record.
    NoData(Option<FilterStage>),
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RankReport {
    pub status: Status,
    pub matched_records: usize,
    pub entities: usize,
    pub ranked: Vec<RankedEntry>,
}

/// Runs the pipeline with the profile's own `top_n`.
pub fn run(
    records: &[Record],
    profile: &PageProfile,
    selection: &Selection,
) -> PipelineResult<RankReport> {
    run_top(records, profile, selection, profile.top_n)
}

/// Filters, aggregates and ranks `records` for `selection`, keeping `top_n` entries.
#[tracing::instrument(skip(records, profile), fields(profile = %profile.name, date = ?selection.date, category = %selection.category))]
pub fn run_top(
    records: &[Record],
    profile: &PageProfile,
    selection: &Selection,
    top_n: usize,
) -> PipelineResult<RankReport> {
    let filtered = filter_records(records, profile, selection)?;
    let matched_records = filtered.records.len();

    let totals = aggregate(
        &filtered.records,
        &profile.roles,
        profile.category_column.as_deref(),
    );
    let entities = totals.len();
    let ranked = rank(totals, top_n, &profile.colors)?;

    let status = if ranked.is_empty() {
        Status::NoData(filtered.emptied_by)
    } else {
        Status::Ranked
    };

    info!(matched_records, entities, ranked = ranked.len(), ?status, "Pipeline run complete");

    Ok(RankReport {
        status,
        matched_records,
        entities,
        ranked,
    })
}
