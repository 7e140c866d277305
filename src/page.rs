//! The page boundary: every failure below this point becomes a [`Notice`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::analyzers::types::RankedEntry;
use crate::cache::RecordCache;
use crate::chart::{ChartSpec, to_chart};
use crate::error::{Notice, NoticeLevel, PipelineResult};
use crate::filter::{CategoryFilter, FilterStage, Selection, SelectionOptions};
use crate::pipeline::{Status, run};
use crate::profile::PageProfile;
use crate::records::Record;

/// A successfully drawn page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub chart: ChartSpec,
    pub table: Vec<RankedEntry>,
}

/// What the user sees after one interaction.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Rendered(RenderedPage),
    Notice(Notice),
}

/// One dashboard page bound to a data file.
pub struct Page {
    profile: PageProfile,
    source: PathBuf,
    cache: RecordCache,
}

impl Page {
    pub fn new(profile: PageProfile, source: impl Into<PathBuf>) -> Self {
        Self {
            profile,
            source: source.into(),
            cache: RecordCache::new(),
        }
    }

    /// Overrides how many entities the chart shows.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.profile.top_n = top_n;
        self
    }

    pub fn profile(&self) -> &PageProfile {
        &self.profile
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    fn records(&mut self) -> PipelineResult<Arc<Vec<Record>>> {
        self.cache.get_or_load(&self.source, &self.profile)
    }

    /// Dates and categories the selection widgets may offer.
    pub fn options(&mut self) -> PipelineResult<SelectionOptions> {
        let records = self.records()?;
        Ok(SelectionOptions::from_records(&records, &self.profile))
    }

    /// Renders the page for `selection`. Never fails: errors and empty results
    /// come back as [`PageOutcome::Notice`].
    #[tracing::instrument(skip(self), fields(profile = %self.profile.name, source = %self.source.display()))]
    pub fn render(&mut self, selection: &Selection) -> PageOutcome {
        match self.try_render(selection) {
            Ok(outcome) => outcome,
            Err(e) => {
                let notice = e.notice();
                match notice.level {
                    NoticeLevel::Error => error!(error = %e, "Page render failed"),
                    _ => warn!(error = %e, "Page render stopped"),
                }
                PageOutcome::Notice(notice)
            }
        }
    }

    fn try_render(&mut self, selection: &Selection) -> PipelineResult<PageOutcome> {
        let records = self.records()?;
        SelectionOptions::from_records(&records, &self.profile)
            .validate(&self.profile, selection)?;

        let report = run(&records, &self.profile, selection)?;
        if let Status::NoData(stage) = report.status {
            info!(?stage, "No data for selection");
            return Ok(PageOutcome::Notice(no_data_notice(stage, selection)));
        }

        Ok(PageOutcome::Rendered(RenderedPage {
            chart: to_chart(&report.ranked, &self.profile, selection),
            table: report.ranked,
        }))
    }
}

fn no_data_notice(stage: Option<FilterStage>, selection: &Selection) -> Notice {
    let date = selection
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    match (stage, &selection.category) {
        (Some(FilterStage::Date), _) => Notice::warning(format!("There is no data for {date}.")),
        (Some(FilterStage::Category), CategoryFilter::Only(category)) => {
            Notice::warning(format!("There is no {category} data for {date}."))
        }
        _ => Notice::warning("There is no station data to analyze for this selection."),
    }
}
