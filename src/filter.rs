//! Selection model and the filter stage that feeds the aggregator.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::profile::PageProfile;
use crate::records::Record;

/// Sentinel accepted on the command line for "no category filter".
pub const ALL_CATEGORIES: &str = "all";

/// Category part of a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(ALL_CATEGORIES) || s == "전체 노선" {
            Ok(CategoryFilter::All)
        } else {
            Ok(CategoryFilter::Only(s.to_string()))
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str(ALL_CATEGORIES),
            CategoryFilter::Only(c) => f.write_str(c),
        }
    }
}

/// What the user picked on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub date: Option<NaiveDate>,
    pub category: CategoryFilter,
}

impl Selection {
    pub fn new(date: Option<NaiveDate>, category: CategoryFilter) -> Self {
        Self { date, category }
    }
}

/// Parses a date typed as `YYYYMMDD` or `YYYY-MM-DD`.
pub fn parse_selection_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d").or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
}

/// Values the selection widgets may offer for a loaded record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionOptions {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    /// Distinct category values, sorted.
    pub categories: Vec<String>,
}

impl SelectionOptions {
    pub fn from_records(records: &[Record], profile: &PageProfile) -> Self {
        let mut options = SelectionOptions::default();
        for record in records {
            if let Some(date) = record.date {
                options.min_date = Some(options.min_date.map_or(date, |d| d.min(date)));
                options.max_date = Some(options.max_date.map_or(date, |d| d.max(date)));
            }
        }
        if let Some(column) = profile.category_column.as_deref() {
            let mut categories: Vec<String> = records
                .iter()
                .filter_map(|r| r.label(column))
                .map(str::to_string)
                .collect();
            categories.sort();
            categories.dedup();
            options.categories = categories;
        }
        options
    }

    /// The selection a page shows before the user touches anything.
    pub fn default_selection(&self) -> Selection {
        Selection::new(self.min_date, CategoryFilter::All)
    }

    /// Rejects dates outside the loaded range and categories never seen.
    ///
    /// Like [`filter_records`], a category is ignored when `profile` has no
    /// category column.
    pub fn validate(&self, profile: &PageProfile, selection: &Selection) -> PipelineResult<()> {
        if let (Some(date), Some(min), Some(max)) = (selection.date, self.min_date, self.max_date) {
            if date < min || date > max {
                return Err(PipelineError::DateOutOfRange { date, min, max });
            }
        }
        if profile.category_column.is_none() {
            return Ok(());
        }
        if let CategoryFilter::Only(category) = &selection.category {
            if !self.categories.contains(category) {
                return Err(PipelineError::UnknownCategory(category.clone()));
            }
        }
        Ok(())
    }
}

/// The filter step that left no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    Date,
    Category,
}

/// Records matching a selection.
#[derive(Debug)]
pub struct Filtered<'a> {
    pub records: Vec<&'a Record>,
    /// Set when `records` is empty: the first stage that removed everything.
    pub emptied_by: Option<FilterStage>,
}

impl Filtered<'_> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Keeps the records that match every criterion of `selection`.
///
/// The date is required when the profile has a date column. A category
/// selection on a profile without a category column is ignored.
pub fn filter_records<'a>(
    records: &'a [Record],
    profile: &PageProfile,
    selection: &Selection,
) -> PipelineResult<Filtered<'a>> {
    let mut kept: Vec<&Record> = records.iter().collect();
    let mut emptied_by = None;

    if profile.date_column.is_some() {
        let date = selection.date.ok_or_else(|| PipelineError::NoSelection {
            dimension: "date".to_string(),
        })?;
        kept.retain(|r| r.date == Some(date));
        if kept.is_empty() && !records.is_empty() {
            emptied_by = Some(FilterStage::Date);
        }
    }

    if let (Some(column), CategoryFilter::Only(category)) =
        (profile.category_column.as_deref(), &selection.category)
    {
        let before = kept.len();
        kept.retain(|r| r.label(column) == Some(category.as_str()));
        if kept.is_empty() && before > 0 {
            emptied_by = Some(FilterStage::Category);
        }
    }

    debug!(total = records.len(), kept = kept.len(), "Records filtered");

    Ok(Filtered {
        records: kept,
        emptied_by,
    })
}
