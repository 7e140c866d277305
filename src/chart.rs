//! Translation of ranked entries into chart bars.
//!
//! Bars are emitted in rank order; renderers must not re-sort them.

use serde::Serialize;

use crate::analyzers::types::RankedEntry;
use crate::filter::{CategoryFilter, Selection};
use crate::profile::{Orientation, PageProfile};

/// One name/value pair shown when hovering a bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TooltipField {
    pub name: String,
    pub value: String,
}

impl TooltipField {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartBar {
    pub rank: usize,
    pub label: String,
    pub value: u64,
    pub color: String,
    pub tooltip: Vec<TooltipField>,
}

/// Everything a charting backend needs to draw the ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub orientation: Orientation,
    pub value_label: String,
    pub entity_label: String,
    pub bars: Vec<ChartBar>,
}

/// Groups digits by thousands: `1234567` → `1,234,567`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Chart title describing the profile and the active selection.
pub fn chart_title(profile: &PageProfile, selection: &Selection) -> String {
    let mut parts = Vec::new();
    if let Some(date) = selection.date {
        parts.push(date.format("%Y-%m-%d").to_string());
    }
    if profile.category_column.is_some() {
        parts.push(match &selection.category {
            CategoryFilter::All => "all lines".to_string(),
            CategoryFilter::Only(c) => c.clone(),
        });
    }
    if parts.is_empty() {
        format!("{} (top {})", profile.title, profile.top_n)
    } else {
        format!("{} (top {}, {})", profile.title, profile.top_n, parts.join(", "))
    }
}

fn tooltip(entry: &RankedEntry, profile: &PageProfile) -> Vec<TooltipField> {
    let mut fields = vec![
        TooltipField::new("rank", entry.rank.to_string()),
        TooltipField::new("total", format_count(entry.total.combined)),
        TooltipField::new("outbound", format_count(entry.total.outbound)),
        TooltipField::new("inbound", format_count(entry.total.inbound)),
    ];
    if profile.category_column.is_some() {
        fields.push(TooltipField::new(
            "categories",
            entry.total.categories.join(", "),
        ));
    }
    fields
}

/// Builds the chart for `ranked`, preserving its order.
pub fn to_chart(ranked: &[RankedEntry], profile: &PageProfile, selection: &Selection) -> ChartSpec {
    ChartSpec {
        title: chart_title(profile, selection),
        orientation: profile.orientation,
        value_label: profile.value_label.clone(),
        entity_label: profile.entity_label.clone(),
        bars: ranked
            .iter()
            .map(|entry| ChartBar {
                rank: entry.rank,
                label: entry.total.entity.clone(),
                value: entry.total.combined,
                color: entry.color.to_string(),
                tooltip: tooltip(entry, profile),
            })
            .collect(),
    }
}
