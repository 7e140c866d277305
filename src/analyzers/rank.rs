use tracing::debug;

use crate::analyzers::palette::ColorScheme;
use crate::analyzers::types::{EntityTotal, RankedEntry};
use crate::error::{PipelineError, PipelineResult};

/// Ranks entities by combined total and colors them by position.
///
/// The sort is stable, so equal totals keep their aggregation order. Exactly
/// `top_n` entries are kept when available; an entity tied with the last kept
/// one is cut like any other. Fewer entities are returned as-is, never padded.
///
/// # Errors
///
/// [`PipelineError::InvalidRankSize`] when `top_n` is 0,
/// [`PipelineError::PaletteExhausted`] when `colors` cannot cover `top_n` bars.
pub fn rank(
    mut totals: Vec<EntityTotal>,
    top_n: usize,
    colors: &ColorScheme,
) -> PipelineResult<Vec<RankedEntry>> {
    if top_n == 0 {
        return Err(PipelineError::InvalidRankSize(top_n));
    }
    colors.ensure_capacity(top_n)?;

    let candidates = totals.len();
    totals.sort_by(|a, b| b.combined.cmp(&a.combined));
    totals.truncate(top_n);

    let ranked = totals
        .into_iter()
        .enumerate()
        .map(|(position, total)| {
            let color = colors
                .color_at(position)
                .cloned()
                .ok_or(PipelineError::PaletteExhausted {
                    required: position,
                    available: colors.gradient.len(),
                })?;
            Ok(RankedEntry {
                rank: position + 1,
                total,
                color,
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    debug!(candidates, ranked = ranked.len(), top_n, "Entities ranked");
    Ok(ranked)
}
