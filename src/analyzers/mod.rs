//! Aggregation and ranking of filtered records.
//!
//! Records are grouped per entity and role, merged into combined totals,
//! sorted, cut to the top N and colored by rank position.

pub mod aggregate;
pub mod palette;
pub mod rank;
pub mod types;
