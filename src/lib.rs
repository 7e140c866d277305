pub mod analyzers;
pub mod cache;
pub mod chart;
pub mod error;
pub mod filter;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod profile;
pub mod records;
