//! Error taxonomy for the ranking pipeline and the notices shown in its place.

use serde::Serialize;
use std::path::PathBuf;

use chrono::NaiveDate;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Everything that can stop one render of a page.
///
/// An empty filter result is not an error; see [`crate::pipeline::Status`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("data source '{}' not found", .0.display())]
    SourceNotFound(PathBuf),

    #[error("no {dimension} selected")]
    NoSelection { dimension: String },

    #[error("rank size must be at least 1, got {0}")]
    InvalidRankSize(usize),

    #[error("palette has {available} gradient colors but {required} are needed")]
    PaletteExhausted { required: usize, available: usize },

    #[error("column '{column}' is missing from '{origin}'")]
    MissingColumn { column: String, origin: String },

    #[error("unsupported text encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("date {date} is outside the loaded range {min}..={max}")]
    DateOutOfRange {
        date: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// How prominently a [`Notice`] should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible message rendered instead of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl PipelineError {
    /// Converts the error into the message shown at the page boundary.
    pub fn notice(&self) -> Notice {
        match self {
            PipelineError::SourceNotFound(path) => Notice::error(format!(
                "Data file '{}' could not be found. Check that it was uploaded next to the app.",
                path.display()
            )),
            PipelineError::NoSelection { dimension } => {
                Notice::info(format!("Select a {dimension} to see the ranking."))
            }
            PipelineError::DateOutOfRange { .. } | PipelineError::UnknownCategory(_) => {
                Notice::warning(self.to_string())
            }
            PipelineError::InvalidRankSize(_) | PipelineError::PaletteExhausted { .. } => {
                Notice::warning(format!("The chart cannot be drawn: {self}"))
            }
            PipelineError::MissingColumn { .. } | PipelineError::UnsupportedEncoding(_) => {
                Notice::error(self.to_string())
            }
            PipelineError::Csv(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                Notice::error(format!(
                    "{self}. Set the profile's encoding (e.g. euc-kr) or convert the file to UTF-8."
                ))
            }
            PipelineError::Io(_) | PipelineError::Csv(_) => Notice::error(self.to_string()),
        }
    }
}
