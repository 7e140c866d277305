use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PipelineError, PipelineResult};

/// Sequential "Blues" scale, darkest first.
///
/// | Rank | Color     |
/// |------|-----------|
/// | 2    | `#08306B` |
/// | 3    | `#08519C` |
/// | 4    | `#2171B5` |
/// | 5    | `#4292C6` |
/// | 6    | `#6BAED6` |
/// | 7    | `#9ECAE1` |
/// | 8    | `#C6DBEF` |
/// | 9    | `#DEEBF7` |
/// | 10   | `#F7FBFF` |
static BLUES_DARK_TO_LIGHT: &[&str] = &[
    "#08306B", "#08519C", "#2171B5", "#4292C6", "#6BAED6", "#9ECAE1", "#C6DBEF", "#DEEBF7",
    "#F7FBFF",
];

static HIGHLIGHT_RED: &str = "#FF0000";

/// A `#RRGGBB` display color, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| format!("color '{s}' must start with '#'"))?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("color '{s}' is not in #RRGGBB form"));
        }
        Ok(Color(format!("#{}", hex.to_ascii_uppercase())))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rank-position coloring: the top bar gets `highlight`, the rest walk `gradient` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub highlight: Color,
    pub gradient: Vec<Color>,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            highlight: Color(HIGHLIGHT_RED.to_string()),
            gradient: BLUES_DARK_TO_LIGHT
                .iter()
                .map(|c| Color(c.to_string()))
                .collect(),
        }
    }
}

impl ColorScheme {
    /// Fails unless there are enough gradient colors for a top-`n` chart.
    pub fn ensure_capacity(&self, n: usize) -> PipelineResult<()> {
        let required = n.saturating_sub(1);
        if self.gradient.len() < required {
            return Err(PipelineError::PaletteExhausted {
                required,
                available: self.gradient.len(),
            });
        }
        Ok(())
    }

    /// Color for the bar at 0-based `position`, or `None` past the end of the gradient.
    pub fn color_at(&self, position: usize) -> Option<&Color> {
        match position {
            0 => Some(&self.highlight),
            p => self.gradient.get(p - 1),
        }
    }
}
