//! Page profiles: everything that differs between the subway and bike-share
//! dashboards, so both run through the same pipeline.
//!
//! Custom profiles are plain JSON:
//! ```json
//! {
//!   "name": "bus",
//!   "title": "Top bus stops",
//!   "date_column": "date",
//!   "category_column": "route",
//!   "roles": [
//!     { "role": "outbound", "entity_column": "stop", "measure_column": "boardings" },
//!     { "role": "inbound", "entity_column": "stop", "measure_column": "alightings" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result, bail};
use encoding_rs::{EUC_KR, Encoding};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analyzers::palette::ColorScheme;
use crate::analyzers::types::{Role, RoleColumns};

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Bar direction of the rendered chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    #[default]
    Vertical,
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

/// Resolves a WHATWG encoding label. `cp949` is accepted as an alias of
/// `euc-kr`, whose decoder already covers the Windows-949 extensions.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    if label.eq_ignore_ascii_case("cp949") {
        return Some(EUC_KR);
    }
    Encoding::for_label(label.as_bytes())
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_value_label() -> String {
    "Total".to_string()
}

fn default_entity_label() -> String {
    "Station".to_string()
}

/// Configuration of one dashboard page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProfile {
    pub name: String,
    pub title: String,
    /// Text encoding of the source files, e.g. `utf-8` or `euc-kr`.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub category_column: Option<String>,
    pub roles: Vec<RoleColumns>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub colors: ColorScheme,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_value_label")]
    pub value_label: String,
    #[serde(default = "default_entity_label")]
    pub entity_label: String,
}

impl PageProfile {
    /// Daily subway boardings and alightings per station, filterable by date and line.
    pub fn subway() -> Self {
        Self {
            name: "subway".to_string(),
            title: "Top subway stations by riders".to_string(),
            encoding: default_encoding(),
            date_column: Some("사용일자".to_string()),
            date_format: default_date_format(),
            category_column: Some("노선명".to_string()),
            roles: vec![
                RoleColumns::new(Role::Outbound, "역명", "승차총승객수"),
                RoleColumns::new(Role::Inbound, "역명", "하차총승객수"),
            ],
            top_n: DEFAULT_TOP_N,
            colors: ColorScheme::default(),
            orientation: Orientation::Horizontal,
            value_label: "Riders (boarding + alighting)".to_string(),
            entity_label: "Station".to_string(),
        }
    }

    /// Bike-share trips counted at both the rental and the return station.
    pub fn bike_share() -> Self {
        Self {
            name: "bike".to_string(),
            title: "Top bike-share stations by rentals and returns".to_string(),
            // The public bike-share exports ship in CP949.
            encoding: "euc-kr".to_string(),
            date_column: None,
            date_format: default_date_format(),
            category_column: None,
            roles: vec![
                RoleColumns::new(Role::Outbound, "시작_대여소명", "전체_건수"),
                RoleColumns::new(Role::Inbound, "종료_대여소명", "전체_건수"),
            ],
            top_n: DEFAULT_TOP_N,
            colors: ColorScheme::default(),
            orientation: Orientation::Vertical,
            value_label: "Trips (rent + return)".to_string(),
            entity_label: "Rental station".to_string(),
        }
    }

    /// Looks up a built-in profile by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "subway" => Some(Self::subway()),
            "bike" | "bike_share" => Some(Self::bike_share()),
            _ => None,
        }
    }

    /// Loads and validates a profile from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile '{}'", path.display()))?;
        let profile: PageProfile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse profile '{}'", path.display()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Checks that the profile can drive a pipeline run.
    pub fn validate(&self) -> Result<()> {
        if self.roles.is_empty() {
            bail!("profile '{}' defines no roles", self.name);
        }
        for role in &self.roles {
            if role.entity_column.trim().is_empty() || role.measure_column.trim().is_empty() {
                bail!("profile '{}' has a role with an empty column name", self.name);
            }
        }
        if self.date_column.as_deref().is_some_and(|c| c.trim().is_empty()) {
            bail!("profile '{}' has an empty date column", self.name);
        }
        if self
            .category_column
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            bail!("profile '{}' has an empty category column", self.name);
        }
        if encoding_for_label(&self.encoding).is_none() {
            bail!(
                "profile '{}' names an unknown encoding '{}'",
                self.name,
                self.encoding
            );
        }
        if self.top_n == 0 {
            bail!("profile '{}' must rank at least one entity", self.name);
        }
        Ok(())
    }

    /// Columns read as text: every entity column plus the category column.
    pub fn label_columns(&self) -> impl Iterator<Item = &str> {
        self.roles
            .iter()
            .map(|r| r.entity_column.as_str())
            .chain(self.category_column.as_deref())
    }

    /// Columns coerced to counts.
    pub fn measure_columns(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(|r| r.measure_column.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_profiles_are_valid() {
        for name in ["subway", "bike"] {
            let profile = PageProfile::builtin(name).unwrap();
            profile.validate().unwrap();
            assert_eq!(profile.top_n, 10);
            assert!(profile.colors.ensure_capacity(profile.top_n).is_ok());
        }
        assert!(PageProfile::builtin("tram").is_none());
    }

    #[test]
    fn test_label_and_measure_columns() {
        let profile = PageProfile::subway();
        let labels: Vec<_> = profile.label_columns().collect();
        assert_eq!(labels, vec!["역명", "역명", "노선명"]);

        let bike = PageProfile::bike_share();
        let measures: Vec<_> = bike.measure_columns().collect();
        assert_eq!(measures, vec!["전체_건수", "전체_건수"]);
    }

    #[test]
    fn test_load_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "name": "bus",
                "title": "Top bus stops",
                "date_column": "date",
                "roles": [
                    {{ "role": "outbound", "entity_column": "stop", "measure_column": "on" }}
                ]
            }}"#
        )
        .unwrap();

        let profile = PageProfile::load(file.path()).unwrap();
        assert_eq!(profile.date_format, "%Y%m%d");
        assert_eq!(profile.top_n, 10);
        assert_eq!(profile.orientation, Orientation::Vertical);
        assert_eq!(profile.colors, ColorScheme::default());
        assert_eq!(profile.category_column, None);
        assert_eq!(profile.encoding, "utf-8");
    }

    #[test]
    fn test_encoding_labels() {
        assert_eq!(encoding_for_label("utf-8"), Some(encoding_rs::UTF_8));
        assert_eq!(encoding_for_label("EUC-KR"), Some(EUC_KR));
        assert_eq!(encoding_for_label("cp949"), Some(EUC_KR));
        assert_eq!(encoding_for_label("windows-949"), Some(EUC_KR));
        assert_eq!(encoding_for_label("klingon"), None);

        let mut profile = PageProfile::bike_share();
        profile.encoding = "klingon".to_string();
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn test_load_rejects_profile_without_roles() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "name": "empty", "title": "Nothing", "roles": [] }}"#).unwrap();

        let err = PageProfile::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("no roles"));
    }

    #[test]
    fn test_validate_rejects_zero_top_n() {
        let mut profile = PageProfile::bike_share();
        profile.top_n = 0;
        assert!(profile.validate().is_err());
    }
}
