//! Loaded record sets, reused until their source changes.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::profile::PageProfile;
use crate::records::{Record, load_records, read_records};

/// Identity of a source at the time it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKey {
    /// A file on disk, identified by its metadata.
    File {
        path: PathBuf,
        len: u64,
        modified: Option<SystemTime>,
    },
    /// Uploaded bytes, identified by their SHA-256 checksum.
    Content { name: String, checksum: String },
}

impl SourceKey {
    /// Reads the identity of the file at `path` without reading its contents.
    pub fn for_file(path: &Path) -> PipelineResult<Self> {
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::SourceNotFound(path.to_path_buf()),
            _ => PipelineError::Io(e),
        })?;
        Ok(SourceKey::File {
            path: path.to_path_buf(),
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    pub fn for_content(name: &str, bytes: &[u8]) -> Self {
        SourceKey::Content {
            name: name.to_string(),
            checksum: calculate_checksum(bytes),
        }
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn calculate_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The part of a profile that shapes loaded records. Profiles that agree on
/// it can share records; chart settings such as `top_n` are left out.
fn projection_key(profile: &PageProfile) -> String {
    let mut hasher = Sha256::new();
    let columns = [profile.encoding.as_str(), profile.date_format.as_str()]
        .into_iter()
        .chain(profile.date_column.as_deref())
        .chain(std::iter::once("|"))
        .chain(profile.category_column.as_deref())
        .chain(std::iter::once("|"))
        .chain(profile.label_columns())
        .chain(std::iter::once("|"))
        .chain(profile.measure_columns());
    for part in columns {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Slot {
    profile: String,
    projection: String,
    source: String,
}

impl Slot {
    fn new(profile: &PageProfile, source: String) -> Self {
        Self {
            profile: profile.name.clone(),
            projection: projection_key(profile),
            source,
        }
    }
}

struct CacheEntry {
    key: SourceKey,
    records: Arc<Vec<Record>>,
}

/// Record sets keyed by profile name, projected columns and source location.
///
/// A slot is replaced when the source's [`SourceKey`] no longer matches.
#[derive(Default)]
pub struct RecordCache {
    entries: HashMap<Slot, CacheEntry>,
    loads: usize,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times a source was actually read and parsed.
    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the records of the file at `path`, reading it only when it
    /// changed since the last call.
    pub fn get_or_load(
        &mut self,
        path: &Path,
        profile: &PageProfile,
    ) -> PipelineResult<Arc<Vec<Record>>> {
        let key = SourceKey::for_file(path)?;
        let slot = Slot::new(profile, path.display().to_string());
        self.lookup_or_insert(slot, key, || load_records(path, profile))
    }

    /// Returns the records of uploaded `bytes`, parsing them only when their
    /// content changed since the last upload under `name`.
    pub fn get_or_parse(
        &mut self,
        name: &str,
        bytes: &[u8],
        profile: &PageProfile,
    ) -> PipelineResult<Arc<Vec<Record>>> {
        let key = SourceKey::for_content(name, bytes);
        let slot = Slot::new(profile, name.to_string());
        self.lookup_or_insert(slot, key, || read_records(bytes, name, profile))
    }

    fn lookup_or_insert(
        &mut self,
        slot: Slot,
        key: SourceKey,
        load: impl FnOnce() -> PipelineResult<Vec<Record>>,
    ) -> PipelineResult<Arc<Vec<Record>>> {
        if let Some(entry) = self.entries.get(&slot) {
            if entry.key == key {
                debug!(profile = %slot.profile, source = %slot.source, "Record cache hit");
                return Ok(Arc::clone(&entry.records));
            }
            info!(profile = %slot.profile, source = %slot.source, "Source changed, reloading");
        }

        let records = Arc::new(load()?);
        self.loads += 1;
        self.entries.insert(
            slot,
            CacheEntry {
                key,
                records: Arc::clone(&records),
            },
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BIKE_HEADER: &str = "시작_대여소명,종료_대여소명,전체_건수\n";

    /// Bike columns over UTF-8 scratch files.
    fn bike() -> PageProfile {
        let mut profile = PageProfile::bike_share();
        profile.encoding = "utf-8".to_string();
        profile
    }

    #[test]
    fn test_checksum_consistency() {
        assert_eq!(calculate_checksum(b"abc"), calculate_checksum(b"abc"));
        assert_ne!(calculate_checksum(b"abc"), calculate_checksum(b"abd"));
        assert_eq!(calculate_checksum(b"").len(), 64);
    }

    #[test]
    fn test_file_is_read_once_while_unchanged() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{BIKE_HEADER}A,B,1\n").unwrap();
        file.flush().unwrap();

        let profile = bike();
        let mut cache = RecordCache::new();

        let first = cache.get_or_load(file.path(), &profile).unwrap();
        let second = cache.get_or_load(file.path(), &profile).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.loads(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_changed_file_is_reloaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{BIKE_HEADER}A,B,1\n").unwrap();
        file.flush().unwrap();

        let profile = bike();
        let mut cache = RecordCache::new();
        let first = cache.get_or_load(file.path(), &profile).unwrap();
        assert_eq!(first.len(), 1);

        // Appending changes the length even when mtime granularity is coarse.
        write!(file, "B,C,2\n").unwrap();
        file.flush().unwrap();

        let second = cache.get_or_load(file.path(), &profile).unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(cache.loads(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_profiles_get_separate_slots() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{BIKE_HEADER}A,B,1\n").unwrap();
        file.flush().unwrap();

        let original = bike();
        let mut renamed = original.clone();
        renamed.name = "bike_copy".to_string();

        let mut cache = RecordCache::new();
        cache.get_or_load(file.path(), &original).unwrap();
        cache.get_or_load(file.path(), &renamed).unwrap();
        assert_eq!(cache.loads(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_same_name_with_other_columns_gets_separate_slot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{BIKE_HEADER}A,B,1\n").unwrap();
        file.flush().unwrap();

        let rentals = bike();
        let mut returns = bike();
        returns.roles.truncate(1);
        returns.roles[0].entity_column = "종료_대여소명".to_string();

        let mut cache = RecordCache::new();
        let first = cache.get_or_load(file.path(), &rentals).unwrap();
        let second = cache.get_or_load(file.path(), &returns).unwrap();

        assert_eq!(cache.loads(), 2);
        assert_eq!(first[0].schema().labels(), ["시작_대여소명", "종료_대여소명"]);
        assert_eq!(second[0].schema().labels(), ["종료_대여소명"]);
        assert_eq!(second[0].label("종료_대여소명"), Some("B"));
    }

    #[test]
    fn test_chart_settings_do_not_split_slots() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{BIKE_HEADER}A,B,1\n").unwrap();
        file.flush().unwrap();

        let profile = bike();
        let mut top_three = bike();
        top_three.top_n = 3;
        top_three.title = "Top three".to_string();

        let mut cache = RecordCache::new();
        let first = cache.get_or_load(file.path(), &profile).unwrap();
        let second = cache.get_or_load(file.path(), &top_three).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.loads(), 1);
    }

    #[test]
    fn test_encoding_is_part_of_the_slot() {
        let mut profile = bike();
        let before = projection_key(&profile);
        profile.encoding = "euc-kr".to_string();
        assert_ne!(projection_key(&profile), before);
    }

    #[test]
    fn test_uploaded_content_keyed_by_checksum() {
        let profile = bike();
        let mut cache = RecordCache::new();
        let v1 = format!("{BIKE_HEADER}A,B,1\n");
        let v2 = format!("{BIKE_HEADER}A,B,1\nC,D,5\n");

        let a = cache.get_or_parse("upload.csv", v1.as_bytes(), &profile).unwrap();
        let b = cache.get_or_parse("upload.csv", v1.as_bytes(), &profile).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = cache.get_or_parse("upload.csv", v2.as_bytes(), &profile).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(cache.loads(), 2);
    }

    #[test]
    fn test_missing_file_is_source_not_found() {
        let mut cache = RecordCache::new();
        let err = cache
            .get_or_load(Path::new("no/such/file.csv"), &PageProfile::subway())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound(_)));
        assert!(cache.is_empty());
    }
}
