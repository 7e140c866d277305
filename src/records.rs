//! Record model and CSV loading.
//!
//! Only the columns a [`PageProfile`] names are kept. Measures are coerced to
//! non-negative integers on load; a malformed value becomes 0 instead of
//! dropping the row.

use chrono::NaiveDate;
use encoding_rs::UTF_8;
use encoding_rs_io::DecodeReaderBytesBuilder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::profile::{DEFAULT_DATE_FORMAT, PageProfile, encoding_for_label};

/// Column names shared by every record of one load. A record stores its
/// values in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    labels: Vec<String>,
    measures: Vec<String>,
}

impl Schema {
    pub fn new(labels: Vec<String>, measures: Vec<String>) -> Self {
        Self { labels, measures }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn measures(&self) -> &[String] {
        &self.measures
    }

    fn label_index(&self, column: &str) -> Option<usize> {
        self.labels.iter().position(|c| c == column)
    }

    fn measure_index(&self, column: &str) -> Option<usize> {
        self.measures.iter().position(|c| c == column)
    }
}

/// One row of input data, projected onto a profile's columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub date: Option<NaiveDate>,
    schema: Arc<Schema>,
    labels: Vec<String>,
    counts: Vec<u64>,
}

impl Record {
    pub fn new(date: Option<NaiveDate>) -> Self {
        Self {
            date,
            ..Default::default()
        }
    }

    /// Sets a label, adding `column` to this record's schema if needed.
    pub fn with_label(mut self, column: &str, value: &str) -> Self {
        match self.schema.label_index(column) {
            Some(idx) => self.labels[idx] = value.to_string(),
            None => {
                Arc::make_mut(&mut self.schema).labels.push(column.to_string());
                self.labels.push(value.to_string());
            }
        }
        self
    }

    /// Sets a measure, adding `column` to this record's schema if needed.
    pub fn with_count(mut self, column: &str, value: u64) -> Self {
        match self.schema.measure_index(column) {
            Some(idx) => self.counts[idx] = value,
            None => {
                Arc::make_mut(&mut self.schema).measures.push(column.to_string());
                self.counts.push(value);
            }
        }
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Text value of a categorical column; `None` when absent or blank.
    pub fn label(&self, column: &str) -> Option<&str> {
        self.schema
            .label_index(column)
            .and_then(|idx| self.labels.get(idx))
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Coerced measure value; 0 when the column was not loaded.
    pub fn count(&self, column: &str) -> u64 {
        self.schema
            .measure_index(column)
            .and_then(|idx| self.counts.get(idx))
            .copied()
            .unwrap_or(0)
    }
}

/// Outcome of coercing one measure field.
#[derive(Debug, PartialEq, Eq)]
enum Coerced {
    Clean(u64),
    Defaulted,
}

/// Parses a measure leniently: integers pass, non-negative decimals are
/// truncated, anything else is 0.
fn coerce_count(raw: &str) -> Coerced {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Coerced::Clean(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Coerced::Clean(f.trunc() as u64),
        _ => Coerced::Defaulted,
    }
}

/// Parses a date cell. The default format only takes exactly eight digits;
/// chrono alone would read `2025101` as 2025-10-01.
fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    if format == DEFAULT_DATE_FORMAT && (raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    NaiveDate::parse_from_str(raw, format).ok()
}

/// Counters reported once per load.
#[derive(Debug, Default)]
struct LoadIssues {
    coerced_measures: usize,
    undated_rows: usize,
}

/// Opens `path` for reading, gzip-decoding `.gz` files.
fn open_source(path: &Path) -> PipelineResult<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::SourceNotFound(path.to_path_buf()),
        _ => PipelineError::Io(e),
    })?;
    let reader = BufReader::new(file);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Loads every record of the CSV file at `path`.
///
/// # Errors
///
/// [`PipelineError::SourceNotFound`] when the file does not exist,
/// [`PipelineError::MissingColumn`] when the header lacks a profile column.
#[tracing::instrument(skip(path, profile), fields(path = %path.display(), profile = %profile.name))]
pub fn load_records(path: &Path, profile: &PageProfile) -> PipelineResult<Vec<Record>> {
    let reader = open_source(path)?;
    read_records(reader, &path.display().to_string(), profile)
}

/// Reads records from any CSV byte stream in the profile's encoding.
/// `origin` names the stream in errors.
///
/// UTF-8 input is read as-is and invalid bytes are an error. Other encodings
/// are transcoded first; a UTF-8 byte-order mark still takes precedence.
pub fn read_records<R: Read>(
    reader: R,
    origin: &str,
    profile: &PageProfile,
) -> PipelineResult<Vec<Record>> {
    let encoding = encoding_for_label(&profile.encoding)
        .ok_or_else(|| PipelineError::UnsupportedEncoding(profile.encoding.clone()))?;
    if encoding == UTF_8 {
        return parse_records(reader, origin, profile);
    }

    debug!(origin, encoding = encoding.name(), "Transcoding source");
    let decoded = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_override(true)
        .build(reader);
    parse_records(decoded, origin, profile)
}

fn parse_records<R: Read>(
    reader: R,
    origin: &str,
    profile: &PageProfile,
) -> PipelineResult<Vec<Record>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let index_of = |column: &str| -> PipelineResult<usize> {
        headers
            .iter()
            // Excel exports often start with a byte-order mark.
            .position(|h| h.trim_start_matches('\u{feff}') == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: column.to_string(),
                origin: origin.to_string(),
            })
    };

    let date_idx = profile
        .date_column
        .as_deref()
        .map(|c| index_of(c))
        .transpose()?;

    let mut label_columns: Vec<String> = Vec::new();
    let mut label_idx: Vec<usize> = Vec::new();
    for column in profile.label_columns() {
        if !label_columns.iter().any(|c| c == column) {
            label_idx.push(index_of(column)?);
            label_columns.push(column.to_string());
        }
    }
    let mut measure_columns: Vec<String> = Vec::new();
    let mut count_idx: Vec<usize> = Vec::new();
    for column in profile.measure_columns() {
        if !measure_columns.iter().any(|c| c == column) {
            count_idx.push(index_of(column)?);
            measure_columns.push(column.to_string());
        }
    }
    let schema = Arc::new(Schema::new(label_columns, measure_columns));

    let mut issues = LoadIssues::default();
    let mut records = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let row = result?;
        let field = |idx: usize| row.get(idx).unwrap_or("");

        let date = match date_idx {
            Some(idx) => {
                let raw = field(idx);
                let date = parse_date(raw, &profile.date_format);
                if date.is_none() {
                    debug!(line = line + 2, raw, "Unparsable date");
                    issues.undated_rows += 1;
                }
                date
            }
            None => None,
        };

        let labels = label_idx.iter().map(|&idx| field(idx).to_string()).collect();
        let mut counts = Vec::with_capacity(count_idx.len());
        for (column, &idx) in schema.measures().iter().zip(&count_idx) {
            let raw = field(idx);
            let value = match coerce_count(raw) {
                Coerced::Clean(n) => n,
                Coerced::Defaulted => {
                    if !raw.is_empty() {
                        debug!(line = line + 2, column = %column, raw, "Measure coerced to 0");
                    }
                    issues.coerced_measures += 1;
                    0
                }
            };
            counts.push(value);
        }

        records.push(Record {
            date,
            schema: Arc::clone(&schema),
            labels,
            counts,
        });
    }

    if issues.coerced_measures > 0 || issues.undated_rows > 0 {
        warn!(
            origin,
            coerced_measures = issues.coerced_measures,
            undated_rows = issues.undated_rows,
            "Malformed fields defaulted while loading"
        );
    }
    info!(origin, rows = records.len(), "Records loaded");

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SUBWAY_CSV: &str = "\
사용일자,노선명,역명,승차총승객수,하차총승객수,등록일자
20251001,2호선,강남,100,50,20251004
20251001,2호선,잠실,80,,20251004
20251002,1호선,서울역,abc,-3,20251005
not-a-date,1호선,시청,12.7,3,20251005
";

    #[test]
    fn test_coerce_count() {
        assert_eq!(coerce_count("42"), Coerced::Clean(42));
        assert_eq!(coerce_count(" 7 "), Coerced::Clean(7));
        assert_eq!(coerce_count("12.9"), Coerced::Clean(12));
        assert_eq!(coerce_count(""), Coerced::Defaulted);
        assert_eq!(coerce_count("n/a"), Coerced::Defaulted);
        assert_eq!(coerce_count("-3"), Coerced::Defaulted);
        assert_eq!(coerce_count("NaN"), Coerced::Defaulted);
        assert_eq!(coerce_count("1,234"), Coerced::Defaulted);
    }

    #[test]
    fn test_read_subway_records_coerces_instead_of_dropping() {
        let profile = PageProfile::subway();
        let records = read_records(SUBWAY_CSV.as_bytes(), "inline", &profile).unwrap();

        assert_eq!(records.len(), 4);

        let first = &records[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 10, 1));
        assert_eq!(first.label("역명"), Some("강남"));
        assert_eq!(first.label("노선명"), Some("2호선"));
        assert_eq!(first.count("승차총승객수"), 100);
        assert_eq!(first.count("하차총승객수"), 50);

        assert_eq!(records[1].count("하차총승객수"), 0);
        assert_eq!(records[2].count("승차총승객수"), 0);
        assert_eq!(records[2].count("하차총승객수"), 0);

        assert_eq!(records[3].date, None);
        assert_eq!(records[3].count("승차총승객수"), 12);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let profile = PageProfile::subway();
        let csv = "사용일자,역명,승차총승객수,하차총승객수\n20251001,강남,1,1\n";
        let err = read_records(csv.as_bytes(), "inline", &profile).unwrap_err();

        match err {
            PipelineError::MissingColumn { column, origin } => {
                assert_eq!(column, "노선명");
                assert_eq!(origin, "inline");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_header_byte_order_mark_is_ignored() {
        let profile = PageProfile::bike_share();
        let csv = "\u{feff}시작_대여소명,종료_대여소명,전체_건수\nA,B,3\n";
        let records = read_records(csv.as_bytes(), "inline", &profile).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label("시작_대여소명"), Some("A"));
    }

    #[test]
    fn test_load_missing_file_is_source_not_found() {
        let profile = PageProfile::bike_share();
        let err = load_records(Path::new("definitely/not/here.csv"), &profile).unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound(_)));
    }

    #[test]
    fn test_load_gzip_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bike.csv.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&cp949("시작_대여소명,종료_대여소명,전체_건수\nA,B,3\nB,A,4\n"))
            .unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let records = load_records(&path, &PageProfile::bike_share()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].count("전체_건수"), 4);
    }

    fn cp949(text: &str) -> Vec<u8> {
        let (bytes, _, unmappable) = encoding_rs::EUC_KR.encode(text);
        assert!(!unmappable);
        bytes.into_owned()
    }

    #[test]
    fn test_cp949_source_is_transcoded() {
        let bytes = cp949("시작_대여소명,종료_대여소명,전체_건수\n서울역,시청,3\n");
        assert!(std::str::from_utf8(&bytes).is_err());

        let records = read_records(bytes.as_slice(), "inline", &PageProfile::bike_share()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label("시작_대여소명"), Some("서울역"));
        assert_eq!(records[0].label("종료_대여소명"), Some("시청"));
        assert_eq!(records[0].count("전체_건수"), 3);
    }

    #[test]
    fn test_cp949_source_under_utf8_profile_is_csv_error() {
        let mut profile = PageProfile::bike_share();
        profile.encoding = "utf-8".to_string();
        let bytes = cp949("시작_대여소명,종료_대여소명,전체_건수\n서울,시청,3\n");

        let err = read_records(bytes.as_slice(), "inline", &profile).unwrap_err();
        assert!(matches!(err, PipelineError::Csv(_)));
    }

    #[test]
    fn test_unknown_encoding_is_reported() {
        let mut profile = PageProfile::bike_share();
        profile.encoding = "klingon".to_string();
        let err = read_records(&b"a,b\n"[..], "inline", &profile).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedEncoding(label) if label == "klingon"));
    }

    #[test]
    fn test_short_dates_are_undated() {
        let profile = PageProfile::subway();
        let csv = "\
사용일자,노선명,역명,승차총승객수,하차총승객수
2025101,2호선,강남,1,1
202510011,2호선,강남,1,1
2025-10-01,2호선,강남,1,1
20251001,2호선,강남,1,1
";
        let records = read_records(csv.as_bytes(), "inline", &profile).unwrap();
        let dates: Vec<_> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![None, None, None, NaiveDate::from_ymd_opt(2025, 10, 1)]);
    }

    #[test]
    fn test_custom_date_format_is_not_length_checked() {
        assert_eq!(
            parse_date("2025-10-1", "%Y-%m-%d"),
            NaiveDate::from_ymd_opt(2025, 10, 1)
        );
        assert_eq!(parse_date("2025101", DEFAULT_DATE_FORMAT), None);
    }

    #[test]
    fn test_loaded_records_share_one_schema() {
        let profile = PageProfile::subway();
        let records = read_records(SUBWAY_CSV.as_bytes(), "inline", &profile).unwrap();

        assert!(Arc::ptr_eq(&records[0].schema, &records[3].schema));
        assert_eq!(records[0].schema().labels(), ["역명", "노선명"]);
        assert_eq!(records[0].schema().measures(), ["승차총승객수", "하차총승객수"]);
    }

    #[test]
    fn test_blank_label_reads_as_none() {
        let record = Record::new(None).with_label("역명", "");
        assert_eq!(record.label("역명"), None);
        assert_eq!(record.label("노선명"), None);
    }

    #[test]
    fn test_builder_overwrites_existing_column() {
        let record = Record::new(None)
            .with_label("역명", "강남")
            .with_label("역명", "역삼")
            .with_count("승차총승객수", 1)
            .with_count("승차총승객수", 7);
        assert_eq!(record.label("역명"), Some("역삼"));
        assert_eq!(record.count("승차총승객수"), 7);
        assert_eq!(record.schema().labels().len(), 1);
    }
}
