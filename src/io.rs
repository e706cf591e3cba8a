//! Event readers and format dispatch
//!
//! Input files are lists of [`EventRecord`]s. The reader is picked by file
//! extension; every reader shares the same duplicate-id policy.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::EventRecord;

/// Errors that can occur during reading or writing
#[derive(Error, Debug)]
pub enum IoError {
    /// The file format is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file extension could not be determined
    #[error("could not determine file format from path: {0}")]
    UnknownExtension(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A parsing error occurred
    #[error("parse error: {0}")]
    Parse(String),

    /// A rendering/writing error occurred
    #[error("write error: {0}")]
    Write(String),
}

/// Result type for reader/writer operations
pub type IoResult<T> = Result<T, IoError>;

/// A reader parses an input file into event records
pub trait RecordReader {
    /// Parse the records held in `text`
    fn parse(&self, text: &str) -> IoResult<Vec<EventRecord>>;

    /// File extensions this reader can handle (e.g., ["yaml", "yml"])
    fn supported_extensions(&self) -> &[&str];

    /// Check if this reader can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Read and parse the file at `input`
    fn read(&self, input: &Path) -> IoResult<Vec<EventRecord>> {
        let text = fs::read_to_string(input)?;
        self.parse(&text)
    }
}

/// JSON array of records
#[derive(Debug, Default)]
pub struct JsonRecordReader;

impl RecordReader for JsonRecordReader {
    fn parse(&self, text: &str) -> IoResult<Vec<EventRecord>> {
        serde_json::from_str(text).map_err(|e| IoError::Parse(e.to_string()))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }
}

/// YAML sequence of records
#[derive(Debug, Default)]
pub struct YamlRecordReader;

impl RecordReader for YamlRecordReader {
    fn parse(&self, text: &str) -> IoResult<Vec<EventRecord>> {
        serde_yaml::from_str(text).map_err(|e| IoError::Parse(e.to_string()))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

/// Get file extension from a path
pub fn extension_from_path(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Keep the first record for every id, warning about the rest
pub fn dedupe_by_id(records: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = 0usize;
    for record in records {
        if seen.insert(record.id) {
            kept.push(record);
        } else {
            warn!(id = record.id, "Duplicate event id, keeping the first occurrence");
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!(dropped, "Dropped duplicate events");
    }
    kept
}

/// Registry of available record readers
pub struct ReaderRegistry {
    readers: Vec<Box<dyn RecordReader + Send + Sync>>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            readers: Vec::new(),
        }
    }

    /// Registry with the JSON and YAML readers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_reader(Box::new(JsonRecordReader));
        registry.register_reader(Box::new(YamlRecordReader));
        registry
    }

    /// Register a reader
    pub fn register_reader(&mut self, reader: Box<dyn RecordReader + Send + Sync>) {
        self.readers.push(reader);
    }

    /// Find a reader for the given file extension
    pub fn reader_for_extension(&self, ext: &str) -> Option<&dyn RecordReader> {
        self.readers
            .iter()
            .find(|r| r.supports_extension(ext))
            .map(|r| r.as_ref() as &dyn RecordReader)
    }

    /// Find a reader for the given path based on its extension
    pub fn reader_for_path(&self, path: &Path) -> IoResult<&dyn RecordReader> {
        let ext = extension_from_path(path)
            .ok_or_else(|| IoError::UnknownExtension(path.display().to_string()))?;

        self.reader_for_extension(ext)
            .ok_or_else(|| IoError::UnsupportedFormat(ext.to_string()))
    }

    /// Read the events at `path`, dropping duplicate ids
    pub fn read_events(&self, path: &Path) -> IoResult<Vec<EventRecord>> {
        let records = self.reader_for_path(path)?.read(path)?;
        debug!(path = %path.display(), count = records.len(), "Read events");
        Ok(dedupe_by_id(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct MockReader {
        extensions: Vec<&'static str>,
    }

    impl RecordReader for MockReader {
        fn parse(&self, _text: &str) -> IoResult<Vec<EventRecord>> {
            Ok(Vec::new())
        }

        fn supported_extensions(&self) -> &[&str] {
            &self.extensions
        }
    }

    fn event(id: u64, city: &str) -> EventRecord {
        EventRecord {
            id,
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            city: Some(city.to_string()),
            participants_registered: None,
        }
    }

    #[test]
    fn reader_supports_extension_case_insensitive() {
        let reader = YamlRecordReader;
        assert!(reader.supports_extension("yaml"));
        assert!(reader.supports_extension("YML"));
        assert!(!reader.supports_extension("json"));
    }

    #[test]
    fn registry_reader_for_path_extracts_extension() {
        let mut registry = ReaderRegistry::new();
        registry.register_reader(Box::new(MockReader {
            extensions: vec!["csv"],
        }));

        assert!(registry.reader_for_path(&PathBuf::from("/data/events.csv")).is_ok());
        assert!(matches!(
            registry.reader_for_path(&PathBuf::from("/data/events.xyz")),
            Err(IoError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            registry.reader_for_path(&PathBuf::from("/data/events")),
            Err(IoError::UnknownExtension(_))
        ));
    }

    #[test]
    fn with_defaults_registers_json_and_yaml() {
        let registry = ReaderRegistry::with_defaults();
        assert!(registry.reader_for_extension("json").is_some());
        assert!(registry.reader_for_extension("yml").is_some());
        assert!(registry.reader_for_extension("csv").is_none());
    }

    #[test]
    fn json_reader_fills_optional_fields() {
        let text = r#"[
            {"id": 1, "date": "2015-03-14", "city": "Berlin", "participants_registered": 120},
            {"id": 2, "date": "2016-07-01"}
        ]"#;
        let records = JsonRecordReader.parse(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].participants_registered, Some(120.0));
        assert_eq!(records[1].city, None);
        assert_eq!(records[1].participants_registered, None);
    }

    #[test]
    fn yaml_reader_parses_sequence() {
        let text = "- id: 5\n  date: 2019-11-02\n  city: Lagos\n";
        let records = YamlRecordReader.parse(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 5);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2019, 11, 2).unwrap());
        assert_eq!(records[0].city.as_deref(), Some("Lagos"));
    }

    #[test]
    fn unparseable_date_is_a_parse_error() {
        let text = r#"[{"id": 1, "date": "not-a-date"}]"#;
        assert!(matches!(JsonRecordReader.parse(text), Err(IoError::Parse(_))));
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let records = vec![event(1, "A"), event(2, "B"), event(1, "C")];
        let kept = dedupe_by_id(records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].city.as_deref(), Some("A"));
    }

    #[test]
    fn read_events_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        fs::write(
            &path,
            r#"[{"id": 1, "date": "2020-01-01"}, {"id": 1, "date": "2021-01-01"}]"#,
        )
        .unwrap();

        let records = ReaderRegistry::with_defaults().read_events(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].year(), 2020);
    }

    #[test]
    fn io_error_display() {
        let err = IoError::UnsupportedFormat("xyz".to_string());
        assert_eq!(err.to_string(), "unsupported format: xyz");

        let err = IoError::Parse("invalid syntax".to_string());
        assert_eq!(err.to_string(), "parse error: invalid syntax");
    }
}
