//! Position artifact encoding and lookup
//!
//! The artifact is one pretty-printed JSON object: a `meta` block followed by
//! one array of `{id, x, y, r}` records per layout mode. Readers index every
//! mode by id and tolerate damaged entries.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::io::{IoError, IoResult};
use crate::model::Node;

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ceil2(value: f64) -> f64 {
    (value * 100.0).ceil() / 100.0
}

fn floor2(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

/// Final screen position of one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

impl PositionRecord {
    /// Extract a node's position rounded to two decimals.
    ///
    /// The rounded `y` is kept far enough from the band edges that the rounded
    /// circle still fits inside the band.
    pub fn from_node(node: &Node) -> Self {
        let r = round2(node.radius);
        let lo = ceil2(node.band.top + r);
        let hi = floor2(node.band.bottom - r);
        let y = if lo <= hi {
            round2(node.y).clamp(lo, hi)
        } else {
            round2(node.band.center())
        };
        Self {
            id: node.id,
            x: round2(node.x),
            y,
            r,
        }
    }

    fn is_usable(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.r.is_finite() && self.r > 0.0
    }

    fn rounded(self) -> Self {
        Self {
            x: round2(self.x),
            y: round2(self.y),
            r: round2(self.r),
            ..self
        }
    }
}

/// Header of a position artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMeta {
    /// RFC3339 UTC timestamp with milliseconds
    pub generated_at: String,
    pub event_count: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub year_range: [i32; 2],
}

/// Format a timestamp the way `generatedAt` is stored
pub fn format_generated_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Everything written to the positions file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionArtifact {
    pub meta: ArtifactMeta,
    #[serde(flatten)]
    pub modes: BTreeMap<String, Vec<PositionRecord>>,
}

impl PositionArtifact {
    pub fn new(meta: ArtifactMeta) -> Self {
        Self {
            meta,
            modes: BTreeMap::new(),
        }
    }

    /// Add (or replace) the positions for one mode
    pub fn insert(&mut self, mode: impl Into<String>, positions: Vec<PositionRecord>) {
        self.modes.insert(mode.into(), positions);
    }

    /// Pretty JSON, two-space indent
    pub fn to_json(&self) -> IoResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| IoError::Write(e.to_string()))
    }

    /// Serialize and write to `output`, creating parent directories
    pub fn write(&self, output: &Path) -> IoResult<()> {
        let json = self.to_json()?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, json)?;
        debug!(path = %output.display(), modes = self.modes.len(), "Wrote position artifact");
        Ok(())
    }
}

/// Positions of one mode, indexed by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionLookup {
    records: Vec<PositionRecord>,
    by_id: HashMap<u64, usize>,
}

impl PositionLookup {
    /// Index `records`, keeping the first record of every id
    pub fn new(records: impl IntoIterator<Item = PositionRecord>) -> Self {
        let mut lookup = Self::default();
        for record in records {
            if lookup.by_id.contains_key(&record.id) {
                warn!(id = record.id, "Duplicate position id, keeping the first");
                continue;
            }
            lookup.by_id.insert(record.id, lookup.records.len());
            lookup.records.push(record);
        }
        lookup
    }

    pub fn get(&self, id: u64) -> Option<&PositionRecord> {
        self.by_id.get(&id).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[PositionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Positions for `ids` in the given order. Missing ids are logged and
    /// left out; they are not drawn.
    pub fn resolve(&self, ids: impl IntoIterator<Item = u64>) -> Vec<PositionRecord> {
        let mut found = Vec::new();
        for id in ids {
            match self.get(id) {
                Some(record) => found.push(*record),
                None => warn!(id, "No precomputed position for event"),
            }
        }
        found
    }
}

/// A parsed artifact: header plus one lookup per mode
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactLookup {
    pub meta: ArtifactMeta,
    modes: BTreeMap<String, PositionLookup>,
}

impl ArtifactLookup {
    /// Parse artifact JSON. Only a missing or broken `meta` block is fatal;
    /// damaged records and non-array modes are skipped with a warning.
    pub fn from_json(text: &str) -> IoResult<Self> {
        let root: Value = serde_json::from_str(text).map_err(|e| IoError::Parse(e.to_string()))?;
        let Value::Object(mut object) = root else {
            return Err(IoError::Parse("artifact must be a JSON object".to_string()));
        };
        let meta = object
            .remove("meta")
            .ok_or_else(|| IoError::Parse("artifact has no meta block".to_string()))?;
        let meta: ArtifactMeta =
            serde_json::from_value(meta).map_err(|e| IoError::Parse(format!("meta: {e}")))?;

        let mut modes = BTreeMap::new();
        for (key, value) in object {
            let Value::Array(entries) = value else {
                warn!(mode = %key, "Skipping non-array entry in position artifact");
                continue;
            };
            let records = entries.into_iter().enumerate().filter_map(|(index, entry)| {
                match serde_json::from_value::<PositionRecord>(entry) {
                    Ok(record) if record.is_usable() => Some(record.rounded()),
                    Ok(record) => {
                        warn!(mode = %key, id = record.id, "Skipping position with unusable values");
                        None
                    }
                    Err(err) => {
                        warn!(mode = %key, index, error = %err, "Skipping malformed position");
                        None
                    }
                }
            });
            let lookup = PositionLookup::new(records.collect::<Vec<_>>());
            modes.insert(key, lookup);
        }
        Ok(Self { meta, modes })
    }

    /// Read and parse the artifact at `path`
    pub fn read(path: &Path) -> IoResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn mode(&self, key: &str) -> Option<&PositionLookup> {
        self.modes.get(key)
    }

    pub fn mode_keys(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }
}
