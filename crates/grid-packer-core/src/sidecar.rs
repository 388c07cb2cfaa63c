//! Per-subdirectory JSON metadata ("sidecars").
//!
//! A sidecar is a JSON object keyed by sprite file name:
//!
//! ```json
//! {
//!   "m_glas102.png": {
//!     "name": "Round Glasses",
//!     "hideBaseLayer": false,
//!     "animate": { "isAnimated": false, "animateFrame": 0 },
//!     "bundle": { "atlas": "glas_6.png", "position": { "x": 32, "y": 0, "w": 30, "h": 12 } }
//!   }
//! }
//! ```
//!
//! Only the `bundle` key is owned by the packer. Every other key, and the key order of
//! the file, is preserved on write. Older files may map a file name straight to its
//! display name string; such entries are upgraded to `{ "name": ... }` when touched.

use crate::error::{GridPackerError, Result};
use crate::model::{BundleRecord, SpriteKey};
use crate::raster::write_atomic;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const BUNDLE_KEY: &str = "bundle";
const NAME_KEY: &str = "name";

/// One loaded sidecar file.
#[derive(Debug, Clone)]
pub struct Sidecar {
    path: PathBuf,
    entries: Map<String, Value>,
    dirty: bool,
}

impl Sidecar {
    /// Empty in-memory sidecar bound to `path` (nothing is written until `save`).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Map::new(),
            dirty: false,
        }
    }

    /// Loads `path`; a missing file yields an empty sidecar.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(e) => return Err(GridPackerError::io(&path, e)),
        };
        let value: Value =
            serde_json::from_str(&text).map_err(|e| GridPackerError::json(&path, e))?;
        match value {
            Value::Object(entries) => Ok(Self {
                path,
                entries,
                dirty: false,
            }),
            other => Err(GridPackerError::InvalidInput(format!(
                "{}: expected a JSON object, found {}",
                path.display(),
                json_kind(&other)
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn contains(&self, file: &str) -> bool {
        self.entries.contains_key(file)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The bundle record of `file`, if present and well-formed.
    pub fn bundle(&self, file: &str) -> Option<BundleRecord> {
        let raw = self.entries.get(file)?.as_object()?.get(BUNDLE_KEY)?;
        match serde_json::from_value(raw.clone()) {
            Ok(rec) => Some(rec),
            Err(e) => {
                warn!(sidecar = %self.path.display(), file, error = %e, "ignore malformed bundle record");
                None
            }
        }
    }

    /// All well-formed bundle records, in file order.
    pub fn records(&self) -> Vec<(String, BundleRecord)> {
        self.entries
            .keys()
            .filter_map(|file| self.bundle(file).map(|rec| (file.clone(), rec)))
            .collect()
    }

    /// Sets `file`'s bundle record. Returns false (and changes nothing) when the sidecar
    /// has no entry for `file`.
    pub fn upsert_bundle(&mut self, file: &str, record: &BundleRecord) -> bool {
        let Some(entry) = self.entries.get_mut(file) else {
            return false;
        };
        let Ok(value) = serde_json::to_value(record) else {
            return false;
        };
        let Some(obj) = upgrade_entry(entry) else {
            return false;
        };
        if obj.get(BUNDLE_KEY) != Some(&value) {
            obj.insert(BUNDLE_KEY.to_string(), value);
            self.dirty = true;
        }
        true
    }

    /// Drops `file`'s bundle record so the sprite counts as unpacked again.
    pub fn clear_bundle(&mut self, file: &str) -> bool {
        let removed = self
            .entries
            .get_mut(file)
            .and_then(Value::as_object_mut)
            .and_then(|obj| obj.shift_remove(BUNDLE_KEY))
            .is_some();
        self.dirty |= removed;
        removed
    }

    /// Adds a minimal `{ "name": name }` entry for `file` if it has none.
    pub fn ensure_entry(&mut self, file: &str, name: &str) -> bool {
        if self.entries.contains_key(file) {
            return false;
        }
        let mut obj = Map::new();
        obj.insert(NAME_KEY.to_string(), Value::String(name.to_string()));
        self.entries.insert(file.to_string(), Value::Object(obj));
        self.dirty = true;
        true
    }

    /// Writes the sidecar back (pretty JSON, trailing newline) if it changed.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut text = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| GridPackerError::json(&self.path, e))?;
        text.push('\n');
        write_atomic(&self.path, text.as_bytes())?;
        self.dirty = false;
        debug!(sidecar = %self.path.display(), "sidecar written");
        Ok(())
    }
}

fn upgrade_entry(entry: &mut Value) -> Option<&mut Map<String, Value>> {
    if !entry.is_object() {
        let mut obj = Map::new();
        match entry.take() {
            Value::Null => {}
            name => {
                obj.insert(NAME_KEY.to_string(), name);
            }
        }
        *entry = Value::Object(obj);
    }
    entry.as_object_mut()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// All sidecars of one category, keyed by subdirectory (`""` for the category root).
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    root: PathBuf,
    sidecar_name: String,
    sidecars: BTreeMap<String, Sidecar>,
}

impl MetadataSnapshot {
    /// Snapshot with no sidecars, rooted at `{metadata_root}/{category}`.
    pub fn empty(root: impl Into<PathBuf>, sidecar_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            sidecar_name: sidecar_name.into(),
            sidecars: BTreeMap::new(),
        }
    }

    /// Loads every `sidecar_name` file below `root`. A missing root is an empty snapshot;
    /// an unreadable or malformed sidecar fails the whole load.
    pub fn load(root: impl Into<PathBuf>, sidecar_name: &str) -> Result<Self> {
        let mut snap = Self::empty(root, sidecar_name);
        if !snap.root.exists() {
            return Ok(snap);
        }
        for entry in WalkDir::new(&snap.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&snap.root).to_path_buf();
                GridPackerError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() || entry.file_name() != sidecar_name {
                continue;
            }
            let subdir = entry
                .path()
                .parent()
                .and_then(|dir| dir.strip_prefix(&snap.root).ok())
                .map(slash_path)
                .unwrap_or_default();
            let sidecar = Sidecar::load(entry.path())?;
            snap.sidecars.insert(subdir, sidecar);
        }
        Ok(snap)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sidecar(&self, subdir: &str) -> Option<&Sidecar> {
        self.sidecars.get(subdir)
    }

    pub fn sidecars(&self) -> impl Iterator<Item = (&str, &Sidecar)> {
        self.sidecars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn sidecars_mut(&mut self) -> impl Iterator<Item = (&str, &mut Sidecar)> {
        self.sidecars.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Sidecar for `subdir`, created in memory when absent.
    pub fn sidecar_mut(&mut self, subdir: &str) -> &mut Sidecar {
        let root = &self.root;
        let name = &self.sidecar_name;
        self.sidecars.entry(subdir.to_string()).or_insert_with(|| {
            let dir = if subdir.is_empty() {
                root.clone()
            } else {
                root.join(subdir)
            };
            Sidecar::new(dir.join(name))
        })
    }

    pub fn has_entry(&self, key: &SpriteKey) -> bool {
        self.sidecars
            .get(&key.subdir)
            .is_some_and(|s| s.contains(&key.file))
    }

    pub fn bundle(&self, key: &SpriteKey) -> Option<BundleRecord> {
        self.sidecars.get(&key.subdir)?.bundle(&key.file)
    }

    /// Every recorded bundle position in this category.
    pub fn records(&self) -> Vec<(SpriteKey, BundleRecord)> {
        self.sidecars
            .iter()
            .flat_map(|(subdir, sc)| {
                sc.records()
                    .into_iter()
                    .map(move |(file, rec)| (SpriteKey::new(subdir.clone(), file), rec))
            })
            .collect()
    }
}

/// Relative path rendered with `/` separators.
pub(crate) fn slash_path(p: &Path) -> String {
    p.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
