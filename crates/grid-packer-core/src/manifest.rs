use crate::config::PageNaming;
use crate::error::{GridPackerError, Result};
use crate::model::GridPage;
use crate::raster::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Per-category record kept next to the sidecars (`{metadata_root}/{category}/bundle.json`).
///
/// It pins the page 0 naming convention once it has been decided so later runs never
/// have to guess it from file names, and keeps the geometry of the last render of each
/// page for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page0_naming: Option<PageNaming>,
    #[serde(default)]
    pub pages: Vec<ManifestPage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPage {
    pub index: usize,
    pub atlas: String,
    pub cell: CellSize,
    pub members: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSize {
    pub w: u32,
    pub h: u32,
}

impl CategoryManifest {
    /// Loads the manifest; a missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| GridPackerError::json(path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(GridPackerError::io(path, e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text =
            serde_json::to_string_pretty(self).map_err(|e| GridPackerError::json(path, e))?;
        text.push('\n');
        write_atomic(path, text.as_bytes())
    }

    /// Records a freshly written page, replacing any previous entry at its index.
    pub fn record_page<K>(&mut self, page: &GridPage<K>) {
        let entry = ManifestPage {
            index: page.index,
            atlas: page.atlas.clone(),
            cell: CellSize {
                w: page.cell_w,
                h: page.cell_h,
            },
            members: page.placements.len(),
        };
        match self.pages.binary_search_by_key(&page.index, |p| p.index) {
            Ok(pos) => self.pages[pos] = entry,
            Err(pos) => self.pages.insert(pos, entry),
        }
    }

    pub fn page(&self, index: usize) -> Option<&ManifestPage> {
        self.pages
            .binary_search_by_key(&index, |p| p.index)
            .ok()
            .map(|pos| &self.pages[pos])
    }
}
