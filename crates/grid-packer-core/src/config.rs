use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Naming convention of a category's page 0 atlas.
///
/// Pages with index >= 1 are always `{category}_{index}.png`; only page 0 may use the
/// bare legacy name that predates multi-page categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageNaming {
    /// `{category}.png`
    Legacy,
    /// `{category}_0.png`
    Explicit,
}

impl FromStr for PageNaming {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "bare" => Ok(Self::Legacy),
            "explicit" | "indexed" => Ok(Self::Explicit),
            _ => Err(()),
        }
    }
}

/// Configuration of a bundling run.
///
/// Roots follow the on-disk layout:
///   - sprites:  `{image_root}/{category}/{subdir}/{file}.png`
///   - sidecars: `{metadata_root}/{category}/{subdir}/{sidecar_name}`
///   - atlases:  `{bundle_root}/{category}.png` | `{bundle_root}/{category}_{index}.png`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Root of the per-category sprite tree (read-only input).
    pub image_root: PathBuf,
    /// Root of the per-subdirectory JSON sidecars.
    pub metadata_root: PathBuf,
    /// Output directory for atlas pages.
    pub bundle_root: PathBuf,

    /// Grid rows per page.
    #[serde(default = "default_rows")]
    pub rows: u32,
    /// Grid columns per page.
    #[serde(default = "default_cols")]
    pub cols: u32,

    /// File name of each subdirectory's sidecar.
    #[serde(default = "default_sidecar_name")]
    pub sidecar_name: String,
    /// File name of the per-category manifest (lives next to the sidecars).
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Create a minimal `{name}` sidecar entry for packed sprites that have none.
    /// When false such sprites are packed into the atlas but never recorded.
    #[serde(default = "default_create_missing_entries")]
    pub create_missing_entries: bool,
    /// Plan and render but write nothing.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            image_root: PathBuf::from("img"),
            metadata_root: PathBuf::from("names"),
            bundle_root: PathBuf::from("dist"),
            rows: default_rows(),
            cols: default_cols(),
            sidecar_name: default_sidecar_name(),
            manifest_name: default_manifest_name(),
            create_missing_entries: default_create_missing_entries(),
            dry_run: false,
        }
    }
}

impl BundleConfig {
    /// Number of grid cells on one atlas page (`rows * cols`).
    pub fn cells_per_page(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Validates the configuration parameters.
    ///
    /// Returns an error if the grid is degenerate or a metadata file name is unusable.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::GridPackerError;

        if self.rows == 0 || self.cols == 0 {
            return Err(GridPackerError::InvalidDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }

        for (field, value) in [
            ("sidecar_name", &self.sidecar_name),
            ("manifest_name", &self.manifest_name),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(GridPackerError::InvalidConfig(format!(
                    "{field} must be a plain file name, got {value:?}"
                )));
            }
        }

        // both live in the same directory tree
        if self.sidecar_name == self.manifest_name {
            return Err(GridPackerError::InvalidConfig(format!(
                "sidecar_name and manifest_name must differ (both {:?})",
                self.sidecar_name
            )));
        }

        Ok(())
    }
}

fn default_rows() -> u32 {
    4
}
fn default_cols() -> u32 {
    4
}
fn default_sidecar_name() -> String {
    "name.json".into()
}
fn default_manifest_name() -> String {
    "bundle.json".into()
}
fn default_create_missing_entries() -> bool {
    true
}

/// Builder for `BundleConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct BundleConfigBuilder {
    cfg: BundleConfig,
}

impl BundleConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: BundleConfig::default(),
        }
    }
    pub fn image_root(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.image_root = v.into();
        self
    }
    pub fn metadata_root(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.metadata_root = v.into();
        self
    }
    pub fn bundle_root(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.bundle_root = v.into();
        self
    }
    pub fn with_grid(mut self, rows: u32, cols: u32) -> Self {
        self.cfg.rows = rows;
        self.cfg.cols = cols;
        self
    }
    pub fn sidecar_name(mut self, v: impl Into<String>) -> Self {
        self.cfg.sidecar_name = v.into();
        self
    }
    pub fn manifest_name(mut self, v: impl Into<String>) -> Self {
        self.cfg.manifest_name = v.into();
        self
    }
    pub fn create_missing_entries(mut self, v: bool) -> Self {
        self.cfg.create_missing_entries = v;
        self
    }
    pub fn dry_run(mut self, v: bool) -> Self {
        self.cfg.dry_run = v;
        self
    }
    pub fn build(self) -> BundleConfig {
        self.cfg
    }
}

impl BundleConfig {
    /// Create a fluent builder for `BundleConfig`.
    pub fn builder() -> BundleConfigBuilder {
        BundleConfigBuilder::new()
    }
}
