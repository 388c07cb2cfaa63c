//! Incremental grid bundling of sprite libraries.
//!
//! - Reconcile: compare the sprite tree on disk with the JSON sidecars to find unpacked sprites
//! - Allocate: append to the category's open last page or start new pages (fixed R×C grid)
//! - Render: decode (after trimming trailing garbage), composite into uniform cells, write PNG
//! - Record: upsert `{ atlas, position }` into each sprite's sidecar entry
//!
//! Quick example:
//! ```ignore
//! use grid_packer_core::{BundleConfig, run};
//! # fn main() -> anyhow::Result<()> {
//! let cfg = BundleConfig::builder()
//!     .image_root("img")
//!     .metadata_root("names")
//!     .bundle_root("dist")
//!     .build();
//! let report = run(&cfg, &[])?;
//! println!("{}", report.stats().summary());
//! # Ok(()) }
//! ```

pub mod allocator;
pub mod bundle;
pub mod config;
pub mod error;
pub mod grid;
pub mod lookup;
pub mod manifest;
pub mod model;
pub mod raster;
pub mod reconcile;
pub mod sanitize;
pub mod scan;
pub mod sidecar;

pub use allocator::*;
pub use bundle::*;
pub use config::*;
pub use error::*;
pub use grid::*;
pub use lookup::*;
pub use manifest::*;
pub use model::*;
pub use reconcile::*;
pub use sanitize::*;
pub use scan::*;
pub use sidecar::*;

/// Convenience prelude for common types and functions.
/// Importing `grid_packer_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::allocator::{AllocationPlan, LastPage, Page0Hint, PagePlan, allocate};
    pub use crate::bundle::{CategoryReport, RunReport, bundle_category, run, run_with};
    pub use crate::config::{BundleConfig, BundleConfigBuilder, PageNaming};
    pub use crate::grid::{GridLayout, GridOutput, SpriteSource, pack_grid};
    pub use crate::model::{BundleRecord, GridPage, PackStats, Placement, Rect, SpriteKey};
    pub use crate::reconcile::{Reconciliation, reconcile};
    pub use crate::scan::SpriteTree;
    pub use crate::sidecar::{MetadataSnapshot, Sidecar};
}
