use crate::allocator::{AllocationPlan, LastPage, Page0Hint, allocate};
use crate::config::BundleConfig;
use crate::error::{GridPackerError, Result};
use crate::grid::{DecodedSprite, SpriteSource, decode_sources, render_grid};
use crate::manifest::CategoryManifest;
use crate::model::{BundleRecord, GridPage, PackStats, SpriteKey};
use crate::raster::save_png;
use crate::reconcile::{Reconciliation, reconcile};
use crate::scan::{SpriteTree, list_categories};
use crate::sidecar::MetadataSnapshot;
use image::RgbaImage;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of bundling one category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryReport {
    pub category: String,
    /// Sprites found without a bundle record at the start of the run.
    pub new_sprites: usize,
    /// Pages rendered and written (or, in a dry run, that would have been written).
    pub pages: Vec<GridPage>,
    /// Sprites whose bundle record was written or confirmed.
    pub recorded: usize,
    /// Sprites that failed to decode; they stay unpacked.
    pub decode_failures: Vec<SpriteKey>,
    /// Bundle records dropped because the sprite is gone from disk.
    pub stale: Vec<SpriteKey>,
    /// Placed in an atlas but without a sidecar entry to record the position in.
    pub unrecorded: Vec<SpriteKey>,
    /// Atlases that could not be rendered or written.
    pub failed_pages: Vec<String>,
    /// Pages planned after a failed page; left for the next run.
    pub skipped_pages: Vec<String>,
    /// Bundle records removed because their atlas was redrawn without the sprite.
    pub cleared: Vec<SpriteKey>,
    /// Sidecars that could not be written.
    pub failed_sidecars: Vec<PathBuf>,
}

impl CategoryReport {
    pub fn stats(&self) -> PackStats {
        PackStats::from_pages(&self.pages)
    }

    /// True when nothing went wrong in this category.
    pub fn is_clean(&self) -> bool {
        self.decode_failures.is_empty()
            && self.unrecorded.is_empty()
            && self.failed_pages.is_empty()
            && self.skipped_pages.is_empty()
            && self.failed_sidecars.is_empty()
    }
}

/// A category that could not be processed at all.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryFailure {
    pub category: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub categories: Vec<CategoryReport>,
    pub failed: Vec<CategoryFailure>,
}

impl RunReport {
    pub fn stats(&self) -> PackStats {
        PackStats::from_pages(self.categories.iter().flat_map(|c| c.pages.iter()))
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.categories.iter().all(CategoryReport::is_clean)
    }
}

/// Bundles `categories` (all categories under `image_root` when empty), one at a time.
///
/// A category that fails is logged and reported; the remaining categories still run.
/// Invocations must be serialized per category by the caller: two concurrent runs over
/// the same category race on its atlases and sidecars.
pub fn run(cfg: &BundleConfig, categories: &[String]) -> Result<RunReport> {
    run_with(cfg, categories, |_, _| {})
}

#[instrument(skip_all)]
/// Same as [`run`], calling `on_category` after each category with its outcome.
pub fn run_with(
    cfg: &BundleConfig,
    categories: &[String],
    mut on_category: impl FnMut(&str, std::result::Result<&CategoryReport, &CategoryFailure>),
) -> Result<RunReport> {
    cfg.validate()?;
    let selected = if categories.is_empty() {
        list_categories(&cfg.image_root)?
    } else {
        categories.to_vec()
    };
    info!(count = selected.len(), "bundling categories");

    let mut report = RunReport::default();
    for category in &selected {
        match bundle_category(cfg, category) {
            Ok(r) => {
                on_category(category, Ok(&r));
                report.categories.push(r);
            }
            Err(e) => {
                error!(category = %category, error = %e, "category failed");
                let failure = CategoryFailure {
                    category: category.clone(),
                    error: e.to_string(),
                };
                on_category(category, Err(&failure));
                report.failed.push(failure);
            }
        }
    }
    Ok(report)
}

#[instrument(skip(cfg))]
/// Folds the new sprites of `category` into its atlases and records their positions.
///
/// Steps:
/// 1. snapshot sprites, sidecars and manifest; reconcile
/// 2. allocate pages; decode every sprite the plan touches and re-plan without failures
/// 3. render and write each page; a page's records are staged only once its atlas is on
///    disk, and the first page that fails ends the category's run (later pages were
///    chunked assuming it succeeds)
/// 4. apply staged records, clear records made invalid by redrawn pages, and save each
///    changed sidecar independently
///
/// Errors returned from here (unreadable tree or metadata) are fatal for the category only.
pub fn bundle_category(cfg: &BundleConfig, category: &str) -> Result<CategoryReport> {
    cfg.validate()?;
    check_category_name(category)?;

    let tree = SpriteTree::scan(cfg.image_root.join(category))?;
    let meta_root = cfg.metadata_root.join(category);
    let mut meta = MetadataSnapshot::load(&meta_root, &cfg.sidecar_name)?;
    let manifest_path = meta_root.join(&cfg.manifest_name);
    let mut manifest = CategoryManifest::load(&manifest_path)?;
    let loaded_manifest = manifest.clone();

    let recon = reconcile(category, &tree, &meta);
    let mut report = CategoryReport {
        category: category.to_string(),
        new_sprites: recon.new_sprites.len(),
        stale: recon.stale.clone(),
        ..Default::default()
    };
    if recon.is_up_to_date() {
        info!(sprites = tree.len(), "up to date");
        return Ok(report);
    }

    let (plan, mut decoded) = plan_and_decode(cfg, category, &tree, &recon, &manifest, &mut report)?;
    if plan.is_empty() {
        warn!("nothing placeable this run");
        return Ok(report);
    }

    let mut staged: Vec<(SpriteKey, BundleRecord)> = Vec::new();
    let mut obsolete: Vec<SpriteKey> = Vec::new();
    for (i, page) in plan.pages.iter().enumerate() {
        let sprites: Vec<DecodedSprite<SpriteKey>> = page
            .members
            .iter()
            .filter_map(|k| {
                decoded.remove(k).map(|rgba| DecodedSprite {
                    key: k.clone(),
                    rgba,
                })
            })
            .collect();
        let out = match render_grid(sprites, cfg.rows, cfg.cols) {
            Ok(out) => out,
            Err(e) => {
                error!(atlas = %page.atlas, error = %e, "render failed");
                report.failed_pages.push(page.atlas.clone());
                skip_rest(&plan, i, &mut report);
                break;
            }
        };
        let (width, height) = out.layout.canvas_size();
        let grid_page = GridPage {
            index: page.index,
            atlas: page.atlas.clone(),
            cell_w: out.layout.cell_w,
            cell_h: out.layout.cell_h,
            width,
            height,
            placements: out.placements,
        };

        if !cfg.dry_run {
            let path = cfg.bundle_root.join(&page.atlas);
            if let Err(e) = save_png(&out.rgba, &path) {
                error!(atlas = %page.atlas, error = %e, "atlas write failed; page metadata discarded");
                report.failed_pages.push(page.atlas.clone());
                skip_rest(&plan, i, &mut report);
                break;
            }
        }
        info!(
            atlas = %page.atlas,
            index = page.index,
            sprites = grid_page.placements.len(),
            carried = page.carried,
            cell = %format!("{}x{}", grid_page.cell_w, grid_page.cell_h),
            dry_run = cfg.dry_run,
            "page written"
        );

        // redrawn without these, so their old rectangles now hold other sprites
        obsolete.extend(recon.stale_on(&page.atlas).iter().cloned());
        if page.reopened {
            obsolete.extend(plan.dropped.iter().cloned());
        }
        staged.extend(grid_page.placements.iter().map(|p| {
            (
                p.key.clone(),
                BundleRecord {
                    atlas: page.atlas.clone(),
                    position: p.rect,
                },
            )
        }));
        manifest.record_page(&grid_page);
        report.pages.push(grid_page);
    }

    if cfg.dry_run {
        return Ok(report);
    }

    apply_records(cfg, &mut meta, &staged, &mut report);
    for key in obsolete {
        if meta.bundle(&key).is_some() && meta.sidecar_mut(&key.subdir).clear_bundle(&key.file) {
            warn!(sprite = %key, "cleared bundle record: sprite no longer on its atlas");
            report.cleared.push(key);
        }
    }
    save_sidecars(&mut meta, &mut report);

    // only pin a convention once page 0 actually exists on disk
    let page0_exists = recon.pages.contains_key(&0) || report.pages.iter().any(|p| p.index == 0);
    if let (true, Some(naming)) = (page0_exists, plan.page0_naming) {
        manifest.page0_naming = Some(naming);
    }
    if manifest != loaded_manifest {
        if let Err(e) = manifest.save(&manifest_path) {
            error!(path = %manifest_path.display(), error = %e, "manifest write failed");
        }
    }

    let stats = report.stats();
    info!(
        pages = stats.num_pages,
        recorded = report.recorded,
        failures = report.decode_failures.len(),
        occupancy = %format!("{:.2}%", stats.occupancy * 100.0),
        "category done"
    );
    Ok(report)
}

/// Allocates pages and decodes every sprite they need. Sprites that fail to decode are
/// reported and the allocation is redone without them, so every non-last page stays full.
fn plan_and_decode(
    cfg: &BundleConfig,
    category: &str,
    tree: &SpriteTree,
    recon: &Reconciliation,
    manifest: &CategoryManifest,
    report: &mut CategoryReport,
) -> Result<(AllocationPlan, HashMap<SpriteKey, RgbaImage>)> {
    let cap = cfg.cells_per_page();
    let hint = Page0Hint {
        decided: manifest.page0_naming.or(recon.page0_naming()),
        other_pages_exist: recon.pages.keys().any(|&i| i != 0),
    };
    let last = recon.highest_page().map(|p| LastPage {
        index: p.index,
        atlas: &p.atlas,
        members: recon.members(&p.atlas),
    });

    let plan = allocate(category, &recon.new_sprites, last, cap, hint, |k| {
        tree.contains(k)
    })?;

    // read everything before any write, so an unreadable sprite cannot leave half a category
    let sources = plan
        .members()
        .map(|k| {
            Ok(SpriteSource {
                key: k.clone(),
                bytes: tree.read(k)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let (ok, failures) = decode_sources(sources);
    let decoded: HashMap<SpriteKey, RgbaImage> =
        ok.into_iter().map(|d| (d.key, d.rgba)).collect();
    if failures.is_empty() {
        return Ok((plan, decoded));
    }

    let failed: BTreeSet<SpriteKey> = failures.into_iter().map(|f| f.key).collect();
    report.decode_failures = failed.iter().cloned().collect();
    let new: Vec<SpriteKey> = recon
        .new_sprites
        .iter()
        .filter(|k| !failed.contains(*k))
        .cloned()
        .collect();
    debug!(failed = failed.len(), "re-planning without undecodable sprites");
    let plan = allocate(category, &new, last, cap, hint, |k| {
        tree.contains(k) && !failed.contains(k)
    })?;
    Ok((plan, decoded))
}

fn skip_rest(plan: &AllocationPlan, failed: usize, report: &mut CategoryReport) {
    for page in &plan.pages[failed + 1..] {
        warn!(atlas = %page.atlas, "page skipped after an earlier page failed");
        report.skipped_pages.push(page.atlas.clone());
    }
}

fn apply_records(
    cfg: &BundleConfig,
    meta: &mut MetadataSnapshot,
    staged: &[(SpriteKey, BundleRecord)],
    report: &mut CategoryReport,
) {
    for (key, record) in staged {
        if !meta.has_entry(key) {
            if cfg.create_missing_entries {
                meta.sidecar_mut(&key.subdir)
                    .ensure_entry(&key.file, key.stem());
                warn!(sprite = %key, "created missing sidecar entry");
            } else {
                warn!(sprite = %key, "no sidecar entry; position not recorded");
                report.unrecorded.push(key.clone());
                continue;
            }
        }
        if meta.sidecar_mut(&key.subdir).upsert_bundle(&key.file, record) {
            report.recorded += 1;
        }
    }
}

fn save_sidecars(meta: &mut MetadataSnapshot, report: &mut CategoryReport) {
    for (subdir, sidecar) in meta.sidecars_mut() {
        if !sidecar.is_dirty() {
            continue;
        }
        match sidecar.save() {
            Ok(()) => debug!(subdir, "sidecar saved"),
            Err(e) => {
                error!(path = %sidecar.path().display(), error = %e, "sidecar write failed");
                report.failed_sidecars.push(sidecar.path().to_path_buf());
            }
        }
    }
}

fn check_category_name(category: &str) -> Result<()> {
    if category.is_empty()
        || category == "."
        || category == ".."
        || category.contains(['/', '\\'])
    {
        return Err(GridPackerError::InvalidInput(format!(
            "invalid category name {category:?}"
        )));
    }
    Ok(())
}
