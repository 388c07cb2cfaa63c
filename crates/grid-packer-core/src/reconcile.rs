//! Delta between the sprites on disk and the sprites already recorded as packed.

use crate::allocator::parse_atlas_name;
use crate::config::PageNaming;
use crate::model::{BundleRecord, SpriteKey};
use crate::scan::SpriteTree;
use crate::sidecar::MetadataSnapshot;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// A page known from existing bundle records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub index: usize,
    pub atlas: String,
    pub naming: PageNaming,
}

/// Result of reconciling one category. Pure data; nothing here touches the disk.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Sprites on disk that carry a bundle record.
    pub packed: BTreeSet<SpriteKey>,
    /// Atlas file name -> members, in grid order (row, then column).
    pub atlas_members: BTreeMap<String, Vec<SpriteKey>>,
    /// Sprites on disk without a bundle record, sorted.
    pub new_sprites: Vec<SpriteKey>,
    /// Records whose sprite is gone from disk; dropped from membership.
    pub stale: Vec<SpriteKey>,
    /// Stale records by the atlas they point at. Once that atlas is redrawn their
    /// rectangles belong to other sprites.
    pub stale_by_atlas: BTreeMap<String, Vec<SpriteKey>>,
    /// Sprites on disk with no sidecar entry at all.
    pub unlisted: Vec<SpriteKey>,
    /// Pages of this category by index, parsed from the recorded atlas names.
    pub pages: BTreeMap<usize, PageRef>,
}

impl Reconciliation {
    /// The page with the highest index, if any atlas exists.
    pub fn highest_page(&self) -> Option<&PageRef> {
        self.pages.values().next_back()
    }

    /// Members recorded on `atlas`.
    pub fn members(&self, atlas: &str) -> &[SpriteKey] {
        self.atlas_members
            .get(atlas)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Stale records pointing at `atlas`.
    pub fn stale_on(&self, atlas: &str) -> &[SpriteKey] {
        self.stale_by_atlas
            .get(atlas)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Naming observed for page 0, if page 0 exists.
    pub fn page0_naming(&self) -> Option<PageNaming> {
        self.pages.get(&0).map(|p| p.naming)
    }

    pub fn is_up_to_date(&self) -> bool {
        self.new_sprites.is_empty()
    }
}

/// Reconciles a category's sprite tree against its sidecars.
///
/// Notes:
/// - Enumeration follows the tree's sorted order, so repeated runs agree.
/// - A record for a sprite missing on disk is warned about and dropped, never fatal. It
///   is kept in `stale_by_atlas` so the caller can clear it once its atlas is redrawn.
/// - Records pointing at an atlas that does not follow the `{category}[_{index}].png`
///   scheme still mark the sprite as packed but are not treated as pages.
pub fn reconcile(category: &str, tree: &SpriteTree, meta: &MetadataSnapshot) -> Reconciliation {
    let mut out = Reconciliation::default();
    let mut placed: BTreeMap<String, Vec<(BundleRecord, SpriteKey)>> = BTreeMap::new();

    for (key, record) in meta.records() {
        if !tree.contains(&key) {
            warn!(category, sprite = %key, atlas = %record.atlas, "drop bundle record: sprite missing on disk");
            out.stale_by_atlas
                .entry(record.atlas)
                .or_default()
                .push(key.clone());
            out.stale.push(key);
            continue;
        }
        out.packed.insert(key.clone());
        placed
            .entry(record.atlas.clone())
            .or_default()
            .push((record, key));
    }

    for (atlas, mut members) in placed {
        members.sort_by(|(ra, ka), (rb, kb)| {
            (ra.position.y, ra.position.x)
                .cmp(&(rb.position.y, rb.position.x))
                .then_with(|| ka.cmp(kb))
        });
        match parse_atlas_name(category, &atlas) {
            Some((index, naming)) => {
                if let Some(prev) = out.pages.get(&index) {
                    warn!(
                        category,
                        index,
                        kept = %prev.atlas,
                        ignored = %atlas,
                        "two atlases claim the same page index"
                    );
                } else {
                    out.pages.insert(
                        index,
                        PageRef {
                            index,
                            atlas: atlas.clone(),
                            naming,
                        },
                    );
                }
            }
            None => warn!(category, atlas = %atlas, "bundle record names a foreign atlas"),
        }
        out.atlas_members
            .insert(atlas, members.into_iter().map(|(_, k)| k).collect());
    }

    for key in tree.iter() {
        if !meta.has_entry(key) {
            out.unlisted.push(key.clone());
        }
        if !out.packed.contains(key) {
            out.new_sprites.push(key.clone());
        }
    }

    debug!(
        category,
        on_disk = tree.len(),
        packed = out.packed.len(),
        new = out.new_sprites.len(),
        stale = out.stale.len(),
        pages = out.pages.len(),
        "reconciled"
    );
    out
}
