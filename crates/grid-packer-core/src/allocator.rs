//! Page allocation: which sprites go on which page, and what each atlas is called.

use crate::config::PageNaming;
use crate::error::{GridPackerError, Result};
use crate::model::SpriteKey;
use serde::Serialize;
use tracing::warn;

/// Atlas file name for page `index` of `category`.
///
/// Only page 0 honours `naming`; every other index is `{category}_{index}.png`.
pub fn atlas_name(category: &str, index: usize, naming: PageNaming) -> String {
    match (index, naming) {
        (0, PageNaming::Legacy) => format!("{category}.png"),
        _ => format!("{category}_{index}.png"),
    }
}

/// Inverse of [`atlas_name`]: page index and naming of an atlas belonging to `category`.
pub fn parse_atlas_name(category: &str, atlas: &str) -> Option<(usize, PageNaming)> {
    let stem = atlas.strip_suffix(".png")?.strip_prefix(category)?;
    if stem.is_empty() {
        return Some((0, PageNaming::Legacy));
    }
    let digits = stem.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse().ok()?;
    Some((index, PageNaming::Explicit))
}

/// The category's current last page, as seen by the reconciler.
#[derive(Debug, Clone, Copy)]
pub struct LastPage<'a> {
    pub index: usize,
    pub atlas: &'a str,
    pub members: &'a [SpriteKey],
}

/// What is known about page 0's name before allocating.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page0Hint {
    /// Convention already decided for this category (persisted or observed).
    pub decided: Option<PageNaming>,
    /// Atlases of this category exist at indices other than 0.
    pub other_pages_exist: bool,
}

/// One page to (re)render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagePlan {
    pub index: usize,
    pub atlas: String,
    /// Members in slot order: carried-over members first, then new sprites.
    pub members: Vec<SpriteKey>,
    /// How many leading members were already on this page.
    pub carried: usize,
    /// This page existed before and is being redrawn with extra members.
    pub reopened: bool,
}

/// Output of [`allocate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    pub pages: Vec<PagePlan>,
    /// Members of the reopened page that were dropped because they are gone.
    pub dropped: Vec<SpriteKey>,
    /// Page 0 convention after this plan (None if page 0 is neither known nor planned).
    pub page0_naming: Option<PageNaming>,
}

impl AllocationPlan {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// All sprites placed by this plan, in page then slot order.
    pub fn members(&self) -> impl Iterator<Item = &SpriteKey> {
        self.pages.iter().flat_map(|p| p.members.iter())
    }
}

/// Splits `new_sprites` (plus the members of an open last page) into page batches.
///
/// - No last page: pages start at 0.
/// - Last page full (`members.len() >= cells_per_page`): it is left alone and new pages
///   start at `index + 1`.
/// - Otherwise the last page is reopened: its members still `present` keep their order
///   and new sprites follow. The reopened page keeps its atlas name.
///
/// New page 0 uses `hint.decided`, else the explicit name when other pages already
/// exist, else the legacy bare name. With no new sprites the plan is empty.
pub fn allocate(
    category: &str,
    new_sprites: &[SpriteKey],
    last: Option<LastPage<'_>>,
    cells_per_page: usize,
    hint: Page0Hint,
    present: impl Fn(&SpriteKey) -> bool,
) -> Result<AllocationPlan> {
    if cells_per_page == 0 {
        return Err(GridPackerError::InvalidConfig(
            "cells_per_page must be > 0".into(),
        ));
    }
    let mut plan = AllocationPlan {
        page0_naming: hint.decided,
        ..Default::default()
    };
    if new_sprites.is_empty() {
        return Ok(plan);
    }

    let mut queue: Vec<SpriteKey> = Vec::with_capacity(new_sprites.len() + cells_per_page);
    let (start, reopened) = match last {
        None => (0, None),
        Some(page) if page.members.len() >= cells_per_page => (page.index + 1, None),
        Some(page) => {
            for key in page.members {
                if present(key) {
                    queue.push(key.clone());
                } else {
                    warn!(category, sprite = %key, atlas = page.atlas, "skip page member: sprite unavailable");
                    plan.dropped.push(key.clone());
                }
            }
            (page.index, Some(page.atlas))
        }
    };
    let carried = queue.len();
    queue.extend(new_sprites.iter().cloned());

    let page0_naming = plan.page0_naming.unwrap_or(if hint.other_pages_exist {
        PageNaming::Explicit
    } else {
        PageNaming::Legacy
    });

    for (i, chunk) in queue.chunks(cells_per_page).enumerate() {
        let index = start + i;
        let atlas = match reopened {
            Some(name) if i == 0 => name.to_string(),
            _ => atlas_name(category, index, page0_naming),
        };
        if index == 0 && plan.page0_naming.is_none() {
            plan.page0_naming =
                parse_atlas_name(category, &atlas).map(|(_, naming)| naming);
        }
        plan.pages.push(PagePlan {
            index,
            atlas,
            members: chunk.to_vec(),
            carried: if i == 0 { carried.min(chunk.len()) } else { 0 },
            reopened: i == 0 && reopened.is_some(),
        });
    }
    Ok(plan)
}
