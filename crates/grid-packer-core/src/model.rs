use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
}

/// Identity of a sprite inside its category: `{subdir}/{file}`.
///
/// `subdir` is the slash-separated directory path below the category root and may be
/// empty for sprites placed directly in the category directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteKey {
    pub subdir: String,
    pub file: String,
}

impl SpriteKey {
    pub fn new(subdir: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            subdir: subdir.into(),
            file: file.into(),
        }
    }

    /// Parses a category-relative path such as `boy/m_clot001.png`.
    pub fn from_rel_path(rel: &str) -> Self {
        let rel = rel.trim_start_matches('/');
        match rel.rsplit_once('/') {
            Some((dir, file)) => Self::new(dir, file),
            None => Self::new("", rel),
        }
    }

    /// Category-relative path, `/`-separated.
    pub fn rel_path(&self) -> String {
        if self.subdir.is_empty() {
            self.file.clone()
        } else {
            format!("{}/{}", self.subdir, self.file)
        }
    }

    /// Key used by downstream consumers: `{category}/{subdir}/{file}`.
    pub fn lookup_key(&self, category: &str) -> String {
        format!("{}/{}", category, self.rel_path())
    }

    /// File name without extension; used as the default display name.
    pub fn stem(&self) -> &str {
        self.file
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.file)
    }
}

// Ordered by the full relative path so enumeration matches a lexicographic path sort.
impl Ord for SpriteKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.subdir == other.subdir {
            return self.file.cmp(&other.file);
        }
        self.rel_path().cmp(&other.rel_path())
    }
}

impl PartialOrd for SpriteKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SpriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rel_path())
    }
}

/// Where a packed sprite lives: atlas file name plus the sprite's own bounds inside it.
///
/// Serialized shape matches the sidecar `bundle` value:
/// `{ "atlas": "clot_1.png", "position": { "x": 64, "y": 0, "w": 30, "h": 28 } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleRecord {
    pub atlas: String,
    pub position: Rect,
}

/// A sprite placed on a grid page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement<K = SpriteKey> {
    pub key: K,
    /// Grid slot (row-major).
    pub slot: usize,
    /// Sprite bounds within the page; `w,h` are the sprite's decoded size, not the cell size.
    pub rect: Rect,
}

/// Logical record of a rendered grid page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPage<K = SpriteKey> {
    pub index: usize,
    pub atlas: String,
    pub cell_w: u32,
    pub cell_h: u32,
    pub width: u32,
    pub height: u32,
    pub placements: Vec<Placement<K>>,
}

/// Fill statistics for a set of rendered pages.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PackStats {
    pub num_pages: usize,
    pub num_sprites: usize,
    /// Sum of page areas (width * height).
    pub total_page_area: u64,
    /// Sum of sprite areas.
    pub used_area: u64,
    /// used_area / total_page_area (0.0 to 1.0).
    pub occupancy: f64,
}

impl PackStats {
    pub fn from_pages<'a, K: 'a>(pages: impl IntoIterator<Item = &'a GridPage<K>>) -> Self {
        let mut stats = PackStats::default();
        for page in pages {
            stats.num_pages += 1;
            stats.total_page_area += (page.width as u64) * (page.height as u64);
            for p in &page.placements {
                stats.num_sprites += 1;
                stats.used_area += (p.rect.w as u64) * (p.rect.h as u64);
            }
        }
        stats.occupancy = if stats.total_page_area > 0 {
            stats.used_area as f64 / stats.total_page_area as f64
        } else {
            0.0
        };
        stats
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Pages: {}, Sprites: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px²",
            self.num_pages,
            self.num_sprites,
            self.occupancy * 100.0,
            self.total_page_area,
            self.used_area,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_key_paths() {
        let k = SpriteKey::from_rel_path("boy/m_clot001.png");
        assert_eq!(k.subdir, "boy");
        assert_eq!(k.file, "m_clot001.png");
        assert_eq!(k.stem(), "m_clot001");
        assert_eq!(k.lookup_key("clot"), "clot/boy/m_clot001.png");

        let nested = SpriteKey::from_rel_path("a/b/c.png");
        assert_eq!(nested.subdir, "a/b");
        assert_eq!(nested.rel_path(), "a/b/c.png");

        let flat = SpriteKey::from_rel_path("x.png");
        assert_eq!(flat.subdir, "");
        assert_eq!(flat.rel_path(), "x.png");
    }

    #[test]
    fn keys_order_by_relative_path() {
        let mut keys = vec![
            SpriteKey::new("girl", "a.png"),
            SpriteKey::new("boy", "b.png"),
            SpriteKey::new("boy-x", "a.png"),
            SpriteKey::new("boy", "a.png"),
        ];
        keys.sort();
        let paths: Vec<String> = keys.iter().map(|k| k.rel_path()).collect();
        assert_eq!(paths, ["boy-x/a.png", "boy/a.png", "boy/b.png", "girl/a.png"]);
    }
}
