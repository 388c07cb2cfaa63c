use crate::error::{GridPackerError, Result};
use crate::model::SpriteKey;
use crate::sidecar::slash_path;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Snapshot of the sprites on disk for one category, sorted by relative path.
#[derive(Debug, Clone, Default)]
pub struct SpriteTree {
    root: PathBuf,
    sprites: BTreeSet<SpriteKey>,
}

impl SpriteTree {
    /// Walks `root` (`{image_root}/{category}`) for `*.png` files.
    ///
    /// A missing or unreadable root is an error; the caller treats it as fatal for the
    /// category.
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let meta = fs::metadata(&root).map_err(|e| GridPackerError::io(&root, e))?;
        if !meta.is_dir() {
            return Err(GridPackerError::InvalidInput(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let mut sprites = BTreeSet::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&root).to_path_buf();
                GridPackerError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() || !is_png(entry.path()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&root) {
                sprites.insert(SpriteKey::from_rel_path(&slash_path(rel)));
            }
        }
        Ok(Self { root, sprites })
    }

    /// Tree built from known keys, without touching the file system.
    pub fn from_keys(root: impl Into<PathBuf>, keys: impl IntoIterator<Item = SpriteKey>) -> Self {
        Self {
            root: root.into(),
            sprites: keys.into_iter().collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn contains(&self, key: &SpriteKey) -> bool {
        self.sprites.contains(key)
    }

    /// Sprites in lexicographic relative-path order.
    pub fn iter(&self) -> impl Iterator<Item = &SpriteKey> {
        self.sprites.iter()
    }

    pub fn path_of(&self, key: &SpriteKey) -> PathBuf {
        let mut p = self.root.clone();
        for part in key.subdir.split('/').filter(|s| !s.is_empty()) {
            p.push(part);
        }
        p.push(&key.file);
        p
    }

    /// Raw bytes of a sprite.
    pub fn read(&self, key: &SpriteKey) -> Result<Vec<u8>> {
        let path = self.path_of(key);
        fs::read(&path).map_err(|e| GridPackerError::io(&path, e))
    }
}

fn is_png(p: &Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

/// Category names: the immediate subdirectories of `root`, sorted. Hidden directories
/// are ignored.
pub fn list_categories(root: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let rd = fs::read_dir(root).map_err(|e| GridPackerError::io(root, e))?;
    for entry in rd {
        let entry = entry.map_err(|e| GridPackerError::io(root, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| GridPackerError::io(entry.path(), e))?
            .is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dir && !name.starts_with('.') {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}
