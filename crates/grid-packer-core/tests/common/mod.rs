#![allow(dead_code)]

use grid_packer_core::prelude::*;
use grid_packer_core::raster::encode_png;
use image::{Rgba, RgbaImage};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Throwaway `img/`, `names/` and `dist/` roots for one test.
pub struct Fixture {
    pub dir: TempDir,
    pub cfg: BundleConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = BundleConfig::builder()
            .image_root(dir.path().join("img"))
            .metadata_root(dir.path().join("names"))
            .bundle_root(dir.path().join("dist"))
            .build();
        Self { dir, cfg }
    }

    pub fn sprite_path(&self, category: &str, rel: &str) -> PathBuf {
        self.cfg.image_root.join(category).join(rel)
    }

    /// Writes a solid `w` x `h` sprite.
    pub fn add_sprite(&self, category: &str, rel: &str, w: u32, h: u32, color: [u8; 4]) {
        self.add_sprite_bytes(category, rel, &solid_png(w, h, color));
    }

    pub fn add_sprite_bytes(&self, category: &str, rel: &str, bytes: &[u8]) {
        let path = self.sprite_path(category, rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, bytes).expect("write sprite");
    }

    pub fn sidecar_path(&self, category: &str, subdir: &str) -> PathBuf {
        self.cfg
            .metadata_root
            .join(category)
            .join(subdir)
            .join(&self.cfg.sidecar_name)
    }

    pub fn write_sidecar(&self, category: &str, subdir: &str, value: &Value) {
        let path = self.sidecar_path(category, subdir);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let mut text = serde_json::to_string_pretty(value).expect("json");
        text.push('\n');
        fs::write(path, text).expect("write sidecar");
    }

    pub fn read_sidecar(&self, category: &str, subdir: &str) -> Value {
        let text = fs::read_to_string(self.sidecar_path(category, subdir)).expect("read sidecar");
        serde_json::from_str(&text).expect("parse sidecar")
    }

    pub fn sidecar_text(&self, category: &str, subdir: &str) -> String {
        fs::read_to_string(self.sidecar_path(category, subdir)).expect("read sidecar")
    }

    /// Adds `files` (all `w` x `h`) under `category/subdir` with plain `{name}` entries.
    pub fn add_listed_sprites(&self, category: &str, subdir: &str, files: &[String], w: u32, h: u32) {
        let mut entries = match fs::read_to_string(self.sidecar_path(category, subdir)) {
            Ok(text) => serde_json::from_str(&text).expect("parse sidecar"),
            Err(_) => Value::Object(Default::default()),
        };
        for (i, file) in files.iter().enumerate() {
            self.add_sprite(category, &format!("{subdir}/{file}"), w, h, color_for(i));
            let stem = file.trim_end_matches(".png");
            entries[file.as_str()] = serde_json::json!({ "name": stem, "hideBaseLayer": false });
        }
        self.write_sidecar(category, subdir, &entries);
    }

    pub fn atlas_path(&self, atlas: &str) -> PathBuf {
        self.cfg.bundle_root.join(atlas)
    }

    pub fn atlas(&self, atlas: &str) -> RgbaImage {
        image::open(self.atlas_path(atlas))
            .expect("open atlas")
            .to_rgba8()
    }

    pub fn bundle(&self, category: &str) -> CategoryReport {
        bundle_category(&self.cfg, category).expect("bundle")
    }

    pub fn record(&self, category: &str, subdir: &str, file: &str) -> Option<BundleRecord> {
        let sidecar = self.read_sidecar(category, subdir);
        let raw = sidecar.get(file)?.get("bundle")?.clone();
        Some(serde_json::from_value(raw).expect("bundle record"))
    }
}

pub fn names(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("{prefix}{i:02}.png")).collect()
}

pub fn color_for(i: usize) -> [u8; 4] {
    [(i * 37 % 256) as u8, (i * 91 % 256) as u8, 200, 255]
}

pub fn solid_png(w: u32, h: u32, color: [u8; 4]) -> Vec<u8> {
    encode_png(&RgbaImage::from_pixel(w, h, Rgba(color))).expect("encode")
}

pub fn file_bytes(path: &Path) -> Vec<u8> {
    fs::read(path).expect("read")
}
