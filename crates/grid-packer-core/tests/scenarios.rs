mod common;

use common::*;
use grid_packer_core::prelude::*;
use grid_packer_core::raster::{decode_sprite, decode_strict};
use grid_packer_core::{CategoryManifest, sanitize_png};
use serde_json::{Map, Value, json};

#[test]
fn fresh_category_packs_into_legacy_page0() {
    let fx = Fixture::new();
    fx.add_listed_sprites("clot", "boy", &names("s", 0..5), 32, 32);

    let report = fx.bundle("clot");
    assert_eq!(report.new_sprites, 5);
    assert_eq!(report.pages.len(), 1);
    let page = &report.pages[0];
    assert_eq!(page.atlas, "clot.png");
    assert_eq!((page.cell_w, page.cell_h), (32, 32));
    assert_eq!((page.width, page.height), (128, 128));

    let atlas = fx.atlas("clot.png");
    assert_eq!(atlas.dimensions(), (128, 128));
    for (i, file) in names("s", 0..5).iter().enumerate() {
        let rec = fx.record("clot", "boy", file).expect("record");
        assert_eq!(rec.atlas, "clot.png");
        let expected = Rect::new((i as u32 % 4) * 32, (i as u32 / 4) * 32, 32, 32);
        assert_eq!(rec.position, expected, "{file}");
        assert_eq!(atlas.get_pixel(expected.x, expected.y).0, color_for(i));
    }
    // cells 5..16 stay transparent
    assert_eq!(atlas.get_pixel(32 + 1, 32 + 1)[3], 0);
    assert_eq!(atlas.get_pixel(127, 127)[3], 0);

    let manifest = CategoryManifest::load(
        &fx.cfg.metadata_root.join("clot").join(&fx.cfg.manifest_name),
    )
    .expect("manifest");
    assert_eq!(manifest.page0_naming, Some(PageNaming::Legacy));
}

/// Sixteen `a*` sprites already recorded on a full `clot_0.png`.
fn full_explicit_page(fx: &Fixture) -> Vec<u8> {
    let files = names("a", 0..16);
    fx.add_listed_sprites("clot", "boy", &files, 32, 32);
    let mut sidecar = fx.read_sidecar("clot", "boy");
    for (i, file) in files.iter().enumerate() {
        sidecar[file.as_str()]["bundle"] = json!({
            "atlas": "clot_0.png",
            "position": { "x": (i % 4) * 32, "y": (i / 4) * 32, "w": 32, "h": 32 }
        });
    }
    fx.write_sidecar("clot", "boy", &sidecar);
    let atlas_bytes = solid_png(128, 128, [9, 9, 9, 255]);
    std::fs::create_dir_all(&fx.cfg.bundle_root).expect("mkdir");
    std::fs::write(fx.atlas_path("clot_0.png"), &atlas_bytes).expect("write atlas");
    atlas_bytes
}

#[test]
fn full_page_is_left_alone_and_new_page_follows() {
    let fx = Fixture::new();
    let atlas_before = full_explicit_page(&fx);
    let records_before: Vec<BundleRecord> = names("a", 0..16)
        .iter()
        .map(|f| fx.record("clot", "boy", f).expect("record"))
        .collect();

    fx.add_listed_sprites("clot", "boy", &names("b", 0..3), 32, 32);
    let report = fx.bundle("clot");

    assert_eq!(report.new_sprites, 3);
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].index, 1);
    assert_eq!(report.pages[0].atlas, "clot_1.png");
    assert_eq!(report.pages[0].placements.len(), 3);

    assert_eq!(file_bytes(&fx.atlas_path("clot_0.png")), atlas_before);
    assert!(!fx.atlas_path("clot.png").exists());
    for (file, before) in names("a", 0..16).iter().zip(&records_before) {
        assert_eq!(fx.record("clot", "boy", file).as_ref(), Some(before));
    }
    for (i, file) in names("b", 0..3).iter().enumerate() {
        let rec = fx.record("clot", "boy", file).expect("record");
        assert_eq!(rec.atlas, "clot_1.png");
        assert_eq!(rec.position, Rect::new(i as u32 * 32, 0, 32, 32));
    }
}

#[test]
fn open_page_is_refilled_then_overflows() {
    let fx = Fixture::new();
    let existing = names("a", 0..10);
    fx.add_listed_sprites("clot", "boy", &existing, 32, 32);
    let mut sidecar = fx.read_sidecar("clot", "boy");
    for (i, file) in existing.iter().enumerate() {
        sidecar[file.as_str()]["bundle"] = json!({
            "atlas": "clot.png",
            "position": { "x": (i % 4) * 32, "y": (i / 4) * 32, "w": 32, "h": 32 }
        });
    }
    fx.write_sidecar("clot", "boy", &sidecar);

    let added = names("b", 0..10);
    fx.add_listed_sprites("clot", "boy", &added, 32, 32);
    let report = fx.bundle("clot");

    assert_eq!(report.new_sprites, 10);
    assert_eq!(report.pages.len(), 2);
    let (p0, p1) = (&report.pages[0], &report.pages[1]);
    assert_eq!(p0.atlas, "clot.png");
    assert_eq!(p1.atlas, "clot_1.png");

    let p0_members: Vec<String> = p0.placements.iter().map(|p| p.key.file.clone()).collect();
    let mut expected: Vec<String> = existing.clone();
    expected.extend(added[..6].iter().cloned());
    assert_eq!(p0_members, expected);
    let p1_members: Vec<String> = p1.placements.iter().map(|p| p.key.file.clone()).collect();
    assert_eq!(p1_members, added[6..].to_vec());

    for (i, file) in expected.iter().enumerate() {
        let rec = fx.record("clot", "boy", file).expect("record");
        assert_eq!(rec.atlas, "clot.png");
        assert_eq!(rec.position.x, (i as u32 % 4) * 32);
        assert_eq!(rec.position.y, (i as u32 / 4) * 32);
    }
    assert_eq!(
        fx.record("clot", "boy", "b09.png").map(|r| r.atlas),
        Some("clot_1.png".to_string())
    );
}

#[test]
fn trailing_garbage_is_stripped_before_decode() {
    let mut bytes = solid_png(32, 32, [1, 2, 3, 255]);
    let clean_len = bytes.len();
    bytes.extend(std::iter::repeat_n(0xAB, 200));

    assert_eq!(sanitize_png(&bytes).len(), clean_len);
    let img = decode_sprite(&bytes).expect("sanitized decode");
    assert_eq!(img.dimensions(), (32, 32));
    assert!(decode_strict(&bytes).is_err());
    assert!(decode_strict(&bytes[..clean_len]).is_ok());
}

#[test]
fn garbage_sprite_packs_like_a_clean_one() {
    let fx = Fixture::new();
    let mut bytes = solid_png(32, 32, [1, 2, 3, 255]);
    bytes.extend(std::iter::repeat_n(0xAB, 200));
    fx.add_sprite_bytes("clot", "boy/dirty.png", &bytes);
    let mut entries = Map::new();
    entries.insert("dirty.png".into(), json!({ "name": "dirty" }));
    fx.write_sidecar("clot", "boy", &Value::Object(entries));

    let report = fx.bundle("clot");
    assert!(report.decode_failures.is_empty());
    assert_eq!(fx.atlas("clot.png").get_pixel(0, 0).0, [1, 2, 3, 255]);
}
