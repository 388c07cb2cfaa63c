mod common;

use common::*;
use grid_packer_core::prelude::*;
use grid_packer_core::lookup_table;
use std::collections::BTreeMap;

#[test]
fn second_run_changes_nothing() {
    let fx = Fixture::new();
    fx.add_listed_sprites("hats", "girl", &names("h", 0..7), 20, 24);

    let first = fx.bundle("hats");
    assert_eq!(first.pages.len(), 1);
    let sidecar = fx.sidecar_text("hats", "girl");
    let atlas = file_bytes(&fx.atlas_path("hats.png"));

    let second = fx.bundle("hats");
    assert_eq!(second.new_sprites, 0);
    assert!(second.pages.is_empty());
    assert_eq!(second.recorded, 0);
    assert_eq!(fx.sidecar_text("hats", "girl"), sidecar);
    assert_eq!(file_bytes(&fx.atlas_path("hats.png")), atlas);
}

#[test]
fn every_sprite_ends_up_recorded() {
    let fx = Fixture::new();
    fx.add_listed_sprites("clot", "boy", &names("b", 0..9), 16, 16);
    fx.add_listed_sprites("clot", "girl", &names("g", 0..12), 16, 16);

    let report = fx.bundle("clot");
    assert!(report.is_clean());
    assert_eq!(report.recorded, 21);
    for (subdir, files) in [("boy", names("b", 0..9)), ("girl", names("g", 0..12))] {
        for file in files {
            assert!(fx.record("clot", subdir, &file).is_some(), "{subdir}/{file}");
        }
    }
    // boy/* sorts before girl/*, so the boys fill page 0 first
    assert_eq!(
        fx.record("clot", "girl", "g06.png").map(|r| r.atlas),
        Some("clot.png".into())
    );
    assert_eq!(
        fx.record("clot", "girl", "g07.png").map(|r| r.atlas),
        Some("clot_1.png".into())
    );
}

#[test]
fn only_the_last_page_is_ever_partial() {
    let fx = Fixture::new();
    let batches = [5usize, 14, 1, 17];
    let mut total = 0;
    for (round, count) in batches.iter().enumerate() {
        let files = names(&format!("r{round}_"), 0..*count);
        fx.add_listed_sprites("glas", "all", &files, 12, 12);
        fx.bundle("glas");
        total += count;

        let table = lookup_table(&fx.cfg).expect("lookup");
        let mut per_atlas: BTreeMap<String, usize> = BTreeMap::new();
        for atlas in table.values() {
            *per_atlas.entry(atlas.clone()).or_default() += 1;
        }
        assert_eq!(per_atlas.values().sum::<usize>(), total);

        let pages = total.div_ceil(16);
        assert_eq!(per_atlas.len(), pages, "round {round}: {per_atlas:?}");
        for index in 0..pages {
            let atlas = if index == 0 {
                "glas.png".to_string()
            } else {
                format!("glas_{index}.png")
            };
            let expected = if index + 1 < pages {
                16
            } else {
                total - 16 * (pages - 1)
            };
            assert_eq!(per_atlas.get(&atlas), Some(&expected), "round {round}: {atlas}");
        }
    }
}

#[test]
fn reopened_page_keeps_its_name() {
    let fx = Fixture::new();
    fx.add_listed_sprites("wing", "x", &names("w", 0..3), 8, 8);
    fx.bundle("wing");
    assert!(fx.atlas_path("wing.png").exists());

    fx.add_listed_sprites("wing", "x", &names("v", 0..2), 8, 8);
    let report = fx.bundle("wing");
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].atlas, "wing.png");
    assert_eq!(report.pages[0].placements.len(), 5);
    assert!(!fx.atlas_path("wing_0.png").exists());

    // existing members keep their slots; v* sorts before w* but is appended
    assert_eq!(
        fx.record("wing", "x", "w00.png").map(|r| r.position),
        Some(Rect::new(0, 0, 8, 8))
    );
    assert_eq!(
        fx.record("wing", "x", "v00.png").map(|r| r.position),
        Some(Rect::new(24, 0, 8, 8))
    );
}

#[test]
fn explicit_page0_stays_explicit_when_reopened() {
    let fx = Fixture::new();
    let files = names("a", 0..2);
    fx.add_listed_sprites("cset", "m", &files, 8, 8);
    let mut sidecar = fx.read_sidecar("cset", "m");
    for (i, file) in files.iter().enumerate() {
        sidecar[file.as_str()]["bundle"] = serde_json::json!({
            "atlas": "cset_0.png",
            "position": { "x": i * 8, "y": 0, "w": 8, "h": 8 }
        });
    }
    fx.write_sidecar("cset", "m", &sidecar);

    fx.add_listed_sprites("cset", "m", &names("b", 0..1), 8, 8);
    let report = fx.bundle("cset");
    assert_eq!(report.pages[0].atlas, "cset_0.png");
    assert!(!fx.atlas_path("cset.png").exists());
}

#[test]
fn cells_grow_to_the_largest_member() {
    let fx = Fixture::new();
    let sizes = [(10, 4), (3, 12), (7, 7), (5, 5), (2, 2)];
    for (i, (w, h)) in sizes.iter().enumerate() {
        fx.add_sprite("misc", &format!("s/{i}.png"), *w, *h, color_for(i));
    }
    let report = fx.bundle("misc");
    let page = &report.pages[0];
    assert_eq!((page.cell_w, page.cell_h), (10, 12));
    assert_eq!((page.width, page.height), (40, 48));

    let atlas = fx.atlas("misc.png");
    for (i, (w, h)) in sizes.iter().enumerate() {
        let rec = fx.record("misc", "s", &format!("{i}.png")).expect("record");
        let (col, row) = (i as u32 % 4, i as u32 / 4);
        assert_eq!(rec.position, Rect::new(col * 10, row * 12, *w, *h));
        assert_eq!(atlas.get_pixel(rec.position.x, rec.position.y).0, color_for(i));
        // right of the sprite, still inside its cell
        if *w < 10 {
            assert_eq!(atlas.get_pixel(rec.position.x + w, rec.position.y)[3], 0);
        }
    }
}

#[test]
fn reopened_page_is_redrawn_with_bigger_cells() {
    let fx = Fixture::new();
    fx.add_listed_sprites("face", "f", &names("a", 0..2), 8, 8);
    fx.bundle("face");
    assert_eq!(fx.atlas("face.png").dimensions(), (32, 32));

    fx.add_listed_sprites("face", "f", &names("b", 0..1), 16, 10);
    fx.bundle("face");
    assert_eq!(fx.atlas("face.png").dimensions(), (64, 40));
    assert_eq!(
        fx.record("face", "f", "a01.png").map(|r| r.position),
        Some(Rect::new(16, 0, 8, 8))
    );
    assert_eq!(
        fx.record("face", "f", "b00.png").map(|r| r.position),
        Some(Rect::new(32, 0, 16, 10))
    );
}
