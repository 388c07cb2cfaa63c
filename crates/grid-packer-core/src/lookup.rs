use crate::config::BundleConfig;
use crate::error::Result;
use crate::scan::list_categories;
use crate::sidecar::MetadataSnapshot;
use std::collections::BTreeMap;

/// Maps `{category}/{subdir}/{file}` to the atlas file holding that sprite, built from
/// every sidecar's bundle records. This is the table edge layers use to redirect sprite
/// requests; sprites without a record are absent.
pub fn lookup_table(cfg: &BundleConfig) -> Result<BTreeMap<String, String>> {
    let mut table = BTreeMap::new();
    if !cfg.metadata_root.is_dir() {
        return Ok(table);
    }
    for category in list_categories(&cfg.metadata_root)? {
        let snap = MetadataSnapshot::load(cfg.metadata_root.join(&category), &cfg.sidecar_name)?;
        for (key, record) in snap.records() {
            table.insert(key.lookup_key(&category), record.atlas);
        }
    }
    Ok(table)
}
