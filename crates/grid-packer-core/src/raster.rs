//! Thin adapter over the `image` crate: decode sprite bytes, composite onto a page
//! canvas, encode and persist atlas pages.

use crate::error::{GridPackerError, Result};
use crate::model::Rect;
use crate::sanitize::{inspect_png, sanitize_png};
use image::{ImageFormat, Rgba, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Decodes sprite bytes into RGBA, stripping trailing garbage first.
pub fn decode_sprite(bytes: &[u8]) -> Result<RgbaImage> {
    let clean = sanitize_png(bytes);
    let img = image::load_from_memory(clean)?;
    Ok(img.to_rgba8())
}

/// Decodes without sanitizing and rejects bytes after the IEND trailer. Only used by
/// diagnostics to show what a strict reader sees.
pub fn decode_strict(bytes: &[u8]) -> Result<RgbaImage> {
    let info = inspect_png(bytes);
    if info.trailing_bytes > 0 {
        return Err(GridPackerError::InvalidInput(format!(
            "{} bytes after IEND",
            info.trailing_bytes
        )));
    }
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Fully transparent canvas.
pub fn transparent_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]))
}

/// Copy `src` into `canvas` with its top-left at (dx, dy). Pixels falling outside the
/// canvas are clipped.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    for yy in 0..sh {
        if dy + yy >= ch {
            break;
        }
        for xx in 0..sw {
            if dx + xx >= cw {
                break;
            }
            let px = *src.get_pixel(xx, yy);
            canvas.put_pixel(dx + xx, dy + yy, px);
        }
    }
}

/// Encode a canvas as PNG bytes.
pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    canvas.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Writes `bytes` to `path` through a sibling temp file and a rename, so readers never
/// observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| GridPackerError::io(dir, e))?;
        }
    }
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, bytes).map_err(|e| GridPackerError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(GridPackerError::io(path, e));
    }
    Ok(())
}

/// Encode and write an atlas page.
pub fn save_png(canvas: &RgbaImage, path: &Path) -> Result<()> {
    let bytes = encode_png(canvas)?;
    write_atomic(path, &bytes)
}

/// True if any pixel inside `rect` (clipped to the image) has non-zero alpha.
pub fn region_has_content(rgba: &RgbaImage, rect: Rect) -> bool {
    let (w, h) = rgba.dimensions();
    let x_end = rect.x.saturating_add(rect.w).min(w);
    let y_end = rect.y.saturating_add(rect.h).min(h);
    (rect.y..y_end).any(|y| (rect.x..x_end).any(|x| rgba.get_pixel(x, y)[3] > 0))
}

/// Per-cell occupancy of an atlas laid out as a `rows` x `cols` grid, row-major.
/// Cell size is inferred as `width / cols` by `height / rows`.
pub fn cell_occupancy(rgba: &RgbaImage, rows: u32, cols: u32) -> Result<Vec<bool>> {
    if rows == 0 || cols == 0 {
        return Err(GridPackerError::InvalidDimensions { rows, cols });
    }
    let (w, h) = rgba.dimensions();
    if w % cols != 0 || h % rows != 0 {
        return Err(GridPackerError::InvalidInput(format!(
            "atlas {w}x{h} is not divisible into a {rows}x{cols} grid"
        )));
    }
    let (cell_w, cell_h) = (w / cols, h / rows);
    let mut out = Vec::with_capacity((rows * cols) as usize);
    for r in 0..rows {
        for c in 0..cols {
            out.push(region_has_content(
                rgba,
                Rect::new(c * cell_w, r * cell_h, cell_w, cell_h),
            ));
        }
    }
    Ok(out)
}
