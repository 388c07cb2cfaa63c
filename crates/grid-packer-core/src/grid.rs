use crate::error::{GridPackerError, Result};
use crate::model::{Placement, Rect};
use crate::raster::{blit_rgba, decode_sprite, transparent_canvas};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Raw sprite bytes to place on a page (key + undecoded PNG).
pub struct SpriteSource<K> {
    pub key: K,
    pub bytes: Vec<u8>,
}

/// Geometry of a fixed grid page.
///
/// Every cell is `cell_w` x `cell_h`, the largest width and height among the members
/// (at least 1). Member `i` sits at column `i % cols`, row `i / cols`, anchored at the
/// cell's top-left corner with its own size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
    pub cell_w: u32,
    pub cell_h: u32,
    /// Member bounds in input order.
    pub rects: Vec<Rect>,
}

impl GridLayout {
    /// Lays out `sizes` (w, h) row-major on a `rows` x `cols` grid.
    pub fn compute(sizes: &[(u32, u32)], rows: u32, cols: u32) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(GridPackerError::InvalidDimensions { rows, cols });
        }
        let capacity = rows as usize * cols as usize;
        if sizes.len() > capacity {
            return Err(GridPackerError::InvalidInput(format!(
                "{} sprites exceed the {}x{} grid capacity of {}",
                sizes.len(),
                rows,
                cols,
                capacity
            )));
        }
        let cell_w = sizes.iter().map(|s| s.0).max().unwrap_or(0).max(1);
        let cell_h = sizes.iter().map(|s| s.1).max().unwrap_or(0).max(1);
        let rects = sizes
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| {
                let (col, row) = (i as u32 % cols, i as u32 / cols);
                Rect::new(col * cell_w, row * cell_h, w, h)
            })
            .collect();
        Ok(Self {
            rows,
            cols,
            cell_w,
            cell_h,
            rects,
        })
    }

    /// Canvas size: (cols * cell_w, rows * cell_h).
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.cols * self.cell_w, self.rows * self.cell_h)
    }

    /// Top-left corner of grid slot `slot`.
    pub fn cell_origin(&self, slot: usize) -> (u32, u32) {
        let slot = slot as u32;
        ((slot % self.cols) * self.cell_w, (slot / self.cols) * self.cell_h)
    }
}

/// A decoded sprite ready to be placed.
pub struct DecodedSprite<K> {
    pub key: K,
    pub rgba: RgbaImage,
}

/// A sprite that could not be decoded; it is left out of the page.
#[derive(Debug)]
pub struct DecodeFailure<K> {
    pub key: K,
    pub error: GridPackerError,
}

/// Rendered page: canvas, geometry and the sprites that made it in.
pub struct GridOutput<K> {
    pub layout: GridLayout,
    pub rgba: RgbaImage,
    /// Placed sprites; slots are contiguous from 0 in batch order, skipping failures.
    pub placements: Vec<Placement<K>>,
    pub failures: Vec<DecodeFailure<K>>,
}

/// Sanitizes and decodes each source, keeping input order. Failures are logged and
/// returned separately. With the `parallel` feature the decoding runs on rayon.
pub fn decode_sources<K: std::fmt::Display + Send>(
    inputs: Vec<SpriteSource<K>>,
) -> (Vec<DecodedSprite<K>>, Vec<DecodeFailure<K>>) {
    #[cfg(feature = "parallel")]
    let results: Vec<(K, Result<RgbaImage>)> = inputs
        .into_par_iter()
        .map(|src| {
            let rgba = decode_sprite(&src.bytes);
            (src.key, rgba)
        })
        .collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<(K, Result<RgbaImage>)> = inputs
        .into_iter()
        .map(|src| {
            let rgba = decode_sprite(&src.bytes);
            (src.key, rgba)
        })
        .collect();

    let mut decoded = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (key, rgba) in results {
        match rgba {
            Ok(rgba) => decoded.push(DecodedSprite { key, rgba }),
            Err(e) => {
                error!(sprite = %key, error = %e, "skip sprite: decode failed");
                failures.push(DecodeFailure { key, error: e });
            }
        }
    }
    (decoded, failures)
}

#[instrument(skip_all, fields(count = inputs.len()))]
/// Decodes `inputs` and renders them onto one `rows` x `cols` grid page.
///
/// Notes:
/// - Input order is slot order; a sprite that fails to decode is logged, reported in
///   `failures` and does not take a slot.
/// - If every sprite fails, the output has no placements and a 1px-cell blank canvas.
pub fn pack_grid<K: std::fmt::Display + Send>(
    inputs: Vec<SpriteSource<K>>,
    rows: u32,
    cols: u32,
) -> Result<GridOutput<K>> {
    if inputs.is_empty() {
        return Err(GridPackerError::Empty);
    }
    check_capacity(inputs.len(), rows, cols)?;
    let (decoded, failures) = decode_sources(inputs);
    let mut out = render_grid(decoded, rows, cols)?;
    out.failures = failures;
    Ok(out)
}

/// Renders already-decoded sprites onto one grid page, in order.
pub fn render_grid<K: std::fmt::Display>(
    sprites: Vec<DecodedSprite<K>>,
    rows: u32,
    cols: u32,
) -> Result<GridOutput<K>> {
    check_capacity(sprites.len(), rows, cols)?;
    let sizes: Vec<(u32, u32)> = sprites.iter().map(|s| s.rgba.dimensions()).collect();
    let layout = GridLayout::compute(&sizes, rows, cols)?;
    let (width, height) = layout.canvas_size();
    debug!(
        width,
        height,
        cell_w = layout.cell_w,
        cell_h = layout.cell_h,
        "grid canvas"
    );

    let mut rgba = transparent_canvas(width, height);
    let mut placements = Vec::with_capacity(sprites.len());
    for (slot, (sprite, rect)) in sprites.into_iter().zip(layout.rects.iter()).enumerate() {
        debug!(slot, sprite = %sprite.key, x = rect.x, y = rect.y, "draw");
        blit_rgba(&sprite.rgba, &mut rgba, rect.x, rect.y);
        placements.push(Placement {
            key: sprite.key,
            slot,
            rect: *rect,
        });
    }

    Ok(GridOutput {
        layout,
        rgba,
        placements,
        failures: Vec::new(),
    })
}

fn check_capacity(len: usize, rows: u32, cols: u32) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(GridPackerError::InvalidDimensions { rows, cols });
    }
    let capacity = rows as usize * cols as usize;
    if len > capacity {
        return Err(GridPackerError::InvalidInput(format!(
            "batch of {len} sprites exceeds {capacity} cells"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_uses_largest_member_for_cells() {
        let layout = GridLayout::compute(&[(10, 4), (3, 12), (7, 7)], 2, 2).expect("layout");
        assert_eq!((layout.cell_w, layout.cell_h), (10, 12));
        assert_eq!(layout.canvas_size(), (20, 24));
        assert_eq!(layout.rects[0], Rect::new(0, 0, 10, 4));
        assert_eq!(layout.rects[1], Rect::new(10, 0, 3, 12));
        assert_eq!(layout.rects[2], Rect::new(0, 12, 7, 7));
        assert_eq!(layout.cell_origin(3), (10, 12));
    }

    #[test]
    fn layout_rejects_overflow_and_zero_grid() {
        assert!(GridLayout::compute(&[(1, 1); 5], 2, 2).is_err());
        assert!(matches!(
            GridLayout::compute(&[], 0, 4),
            Err(GridPackerError::InvalidDimensions { rows: 0, cols: 4 })
        ));
    }

    #[test]
    fn empty_layout_has_unit_cells() {
        let layout = GridLayout::compute(&[(0, 0)], 4, 4).expect("layout");
        assert_eq!((layout.cell_w, layout.cell_h), (1, 1));
        assert_eq!(layout.canvas_size(), (4, 4));
    }
}
