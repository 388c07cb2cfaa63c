//! PNG input repair.
//!
//! Upstream conversion sometimes appends bytes after the logical end of a PNG stream.
//! Strict decoders reject such files, so sprite bytes are cut right after the final
//! `IEND` chunk (type + CRC) before decoding.

use serde::Serialize;

/// The 8-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const IEND: &[u8; 4] = b"IEND";
const CRC_LEN: usize = 4;

/// Returns `bytes` truncated after the last `IEND` chunk's CRC.
///
/// Passes the buffer through unchanged when there is no `IEND`, when nothing follows the
/// CRC, or when the CRC itself would run past the end of the buffer.
pub fn sanitize_png(bytes: &[u8]) -> &[u8] {
    match logical_end(bytes) {
        Some(end) if end < bytes.len() => &bytes[..end],
        _ => bytes,
    }
}

/// Byte offset one past the last `IEND` CRC, if the whole trailer is present.
fn logical_end(bytes: &[u8]) -> Option<usize> {
    let marker = bytes.windows(IEND.len()).rposition(|w| w == IEND)?;
    let end = marker + IEND.len() + CRC_LEN;
    (end <= bytes.len()).then_some(end)
}

/// Structural summary of a PNG buffer, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PngInspection {
    /// Buffer starts with the PNG signature.
    pub valid_signature: bool,
    /// Offset of the last `IEND` chunk type, if any.
    pub iend_offset: Option<usize>,
    /// Bytes after the `IEND` CRC that `sanitize_png` would drop.
    pub trailing_bytes: usize,
    pub total_len: usize,
}

pub fn inspect_png(bytes: &[u8]) -> PngInspection {
    let iend_offset = bytes.windows(IEND.len()).rposition(|w| w == IEND);
    let trailing_bytes = logical_end(bytes)
        .map(|end| bytes.len() - end)
        .unwrap_or(0);
    PngInspection {
        valid_signature: bytes.starts_with(&PNG_SIGNATURE),
        iend_offset,
        trailing_bytes,
        total_len: bytes.len(),
    }
}
