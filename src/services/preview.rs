//! Preview thumbnail generation for submitted images

use crate::error::Result;
use bytes::Bytes;
use image::ImageFormat;
use std::io::Cursor;

/// Decode an image and produce a small PNG thumbnail for display.
///
/// Runs synchronously at submission time so the queue can show something
/// before any backend work begins. Also serves as the decode check that
/// gates admission into the queue.
pub fn make_preview(source: &[u8], max_edge: u32) -> Result<Bytes> {
    let decoded = image::load_from_memory(source)?;
    let thumb = decoded.thumbnail(max_edge, max_edge);

    let mut out = Cursor::new(Vec::new());
    thumb.write_to(&mut out, ImageFormat::Png)?;
    Ok(Bytes::from(out.into_inner()))
}
