use crate::internal::models::ClipRect;
use anyhow::{Context, Result, bail};
use image::ImageFormat;
use std::io::Cursor;

/// Crop a PNG to `clip`, given in CSS pixels, on a page captured at `scale`
/// device pixels per CSS pixel.
///
/// Negative coordinates (padding at the page edge) are clamped to the origin.
/// A region reaching past the right or bottom edge by more than one CSS pixel
/// is an error, since the capture did not cover it.
pub fn clip_png(png: &[u8], clip: ClipRect, scale: f64) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)
        .context("failed to decode screenshot")?;

    let (width, height) = (img.width() as f64, img.height() as f64);
    let right = ((clip.x + clip.width) * scale).ceil();
    let bottom = ((clip.y + clip.height) * scale).ceil();
    if right > width + scale.ceil() || bottom > height + scale.ceil() {
        bail!(
            "clip region {clip:?} needs {right}x{bottom} device pixels but the screenshot is only {}x{}",
            img.width(),
            img.height()
        );
    }

    let x0 = (clip.x * scale).floor().clamp(0.0, width);
    let y0 = (clip.y * scale).floor().clamp(0.0, height);
    let x1 = right.clamp(0.0, width);
    let y1 = bottom.clamp(0.0, height);

    if x1 <= x0 || y1 <= y0 {
        bail!(
            "clip region {clip:?} lies outside the {}x{} screenshot",
            img.width(),
            img.height()
        );
    }

    let cropped = img.crop_imm(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);

    let mut out = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .context("failed to encode clipped screenshot")?;
    Ok(out)
}
