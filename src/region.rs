use crate::{
    codec::RasterCodec,
    error::{CollageError, CollageResult},
    model::{Region, RegionContent},
    raster::Raster,
};

/// Both downsample ladders (per-region and whole-canvas) stop once the
/// power-of-two factor reaches this bound, so each tries 1, 2, 4, ... 64.
pub const SAMPLE_FACTOR_LIMIT: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Maps a normalized region onto canvas pixels.
///
/// Every term, including the vertical ones, derives from the canvas WIDTH.
/// The canvas is always square and regions are near-square, and callers
/// depend on this exact mapping, so the height terms deliberately do not
/// switch to the canvas height.
pub(crate) fn region_pixel_rect(region: &Region, canvas_width: u32) -> PixelRect {
    let w = canvas_width as f32;
    PixelRect {
        x: (region.left * w).round() as u32,
        y: (region.top * w).round() as u32,
        width: (region.width * w).round() as u32,
        height: (region.height * w).round() as u32,
    }
}

/// Renders one region's content onto the canvas: decode, cover-fit to the
/// region rectangle, apply the user's zoom/crop window, scale back to the
/// exact rectangle, blit.
///
/// Memory exhaustion at any step retries the whole pipeline at the next
/// power-of-two decode factor; only when the ladder is spent does the
/// exhaustion propagate (for the composer's canvas-level ladder to handle).
/// An unreadable source fails immediately with
/// [`CollageError::RegionDecode`].
pub fn render_region(
    codec: &dyn RasterCodec,
    canvas: &mut Raster,
    region: &Region,
    content: &RegionContent,
) -> CollageResult<()> {
    let rect = region_pixel_rect(region, canvas.width());
    if rect.width == 0 || rect.height == 0 {
        return Ok(());
    }

    let mut sample_factor = 1u32;
    while sample_factor < SAMPLE_FACTOR_LIMIT {
        match render_at(codec, canvas, &rect, content, sample_factor) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_memory_exhausted() => {
                tracing::debug!(
                    image = %content.image_path.display(),
                    sample_factor,
                    "region did not fit in memory, retrying at a coarser sample"
                );
                sample_factor *= 2;
            }
            Err(err) => return Err(err),
        }
    }
    Err(CollageError::memory_exhausted(format!(
        "region image '{}' did not fit in memory at any sample factor",
        content.image_path.display()
    )))
}

fn render_at(
    codec: &dyn RasterCodec,
    canvas: &mut Raster,
    rect: &PixelRect,
    content: &RegionContent,
    sample_factor: u32,
) -> CollageResult<()> {
    let decoded = match codec.decode(&content.image_path, sample_factor) {
        Ok(raster) => raster,
        // The file decoded cleanly at base resolution, so a failure at a
        // coarser factor can only be a resource problem.
        Err(err) if sample_factor > 1 && !err.is_memory_exhausted() => {
            return Err(CollageError::memory_exhausted(format!(
                "decode of '{}' failed at sample factor {sample_factor}: {err}",
                content.image_path.display()
            )));
        }
        Err(err) => return Err(err),
    };

    // Cover-fit over the region rectangle: the smaller dimension just fills
    // it, the other may overshoot. Skipped when the decode already matches.
    let fitted = if decoded.width() == rect.width && decoded.height() == rect.height {
        decoded
    } else {
        let s = f64::max(
            f64::from(rect.width) / f64::from(decoded.width()),
            f64::from(rect.height) / f64::from(decoded.height()),
        );
        let w = ((s * f64::from(decoded.width())).round() as u32).max(1);
        let h = ((s * f64::from(decoded.height())).round() as u32).max(1);
        let scaled = codec.scale(&decoded, w, h)?;
        drop(decoded);
        scaled
    };

    // The user's zoom picks a window 1/scale the region size out of the
    // cover-scaled image; the crop offsets pick which part of the overshoot
    // stays.
    let zoom = f64::from(content.scale.max(1.0));
    let crop_w = ((f64::from(rect.width) / zoom) as u32).clamp(1, fitted.width());
    let crop_h = ((f64::from(rect.height) / zoom) as u32).clamp(1, fitted.height());
    let slack_x = fitted.width() - crop_w;
    let slack_y = fitted.height() - crop_h;
    let crop_x =
        ((f64::from(content.crop_left.unwrap_or(0.0)) * f64::from(slack_x)) as u32).min(slack_x);
    let crop_y =
        ((f64::from(content.crop_top.unwrap_or(0.0)) * f64::from(slack_y)) as u32).min(slack_y);

    let cropped = if crop_x == 0 && crop_y == 0 && crop_w == fitted.width() && crop_h == fitted.height()
    {
        fitted
    } else {
        let window = codec.crop(&fitted, crop_x, crop_y, crop_w, crop_h)?;
        drop(fitted);
        window
    };

    // Undo the 1/scale shrink: the window stretches back to the exact
    // region rectangle.
    let result = if cropped.width() == rect.width && cropped.height() == rect.height {
        cropped
    } else {
        let stretched = codec.scale(&cropped, rect.width, rect.height)?;
        drop(cropped);
        stretched
    };

    canvas.blit(&result, rect.x, rect.y);
    Ok(())
}
