use std::path::PathBuf;

use crate::{
    codec::RasterCodec,
    error::{CollageError, CollageResult},
    model::CollageFillData,
    raster::Raster,
    region::{SAMPLE_FACTOR_LIMIT, render_region},
    store::CollageStore,
};

#[derive(Clone, Copy, Debug)]
pub struct ComposeSettings {
    /// Background fill behind and between regions.
    pub background: [u8; 4],
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            background: [255, 255, 255, 255],
        }
    }
}

/// Composites a region layout into one square raster.
///
/// The canvas side length is the largest intrinsic dimension among the
/// source images. When an attempt runs out of memory the whole canvas is
/// retried at the next power-of-two sample factor, so every region of the
/// final result is rendered at one uniform (if reduced) resolution; there
/// is never a partially drawn collage.
pub struct CanvasComposer<'a> {
    codec: &'a dyn RasterCodec,
    settings: ComposeSettings,
}

impl<'a> CanvasComposer<'a> {
    pub fn new(codec: &'a dyn RasterCodec) -> Self {
        Self::with_settings(codec, ComposeSettings::default())
    }

    pub fn with_settings(codec: &'a dyn RasterCodec, settings: ComposeSettings) -> Self {
        Self { codec, settings }
    }

    /// Composites every region and returns the finished canvas.
    ///
    /// Fails with [`CollageError::Composition`] when a source image is
    /// unreadable or when no sample factor up to the ladder bound fits in
    /// memory; malformed fill data fails with
    /// [`CollageError::Validation`].
    #[tracing::instrument(skip(self, fill), fields(regions = fill.len()))]
    pub fn compose(&self, fill: &CollageFillData) -> CollageResult<Raster> {
        fill.validate()?;

        // The full-resolution canvas side is the biggest source dimension.
        let mut max_side = 0u32;
        for entry in fill.iter() {
            let (w, h) = self
                .codec
                .probe_dimensions(&entry.content.image_path)
                .map_err(CollageError::composition)?;
            max_side = max_side.max(w.max(h));
        }
        if max_side == 0 {
            return Err(CollageError::validation(
                "no source image has drawable dimensions",
            ));
        }

        let mut cause = CollageError::memory_exhausted(format!(
            "no canvas attempt below sample factor {SAMPLE_FACTOR_LIMIT} fit in memory"
        ));
        let mut canvas_sample = 1u32;
        while canvas_sample < SAMPLE_FACTOR_LIMIT {
            let side = max_side / canvas_sample;
            if side == 0 {
                break;
            }
            match self.attempt(fill, side) {
                Ok(canvas) => {
                    tracing::debug!(side, canvas_sample, "collage composed");
                    return Ok(canvas);
                }
                Err(err) if err.is_memory_exhausted() => {
                    tracing::warn!(
                        side,
                        canvas_sample,
                        "canvas attempt ran out of memory, halving resolution"
                    );
                    cause = err;
                    canvas_sample *= 2;
                }
                // Unreadable source data: no resolution can fix it.
                Err(err) => return Err(CollageError::composition(err)),
            }
        }
        Err(CollageError::composition(cause))
    }

    /// Composites and hands the finished canvas to `store`, returning the
    /// store's reference. The canvas drops before returning whether or not
    /// the store succeeds.
    pub fn compose_into(
        &self,
        fill: &CollageFillData,
        store: &dyn CollageStore,
    ) -> CollageResult<PathBuf> {
        let canvas = self.compose(fill)?;
        store.insert(&canvas)
    }

    fn attempt(&self, fill: &CollageFillData, side: u32) -> CollageResult<Raster> {
        // A fresh canvas per attempt; a failed attempt's canvas drops here.
        let mut canvas = self.codec.alloc_canvas(side)?;
        canvas.fill(self.settings.background);
        for entry in fill.iter() {
            render_region(self.codec, &mut canvas, &entry.region, &entry.content)?;
        }
        Ok(canvas)
    }
}
