use std::path::PathBuf;

use crate::error::{CollageError, CollageResult};

/// A normalized rectangle on the output canvas where one source image is
/// placed. Coordinates are fractions in `[0, 1]` of the square canvas side.
///
/// Regions are caller-supplied layout: this crate trusts them to be
/// non-overlapping and within bounds and does not validate either.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// What fills one region: a source image plus the user's zoom and crop
/// offset choice.
///
/// `scale >= 1` is how far the user zoomed into the region relative to the
/// cover-fit image; `crop_left`/`crop_top` pick which fraction of the
/// zoomed-out overshoot to keep (absent means 0, the top-left).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RegionContent {
    pub image_path: PathBuf,
    pub scale: f32,
    #[serde(default)]
    pub crop_left: Option<f32>,
    #[serde(default)]
    pub crop_top: Option<f32>,
}

impl RegionContent {
    /// Cover-fit content with no zoom and no crop offset.
    pub fn cover(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            scale: 1.0,
            crop_left: None,
            crop_top: None,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FillEntry {
    pub region: Region,
    pub content: RegionContent,
}

/// The region-to-content mapping for one collage. Entries keep insertion
/// order; that order is the (stable) order regions are composited in.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct CollageFillData {
    pub entries: Vec<FillEntry>,
}

impl CollageFillData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, region: Region, content: RegionContent) {
        self.entries.push(FillEntry { region, content });
    }

    pub fn iter(&self) -> impl Iterator<Item = &FillEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn validate(&self) -> CollageResult<()> {
        if self.entries.is_empty() {
            return Err(CollageError::validation(
                "fill data must contain at least one region",
            ));
        }

        for (idx, entry) in self.entries.iter().enumerate() {
            let content = &entry.content;
            if !content.scale.is_finite() || content.scale < 1.0 {
                return Err(CollageError::validation(format!(
                    "entry {idx}: content scale must be finite and >= 1.0, got {}",
                    content.scale
                )));
            }
            for (name, crop) in [
                ("crop_left", content.crop_left),
                ("crop_top", content.crop_top),
            ] {
                if let Some(v) = crop {
                    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                        return Err(CollageError::validation(format!(
                            "entry {idx}: {name} must be in [0, 1], got {v}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_region() -> Region {
        Region {
            left: 0.0,
            top: 0.0,
            width: 0.5,
            height: 1.0,
        }
    }

    #[test]
    fn validate_accepts_cover_content() {
        let mut fill = CollageFillData::new();
        fill.push(half_region(), RegionContent::cover("a.jpg"));
        fill.validate().unwrap();
    }

    #[test]
    fn validate_rejects_empty_fill() {
        assert!(CollageFillData::new().validate().is_err());
    }

    #[test]
    fn validate_rejects_zoom_below_one_and_crop_out_of_range() {
        let mut fill = CollageFillData::new();
        let mut content = RegionContent::cover("a.jpg");
        content.scale = 0.5;
        fill.push(half_region(), content);
        assert!(fill.validate().is_err());

        let mut fill = CollageFillData::new();
        let mut content = RegionContent::cover("a.jpg");
        content.crop_left = Some(1.5);
        fill.push(half_region(), content);
        assert!(fill.validate().is_err());
    }

    #[test]
    fn fill_data_round_trips_through_json() {
        let mut fill = CollageFillData::new();
        let mut content = RegionContent::cover("photos/a.jpg");
        content.scale = 2.0;
        content.crop_left = Some(0.25);
        fill.push(half_region(), content);

        let json = serde_json::to_string(&fill).unwrap();
        let back: CollageFillData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.entries[0].region, fill.entries[0].region);
        assert_eq!(back.entries[0].content.scale, 2.0);
        assert_eq!(back.entries[0].content.crop_left, Some(0.25));
        assert_eq!(back.entries[0].content.crop_top, None);
    }

    #[test]
    fn absent_crop_offsets_deserialize_as_none() {
        let json = r#"{"entries":[{"region":{"left":0.0,"top":0.0,"width":1.0,"height":1.0},
            "content":{"image_path":"a.jpg","scale":1.0}}]}"#;
        let fill: CollageFillData = serde_json::from_str(json).unwrap();
        assert_eq!(fill.entries[0].content.crop_left, None);
        assert_eq!(fill.entries[0].content.crop_top, None);
    }
}
