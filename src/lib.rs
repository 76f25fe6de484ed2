#![forbid(unsafe_code)]

pub mod codec;
pub mod compose;
pub mod error;
pub mod model;
pub mod raster;
pub mod region;
pub mod store;

pub use codec::{ImageCodec, RasterCodec};
pub use compose::{CanvasComposer, ComposeSettings};
pub use error::{CollageError, CollageResult};
pub use model::{CollageFillData, FillEntry, Region, RegionContent};
pub use raster::Raster;
pub use region::{SAMPLE_FACTOR_LIMIT, render_region};
pub use store::{CollageStore, DirectoryStore};
