//! Target image buffer, CFA bookkeeping and decode metadata.

mod cfa;
mod image;
pub mod types;

pub use cfa::{CfaColor, CfaPattern};
pub use image::{ErrorLog, ImageBuffer, LookupTable};
pub use types::{BlackArea, ImageSpec, Rect, SampleType};

pub(crate) use image::{row_dither_state, DecodeTarget, PixelsMut};
