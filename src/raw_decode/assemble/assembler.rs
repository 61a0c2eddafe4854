use log::warn;
use tracing::{debug, instrument};

use crate::raw_decode::assemble::types::{SliceDescriptor, UncompressedLayout};
use crate::raw_decode::buffer::{ImageBuffer, ImageSpec};
use crate::raw_decode::bytes::ByteRange;
use crate::raw_decode::common::error::{DecodeError, Result};
use crate::raw_decode::packed::{DecodeOptions, Packing};
use crate::raw_decode::parallel::RowScheduler;

/// Stitches the strips of an uncompressed RAW into one image buffer.
///
/// Strips whose byte range falls outside the file are dropped up front.
/// A failure in the first surviving strip is fatal; failures in later
/// strips are recorded on the buffer and the remaining strips keep the
/// rows they decoded.
pub struct SliceAssembler {
    options: DecodeOptions,
    scheduler: RowScheduler,
}

impl SliceAssembler {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            scheduler: RowScheduler::new(),
        }
    }

    pub fn with_scheduler(options: DecodeOptions, scheduler: RowScheduler) -> Self {
        Self { options, scheduler }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    #[instrument(skip(self, file, layout, spec), fields(width = layout.width, slices = layout.slices.len()))]
    pub fn decode(
        &self,
        file: &ByteRange<'_>,
        layout: &UncompressedLayout,
        spec: &ImageSpec,
    ) -> Result<ImageBuffer> {
        let valid: Vec<SliceDescriptor> = layout
            .slices
            .iter()
            .copied()
            .filter(|s| {
                let ok = file.is_valid(s.offset, s.byte_count);
                if !ok {
                    debug!(
                        "dropping slice at {}+{} outside the {}-byte file",
                        s.offset,
                        s.byte_count,
                        file.len()
                    );
                }
                ok
            })
            .collect();
        if valid.is_empty() {
            return Err(DecodeError::Truncated(
                "no valid slices found, file is probably cut short".into(),
            ));
        }

        let total_rows: usize = valid.iter().map(|s| s.row_count).sum();
        let mut image = ImageBuffer::new(spec, layout.width, total_rows);
        image.create_data()?;
        image.white_point = white_point(layout.packing.bits_per_pixel());
        debug!(
            "decoding {} slices into a {}x{} image",
            valid.len(),
            layout.width,
            total_rows
        );

        let mut oy = 0;
        for (i, slice) in valid.iter().enumerate() {
            let mut input = file.sub_cursor(slice.offset, slice.byte_count)?;
            let packing = slice_packing(layout, slice);
            let res = self.scheduler.decode(
                &packing,
                &mut input,
                &mut image,
                oy,
                slice.row_count,
                &self.options,
            );
            if let Err(err) = res {
                if i > 0 {
                    warn!("slice {i} failed: {err}");
                    image.set_error(err);
                } else if matches!(err, DecodeError::Truncated(_) | DecodeError::Io(_)) {
                    return Err(DecodeError::Io(format!(
                        "first slice failed, unable to decode more: {err}"
                    )));
                } else {
                    return Err(err);
                }
            }
            oy += slice.row_count;
        }
        Ok(image)
    }
}

fn white_point(bits: u32) -> u32 {
    ((1u64 << bits.min(32)) - 1) as u32
}

/// The effective packing of one slice. With bit-depth inference on, the
/// generic packing is re-derived from the slice's own byte count, the
/// way vendors that pad the last strip expect.
fn slice_packing(layout: &UncompressedLayout, slice: &SliceDescriptor) -> Packing {
    match layout.packing {
        Packing::Generic { bit_order, .. }
            if layout.infer_slice_bit_depth && slice.row_count > 0 && layout.width > 0 =>
        {
            let samples = (slice.row_count * layout.width) as u64;
            let bits = (slice.byte_count * 8 / samples) as u32;
            Packing::Generic {
                bit_order,
                bits_per_pixel: bits,
                input_pitch: layout.width * bits as usize / 8,
            }
        }
        p => p,
    }
}
