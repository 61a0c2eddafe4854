//! Parallel decoding of row bands into a shared image buffer.

use rayon::prelude::*;
use tracing::debug;

use crate::raw_decode::buffer::{DecodeTarget, ImageBuffer, PixelsMut};
use crate::raw_decode::bytes::ByteCursor;
use crate::raw_decode::common::error::{DecodeError, Result};
use crate::raw_decode::packed::{clamp_rows, decode_rows, validate, DecodeOptions, Packing};

/// Drives a packing decoder over contiguous row bands of one image,
/// decoding bands concurrently when the packing allows it.
///
/// Bands never overlap in rows, so the pixel bytes need no locking; the
/// only shared mutable state is the buffer's error log. A band's failure
/// is appended there and does not poison its peers; the decode is fatal
/// only when every band failed.
#[derive(Debug, Clone)]
pub struct RowScheduler {
    workers: usize,
}

impl Default for RowScheduler {
    fn default() -> Self {
        Self {
            workers: rayon::current_num_threads(),
        }
    }
}

impl RowScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler with a fixed band count; one band decodes sequentially.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Decode `rows` declared rows of `packing` into the band of `image`
    /// starting at absolute row `oy`.
    pub fn decode(
        &self,
        packing: &Packing,
        input: &mut ByteCursor<'_>,
        image: &mut ImageBuffer,
        oy: usize,
        rows: usize,
        opts: &DecodeOptions,
    ) -> Result<()> {
        if rows == 0 {
            return Err(DecodeError::Internal(
                "row scheduler invoked with zero rows".into(),
            ));
        }
        let target = image.decode_parts_mut()?.band(oy, rows)?;
        self.decode_into(packing, input, target, rows, opts)
    }

    /// As [`RowScheduler::decode`], but filling `width` pixels per row
    /// starting at column `ox`.
    #[allow(clippy::too_many_arguments)]
    pub fn decode_at(
        &self,
        packing: &Packing,
        input: &mut ByteCursor<'_>,
        image: &mut ImageBuffer,
        ox: usize,
        oy: usize,
        width: usize,
        rows: usize,
        opts: &DecodeOptions,
    ) -> Result<()> {
        if rows == 0 {
            return Err(DecodeError::Internal(
                "row scheduler invoked with zero rows".into(),
            ));
        }
        let target = image
            .decode_parts_mut()?
            .band(oy, rows)?
            .columns(ox, width)?;
        self.decode_into(packing, input, target, rows, opts)
    }

    fn decode_into(
        &self,
        packing: &Packing,
        input: &mut ByteCursor<'_>,
        mut target: DecodeTarget<'_>,
        declared_rows: usize,
        opts: &DecodeOptions,
    ) -> Result<()> {
        validate(packing, &target)?;
        let bpr = packing.bytes_per_row(target.width, target.cpp);
        let rows = clamp_rows(input, bpr, declared_rows, target.errors)?;
        let bands = if packing.row_parallel() {
            rows.min(self.workers)
        } else {
            1
        };
        if bands <= 1 {
            return decode_rows(packing, input, &mut target, rows, opts);
        }

        let rows_per_band = rows.div_ceil(bands);
        let mut band_inputs = Vec::with_capacity(bands);
        for start in (0..rows).step_by(rows_per_band) {
            let n = rows_per_band.min(rows - start);
            band_inputs.push((start, n, input.sub(start * bpr, n * bpr)?));
        }
        let nbands = band_inputs.len();
        debug!("decoding {rows} rows in {nbands} bands of up to {rows_per_band} rows");

        let row_samples = target.row_samples;
        let width = target.width;
        let cpp = target.cpp;
        let col_origin = target.col_origin;
        let errors = target.errors;
        let table = target.table;
        let dither_seed = target.dither_seed;
        let row_origin = target.row_origin;
        let chunk_samples = rows_per_band * row_samples;

        let failures: usize = match target.pixels {
            PixelsMut::U16(px) => px[..rows * row_samples]
                .par_chunks_mut(chunk_samples)
                .zip(band_inputs.into_par_iter())
                .map(|(chunk, (start, n, mut band_input))| {
                    let mut band = DecodeTarget {
                        pixels: PixelsMut::U16(chunk),
                        row_samples,
                        width,
                        cpp,
                        col_origin,
                        errors,
                        table,
                        dither_seed,
                        row_origin: row_origin + start,
                    };
                    match decode_rows(packing, &mut band_input, &mut band, n, opts) {
                        Ok(()) => 0,
                        Err(e) => {
                            errors.push(e);
                            1
                        }
                    }
                })
                .sum(),
            PixelsMut::F32(px) => px[..rows * row_samples]
                .par_chunks_mut(chunk_samples)
                .zip(band_inputs.into_par_iter())
                .map(|(chunk, (start, n, mut band_input))| {
                    let mut band = DecodeTarget {
                        pixels: PixelsMut::F32(chunk),
                        row_samples,
                        width,
                        cpp,
                        col_origin,
                        errors,
                        table,
                        dither_seed,
                        row_origin: row_origin + start,
                    };
                    match decode_rows(packing, &mut band_input, &mut band, n, opts) {
                        Ok(()) => 0,
                        Err(e) => {
                            errors.push(e);
                            1
                        }
                    }
                })
                .sum(),
        };

        if failures == nbands {
            return Err(DecodeError::Io(format!(
                "all {nbands} row bands failed to decode"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw_decode::buffer::{ImageBuffer, ImageSpec, LookupTable};
    use crate::raw_decode::bytes::ByteRange;
    use crate::raw_decode::common::error::ErrorKind;

    fn decode_with_workers(
        workers: usize,
        packing: Packing,
        spec: &ImageSpec,
        data: &[u8],
        width: usize,
        height: usize,
    ) -> ImageBuffer {
        let mut buf = ImageBuffer::new(spec, width, height);
        buf.create_data().unwrap();
        let mut input = ByteRange::new(data).cursor();
        RowScheduler::with_workers(workers)
            .decode(
                &packing,
                &mut input,
                &mut buf,
                0,
                height,
                &DecodeOptions::default(),
            )
            .unwrap();
        buf
    }

    fn assert_same_pixels(a: &ImageBuffer, b: &ImageBuffer) {
        assert_eq!(a.height(), b.height());
        for y in 0..a.height() {
            assert_eq!(a.row_u16(y).unwrap(), b.row_u16(y).unwrap(), "row {y}");
        }
    }

    #[test]
    fn banded_decode_matches_sequential() {
        let width = 6;
        let height = 9;
        let bpr = Packing::Raw12BePacked.bytes_per_row(width, 1);
        let data: Vec<u8> = (0..bpr * height).map(|i| (i * 31 % 253) as u8).collect();
        let spec = ImageSpec::default();
        let sequential =
            decode_with_workers(1, Packing::Raw12BePacked, &spec, &data, width, height);
        let banded = decode_with_workers(4, Packing::Raw12BePacked, &spec, &data, width, height);
        assert_same_pixels(&sequential, &banded);
    }

    #[test]
    fn dithered_8bit_decode_is_worker_count_independent() {
        let width = 16;
        let height = 12;
        let data: Vec<u8> = (0..width * height).map(|i| (i % 251) as u8).collect();
        let curve: Vec<u16> = (0..256).map(|v| (v as u16) * 13).collect();
        let spec = ImageSpec::default()
            .with_table(LookupTable::new(&curve, true))
            .with_dither_seed(0xBEEF);
        let one = decode_with_workers(1, Packing::Raw8, &spec, &data, width, height);
        let many = decode_with_workers(5, Packing::Raw8, &spec, &data, width, height);
        assert_same_pixels(&one, &many);
    }

    #[test]
    fn truncation_is_clamped_before_banding() {
        let width = 10;
        let bpr = 2 * width;
        // 10 declared rows, input covers a little over 7.
        let data = vec![0u8; bpr * 7 + 5];
        let mut buf = ImageBuffer::new(&ImageSpec::default(), width, 10);
        buf.create_data().unwrap();
        let mut input = ByteRange::new(&data).cursor();
        RowScheduler::with_workers(4)
            .decode(
                &Packing::Raw16LeUnpacked,
                &mut input,
                &mut buf,
                0,
                10,
                &DecodeOptions::default(),
            )
            .unwrap();
        assert_eq!(buf.errors().len(), 1);
    }

    #[test]
    fn fails_only_when_every_band_fails() {
        // A 3-byte pitch cannot feed the 16-bit-word pump to the end of a
        // row, so every one-row band fails.
        let data = vec![0u8; 9];
        let mut buf = ImageBuffer::new(&ImageSpec::default(), 2, 3);
        buf.create_data().unwrap();
        let mut input = ByteRange::new(&data).cursor();
        let err = RowScheduler::with_workers(3)
            .decode(
                &Packing::Generic {
                    bit_order: crate::raw_decode::bytes::BitOrder::Msb16,
                    bits_per_pixel: 12,
                    input_pitch: 3,
                },
                &mut input,
                &mut buf,
                0,
                3,
                &DecodeOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(buf.errors().len(), 3);
    }

    #[test]
    fn degenerate_geometry_is_rejected_before_banding() {
        let data = vec![0u8; 64];
        let mut buf = ImageBuffer::new(&ImageSpec::default(), 1, 3);
        buf.create_data().unwrap();
        let mut input = ByteRange::new(&data).cursor();
        let err = RowScheduler::with_workers(3)
            .decode(
                &Packing::Raw12LePacked,
                &mut input,
                &mut buf,
                0,
                3,
                &DecodeOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(buf.errors().is_empty());
    }

    #[test]
    fn column_origin_leaves_other_columns_untouched() {
        let mut buf = ImageBuffer::new(&ImageSpec::default(), 8, 2);
        buf.create_data().unwrap();
        let mut data = Vec::new();
        for v in 1u16..=8 {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut input = ByteRange::new(&data).cursor();
        RowScheduler::with_workers(2)
            .decode_at(
                &Packing::Raw16LeUnpacked,
                &mut input,
                &mut buf,
                2,
                0,
                4,
                2,
                &DecodeOptions::default(),
            )
            .unwrap();
        assert_eq!(buf.row_u16(0).unwrap(), &[0, 0, 1, 2, 3, 4, 0, 0]);
        assert_eq!(buf.row_u16(1).unwrap(), &[0, 0, 5, 6, 7, 8, 0, 0]);
    }

    #[test]
    fn zero_rows_is_an_internal_error() {
        let data = [0u8; 4];
        let mut buf = ImageBuffer::new(&ImageSpec::default(), 2, 1);
        buf.create_data().unwrap();
        let mut input = ByteRange::new(&data).cursor();
        let err = RowScheduler::new()
            .decode(
                &Packing::Raw16LeUnpacked,
                &mut input,
                &mut buf,
                0,
                0,
                &DecodeOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
