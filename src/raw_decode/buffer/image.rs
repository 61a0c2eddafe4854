use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::raw_decode::buffer::cfa::CfaPattern;
use crate::raw_decode::buffer::types::{BlackArea, ImageSpec, Rect, SampleType};
use crate::raw_decode::common::error::{DecodeError, Result};

/// Thread-safe append-only list of non-fatal decode errors.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<DecodeError>>,
}

impl ErrorLog {
    /// Append an entry. Never fails, even across a poisoned lock.
    pub fn push(&self, err: DecodeError) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<DecodeError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Output mapping for decoded samples, optionally dithering between
/// neighbouring curve entries to preserve sensor noise.
///
/// Entries pack a base value and the spread to dither over; a lookup in
/// dither mode perturbs within the spread using the caller's random state
/// and steps the state with a multiply-with-carry step.
#[derive(Debug, Clone)]
pub struct LookupTable {
    table: Vec<u32>,
    dither: bool,
}

impl LookupTable {
    /// Build from an output curve with one entry per input value.
    pub fn new(curve: &[u16], dither: bool) -> Self {
        let mut table = Vec::with_capacity(curve.len());
        for (i, &center) in curve.iter().enumerate() {
            if dither {
                let lower = if i > 0 { curve[i - 1] } else { center };
                let upper = curve.get(i + 1).copied().unwrap_or(center);
                let full = (i32::from(upper) - i32::from(lower)).max(0);
                let base = (i32::from(center) - full / 4).clamp(0, 0xffff) as u32;
                let spread = (full / 2) as u32;
                table.push(base | (spread << 16));
            } else {
                table.push(u32::from(center));
            }
        }
        Self { table, dither }
    }

    pub fn dither(&self) -> bool {
        self.dither
    }

    /// Map one sample. Values beyond the curve pass through unchanged.
    pub(crate) fn sample(&self, value: u16, random: &mut u32) -> u16 {
        let entry = match self.table.get(usize::from(value)) {
            Some(e) => *e,
            None => return value,
        };
        if !self.dither {
            return entry as u16;
        }
        let base = entry & 0xffff;
        let spread = entry >> 16;
        let r = *random;
        let pix = base + ((spread * (r & 2047) + 1024) >> 12);
        *random = 15700u32.wrapping_mul(r & 65535).wrapping_add(r >> 16);
        pix as u16
    }
}

/// Deterministic per-row dither state, so decoding is reproducible for
/// any row banding.
pub(crate) fn row_dither_state(seed: u32, row: u32) -> u32 {
    let mut z = seed ^ row.wrapping_mul(0x9E37_79B9);
    z ^= z >> 16;
    z = z.wrapping_mul(0x85EB_CA6B);
    z ^ (z >> 13)
}

#[derive(Debug)]
enum PixelData {
    Unallocated,
    U16(Vec<u16>),
    F32(Vec<f32>),
}

/// Mutable pixel storage handed to the packing decoders.
pub(crate) enum PixelsMut<'a> {
    U16(&'a mut [u16]),
    F32(&'a mut [f32]),
}

/// A writable view of consecutive image rows plus the shared decode
/// metadata. Bands over disjoint rows may be decoded concurrently.
pub(crate) struct DecodeTarget<'a> {
    pub pixels: PixelsMut<'a>,
    /// Samples per allocated row (pitch divided by sample size).
    pub row_samples: usize,
    /// Pixels per row to fill.
    pub width: usize,
    pub cpp: usize,
    /// First column to fill in every row.
    pub col_origin: usize,
    pub errors: &'a ErrorLog,
    pub table: Option<&'a LookupTable>,
    pub dither_seed: u32,
    /// Absolute index of the first row in this view.
    pub row_origin: usize,
}

impl<'a> DecodeTarget<'a> {
    /// Restrict the view to `rows` rows starting at `oy`.
    pub(crate) fn band(self, oy: usize, rows: usize) -> Result<DecodeTarget<'a>> {
        let start = oy * self.row_samples;
        let end = (oy + rows) * self.row_samples;
        let pixels = match self.pixels {
            PixelsMut::U16(px) => {
                if end > px.len() {
                    return Err(band_range_err(oy, rows));
                }
                PixelsMut::U16(&mut px[start..end])
            }
            PixelsMut::F32(px) => {
                if end > px.len() {
                    return Err(band_range_err(oy, rows));
                }
                PixelsMut::F32(&mut px[start..end])
            }
        };
        Ok(DecodeTarget {
            pixels,
            row_samples: self.row_samples,
            width: self.width,
            cpp: self.cpp,
            col_origin: self.col_origin,
            errors: self.errors,
            table: self.table,
            dither_seed: self.dither_seed,
            row_origin: self.row_origin + oy,
        })
    }

    /// Restrict the view to `width` pixels per row starting at column
    /// `ox`.
    pub(crate) fn columns(mut self, ox: usize, width: usize) -> Result<DecodeTarget<'a>> {
        if ox.checked_add(width).is_none_or(|end| end > self.width) {
            return Err(DecodeError::InvalidParameter(format!(
                "column window {ox}+{width} exceeds the {}-pixel row",
                self.width
            )));
        }
        self.col_origin += ox;
        self.width = width;
        Ok(self)
    }

    /// The buffer's sample writer, detached from this view so decoders
    /// can hold it while the pixel rows are mutably borrowed.
    pub(crate) fn lookup_writer(&self) -> LookupWriter<'a> {
        LookupWriter { table: self.table }
    }
}

/// Writes decoded samples through the buffer's configured lookup table.
pub(crate) struct LookupWriter<'a> {
    table: Option<&'a LookupTable>,
}

impl LookupWriter<'_> {
    /// Write an 8-bit sample through the lookup table, stepping the
    /// caller's dither state. Without a table the sample is widened
    /// unchanged.
    pub(crate) fn set_with_lookup(&self, sample: u8, dest: &mut u16, random: &mut u32) {
        match self.table {
            Some(t) => *dest = t.sample(u16::from(sample), random),
            None => *dest = u16::from(sample),
        }
    }
}

fn band_range_err(oy: usize, rows: usize) -> DecodeError {
    DecodeError::Internal(format!("row band {oy}+{rows} exceeds the image"))
}

/// Owned pixel storage with sensor metadata and a shared error log.
///
/// Decoders fill the buffer row by row; the caller reads the decoded
/// plane, the accumulated non-fatal errors and the CFA description.
#[derive(Debug)]
pub struct ImageBuffer {
    width: usize,
    height: usize,
    alloc_width: usize,
    alloc_height: usize,
    origin_x: usize,
    origin_y: usize,
    pitch: usize,
    sample_type: SampleType,
    cpp: usize,
    pub cfa: CfaPattern,
    pub black_level: Option<i32>,
    pub white_point: u32,
    pub black_level_separate: Option<[i32; 4]>,
    pub black_areas: Vec<BlackArea>,
    errors: ErrorLog,
    dither_seed: u32,
    table: Option<LookupTable>,
    data: PixelData,
}

impl ImageBuffer {
    pub fn new(spec: &ImageSpec, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            alloc_width: width,
            alloc_height: height,
            origin_x: 0,
            origin_y: 0,
            pitch: 0,
            sample_type: spec.sample_type,
            cpp: spec.components_per_pixel,
            cfa: spec.cfa.clone(),
            black_level: spec.black_level,
            white_point: u32::from(u16::MAX),
            black_level_separate: spec.black_level_separate,
            black_areas: spec.black_areas.clone(),
            errors: ErrorLog::default(),
            dither_seed: spec.dither_seed,
            table: spec.table.clone(),
            data: PixelData::Unallocated,
        }
    }

    /// Allocate zeroed pixel storage for the current dimensions.
    pub fn create_data(&mut self) -> Result<()> {
        if self.alloc_width == 0 || self.alloc_height == 0 || self.cpp == 0 {
            return Err(DecodeError::InvalidParameter(format!(
                "cannot allocate a {}x{} image with {} components",
                self.alloc_width, self.alloc_height, self.cpp
            )));
        }
        let bps = self.sample_type.bytes_per_sample();
        let row_bytes = self
            .alloc_width
            .checked_mul(self.cpp)
            .and_then(|n| n.checked_mul(bps))
            .ok_or_else(|| DecodeError::InvalidParameter("image row size overflows".into()))?;
        // Rows are padded to a 16-byte pitch.
        let pitch = row_bytes
            .checked_add(15)
            .ok_or_else(|| DecodeError::InvalidParameter("image row size overflows".into()))?
            & !15;
        let samples = (pitch / bps)
            .checked_mul(self.alloc_height)
            .ok_or_else(|| DecodeError::InvalidParameter("image size overflows".into()))?;
        self.pitch = pitch;
        debug!(
            "allocating {}x{} image, pitch {} bytes",
            self.alloc_width, self.alloc_height, pitch
        );
        self.data = match self.sample_type {
            SampleType::U16 => PixelData::U16(vec![0; samples]),
            SampleType::F32 => PixelData::F32(vec![0.0; samples]),
        };
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per allocated row.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn components_per_pixel(&self) -> usize {
        self.cpp
    }

    pub fn is_allocated(&self) -> bool {
        !matches!(self.data, PixelData::Unallocated)
    }

    fn row_samples(&self) -> usize {
        self.pitch / self.sample_type.bytes_per_sample()
    }

    /// Append a non-fatal error. Never fails.
    pub fn set_error(&self, err: DecodeError) {
        self.errors.push(err);
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn set_table(&mut self, table: LookupTable) {
        self.table = Some(table);
    }

    pub fn set_dither_seed(&mut self, seed: u32) {
        self.dither_seed = seed;
    }

    /// Restrict the active region to `rect` (relative to the current
    /// region) without reallocating. Out-of-range crops are recorded on
    /// the error log and skipped. Callers must realign the CFA when the
    /// origin moves by an odd amount.
    pub fn sub_frame(&mut self, rect: Rect) {
        let fits = rect
            .x
            .checked_add(rect.width)
            .is_some_and(|r| r <= self.width)
            && rect
                .y
                .checked_add(rect.height)
                .is_some_and(|b| b <= self.height);
        if !fits || rect.width == 0 || rect.height == 0 {
            self.set_error(DecodeError::InvalidParameter(format!(
                "crop {}x{}+{}+{} outside the {}x{} image, crop skipped",
                rect.width, rect.height, rect.x, rect.y, self.width, self.height
            )));
            return;
        }
        self.origin_x += rect.x;
        self.origin_y += rect.y;
        self.width = rect.width;
        self.height = rect.height;
    }

    /// One active row of a 16-bit image, `width * cpp` samples.
    pub fn row_u16(&self, y: usize) -> Option<&[u16]> {
        if y >= self.height {
            return None;
        }
        match &self.data {
            PixelData::U16(v) => {
                let base = (self.origin_y + y) * self.row_samples() + self.origin_x * self.cpp;
                v.get(base..base + self.width * self.cpp)
            }
            _ => None,
        }
    }

    /// One active row of a float image, `width * cpp` samples.
    pub fn row_f32(&self, y: usize) -> Option<&[f32]> {
        if y >= self.height {
            return None;
        }
        match &self.data {
            PixelData::F32(v) => {
                let base = (self.origin_y + y) * self.row_samples() + self.origin_x * self.cpp;
                v.get(base..base + self.width * self.cpp)
            }
            _ => None,
        }
    }

    /// The full uncropped plane split into the parts decoding needs:
    /// writable pixels plus the shared metadata.
    pub(crate) fn decode_parts_mut(&mut self) -> Result<DecodeTarget<'_>> {
        let row_samples = self.row_samples();
        let width = self.alloc_width;
        let cpp = self.cpp;
        let dither_seed = self.dither_seed;
        let Self {
            data,
            errors,
            table,
            ..
        } = self;
        let pixels = match data {
            PixelData::U16(v) => PixelsMut::U16(v.as_mut_slice()),
            PixelData::F32(v) => PixelsMut::F32(v.as_mut_slice()),
            PixelData::Unallocated => {
                return Err(DecodeError::Internal(
                    "image data is not allocated".to_string(),
                ))
            }
        };
        Ok(DecodeTarget {
            pixels,
            row_samples,
            width,
            cpp,
            col_origin: 0,
            errors,
            table: table.as_ref(),
            dither_seed,
            row_origin: 0,
        })
    }
}
