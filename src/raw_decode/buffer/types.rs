use crate::raw_decode::buffer::cfa::CfaPattern;
use crate::raw_decode::buffer::image::LookupTable;

/// Pixel sample representation of an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U16,
    F32,
}

impl SampleType {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleType::U16 => 2,
            SampleType::F32 => 4,
        }
    }
}

/// Rectangle in pixel coordinates, used for cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Masked sensor region used for black level estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlackArea {
    /// Vertical areas span columns `[offset, offset + size)`; horizontal
    /// areas span rows.
    pub vertical: bool,
    pub offset: usize,
    pub size: usize,
}

/// Static description of the target image buffer: how samples are stored
/// and the sensor metadata carried alongside the pixels.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    pub sample_type: SampleType,
    /// 1 for CFA sensors, 3 for linear RGB.
    pub components_per_pixel: usize,
    pub cfa: CfaPattern,
    pub black_level: Option<i32>,
    /// Per-CFA-site black levels, in pattern order.
    pub black_level_separate: Option<[i32; 4]>,
    pub black_areas: Vec<BlackArea>,
    /// Output mapping for the 8-bit decode path.
    pub table: Option<LookupTable>,
    /// Seed for the dithering random state.
    pub dither_seed: u32,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            sample_type: SampleType::U16,
            components_per_pixel: 1,
            cfa: CfaPattern::rggb(),
            black_level: None,
            black_level_separate: None,
            black_areas: Vec::new(),
            table: None,
            dither_seed: 0,
        }
    }
}

impl ImageSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    pub fn with_components_per_pixel(mut self, cpp: usize) -> Self {
        self.components_per_pixel = cpp;
        self
    }

    pub fn with_cfa(mut self, cfa: CfaPattern) -> Self {
        self.cfa = cfa;
        self
    }

    pub fn with_black_level(mut self, level: i32) -> Self {
        self.black_level = Some(level);
        self
    }

    pub fn with_table(mut self, table: LookupTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_dither_seed(mut self, seed: u32) -> Self {
        self.dither_seed = seed;
        self
    }
}
