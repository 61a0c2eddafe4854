//! RAW sensor image decoding engine.
//!
//! Consumes a validated byte range plus a packing description and
//! produces a populated image buffer and a list of non-fatal errors.
//! Container parsing, camera database lookup and compressed vendor
//! codecs live outside this module.

pub mod assemble;
pub mod buffer;
pub mod bytes;
pub mod common;
pub mod packed;
pub mod parallel;


pub use assemble::{SliceAssembler, SliceDescriptor, UncompressedLayout};
pub use buffer::{
    BlackArea, CfaColor, CfaPattern, ErrorLog, ImageBuffer, ImageSpec, LookupTable, Rect,
    SampleType,
};
pub use bytes::{
    BitOrder, BitPump, BitPumpMsb, BitPumpMsb16, BitPumpMsb32, BitPumpPlain, ByteCursor, ByteRange,
};
pub use common::{DecodeError, ErrorKind, Result};
pub use packed::{DecodeOptions, Packing};
pub use parallel::RowScheduler;
