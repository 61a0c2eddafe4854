//! Uncompressed camera RAW decoding engine.
//!
//! Materialises sensor samples from a mapped file region into a 16-bit
//! (or 32-bit float) image buffer: bounds-checked, endian-aware,
//! bit-accurate unpacking over a catalogue of fixed packings, with
//! multi-slice stitching, per-slice failure isolation and parallel row
//! decoding.

pub mod logger;
pub mod raw_decode;
