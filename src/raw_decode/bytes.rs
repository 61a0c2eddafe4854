//! Bounds-checked byte access and bit-level readers over a mapped file.

mod cursor;
mod pump;

pub use cursor::{ByteCursor, ByteRange};
pub use pump::{BitOrder, BitPump, BitPumpMsb, BitPumpMsb16, BitPumpMsb32, BitPumpPlain};
