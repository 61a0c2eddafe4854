use crate::raw_decode::bytes::cursor::ByteCursor;
use crate::raw_decode::common::error::{DecodeError, Result};

/// Bit layout of a packed stream; selects the pump variant driving the
/// generic packing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// LSB-first bitstream, byte granularity.
    Plain,
    /// MSB-first bitstream, byte granularity.
    Msb,
    /// MSB-first within 16-bit little-endian words.
    Msb16,
    /// MSB-first within 32-bit little-endian words.
    Msb32,
}

/// Streaming bit reader over a [`ByteCursor`].
///
/// Exhaustion of the underlying cursor is an error, never zero padding.
/// Pumps that refill in words wider than a byte require the remaining
/// input to cover a whole refill unit.
pub trait BitPump {
    /// The next `n` bits (`n <= 32`) as an unsigned integer, MSB-first for
    /// the MSB variants and LSB-first for the plain variant.
    fn get_bits(&mut self, n: u32) -> Result<u32>;

    /// Advance `n` bits without producing output.
    fn skip_bits(&mut self, n: u32) -> Result<()> {
        let mut left = n;
        while left > 0 {
            let step = left.min(16);
            self.get_bits(step)?;
            left -= step;
        }
        Ok(())
    }

    /// Report whether a refill already ran out of input. Decoders call
    /// this between rows so a mid-row truncation surfaces early.
    fn check_position(&self) -> Result<()>;
}

fn mask(n: u32) -> u32 {
    ((1u64 << n) - 1) as u32
}

fn exhausted_err() -> DecodeError {
    DecodeError::Truncated("bit stream exhausted".to_string())
}

/// MSB-first pump refilling one byte at a time.
#[derive(Debug)]
pub struct BitPumpMsb<'a> {
    cursor: ByteCursor<'a>,
    buf: u64,
    count: u32,
    exhausted: bool,
}

impl<'a> BitPumpMsb<'a> {
    pub fn new(cursor: ByteCursor<'a>) -> Self {
        Self {
            cursor,
            buf: 0,
            count: 0,
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        let b = self.cursor.read_u8().inspect_err(|_| self.exhausted = true)?;
        self.buf = (self.buf << 8) | u64::from(b);
        self.count += 8;
        Ok(())
    }
}

impl BitPump for BitPumpMsb<'_> {
    fn get_bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(0);
        }
        while self.count < n {
            self.refill()?;
        }
        self.count -= n;
        Ok((self.buf >> self.count) as u32 & mask(n))
    }

    fn check_position(&self) -> Result<()> {
        if self.exhausted {
            Err(exhausted_err())
        } else {
            Ok(())
        }
    }
}

/// MSB-first pump refilling 16-bit little-endian words, so byte pairs are
/// swapped relative to [`BitPumpMsb`].
#[derive(Debug)]
pub struct BitPumpMsb16<'a> {
    cursor: ByteCursor<'a>,
    buf: u64,
    count: u32,
    exhausted: bool,
}

impl<'a> BitPumpMsb16<'a> {
    pub fn new(cursor: ByteCursor<'a>) -> Self {
        Self {
            cursor,
            buf: 0,
            count: 0,
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        let w = self
            .cursor
            .read_u16_le()
            .inspect_err(|_| self.exhausted = true)?;
        self.buf = (self.buf << 16) | u64::from(w);
        self.count += 16;
        Ok(())
    }
}

impl BitPump for BitPumpMsb16<'_> {
    fn get_bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(0);
        }
        while self.count < n {
            self.refill()?;
        }
        self.count -= n;
        Ok((self.buf >> self.count) as u32 & mask(n))
    }

    fn check_position(&self) -> Result<()> {
        if self.exhausted {
            Err(exhausted_err())
        } else {
            Ok(())
        }
    }
}

/// MSB-first pump refilling 32-bit little-endian words.
#[derive(Debug)]
pub struct BitPumpMsb32<'a> {
    cursor: ByteCursor<'a>,
    buf: u64,
    count: u32,
    exhausted: bool,
}

impl<'a> BitPumpMsb32<'a> {
    pub fn new(cursor: ByteCursor<'a>) -> Self {
        Self {
            cursor,
            buf: 0,
            count: 0,
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        let w = self
            .cursor
            .read_u32_le()
            .inspect_err(|_| self.exhausted = true)?;
        self.buf = (self.buf << 32) | u64::from(w);
        self.count += 32;
        Ok(())
    }
}

impl BitPump for BitPumpMsb32<'_> {
    fn get_bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(0);
        }
        while self.count < n {
            self.refill()?;
        }
        self.count -= n;
        Ok((self.buf >> self.count) as u32 & mask(n))
    }

    fn check_position(&self) -> Result<()> {
        if self.exhausted {
            Err(exhausted_err())
        } else {
            Ok(())
        }
    }
}

/// LSB-first pump refilling one byte at a time. Callers keep `n <= 25` so
/// a refill never overflows the bit buffer headroom guaranteed here.
#[derive(Debug)]
pub struct BitPumpPlain<'a> {
    cursor: ByteCursor<'a>,
    buf: u64,
    count: u32,
    exhausted: bool,
}

impl<'a> BitPumpPlain<'a> {
    pub fn new(cursor: ByteCursor<'a>) -> Self {
        Self {
            cursor,
            buf: 0,
            count: 0,
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        let b = self.cursor.read_u8().inspect_err(|_| self.exhausted = true)?;
        self.buf |= u64::from(b) << self.count;
        self.count += 8;
        Ok(())
    }
}

impl BitPump for BitPumpPlain<'_> {
    fn get_bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 25);
        if n == 0 {
            return Ok(0);
        }
        while self.count < n {
            self.refill()?;
        }
        let out = self.buf as u32 & mask(n);
        self.buf >>= n;
        self.count -= n;
        Ok(out)
    }

    fn check_position(&self) -> Result<()> {
        if self.exhausted {
            Err(exhausted_err())
        } else {
            Ok(())
        }
    }
}
