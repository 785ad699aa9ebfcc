//! Bit-granular byte buffers for the codec's wire format.
//!
//! [`BitBufferWriter`] owns a fixed-capacity, zero-initialized byte array and
//! appends values MSB-first, byte index ascending. [`BitBufferReader`]
//! consumes a byte region the same way. Both track `bits_available` so a
//! caller can always tell how much room is left without attempting a write
//! or read that might fail.

use crate::error::{CodecError, Result};

/// Writes arbitrary-width unsigned integers into a fixed-capacity byte
/// buffer, most-significant-bit first, bytes filled in ascending order.
#[derive(Debug, Clone)]
pub struct BitBufferWriter {
    buffer: Vec<u8>,
    byte_index: usize,
    bits_remaining_in_current_byte: u8,
    bits_available: u64,
    bits_written: u64,
}

impl BitBufferWriter {
    /// Create an empty (all-zero) writer with the given fixed capacity in
    /// bytes. The writer never grows past this capacity.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity_bytes],
            byte_index: 0,
            bits_remaining_in_current_byte: 8,
            bits_available: (capacity_bytes as u64) * 8,
            bits_written: 0,
        }
    }

    /// Bits still free to write.
    pub fn bits_available(&self) -> u64 {
        self.bits_available
    }

    /// Bits actually written so far. A buffer is almost always larger than
    /// the data it ends up holding (fixed capacity is sized up front), so
    /// this is the bound a reader must be given back — not the buffer's
    /// full byte length, which is zero-padded past the real content and
    /// would otherwise decode as spurious trailing samples.
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    /// `bits_written`, rounded up to a whole number of bytes.
    pub fn bytes_written(&self) -> usize {
        ((self.bits_written + 7) / 8) as usize
    }

    /// Total buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Write the low `num_bits` bits of `value`, most-significant bit
    /// first. `num_bits` must be in `1..=64`; callers must not pass 0.
    pub fn write_bits(&mut self, value: u64, num_bits: u32) -> Result<()> {
        debug_assert!((1..=64).contains(&num_bits), "num_bits out of range");

        if u64::from(num_bits) > self.bits_available {
            return Err(CodecError::BufferFull {
                requested: num_bits,
                available: self.bits_available,
            });
        }

        for i in (0..num_bits).rev() {
            let bit = (value >> i) & 1 == 1;
            self.write_bit(bit);
        }
        self.bits_available -= u64::from(num_bits);
        self.bits_written += u64::from(num_bits);
        Ok(())
    }

    /// Write a single bit. Infallible: callers (`write_bits`) are
    /// responsible for pre-checking capacity so this never runs past the
    /// buffer.
    #[inline]
    fn write_bit(&mut self, bit: bool) {
        if self.bits_remaining_in_current_byte == 0 {
            self.byte_index += 1;
            self.bits_remaining_in_current_byte = 8;
        }
        if bit {
            self.buffer[self.byte_index] |= 1 << (self.bits_remaining_in_current_byte - 1);
        }
        self.bits_remaining_in_current_byte -= 1;
    }

    /// Consume the writer, returning the full fixed-capacity byte buffer
    /// (bytes past the last write remain zero).
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Borrow the bytes written so far without consuming the writer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

/// Reads arbitrary-width unsigned integers out of a byte region,
/// most-significant-bit first, bytes consumed in ascending order.
#[derive(Debug, Clone)]
pub struct BitBufferReader {
    data: Vec<u8>,
    byte_index: usize,
    bits_remaining_in_current_byte: u8,
    bits_available: u64,
}

impl BitBufferReader {
    /// Create a reader over a byte region of known length.
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            byte_index: 0,
            bits_remaining_in_current_byte: 8,
            bits_available: (data.len() as u64) * 8,
        }
    }

    /// Create a reader over `data`, but only the first `bit_limit` bits are
    /// considered available, regardless of how many bytes `data` holds.
    ///
    /// Use this when `data` is a fixed-capacity buffer sized larger than
    /// what was actually written (the normal case for a writer created with
    /// a generous capacity): bounding by the writer's own `bits_written`
    /// stops a reader exactly at the real content instead of continuing
    /// into zero-padding, which would otherwise decode as spurious trailing
    /// samples (a zero bit is a valid "unchanged" marker for both the
    /// timestamp and value codecs).
    pub fn with_bit_limit(data: &[u8], bit_limit: u64) -> Self {
        let bits_available = bit_limit.min((data.len() as u64) * 8);
        Self {
            data: data.to_vec(),
            byte_index: 0,
            bits_remaining_in_current_byte: 8,
            bits_available,
        }
    }

    /// Bits not yet consumed.
    pub fn bits_available(&self) -> u64 {
        self.bits_available
    }

    /// Read `num_bits` bits (`1..=64`) and return them as the low bits of a
    /// `u64`.
    pub fn read_bits(&mut self, num_bits: u32) -> Result<u64> {
        debug_assert!((1..=64).contains(&num_bits), "num_bits out of range");

        if u64::from(num_bits) > self.bits_available {
            return Err(CodecError::BufferEmpty {
                requested: num_bits,
                available: self.bits_available,
            });
        }

        let mut value: u64 = 0;
        for _ in 0..num_bits {
            value = (value << 1) | u64::from(self.read_bit());
        }
        self.bits_available -= u64::from(num_bits);
        Ok(value)
    }

    /// Read a single bit. Infallible: `read_bits` pre-checks capacity.
    #[inline]
    fn read_bit(&mut self) -> bool {
        if self.bits_remaining_in_current_byte == 0 {
            self.byte_index += 1;
            self.bits_remaining_in_current_byte = 8;
        }
        let byte = self.data[self.byte_index];
        let bit = (byte >> (self.bits_remaining_in_current_byte - 1)) & 1 == 1;
        self.bits_remaining_in_current_byte -= 1;
        bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrip() {
        let mut w = BitBufferWriter::new(8);
        w.write_bits(0b1, 1).unwrap();
        w.write_bits(0b0, 1).unwrap();
        w.write_bits(0b1, 1).unwrap();
        w.write_bits(0b1010_1010, 8).unwrap();
        w.write_bits(0xFF, 8).unwrap();
        let bytes = w.into_bytes();

        let mut r = BitBufferReader::new(&bytes);
        assert_eq!(r.read_bits(1).unwrap(), 1);
        assert_eq!(r.read_bits(1).unwrap(), 0);
        assert_eq!(r.read_bits(1).unwrap(), 1);
        assert_eq!(r.read_bits(8).unwrap(), 0b1010_1010);
        assert_eq!(r.read_bits(8).unwrap(), 0xFF);
    }

    #[test]
    fn crosses_byte_boundaries() {
        let mut w = BitBufferWriter::new(8);
        w.write_bits(0b111, 3).unwrap();
        w.write_bits(0b10101, 5).unwrap();
        w.write_bits(0xABCD, 16).unwrap();
        w.write_bits(0xDEAD_BEEF, 32).unwrap();
        let bytes = w.into_bytes();

        let mut r = BitBufferReader::new(&bytes);
        assert_eq!(r.read_bits(3).unwrap(), 0b111);
        assert_eq!(r.read_bits(5).unwrap(), 0b10101);
        assert_eq!(r.read_bits(16).unwrap(), 0xABCD);
        assert_eq!(r.read_bits(32).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn full_capacity_write_succeeds_one_more_bit_fails() {
        let mut w = BitBufferWriter::new(1);
        w.write_bits(0xFF, 8).unwrap();
        assert_eq!(w.bits_available(), 0);
        let err = w.write_bits(1, 1).unwrap_err();
        assert!(matches!(err, CodecError::BufferFull { .. }));
    }

    #[test]
    fn over_length_read_fails_without_corrupting_state() {
        let mut w = BitBufferWriter::new(1);
        w.write_bits(0b1010_1010, 8).unwrap();
        let bytes = w.into_bytes();

        let mut r = BitBufferReader::new(&bytes);
        assert_eq!(r.read_bits(4).unwrap(), 0b1010);
        let err = r.read_bits(8).unwrap_err();
        assert!(matches!(err, CodecError::BufferEmpty { .. }));
        // The 4 bits already consumed remain readable in sequence from a
        // fresh reader: re-decoding the untouched source bytes still works.
        let mut r2 = BitBufferReader::new(&bytes);
        assert_eq!(r2.read_bits(8).unwrap(), 0b1010_1010);
    }

    #[test]
    fn bit_limited_reader_stops_before_trailing_zero_padding() {
        // A writer over-provisioned relative to what it actually holds: 3
        // bits written into an 8-byte (64-bit) buffer. Without bounding,
        // a reader would happily keep reading the trailing zero bytes.
        let mut w = BitBufferWriter::new(8);
        w.write_bits(0b101, 3).unwrap();
        assert_eq!(w.bits_written(), 3);
        assert_eq!(w.bytes_written(), 1);
        let bits_written = w.bits_written();
        let bytes = w.into_bytes();

        let mut r = BitBufferReader::with_bit_limit(&bytes, bits_written);
        assert_eq!(r.read_bits(3).unwrap(), 0b101);
        let err = r.read_bits(1).unwrap_err();
        assert!(matches!(err, CodecError::BufferEmpty { .. }));
    }

    #[test]
    fn bits_available_is_non_increasing() {
        let mut w = BitBufferWriter::new(4);
        let mut last = w.bits_available();
        for n in [1u32, 3, 7, 2, 5, 6, 8] {
            w.write_bits(0, n).unwrap();
            let now = w.bits_available();
            assert!(now <= last);
            last = now;
        }
    }

    #[test]
    fn all_bit_widths_roundtrip_at_every_starting_offset() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for start_offset in 0..8u32 {
            for n in 1..=64u32 {
                let mut w = BitBufferWriter::new(16);
                if start_offset > 0 {
                    w.write_bits(0, start_offset).unwrap();
                }
                let max = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
                let value: u64 = rng.gen_range(0..=max);
                w.write_bits(value, n).unwrap();
                let bytes = w.into_bytes();

                let mut r = BitBufferReader::new(&bytes);
                if start_offset > 0 {
                    r.read_bits(start_offset).unwrap();
                }
                assert_eq!(r.read_bits(n).unwrap(), value, "n={n} offset={start_offset}");
            }
        }
    }
}
