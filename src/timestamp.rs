//! Delta-of-delta timestamp encoding with a five-pattern prefix code.
//!
//! Most real-world sampling is periodic, so consecutive deltas between
//! quantized timestamps are usually identical. The encoder tracks the
//! previous delta and emits only the *change* in delta (the
//! delta-of-delta), using the shortest prefix code for small changes and
//! falling back to a 64-bit absolute timestamp when the change is too
//! large to bucket.

use crate::bitbuffer::{BitBufferReader, BitBufferWriter};
use crate::error::{CodecError, Result};

/// 5-bit marker that escapes to a full 64-bit absolute timestamp.
const FULL_TS_PATTERN: u64 = 0b11111;
const FULL_TS_PATTERN_BITS: u32 = 5;

/// Delta-of-delta reset baseline used for the sample right after a full
/// timestamp (the first sample of a stream, or after an escape).
const DEFAULT_DELTA: i64 = 10;

struct Bucket {
    pattern: u64,
    pattern_bits: u32,
    max_delta: u64,
    delta_bits: u32,
}

const BUCKETS: [Bucket; 4] = [
    Bucket { pattern: 0b10, pattern_bits: 2, max_delta: 0x3F, delta_bits: 7 },
    Bucket { pattern: 0b110, pattern_bits: 3, max_delta: 0xFF, delta_bits: 9 },
    Bucket { pattern: 0b1110, pattern_bits: 4, max_delta: 0x7FF, delta_bits: 12 },
    Bucket { pattern: 0b11110, pattern_bits: 5, max_delta: 0x7FFF_FFFF, delta_bits: 32 },
];

/// Time precision: the wire quantum is `10^time_precision_power` ns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeConfig {
    time_precision_power: u8,
}

impl TimeConfig {
    /// Construct a `TimeConfig`, rejecting a power outside `[0, 9]`.
    pub fn new(time_precision_power: u8) -> Result<Self> {
        if time_precision_power > 9 {
            return Err(CodecError::InvalidConfig(format!(
                "time_precision_power must be in [0, 9], got {time_precision_power}"
            )));
        }
        Ok(Self { time_precision_power })
    }

    pub fn time_precision_power(&self) -> u8 {
        self.time_precision_power
    }

    /// `10^time_precision_power`, the smallest representable time
    /// increment in nanoseconds.
    pub fn time_divisor(&self) -> i64 {
        10i64.pow(u32::from(self.time_precision_power))
    }
}

/// Round `t` (nanoseconds) to the nearest multiple of `divisor`, half-up,
/// computed entirely in integer arithmetic so 64-bit timestamps never lose
/// precision to a floating-point division.
fn quantize(t: i64, divisor: i64) -> i64 {
    if divisor == 1 {
        return t;
    }
    let q = t / divisor;
    let remainder = (t % divisor).abs();
    let tail_scale = divisor / 10;
    let leading_digit = (remainder / tail_scale) % 10;
    if leading_digit >= 5 {
        q + t.signum().max(1)
    } else {
        q
    }
}

/// Stateful encoder for one stream's quantized timestamp channel.
#[derive(Debug, Clone)]
pub struct TimestampEncoder {
    config: TimeConfig,
    first: bool,
    previous_quantized_timestamp: i64,
    previous_delta: i64,
}

impl TimestampEncoder {
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            first: true,
            previous_quantized_timestamp: 0,
            previous_delta: DEFAULT_DELTA,
        }
    }

    /// Quantize and encode the next timestamp, writing into `buf`. Returns
    /// the quantized timestamp that was encoded.
    pub fn encode(&mut self, buf: &mut BitBufferWriter, timestamp: i64) -> Result<i64> {
        let q = quantize(timestamp, self.config.time_divisor());

        if self.first {
            buf.write_bits(FULL_TS_PATTERN, FULL_TS_PATTERN_BITS)?;
            buf.write_bits(q as u64, 64)?;
            self.previous_quantized_timestamp = q;
            self.previous_delta = DEFAULT_DELTA;
            self.first = false;
            return Ok(q);
        }

        let delta = q - self.previous_quantized_timestamp;
        let dod = delta - self.previous_delta;

        if dod == 0 {
            buf.write_bits(0, 1)?;
        } else {
            let shifted = dod - dod.signum();
            let magnitude = shifted.unsigned_abs();
            let sign_bit = u64::from(dod <= 0);

            match BUCKETS.iter().position(|b| magnitude <= b.max_delta) {
                Some(i) => {
                    let bucket = &BUCKETS[i];
                    buf.write_bits(bucket.pattern, bucket.pattern_bits)?;
                    buf.write_bits(sign_bit, 1)?;
                    buf.write_bits(magnitude, bucket.delta_bits - 1)?;
                }
                None => {
                    buf.write_bits(FULL_TS_PATTERN, FULL_TS_PATTERN_BITS)?;
                    buf.write_bits(q as u64, 64)?;
                    self.previous_quantized_timestamp = q;
                    self.previous_delta = DEFAULT_DELTA;
                    tracing::debug!(timestamp = q, "timestamp delta-of-delta escaped to full timestamp");
                    return Ok(q);
                }
            }
        }

        self.previous_quantized_timestamp = q;
        self.previous_delta = delta;
        Ok(q)
    }
}

/// Stateful decoder symmetric to [`TimestampEncoder`].
#[derive(Debug, Clone)]
pub struct TimestampDecoder {
    config: TimeConfig,
    first: bool,
    previous_quantized_timestamp: i64,
    previous_delta: i64,
}

impl TimestampDecoder {
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            first: true,
            previous_quantized_timestamp: 0,
            previous_delta: DEFAULT_DELTA,
        }
    }

    /// Decode the next timestamp from `buf`, returning the dequantized
    /// value (`q * 10^time_precision_power`).
    pub fn decode(&mut self, buf: &mut BitBufferReader) -> Result<i64> {
        if self.first {
            let marker = buf.read_bits(FULL_TS_PATTERN_BITS)?;
            if marker != FULL_TS_PATTERN {
                return Err(CodecError::CorruptStream(format!(
                    "expected full-timestamp marker {FULL_TS_PATTERN:#07b}, found {marker:#07b}"
                )));
            }
            let q = buf.read_bits(64)? as i64;
            self.previous_quantized_timestamp = q;
            self.previous_delta = DEFAULT_DELTA;
            self.first = false;
            return Ok(q * self.config.time_divisor());
        }

        let first_bit = buf.read_bits(1)?;
        let q = if first_bit == 0 {
            self.previous_quantized_timestamp + self.previous_delta
        } else {
            let mut run_length = 1u32;
            while run_length < 5 {
                let bit = buf.read_bits(1)?;
                if bit == 0 {
                    break;
                }
                run_length += 1;
            }

            if run_length == 5 {
                let q = buf.read_bits(64)? as i64;
                self.previous_delta = DEFAULT_DELTA;
                tracing::debug!(timestamp = q, "decoded full-timestamp escape");
                self.previous_quantized_timestamp = q;
                return Ok(q * self.config.time_divisor());
            }

            let bucket = &BUCKETS[(run_length - 1) as usize];
            let sign_bit = buf.read_bits(1)?;
            let magnitude = buf.read_bits(bucket.delta_bits - 1)? as i64;
            // Undo zero-gap removal: encode stored sign(dod) and |dod| - 1.
            let dod = if sign_bit == 1 { -magnitude - 1 } else { magnitude + 1 };
            let delta = self.previous_delta + dod;
            self.previous_quantized_timestamp + delta
        };

        let delta = q - self.previous_quantized_timestamp;
        self.previous_delta = delta;
        self.previous_quantized_timestamp = q;
        Ok(q * self.config.time_divisor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(config: TimeConfig, inputs: &[i64]) -> Vec<i64> {
        let mut w = BitBufferWriter::new(4096);
        let mut enc = TimestampEncoder::new(config);
        for &t in inputs {
            enc.encode(&mut w, t).unwrap();
        }
        let bytes = w.into_bytes();
        let mut r = BitBufferReader::new(&bytes);
        let mut dec = TimestampDecoder::new(config);
        inputs.iter().map(|_| dec.decode(&mut r).unwrap()).collect()
    }

    #[test]
    fn scenario_constant_quantum_passthrough() {
        let config = TimeConfig::new(2).unwrap();
        let inputs = [100, 50, 40, 300, 300, 400, 800, 800_012, 1_422_568_543_752_950_000];
        let expected = [100, 100, 0, 300, 300, 400, 800, 800_000, 1_422_568_543_752_950_000];
        assert_eq!(roundtrip(config, &inputs), expected);
    }

    #[test]
    fn alternating_sign_delta_of_delta() {
        let config = TimeConfig::new(0).unwrap();
        let inputs = [0, 10, 25, 35, 55];
        assert_eq!(roundtrip(config, &inputs), inputs);
    }

    #[test]
    fn two_escapes_in_one_stream_reset_baseline_symmetrically() {
        let config = TimeConfig::new(0).unwrap();
        // Two deliberately huge jumps, each forcing an escape.
        let inputs = [0, 10, 20, 10_000_000_000, 10_000_000_010, 1, 2];
        assert_eq!(roundtrip(config, &inputs), inputs);
    }

    #[test]
    fn bucket_boundary_exact_max_delta_fits_its_own_bucket() {
        // After zero-gap removal, magnitude exactly 0x3F must land in bucket 0.
        let config = TimeConfig::new(0).unwrap();
        let inputs: Vec<i64> = vec![0, 10, 20, 20 + 10 + (0x3F + 1)];
        assert_eq!(roundtrip(config, &inputs), inputs);
    }

    #[test]
    fn first_sample_decode_rejects_missing_full_timestamp_marker_without_panicking() {
        // An unwritten (zero-filled) region decodes to an all-zero marker,
        // not the 0b11111 full-timestamp escape: this must return an error,
        // never panic, even in a debug build.
        let config = TimeConfig::new(0).unwrap();
        let bytes = vec![0u8; 64];
        let mut r = BitBufferReader::new(&bytes);
        let mut dec = TimestampDecoder::new(config);
        let err = dec.decode(&mut r).unwrap_err();
        assert!(matches!(err, CodecError::CorruptStream(_)));
    }

    #[test]
    fn quantize_half_up_without_floating_point() {
        assert_eq!(quantize(149, 100), 100);
        assert_eq!(quantize(150, 100), 200);
        assert_eq!(quantize(0, 100), 0);
        assert_eq!(quantize(99, 100), 100);
        assert_eq!(quantize(49, 100), 0);
    }

    #[test]
    fn unchanged_delta_run_costs_one_bit_each() {
        let config = TimeConfig::new(0).unwrap();
        let mut w = BitBufferWriter::new(4096);
        let mut enc = TimestampEncoder::new(config);
        enc.encode(&mut w, 0).unwrap();
        enc.encode(&mut w, 10).unwrap(); // establishes delta=10
        let before = w.bits_available();
        for i in 2..102 {
            enc.encode(&mut w, i * 10).unwrap();
        }
        let after = w.bits_available();
        assert_eq!(before - after, 100);
    }
}
