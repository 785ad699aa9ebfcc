//! A single-channel stream: one [`TimestampEncoder`]/[`TimestampDecoder`]
//! plus one [`ValueEncoder`]/[`ValueDecoder`] sharing a bit buffer.
//!
//! There is no header — the time and value configuration are carried
//! out-of-band and supplied identically to the writer and the reader.

use crate::bitbuffer::{BitBufferReader, BitBufferWriter};
use crate::error::Result;
use crate::timestamp::{TimeConfig, TimestampDecoder, TimestampEncoder};
use crate::value::{ValueDecoder, ValueEncoder, ValueTypeDefinition};

/// One reconstructed (timestamp, value) sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

/// Writes a single-channel time series into a fixed-capacity buffer.
pub struct SingleSeriesWriter {
    buf: BitBufferWriter,
    timestamps: TimestampEncoder,
    values: ValueEncoder,
}

impl SingleSeriesWriter {
    pub fn new(time_config: TimeConfig, value_type: ValueTypeDefinition, capacity_bytes: usize) -> Self {
        Self {
            buf: BitBufferWriter::new(capacity_bytes),
            timestamps: TimestampEncoder::new(time_config),
            values: ValueEncoder::new(value_type),
        }
    }

    /// Append one sample. The timestamp is always encoded before the
    /// value; if either field fails to fit, the sample is not considered
    /// committed and the caller should stop appending.
    pub fn append(&mut self, timestamp: i64, value: f64) -> Result<()> {
        self.timestamps.encode(&mut self.buf, timestamp)?;
        self.values.encode(&mut self.buf, value)?;
        Ok(())
    }

    /// Append as many samples as fit, stopping at the first failure.
    /// Returns the number of samples actually committed.
    pub fn append_all(&mut self, samples: &[(i64, f64)]) -> usize {
        let mut committed = 0;
        for &(t, v) in samples {
            if self.append(t, v).is_err() {
                break;
            }
            committed += 1;
        }
        committed
    }

    pub fn bits_available(&self) -> u64 {
        self.buf.bits_available()
    }

    /// Bits actually written so far. A reader must be bounded to this (not
    /// the buffer's full capacity) to avoid decoding the buffer's zero
    /// padding as spurious trailing samples — see
    /// [`SingleSeriesReader::new_bounded`].
    pub fn bits_written(&self) -> u64 {
        self.buf.bits_written()
    }

    /// Freeze the writer and hand back the backing bytes. The returned
    /// vector is the *full fixed capacity*, zero-padded past whatever was
    /// actually written; pair it with [`Self::bits_written`] when handing it
    /// to a reader.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}

/// Reads a single-channel time series back out of a byte region.
pub struct SingleSeriesReader {
    buf: BitBufferReader,
    timestamps: TimestampDecoder,
    values: ValueDecoder,
}

impl SingleSeriesReader {
    /// Build a reader over `data`, treating every bit of it as live content.
    /// Only correct when `data` is exactly the region that was written, with
    /// no trailing zero padding from an over-provisioned writer capacity —
    /// use [`Self::new_bounded`] when reading straight back from a
    /// [`SingleSeriesWriter`].
    pub fn new(time_config: TimeConfig, value_type: ValueTypeDefinition, data: &[u8]) -> Self {
        Self {
            buf: BitBufferReader::new(data),
            timestamps: TimestampDecoder::new(time_config),
            values: ValueDecoder::new(value_type),
        }
    }

    /// Build a reader over `data`, bounded to `bits_written` bits regardless
    /// of how much larger `data` is. Pass [`SingleSeriesWriter::bits_written`]
    /// here when reading back a writer's full, fixed-capacity `into_bytes()`
    /// output, so trailing zero padding never decodes as phantom samples.
    pub fn new_bounded(
        time_config: TimeConfig,
        value_type: ValueTypeDefinition,
        data: &[u8],
        bits_written: u64,
    ) -> Self {
        Self {
            buf: BitBufferReader::with_bit_limit(data, bits_written),
            timestamps: TimestampDecoder::new(time_config),
            values: ValueDecoder::new(value_type),
        }
    }

    /// Read the next sample, or `Ok(None)` ... note: unlike a sentinel-based
    /// iterator, end-of-stream here is signaled as an `Err` from the
    /// underlying buffer (§4.4): there is no framing that tells a reader
    /// "no more samples" short of running out of bits.
    pub fn read_next(&mut self) -> Result<Sample> {
        let timestamp = self.timestamps.decode(&mut self.buf)?;
        let value = self.values.decode(&mut self.buf)?;
        Ok(Sample { timestamp, value })
    }

    /// Read samples until the first decode failure.
    pub fn read_all(&mut self) -> Vec<Sample> {
        let mut samples = Vec::new();
        while let Ok(sample) = self.read_next() {
            samples.push(sample);
        }
        samples
    }
}
