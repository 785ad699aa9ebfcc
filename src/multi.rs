//! A multi-channel stream: a self-describing header followed by rows of
//! one timestamp plus one value per channel.
//!
//! Unlike [`crate::single`], every piece of configuration — time
//! precision, channel count, per-channel label/precision/bounds — travels
//! in-band in the header, so a reader needs nothing but the byte region to
//! reconstruct the series.

use crate::bitbuffer::{BitBufferReader, BitBufferWriter};
use crate::error::{CodecError, Result};
use crate::timestamp::{TimeConfig, TimestampDecoder, TimestampEncoder};
use crate::value::{ValueDecoder, ValueEncoder, ValueTypeDefinition};

const MAJOR_VERSION: u8 = 0;
const MINOR_VERSION: u8 = 1;

fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        32 - (n - 1).leading_zeros()
    }
}

/// One decoded row: a timestamp plus one value per channel, in channel
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub timestamp: i64,
    pub values: Vec<f64>,
}

fn write_header(
    buf: &mut BitBufferWriter,
    time_config: TimeConfig,
    definitions: &[ValueTypeDefinition],
) -> Result<()> {
    let n = definitions.len() as u32;
    buf.write_bits(u64::from(MAJOR_VERSION), 4)?;
    buf.write_bits(u64::from(MINOR_VERSION), 4)?;
    buf.write_bits(u64::from(time_config.time_precision_power()), 8)?;
    buf.write_bits(0, 16)?; // reserved: periodic/aperiodic hint, unused (spec open question)
    buf.write_bits(u64::from(ceil_log2(n)), 32)?;
    buf.write_bits(u64::from(n), 32)?;

    for definition in definitions {
        let mut label_bytes = definition.label().as_bytes().to_vec();
        label_bytes.push(b'\n');
        for &byte in &label_bytes {
            buf.write_bits(u64::from(byte), 8)?;
        }
        let padding = (4 - label_bytes.len() % 4) % 4;
        for _ in 0..padding {
            buf.write_bits(0, 8)?;
        }
        buf.write_bits(u64::from(definition.precision_decimal_places()), 32)?;
        buf.write_bits(definition.max().to_bits(), 64)?;
        buf.write_bits(definition.min().to_bits(), 64)?;
    }
    Ok(())
}

fn read_header(buf: &mut BitBufferReader) -> Result<(TimeConfig, Vec<ValueTypeDefinition>)> {
    let major = buf.read_bits(4)? as u8;
    let minor = buf.read_bits(4)? as u8;
    if (major, minor) != (MAJOR_VERSION, MINOR_VERSION) {
        tracing::warn!(found_major = major, found_minor = minor, "rejecting multi-series stream with mismatched header version");
        return Err(CodecError::VersionMismatch {
            expected: (MAJOR_VERSION, MINOR_VERSION),
            found: (major, minor),
        });
    }

    let time_precision_power = buf.read_bits(8)? as u8;
    let time_config = TimeConfig::new(time_precision_power)?;

    let _reserved = buf.read_bits(16)?; // periodic/aperiodic hint: written 0, never interpreted
    let _label_id_bit_width = buf.read_bits(32)?; // informational only; not load-bearing for row decoding

    let channel_count = buf.read_bits(32)? as usize;
    if channel_count == 0 {
        return Err(CodecError::MalformedHeader("channel count must be >= 1".into()));
    }

    let mut definitions = Vec::with_capacity(channel_count);
    for _ in 0..channel_count {
        let mut label_bytes = Vec::new();
        loop {
            let byte = buf.read_bits(8)? as u8;
            if byte == b'\n' {
                break;
            }
            label_bytes.push(byte);
        }
        let consumed = label_bytes.len() + 1;
        let padding = (4 - consumed % 4) % 4;
        for _ in 0..padding {
            let pad_byte = buf.read_bits(8)?;
            if pad_byte != 0 {
                tracing::warn!("rejecting multi-series header with non-zero pad byte");
                return Err(CodecError::MalformedHeader(
                    "label padding byte must be zero".into(),
                ));
            }
        }

        let label = String::from_utf8(label_bytes)
            .map_err(|_| CodecError::MalformedHeader("label is not valid UTF-8".into()))?;
        let precision_decimal_places = buf.read_bits(32)? as u32;
        let max = f64::from_bits(buf.read_bits(64)?);
        let min = f64::from_bits(buf.read_bits(64)?);
        definitions.push(ValueTypeDefinition::new(label, precision_decimal_places, min, max)?);
    }

    Ok((time_config, definitions))
}

/// Writes a multi-channel time series, emitting the header on the first
/// appended row.
pub struct MultiSeriesWriter {
    buf: BitBufferWriter,
    time_config: TimeConfig,
    timestamps: TimestampEncoder,
    channels: Vec<ValueEncoder>,
    header_written: bool,
}

impl MultiSeriesWriter {
    pub fn new(
        time_config: TimeConfig,
        definitions: Vec<ValueTypeDefinition>,
        capacity_bytes: usize,
    ) -> Result<Self> {
        if definitions.is_empty() {
            return Err(CodecError::InvalidConfig(
                "a multi-series stream needs at least one channel".into(),
            ));
        }
        let channels = definitions.into_iter().map(ValueEncoder::new).collect();
        Ok(Self {
            buf: BitBufferWriter::new(capacity_bytes),
            timestamps: TimestampEncoder::new(time_config),
            channels,
            header_written: false,
            time_config,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Append one row. Rejects a row whose value count doesn't match the
    /// declared channel count before writing anything.
    pub fn append_row(&mut self, timestamp: i64, values: &[f64]) -> Result<()> {
        if values.len() != self.channels.len() {
            return Err(CodecError::RowShapeMismatch {
                expected: self.channels.len(),
                actual: values.len(),
            });
        }

        if !self.header_written {
            let definitions: Vec<_> = self.channels.iter().map(|c| c.definition().clone()).collect();
            write_header(&mut self.buf, self.time_config, &definitions)?;
            self.header_written = true;
        }

        self.timestamps.encode(&mut self.buf, timestamp)?;
        for (channel, &value) in self.channels.iter_mut().zip(values) {
            channel.encode(&mut self.buf, value)?;
        }
        Ok(())
    }

    /// Append as many rows as fit, stopping at the first failure. Returns
    /// the number of rows actually committed.
    pub fn append_all(&mut self, rows: &[(i64, Vec<f64>)]) -> usize {
        let mut committed = 0;
        for (timestamp, values) in rows {
            if self.append_row(*timestamp, values).is_err() {
                break;
            }
            committed += 1;
        }
        committed
    }

    pub fn bits_available(&self) -> u64 {
        self.buf.bits_available()
    }

    /// Bits actually written so far, including the header. A reader must be
    /// bounded to this (not the buffer's full capacity) to avoid decoding
    /// zero padding as spurious trailing rows — see
    /// [`MultiSeriesReader::new_bounded`].
    pub fn bits_written(&self) -> u64 {
        self.buf.bits_written()
    }

    /// The full fixed-capacity buffer, zero-padded past whatever was
    /// actually written; pair it with [`Self::bits_written`] when handing it
    /// to a reader.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}

/// Reads a multi-channel time series, parsing the header at construction.
pub struct MultiSeriesReader {
    buf: BitBufferReader,
    timestamps: TimestampDecoder,
    channels: Vec<ValueDecoder>,
}

impl MultiSeriesReader {
    /// Build a reader over `data`, treating every bit of it as live content.
    /// Only correct when `data` is exactly the region that was written, with
    /// no trailing zero padding from an over-provisioned writer capacity —
    /// use [`Self::new_bounded`] when reading straight back from a
    /// [`MultiSeriesWriter`].
    pub fn new(data: &[u8]) -> Result<Self> {
        Self::from_reader(BitBufferReader::new(data))
    }

    /// Build a reader over `data`, bounded to `bits_written` bits regardless
    /// of how much larger `data` is. Pass [`MultiSeriesWriter::bits_written`]
    /// here when reading back a writer's full, fixed-capacity `into_bytes()`
    /// output, so trailing zero padding never decodes as phantom rows.
    pub fn new_bounded(data: &[u8], bits_written: u64) -> Result<Self> {
        Self::from_reader(BitBufferReader::with_bit_limit(data, bits_written))
    }

    fn from_reader(mut buf: BitBufferReader) -> Result<Self> {
        let (time_config, definitions) = read_header(&mut buf)?;
        let channels = definitions.into_iter().map(ValueDecoder::new).collect();
        Ok(Self {
            buf,
            timestamps: TimestampDecoder::new(time_config),
            channels,
        })
    }

    pub fn channel_definitions(&self) -> Vec<ValueTypeDefinition> {
        self.channels.iter().map(|c| c.definition().clone()).collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Decode the next row.
    pub fn read_row(&mut self) -> Result<Row> {
        let timestamp = self.timestamps.decode(&mut self.buf)?;
        let mut values = Vec::with_capacity(self.channels.len());
        for channel in &mut self.channels {
            values.push(channel.decode(&mut self.buf)?);
        }
        Ok(Row { timestamp, values })
    }

    /// Read rows until the first decode failure.
    pub fn read_all(&mut self) -> Vec<Row> {
        let mut rows = Vec::new();
        while let Ok(row) = self.read_row() {
            rows.push(row);
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_channel_definitions() -> Vec<ValueTypeDefinition> {
        vec![
            ValueTypeDefinition::new("a", 1, 0.0, 100.0).unwrap(),
            ValueTypeDefinition::new("bb", 2, -50.0, 50.0).unwrap(),
            ValueTypeDefinition::new("ccc", 0, 0.0, 1000.0).unwrap(),
        ]
    }

    #[test]
    fn header_round_trips_definitions_and_rows_decode_bit_exact() {
        let time_config = TimeConfig::new(0).unwrap();
        let definitions = three_channel_definitions();
        let mut w = MultiSeriesWriter::new(time_config, definitions.clone(), 4096).unwrap();

        let rows = vec![
            (0i64, vec![10.5, -20.25, 100.0]),
            (10, vec![10.5, -20.25, 100.0]),
            (25, vec![11.0, -19.5, 200.0]),
        ];
        let committed = w.append_all(&rows);
        assert_eq!(committed, rows.len());
        let bits_written = w.bits_written();
        let bytes = w.into_bytes();

        let mut r = MultiSeriesReader::new_bounded(&bytes, bits_written).unwrap();
        assert_eq!(r.channel_count(), 3);
        let parsed_defs = r.channel_definitions();
        assert_eq!(parsed_defs, definitions);

        for (ts, values) in &rows {
            let row = r.read_row().unwrap();
            assert_eq!(row.timestamp, *ts);
            for (a, b) in row.values.iter().zip(values) {
                assert!((a - b).abs() < 1e-9);
            }
        }
        assert!(r.read_row().is_err(), "no more rows were written");
    }

    #[test]
    fn rejects_row_with_wrong_channel_count() {
        let time_config = TimeConfig::new(0).unwrap();
        let mut w = MultiSeriesWriter::new(time_config, three_channel_definitions(), 4096).unwrap();
        let err = w.append_row(0, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, CodecError::RowShapeMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn rejects_mismatched_version() {
        let time_config = TimeConfig::new(0).unwrap();
        let mut w = MultiSeriesWriter::new(time_config, three_channel_definitions(), 4096).unwrap();
        w.append_row(0, &[1.0, 2.0, 3.0]).unwrap();
        let mut bytes = w.into_bytes();
        // Corrupt the 4-bit minor version field (bits 4..8 of byte 0).
        bytes[0] = (bytes[0] & 0xF0) | 0x0F;

        let err = MultiSeriesReader::new(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::VersionMismatch { .. }));
    }

    #[test]
    fn per_channel_state_is_independent_and_updated_in_place() {
        let time_config = TimeConfig::new(0).unwrap();
        let mut w = MultiSeriesWriter::new(time_config, three_channel_definitions(), 4096).unwrap();
        // Channel 0 changes every row, channel 1 never changes, channel 2
        // changes only on the last row: each channel's "last" state must be
        // tracked independently or this degenerates into one shared value.
        let rows = vec![
            (0i64, vec![1.0, 5.0, 5.0]),
            (10, vec![2.0, 5.0, 5.0]),
            (20, vec![3.0, 5.0, 9.0]),
        ];
        w.append_all(&rows);
        let bits_written = w.bits_written();
        let bytes = w.into_bytes();

        let mut r = MultiSeriesReader::new_bounded(&bytes, bits_written).unwrap();
        for (_, values) in &rows {
            let row = r.read_row().unwrap();
            for (a, b) in row.values.iter().zip(values) {
                assert!((a - b).abs() < 1e-9);
            }
        }
        assert!(r.read_row().is_err());
    }
}
