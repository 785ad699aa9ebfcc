//! Range-clamped fixed-point value encoding with a "changed?" predicate.
//!
//! Each channel is declared by a [`ValueTypeDefinition`]: a label, a number
//! of fixed decimal places, and a `[min, max]` range. Every sample is
//! clamped into that range, quantized to an unsigned integer, and encoded
//! as a single bit when unchanged from the previous sample or a full
//! `bit_size`-bit field when it changes.

use crate::bitbuffer::{BitBufferReader, BitBufferWriter};
use crate::error::{CodecError, Result};

/// Declares one numeric channel: its label, decimal precision, and bounds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValueTypeDefinition {
    label: String,
    precision_decimal_places: u32,
    min: f64,
    max: f64,
}

impl ValueTypeDefinition {
    /// Construct a definition, rejecting non-finite bounds, `min > max`,
    /// a label containing a newline, or a precision that would overflow
    /// fixed-point arithmetic.
    pub fn new(
        label: impl Into<String>,
        precision_decimal_places: u32,
        min: f64,
        max: f64,
    ) -> Result<Self> {
        let label = label.into();
        if label.contains('\n') {
            return Err(CodecError::InvalidConfig(
                "label must not contain a newline".into(),
            ));
        }
        if !min.is_finite() || !max.is_finite() {
            return Err(CodecError::InvalidConfig(
                "min and max must be finite".into(),
            ));
        }
        if min > max {
            return Err(CodecError::InvalidConfig(format!(
                "min ({min}) must be <= max ({max})"
            )));
        }
        if precision_decimal_places > 15 {
            return Err(CodecError::InvalidConfig(format!(
                "precision_decimal_places ({precision_decimal_places}) is too large to represent exactly"
            )));
        }
        Ok(Self { label, precision_decimal_places, min, max })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn precision_decimal_places(&self) -> u32 {
        self.precision_decimal_places
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    fn scale(&self) -> f64 {
        10f64.powi(self.precision_decimal_places as i32)
    }

    /// `floor(min * 10^p)`.
    pub fn precise_min(&self) -> i64 {
        (self.min * self.scale()).floor() as i64
    }

    /// `floor(max * 10^p)`.
    pub fn precise_max(&self) -> i64 {
        (self.max * self.scale()).floor() as i64
    }

    /// Number of bits needed to hold any integer in
    /// `[0, precise_max - precise_min]`; always at least 1.
    pub fn bit_size(&self) -> u32 {
        let span = (self.precise_max() - self.precise_min()) as u64;
        bit_size_for_span(span)
    }

    fn quantize(&self, value: f64) -> u64 {
        let clamped = value.clamp(self.min, self.max);
        let precise = (clamped * self.scale()).floor() as i64;
        (precise - self.precise_min()).clamp(0, self.precise_max() - self.precise_min()) as u64
    }

    fn dequantize(&self, q: u64) -> f64 {
        (q as i64 + self.precise_min()) as f64 / self.scale()
    }
}

fn bit_size_for_span(span: u64) -> u32 {
    let count = span + 1;
    if count <= 1 {
        1
    } else {
        (64 - (count - 1).leading_zeros()).max(1)
    }
}

/// Stateful encoder for one value channel.
#[derive(Debug, Clone)]
pub struct ValueEncoder {
    definition: ValueTypeDefinition,
    bit_size: u32,
    first_value: bool,
    last_quantized_value: u64,
}

impl ValueEncoder {
    pub fn new(definition: ValueTypeDefinition) -> Self {
        let bit_size = definition.bit_size();
        Self { definition, bit_size, first_value: true, last_quantized_value: 0 }
    }

    pub fn definition(&self) -> &ValueTypeDefinition {
        &self.definition
    }

    /// Clamp, quantize and encode `value` into `buf`. Returns the
    /// quantized integer that was encoded.
    pub fn encode(&mut self, buf: &mut BitBufferWriter, value: f64) -> Result<u64> {
        let q = self.definition.quantize(value);

        if self.first_value {
            buf.write_bits(1, 1)?;
            buf.write_bits(q, self.bit_size)?;
            self.last_quantized_value = q;
            self.first_value = false;
            return Ok(q);
        }

        if q == self.last_quantized_value {
            buf.write_bits(0, 1)?;
        } else {
            buf.write_bits(1, 1)?;
            buf.write_bits(q, self.bit_size)?;
            self.last_quantized_value = q;
        }
        Ok(q)
    }
}

/// Stateful decoder symmetric to [`ValueEncoder`].
#[derive(Debug, Clone)]
pub struct ValueDecoder {
    definition: ValueTypeDefinition,
    bit_size: u32,
    last_quantized_value: u64,
}

impl ValueDecoder {
    pub fn new(definition: ValueTypeDefinition) -> Self {
        let bit_size = definition.bit_size();
        Self { definition, bit_size, last_quantized_value: 0 }
    }

    pub fn definition(&self) -> &ValueTypeDefinition {
        &self.definition
    }

    /// Decode the next value from `buf`.
    pub fn decode(&mut self, buf: &mut BitBufferReader) -> Result<f64> {
        let changed = buf.read_bits(1)?;
        if changed == 1 {
            let q = buf.read_bits(self.bit_size)?;
            self.last_quantized_value = q;
        }
        Ok(self.definition.dequantize(self.last_quantized_value))
    }
}
