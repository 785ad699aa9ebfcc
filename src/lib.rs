//! fluxdb-codec — quantized time-series bitstream codec
//!
//! A lossy codec for `(timestamp, value)` time series, in the spirit of
//! Facebook's Gorilla paper, extended with configurable time precision
//! (`10^T` nanosecond quanta) and configurable value precision (fixed-point
//! decimal places over a bounded `[min, max]`). It produces a
//! self-describing bitstream from which a faithful reconstruction of the
//! quantized series can be recovered.
//!
//! # Architecture
//!
//! - [`bitbuffer`]: bit-granular read/write over a fixed-capacity byte
//!   region. Every higher layer is built on this.
//! - [`timestamp`]: delta-of-delta timestamp encoding with a five-pattern
//!   prefix code.
//! - [`value`]: range-clamped fixed-point value encoding with a
//!   single-bit "changed?" predicate.
//! - [`single`]: one timestamp channel plus one value channel sharing a
//!   buffer, with no header — configuration travels out-of-band.
//! - [`multi`]: a self-describing header plus N value channels per row,
//!   with configuration travelling in-band.
//!
//! # Example
//!
//! ```rust
//! use fluxdb_codec::{SingleSeriesWriter, SingleSeriesReader, TimeConfig, ValueTypeDefinition};
//!
//! let time_config = TimeConfig::new(0).unwrap();
//! let value_type = ValueTypeDefinition::new("temperature", 1, -40.0, 125.0).unwrap();
//!
//! let mut writer = SingleSeriesWriter::new(time_config, value_type.clone(), 4096);
//! writer.append(1_700_000_000, 21.4).unwrap();
//! writer.append(1_700_000_060, 21.5).unwrap();
//! let bits_written = writer.bits_written();
//! let bytes = writer.into_bytes();
//!
//! // `bytes` is the full 4096-byte capacity, zero-padded past what was
//! // actually written, so the reader is bounded to `bits_written` — a plain
//! // `SingleSeriesReader::new` would otherwise decode that padding as
//! // spurious trailing samples.
//! let mut reader = SingleSeriesReader::new_bounded(time_config, value_type, &bytes, bits_written);
//! let samples = reader.read_all();
//! assert_eq!(samples.len(), 2);
//! ```
//!
//! # Non-goals
//!
//! This crate is not a database: it has no file I/O, no CLI, no
//! configuration loader, and performs no random access — decode is
//! strictly sequential from the start of a buffer. What sources raw
//! samples and where the encoded bytes end up is entirely the caller's
//! concern.

pub mod bitbuffer;
pub mod multi;
pub mod single;
pub mod timestamp;
pub mod value;

mod error;

pub use bitbuffer::{BitBufferReader, BitBufferWriter};
pub use error::{CodecError, Result};
pub use multi::{MultiSeriesReader, MultiSeriesWriter, Row};
pub use single::{Sample, SingleSeriesReader, SingleSeriesWriter};
pub use timestamp::TimeConfig;
pub use value::ValueTypeDefinition;

/// Crate version, for callers that want to stamp it alongside stored
/// bitstreams (the wire format itself is versioned independently — see
/// [`multi`]'s header major/minor fields).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
