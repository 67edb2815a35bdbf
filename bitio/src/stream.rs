//! Entropy-coded streams over the bit primitives.
//!
//! A stream couples a bit writer/reader with a [`CompressionModel`] and a
//! [`StreamMode`]. `Raw` writes packed integers with plain unary bucket
//! prefixes and is bit-inspectable; `Huffman` replaces the prefix with the
//! context's canonical code. The mode is chosen once per connection during
//! the handshake and both peers must agree on it per package.

use crate::error::{BitError, BitResult};
use crate::model::{CompressionModel, FrequencyCapture};
use crate::packed::{
    join_packed, read_packed, split_packed, write_packed, zigzag_decode, zigzag_encode,
    BUCKET_WIDTHS,
};
use crate::reader::BitReader;
use crate::writer::BitWriter;

/// How packed integers are entropy-coded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Unary bucket prefixes; used for debugging, capture, and the
    /// pre-handshake phase.
    #[default]
    Raw,
    /// Canonical per-context Huffman codes from the negotiated model.
    Huffman,
}

impl StreamMode {
    /// Parses a stream mode from its wire byte.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Raw),
            1 => Some(Self::Huffman),
            _ => None,
        }
    }

    /// Returns the wire byte for this mode.
    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::Raw => 0,
            Self::Huffman => 1,
        }
    }
}

/// An entropy-coded output stream.
#[derive(Debug)]
pub struct OutputStream<'a> {
    mode: StreamMode,
    writer: BitWriter,
    model: &'a CompressionModel,
    capture: Option<&'a mut FrequencyCapture>,
}

impl<'a> OutputStream<'a> {
    /// Creates an output stream with the given mode and model.
    #[must_use]
    pub fn new(mode: StreamMode, model: &'a CompressionModel) -> Self {
        Self {
            mode,
            writer: BitWriter::new(),
            model,
            capture: None,
        }
    }

    /// Creates an output stream with a pre-allocated buffer.
    #[must_use]
    pub fn with_capacity(mode: StreamMode, model: &'a CompressionModel, bytes: usize) -> Self {
        Self {
            mode,
            writer: BitWriter::with_capacity(bytes),
            model,
            capture: None,
        }
    }

    /// Attaches a frequency capture that records every packed symbol.
    pub fn attach_capture(&mut self, capture: &'a mut FrequencyCapture) {
        self.capture = Some(capture);
    }

    /// Returns the stream mode.
    #[must_use]
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub fn bits_written(&self) -> usize {
        self.writer.bits_written()
    }

    /// Writes a single bit.
    pub fn write_bool(&mut self, value: bool) {
        self.writer.write_bit(value);
    }

    /// Writes up to 32 raw (never entropy-coded) bits.
    pub fn write_raw_bits(&mut self, value: u32, bits: u8) -> BitResult<()> {
        if bits > 32 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 32,
            });
        }
        self.writer.write_bits(u64::from(value), bits)
    }

    /// Writes a packed unsigned integer under the given context.
    pub fn write_packed_uint(&mut self, context: u16, value: u64) -> BitResult<()> {
        let (bucket, offset) = split_packed(value);
        if let Some(capture) = self.capture.as_deref_mut() {
            capture.record(context, bucket);
        }
        match self.mode {
            StreamMode::Raw => write_packed(&mut self.writer, value),
            StreamMode::Huffman => {
                let (code, len) = self.model.context(context).encode(bucket);
                self.writer.write_bits(u64::from(code), len)?;
                self.writer.write_bits(offset, BUCKET_WIDTHS[bucket])
            }
        }
    }

    /// Writes a signed value as a zig-zag packed delta against a baseline.
    pub fn write_packed_int_delta(
        &mut self,
        context: u16,
        value: i64,
        baseline: i64,
    ) -> BitResult<()> {
        let delta = value.wrapping_sub(baseline);
        self.write_packed_uint(context, zigzag_encode(delta))
    }

    /// Writes an unsigned value as a zig-zag packed delta against a baseline.
    pub fn write_packed_uint_delta(
        &mut self,
        context: u16,
        value: u64,
        baseline: u64,
    ) -> BitResult<()> {
        let delta = (value as i64).wrapping_sub(baseline as i64);
        self.write_packed_uint(context, zigzag_encode(delta))
    }

    /// Aligns to a byte boundary, then writes raw bytes.
    pub fn write_raw_bytes(&mut self, data: &[u8]) -> BitResult<()> {
        self.writer.align_to_byte();
        self.writer.write_bytes(data)
    }

    /// Pads with zero bits to the next byte boundary.
    pub fn align(&mut self) {
        self.writer.align_to_byte();
    }

    /// Finishes the stream and returns the encoded bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }
}

/// An entropy-coded input stream.
#[derive(Debug)]
pub struct InputStream<'a> {
    mode: StreamMode,
    reader: BitReader<'a>,
    model: &'a CompressionModel,
}

impl<'a> InputStream<'a> {
    /// Creates an input stream over the given bytes.
    #[must_use]
    pub const fn new(mode: StreamMode, model: &'a CompressionModel, data: &'a [u8]) -> Self {
        Self {
            mode,
            reader: BitReader::new(data),
            model,
        }
    }

    /// Returns the stream mode.
    #[must_use]
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Returns the number of bits remaining.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        self.reader.bits_remaining()
    }

    /// Reads a single bit.
    pub fn read_bool(&mut self) -> BitResult<bool> {
        self.reader.read_bit()
    }

    /// Reads up to 32 raw bits.
    pub fn read_raw_bits(&mut self, bits: u8) -> BitResult<u32> {
        if bits > 32 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 32,
            });
        }
        Ok(self.reader.read_bits(bits)? as u32)
    }

    /// Reads a packed unsigned integer under the given context.
    pub fn read_packed_uint(&mut self, context: u16) -> BitResult<u64> {
        match self.mode {
            StreamMode::Raw => read_packed(&mut self.reader),
            StreamMode::Huffman => {
                let bucket = self.model.context(context).decode(context, &mut self.reader)?;
                let offset = self.reader.read_bits(BUCKET_WIDTHS[bucket])?;
                join_packed(bucket, offset).ok_or(BitError::InvalidPacked)
            }
        }
    }

    /// Reads a signed zig-zag packed delta and applies it to a baseline.
    pub fn read_packed_int_delta(&mut self, context: u16, baseline: i64) -> BitResult<i64> {
        let delta = zigzag_decode(self.read_packed_uint(context)?);
        Ok(baseline.wrapping_add(delta))
    }

    /// Reads an unsigned zig-zag packed delta and applies it to a baseline.
    pub fn read_packed_uint_delta(&mut self, context: u16, baseline: u64) -> BitResult<u64> {
        let delta = zigzag_decode(self.read_packed_uint(context)?);
        Ok((baseline as i64).wrapping_add(delta) as u64)
    }

    /// Aligns to a byte boundary (checking zero padding), then reads bytes.
    pub fn read_raw_bytes(&mut self, out: &mut [u8]) -> BitResult<()> {
        self.reader.align_to_byte()?;
        self.reader.read_bytes(out)
    }

    /// Skips to the next byte boundary, verifying zero padding.
    pub fn align(&mut self) -> BitResult<()> {
        self.reader.align_to_byte()
    }
}
