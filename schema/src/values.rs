//! Schema-driven value marshaling over fixed word buffers.
//!
//! Entity state lives in flat `u32` word buffers laid out by the schema.
//! [`FieldWriter`] and [`FieldReader`] visit fields strictly in schema order,
//! converting between application values and their stored word form. The
//! free functions at the bottom marshal whole buffers to and from a stream
//! without delta coding, used for map info and type-default baselines.

use bitio::{zigzag_decode, zigzag_encode, InputStream, OutputStream};

use crate::error::{SchemaError, SchemaResult};
use crate::field::{FieldDescriptor, FieldKind};
use crate::schema::Schema;

/// Length-word sentinel for a null string.
pub const NULL_LENGTH: u32 = u32::MAX;

const QUANTIZATION_FACTORS: [f32; 4] = [1.0, 10.0, 100.0, 1000.0];

/// Converts a float to its stored word under the field's precision.
#[must_use]
pub fn quantize(value: f32, precision: u8) -> u32 {
    if precision == 0 {
        value.to_bits()
    } else {
        let factor = QUANTIZATION_FACTORS[usize::from(precision.min(3))];
        (value * factor).round() as i32 as u32
    }
}

/// Converts a stored word back to a float under the field's precision.
#[must_use]
pub fn dequantize(word: u32, precision: u8) -> f32 {
    if precision == 0 {
        f32::from_bits(word)
    } else {
        let factor = QUANTIZATION_FACTORS[usize::from(precision.min(3))];
        (word as i32) as f32 / factor
    }
}

fn pack_bytes(words: &mut [u32], data: &[u8]) {
    for word in words.iter_mut() {
        *word = 0;
    }
    for (i, chunk) in data.chunks(4).enumerate() {
        let mut word = 0u32;
        for (j, &byte) in chunk.iter().enumerate() {
            word |= u32::from(byte) << (8 * j);
        }
        words[i] = word;
    }
}

fn unpack_bytes(words: &[u32], len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    for i in 0..len {
        let word = words[i / 4];
        data.push((word >> (8 * (i % 4))) as u8);
    }
    data
}

/// Writes application values into a schema-laid-out word buffer.
///
/// Fields must be written in schema order; [`FieldWriter::finish`] verifies
/// every field was visited.
#[derive(Debug)]
pub struct FieldWriter<'a> {
    schema: &'a Schema,
    buffer: &'a mut [u32],
    next: usize,
}

impl<'a> FieldWriter<'a> {
    /// Creates a writer over `buffer`, which must hold the schema's layout.
    pub fn new(schema: &'a Schema, buffer: &'a mut [u32]) -> SchemaResult<Self> {
        if buffer.len() < schema.word_count() {
            return Err(SchemaError::BufferTooSmall {
                needed: schema.word_count(),
                available: buffer.len(),
            });
        }
        Ok(Self {
            schema,
            buffer,
            next: 0,
        })
    }

    fn advance(&mut self, found: FieldKind) -> SchemaResult<(usize, &'a FieldDescriptor)> {
        let index = self.next;
        let field = self.schema.field(index).ok_or(SchemaError::MissingFields {
            visited: index + 1,
            expected: self.schema.field_count(),
        })?;
        if field.kind != found {
            return Err(SchemaError::WrongFieldKind {
                field: index,
                expected: field.kind,
                found,
            });
        }
        self.next += 1;
        Ok((index, field))
    }

    fn offset(&self, index: usize) -> usize {
        // Index comes from advance, the layout entry exists.
        self.schema.layout(index).map_or(0, |l| l.offset)
    }

    /// Writes a bool field.
    pub fn write_bool(&mut self, value: bool) -> SchemaResult<()> {
        let (index, _) = self.advance(FieldKind::Bool)?;
        self.buffer[self.offset(index)] = u32::from(value);
        Ok(())
    }

    /// Writes a signed integer field.
    pub fn write_int(&mut self, value: i32) -> SchemaResult<()> {
        let (index, _) = self.advance(FieldKind::Int)?;
        self.buffer[self.offset(index)] = value as u32;
        Ok(())
    }

    /// Writes an unsigned integer field.
    pub fn write_uint(&mut self, value: u32) -> SchemaResult<()> {
        let (index, _) = self.advance(FieldKind::UInt)?;
        self.buffer[self.offset(index)] = value;
        Ok(())
    }

    /// Writes a float field, quantized per the field's precision.
    pub fn write_float(&mut self, value: f32) -> SchemaResult<()> {
        let (index, field) = self.advance(FieldKind::Float)?;
        self.buffer[self.offset(index)] = quantize(value, field.precision);
        Ok(())
    }

    /// Writes a two-component vector field.
    pub fn write_vector2(&mut self, value: [f32; 2]) -> SchemaResult<()> {
        let (index, field) = self.advance(FieldKind::Vector2)?;
        let offset = self.offset(index);
        for (i, component) in value.iter().enumerate() {
            self.buffer[offset + i] = quantize(*component, field.precision);
        }
        Ok(())
    }

    /// Writes a three-component vector field.
    pub fn write_vector3(&mut self, value: [f32; 3]) -> SchemaResult<()> {
        let (index, field) = self.advance(FieldKind::Vector3)?;
        let offset = self.offset(index);
        for (i, component) in value.iter().enumerate() {
            self.buffer[offset + i] = quantize(*component, field.precision);
        }
        Ok(())
    }

    /// Writes a quaternion field, component-wise.
    pub fn write_quaternion(&mut self, value: [f32; 4]) -> SchemaResult<()> {
        let (index, field) = self.advance(FieldKind::Quaternion)?;
        let offset = self.offset(index);
        for (i, component) in value.iter().enumerate() {
            self.buffer[offset + i] = quantize(*component, field.precision);
        }
        Ok(())
    }

    /// Writes a nullable string field, truncating at a char boundary to fit
    /// the fixed slot.
    pub fn write_string(&mut self, value: Option<&str>) -> SchemaResult<()> {
        let (index, field) = self.advance(FieldKind::String)?;
        let offset = self.offset(index);
        let slot_words = field.word_count() - 1;
        match value {
            None => {
                self.buffer[offset] = NULL_LENGTH;
                for word in &mut self.buffer[offset + 1..offset + 1 + slot_words] {
                    *word = 0;
                }
            }
            Some(s) => {
                let mut len = s.len().min(field.array_size);
                while !s.is_char_boundary(len) {
                    len -= 1;
                }
                self.buffer[offset] = len as u32;
                pack_bytes(
                    &mut self.buffer[offset + 1..offset + 1 + slot_words],
                    &s.as_bytes()[..len],
                );
            }
        }
        Ok(())
    }

    /// Writes a bytes field. The value must fit the fixed slot.
    pub fn write_bytes(&mut self, value: &[u8]) -> SchemaResult<()> {
        let (index, field) = self.advance(FieldKind::Bytes)?;
        if value.len() > field.array_size {
            return Err(SchemaError::ValueTooLong {
                field: index,
                len: value.len(),
                max: field.array_size,
            });
        }
        let offset = self.offset(index);
        let slot_words = field.word_count() - 1;
        self.buffer[offset] = value.len() as u32;
        pack_bytes(&mut self.buffer[offset + 1..offset + 1 + slot_words], value);
        Ok(())
    }

    /// Verifies that every schema field was written.
    pub fn finish(self) -> SchemaResult<()> {
        if self.next != self.schema.field_count() {
            return Err(SchemaError::MissingFields {
                visited: self.next,
                expected: self.schema.field_count(),
            });
        }
        Ok(())
    }
}

/// Reads application values out of a schema-laid-out word buffer.
#[derive(Debug)]
pub struct FieldReader<'a> {
    schema: &'a Schema,
    buffer: &'a [u32],
    next: usize,
}

impl<'a> FieldReader<'a> {
    /// Creates a reader over `buffer`, which must hold the schema's layout.
    pub fn new(schema: &'a Schema, buffer: &'a [u32]) -> SchemaResult<Self> {
        if buffer.len() < schema.word_count() {
            return Err(SchemaError::BufferTooSmall {
                needed: schema.word_count(),
                available: buffer.len(),
            });
        }
        Ok(Self {
            schema,
            buffer,
            next: 0,
        })
    }

    fn advance(&mut self, found: FieldKind) -> SchemaResult<(usize, &'a FieldDescriptor)> {
        let index = self.next;
        let field = self.schema.field(index).ok_or(SchemaError::MissingFields {
            visited: index + 1,
            expected: self.schema.field_count(),
        })?;
        if field.kind != found {
            return Err(SchemaError::WrongFieldKind {
                field: index,
                expected: field.kind,
                found,
            });
        }
        self.next += 1;
        Ok((index, field))
    }

    fn offset(&self, index: usize) -> usize {
        self.schema.layout(index).map_or(0, |l| l.offset)
    }

    /// Reads a bool field.
    pub fn read_bool(&mut self) -> SchemaResult<bool> {
        let (index, _) = self.advance(FieldKind::Bool)?;
        Ok(self.buffer[self.offset(index)] != 0)
    }

    /// Reads a signed integer field.
    pub fn read_int(&mut self) -> SchemaResult<i32> {
        let (index, _) = self.advance(FieldKind::Int)?;
        Ok(self.buffer[self.offset(index)] as i32)
    }

    /// Reads an unsigned integer field.
    pub fn read_uint(&mut self) -> SchemaResult<u32> {
        let (index, _) = self.advance(FieldKind::UInt)?;
        Ok(self.buffer[self.offset(index)])
    }

    /// Reads a float field.
    pub fn read_float(&mut self) -> SchemaResult<f32> {
        let (index, field) = self.advance(FieldKind::Float)?;
        Ok(dequantize(self.buffer[self.offset(index)], field.precision))
    }

    /// Reads a two-component vector field.
    pub fn read_vector2(&mut self) -> SchemaResult<[f32; 2]> {
        let (index, field) = self.advance(FieldKind::Vector2)?;
        let offset = self.offset(index);
        Ok([
            dequantize(self.buffer[offset], field.precision),
            dequantize(self.buffer[offset + 1], field.precision),
        ])
    }

    /// Reads a three-component vector field.
    pub fn read_vector3(&mut self) -> SchemaResult<[f32; 3]> {
        let (index, field) = self.advance(FieldKind::Vector3)?;
        let offset = self.offset(index);
        Ok([
            dequantize(self.buffer[offset], field.precision),
            dequantize(self.buffer[offset + 1], field.precision),
            dequantize(self.buffer[offset + 2], field.precision),
        ])
    }

    /// Reads a quaternion field. Components are returned as decoded, without
    /// renormalization.
    pub fn read_quaternion(&mut self) -> SchemaResult<[f32; 4]> {
        let (index, field) = self.advance(FieldKind::Quaternion)?;
        let offset = self.offset(index);
        Ok([
            dequantize(self.buffer[offset], field.precision),
            dequantize(self.buffer[offset + 1], field.precision),
            dequantize(self.buffer[offset + 2], field.precision),
            dequantize(self.buffer[offset + 3], field.precision),
        ])
    }

    /// Reads a nullable string field.
    pub fn read_string(&mut self) -> SchemaResult<Option<String>> {
        let (index, field) = self.advance(FieldKind::String)?;
        let offset = self.offset(index);
        let len_word = self.buffer[offset];
        if len_word == NULL_LENGTH {
            return Ok(None);
        }
        let len = len_word as usize;
        if len > field.array_size {
            return Err(SchemaError::InvalidStringData { field: index });
        }
        let slot_words = field.word_count() - 1;
        let data = unpack_bytes(&self.buffer[offset + 1..offset + 1 + slot_words], len);
        String::from_utf8(data)
            .map(Some)
            .map_err(|_| SchemaError::InvalidStringData { field: index })
    }

    /// Reads a bytes field.
    pub fn read_bytes(&mut self) -> SchemaResult<Vec<u8>> {
        let (index, field) = self.advance(FieldKind::Bytes)?;
        let offset = self.offset(index);
        let len = self.buffer[offset] as usize;
        if len > field.array_size {
            return Err(SchemaError::InvalidStringData { field: index });
        }
        let slot_words = field.word_count() - 1;
        Ok(unpack_bytes(
            &self.buffer[offset + 1..offset + 1 + slot_words],
            len,
        ))
    }

    /// Verifies that every schema field was read.
    pub fn finish(self) -> SchemaResult<()> {
        if self.next != self.schema.field_count() {
            return Err(SchemaError::MissingFields {
                visited: self.next,
                expected: self.schema.field_count(),
            });
        }
        Ok(())
    }
}

/// Marshals a whole value buffer to a stream without delta coding.
pub fn copy_fields_to_stream(
    schema: &Schema,
    buffer: &[u32],
    out: &mut OutputStream<'_>,
) -> SchemaResult<()> {
    if buffer.len() < schema.word_count() {
        return Err(SchemaError::BufferTooSmall {
            needed: schema.word_count(),
            available: buffer.len(),
        });
    }
    for (index, field) in schema.fields().iter().enumerate() {
        let offset = schema.layout(index).map_or(0, |l| l.offset);
        let ctx = field.context;
        match field.kind {
            FieldKind::Bool => out.write_bool(buffer[offset] != 0),
            FieldKind::Int => {
                out.write_packed_uint(ctx, zigzag_encode(i64::from(buffer[offset] as i32)))?;
            }
            FieldKind::UInt => out.write_packed_uint(ctx, u64::from(buffer[offset]))?,
            FieldKind::Float | FieldKind::Vector2 | FieldKind::Vector3
            | FieldKind::Quaternion => {
                for i in 0..field.kind.components() {
                    let word = buffer[offset + i];
                    if field.precision == 0 {
                        out.write_raw_bits(word, 32)?;
                    } else {
                        out.write_packed_uint(ctx, zigzag_encode(i64::from(word as i32)))?;
                    }
                }
            }
            FieldKind::String | FieldKind::Bytes => {
                let len_word = buffer[offset];
                out.write_packed_uint(ctx, u64::from(len_word))?;
                if len_word != NULL_LENGTH {
                    let used = (len_word as usize).div_ceil(4);
                    for i in 0..used {
                        out.write_raw_bits(buffer[offset + 1 + i], 32)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Unmarshals a whole value buffer from a stream written by
/// [`copy_fields_to_stream`].
pub fn copy_fields_from_stream(
    schema: &Schema,
    buffer: &mut [u32],
    input: &mut InputStream<'_>,
) -> SchemaResult<()> {
    if buffer.len() < schema.word_count() {
        return Err(SchemaError::BufferTooSmall {
            needed: schema.word_count(),
            available: buffer.len(),
        });
    }
    for (index, field) in schema.fields().iter().enumerate() {
        let offset = schema.layout(index).map_or(0, |l| l.offset);
        let words = field.word_count();
        let ctx = field.context;
        match field.kind {
            FieldKind::Bool => buffer[offset] = u32::from(input.read_bool()?),
            FieldKind::Int => {
                buffer[offset] = zigzag_decode(input.read_packed_uint(ctx)?) as i32 as u32;
            }
            FieldKind::UInt => buffer[offset] = input.read_packed_uint(ctx)? as u32,
            FieldKind::Float | FieldKind::Vector2 | FieldKind::Vector3
            | FieldKind::Quaternion => {
                for i in 0..field.kind.components() {
                    buffer[offset + i] = if field.precision == 0 {
                        input.read_raw_bits(32)?
                    } else {
                        zigzag_decode(input.read_packed_uint(ctx)?) as i32 as u32
                    };
                }
            }
            FieldKind::String | FieldKind::Bytes => {
                let len_word = input.read_packed_uint(ctx)? as u32;
                if len_word != NULL_LENGTH && len_word as usize > field.array_size {
                    return Err(SchemaError::InvalidStringData { field: index });
                }
                for word in &mut buffer[offset..offset + words] {
                    *word = 0;
                }
                buffer[offset] = len_word;
                if len_word != NULL_LENGTH {
                    let used = (len_word as usize).div_ceil(4);
                    for i in 0..used {
                        buffer[offset + 1 + i] = input.read_raw_bits(32)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Reads and discards a whole value buffer from a stream.
pub fn skip_fields(schema: &Schema, input: &mut InputStream<'_>) -> SchemaResult<()> {
    for field in schema.fields() {
        let ctx = field.context;
        match field.kind {
            FieldKind::Bool => {
                input.read_bool()?;
            }
            FieldKind::Int | FieldKind::UInt => {
                input.read_packed_uint(ctx)?;
            }
            FieldKind::Float | FieldKind::Vector2 | FieldKind::Vector3
            | FieldKind::Quaternion => {
                for _ in 0..field.kind.components() {
                    if field.precision == 0 {
                        input.read_raw_bits(32)?;
                    } else {
                        input.read_packed_uint(ctx)?;
                    }
                }
            }
            FieldKind::String | FieldKind::Bytes => {
                let len_word = input.read_packed_uint(ctx)? as u32;
                if len_word != NULL_LENGTH {
                    let used = (len_word as usize).div_ceil(4);
                    for _ in 0..used {
                        input.read_raw_bits(32)?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor;
    use bitio::{CompressionModel, StreamMode};

    fn full_schema() -> Schema {
        Schema::new(
            1,
            vec![
                FieldDescriptor::new("flag", FieldKind::Bool),
                FieldDescriptor::new("count", FieldKind::Int).with_bits(20),
                FieldDescriptor::new("id", FieldKind::UInt),
                FieldDescriptor::new("heat", FieldKind::Float).with_precision(2),
                FieldDescriptor::new("aim", FieldKind::Vector2).with_precision(1),
                FieldDescriptor::new("pos", FieldKind::Vector3).with_precision(3),
                FieldDescriptor::new("rot", FieldKind::Quaternion).with_precision(3),
                FieldDescriptor::new("name", FieldKind::String).with_array_size(12),
                FieldDescriptor::new("blob", FieldKind::Bytes).with_array_size(6),
            ],
        )
        .unwrap()
    }

    fn write_sample(schema: &Schema, buffer: &mut [u32], name: Option<&str>) {
        let mut writer = FieldWriter::new(schema, buffer).unwrap();
        writer.write_bool(true).unwrap();
        writer.write_int(-7).unwrap();
        writer.write_uint(900).unwrap();
        writer.write_float(3.25).unwrap();
        writer.write_vector2([1.5, -2.5]).unwrap();
        writer.write_vector3([0.001, -0.002, 10.0]).unwrap();
        writer.write_quaternion([0.0, 0.707, 0.0, 0.707]).unwrap();
        writer.write_string(name).unwrap();
        writer.write_bytes(&[1, 2, 3]).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn writer_reader_symmetry() {
        let schema = full_schema();
        let mut buffer = vec![0u32; schema.word_count()];
        write_sample(&schema, &mut buffer, Some("player"));

        let mut reader = FieldReader::new(&schema, &buffer).unwrap();
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_int().unwrap(), -7);
        assert_eq!(reader.read_uint().unwrap(), 900);
        assert!((reader.read_float().unwrap() - 3.25).abs() < 0.01);
        let aim = reader.read_vector2().unwrap();
        assert!((aim[0] - 1.5).abs() < 0.1 && (aim[1] + 2.5).abs() < 0.1);
        let pos = reader.read_vector3().unwrap();
        assert!((pos[0] - 0.001).abs() < 0.001);
        assert!((pos[2] - 10.0).abs() < 0.001);
        let rot = reader.read_quaternion().unwrap();
        assert!((rot[1] - 0.707).abs() < 0.001);
        assert_eq!(reader.read_string().unwrap().as_deref(), Some("player"));
        assert_eq!(reader.read_bytes().unwrap(), vec![1, 2, 3]);
        reader.finish().unwrap();
    }

    #[test]
    fn null_and_empty_strings() {
        let schema = Schema::new(
            0,
            vec![FieldDescriptor::new("s", FieldKind::String).with_array_size(8)],
        )
        .unwrap();
        let mut buffer = vec![0u32; schema.word_count()];

        let mut writer = FieldWriter::new(&schema, &mut buffer).unwrap();
        writer.write_string(None).unwrap();
        writer.finish().unwrap();
        let mut reader = FieldReader::new(&schema, &buffer).unwrap();
        assert_eq!(reader.read_string().unwrap(), None);

        let mut writer = FieldWriter::new(&schema, &mut buffer).unwrap();
        writer.write_string(Some("")).unwrap();
        writer.finish().unwrap();
        let mut reader = FieldReader::new(&schema, &buffer).unwrap();
        assert_eq!(reader.read_string().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn string_truncates_at_char_boundary() {
        let schema = Schema::new(
            0,
            vec![FieldDescriptor::new("s", FieldKind::String).with_array_size(5)],
        )
        .unwrap();
        let mut buffer = vec![0u32; schema.word_count()];

        // "aé" is three bytes; "aéé" is five, "aééé" is seven and must drop
        // the last two-byte char rather than split it.
        let mut writer = FieldWriter::new(&schema, &mut buffer).unwrap();
        writer.write_string(Some("a\u{e9}\u{e9}\u{e9}")).unwrap();
        writer.finish().unwrap();
        let mut reader = FieldReader::new(&schema, &buffer).unwrap();
        assert_eq!(reader.read_string().unwrap().as_deref(), Some("a\u{e9}\u{e9}"));
    }

    #[test]
    fn bytes_reject_oversized_value() {
        let schema = Schema::new(
            0,
            vec![FieldDescriptor::new("b", FieldKind::Bytes).with_array_size(4)],
        )
        .unwrap();
        let mut buffer = vec![0u32; schema.word_count()];
        let mut writer = FieldWriter::new(&schema, &mut buffer).unwrap();
        assert!(matches!(
            writer.write_bytes(&[0; 5]),
            Err(SchemaError::ValueTooLong { max: 4, .. })
        ));
    }

    #[test]
    fn out_of_order_access_is_rejected() {
        let schema = full_schema();
        let mut buffer = vec![0u32; schema.word_count()];
        let mut writer = FieldWriter::new(&schema, &mut buffer).unwrap();
        assert!(matches!(
            writer.write_int(1),
            Err(SchemaError::WrongFieldKind {
                field: 0,
                expected: FieldKind::Bool,
                found: FieldKind::Int,
            })
        ));
    }

    #[test]
    fn finish_requires_all_fields() {
        let schema = full_schema();
        let mut buffer = vec![0u32; schema.word_count()];
        let mut writer = FieldWriter::new(&schema, &mut buffer).unwrap();
        writer.write_bool(false).unwrap();
        assert!(matches!(
            writer.finish(),
            Err(SchemaError::MissingFields { visited: 1, .. })
        ));
    }

    #[test]
    fn raw_marshaling_roundtrip() {
        let schema = full_schema().with_context_base(0);
        let mut buffer = vec![0u32; schema.word_count()];
        write_sample(&schema, &mut buffer, None);

        let model = CompressionModel::uniform(schema.context_span() as usize);
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        copy_fields_to_stream(&schema, &buffer, &mut out).unwrap();
        let bytes = out.finish();

        let mut restored = vec![0u32; schema.word_count()];
        let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
        copy_fields_from_stream(&schema, &mut restored, &mut input).unwrap();
        assert_eq!(restored, buffer);
    }

    #[test]
    fn skip_consumes_exactly_one_buffer() {
        let schema = full_schema().with_context_base(0);
        let mut buffer = vec![0u32; schema.word_count()];
        write_sample(&schema, &mut buffer, Some("x"));

        let model = CompressionModel::uniform(schema.context_span() as usize);
        let mut out = OutputStream::new(StreamMode::Raw, &model);
        copy_fields_to_stream(&schema, &buffer, &mut out).unwrap();
        out.write_packed_uint(0, 777).unwrap();
        let bytes = out.finish();

        let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
        skip_fields(&schema, &mut input).unwrap();
        assert_eq!(input.read_packed_uint(0).unwrap(), 777);
    }

    #[test]
    fn quantization_tolerance() {
        for precision in 1..=3u8 {
            let tolerance = 10f32.powi(-i32::from(precision));
            for value in [-12.345f32, 0.0, 0.5, 99.99] {
                let restored = dequantize(quantize(value, precision), precision);
                assert!(
                    (restored - value).abs() <= tolerance,
                    "precision {precision}, value {value}, got {restored}"
                );
            }
        }
        // Precision zero is bit-exact.
        assert_eq!(dequantize(quantize(1.23456789, 0), 0), 1.23456789);
    }
}
