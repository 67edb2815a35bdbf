//! Per-context compression model for packed-integer bucket symbols.
//!
//! Each context holds a canonical Huffman code over the [`BUCKET_COUNT`]
//! bucket symbols of the packed-integer coding. Models can be built from
//! captured symbol frequencies and serialized to a small blob that the
//! server ships to clients during the handshake.

use std::fmt;

use crate::error::{BitError, BitResult};
use crate::packed::BUCKET_COUNT;
use crate::reader::BitReader;

/// Maximum canonical code length, in bits.
pub const MAX_CODE_LEN: u8 = 8;

/// Maximum number of contexts a model may carry.
pub const MAX_MODEL_CONTEXTS: usize = 4096;

const CONTEXT_BLOB_BYTES: usize = BUCKET_COUNT.div_ceil(2);

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors from building or deserializing a compression model.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    /// Model blob ended before all contexts were read.
    Truncated { needed: usize, available: usize },

    /// A serialized code length is zero or exceeds [`MAX_CODE_LEN`].
    InvalidLength {
        context: usize,
        symbol: usize,
        length: u8,
    },

    /// The code lengths of a context violate the Kraft inequality.
    OverfullCode { context: usize },

    /// The blob names more contexts than [`MAX_MODEL_CONTEXTS`].
    TooManyContexts { count: usize, max: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, available } => {
                write!(f, "model blob truncated: need {needed}, have {available}")
            }
            Self::InvalidLength {
                context,
                symbol,
                length,
            } => {
                write!(
                    f,
                    "invalid code length {length} for symbol {symbol} in context {context}"
                )
            }
            Self::OverfullCode { context } => {
                write!(f, "overfull code in context {context}")
            }
            Self::TooManyContexts { count, max } => {
                write!(f, "model has {count} contexts, maximum is {max}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

/// Canonical Huffman code for one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextModel {
    lengths: [u8; BUCKET_COUNT],
    codes: [u16; BUCKET_COUNT],
    /// Symbols sorted by (length, symbol), for canonical decoding.
    sorted: [u8; BUCKET_COUNT],
    /// First canonical code of each length, indexed by length.
    first_code: [u16; MAX_CODE_LEN as usize + 1],
    /// Index into `sorted` of the first symbol of each length.
    first_index: [u8; MAX_CODE_LEN as usize + 1],
    /// Number of symbols of each length.
    count: [u8; MAX_CODE_LEN as usize + 1],
}

impl ContextModel {
    /// Builds a canonical code from per-symbol lengths.
    pub fn from_lengths(context: usize, lengths: [u8; BUCKET_COUNT]) -> ModelResult<Self> {
        let mut kraft = 0u32;
        for (symbol, &length) in lengths.iter().enumerate() {
            if length == 0 || length > MAX_CODE_LEN {
                return Err(ModelError::InvalidLength {
                    context,
                    symbol,
                    length,
                });
            }
            kraft += 1u32 << (MAX_CODE_LEN - length);
        }
        if kraft > 1u32 << MAX_CODE_LEN {
            return Err(ModelError::OverfullCode { context });
        }

        let mut sorted: [u8; BUCKET_COUNT] = [0; BUCKET_COUNT];
        for (i, slot) in sorted.iter_mut().enumerate() {
            *slot = i as u8;
        }
        sorted.sort_by_key(|&s| (lengths[s as usize], s));

        let mut codes = [0u16; BUCKET_COUNT];
        let mut first_code = [0u16; MAX_CODE_LEN as usize + 1];
        let mut first_index = [0u8; MAX_CODE_LEN as usize + 1];
        let mut count = [0u8; MAX_CODE_LEN as usize + 1];

        let mut code = 0u16;
        let mut prev_len = 0u8;
        for (index, &symbol) in sorted.iter().enumerate() {
            let len = lengths[symbol as usize];
            code <<= len - prev_len;
            if count[len as usize] == 0 {
                first_code[len as usize] = code;
                first_index[len as usize] = index as u8;
            }
            codes[symbol as usize] = code;
            count[len as usize] += 1;
            code += 1;
            prev_len = len;
        }

        Ok(Self {
            lengths,
            codes,
            sorted,
            first_code,
            first_index,
            count,
        })
    }

    /// Returns the code lengths of this context.
    #[must_use]
    pub const fn lengths(&self) -> &[u8; BUCKET_COUNT] {
        &self.lengths
    }

    /// Returns the (code, length) pair for a bucket symbol.
    #[must_use]
    pub fn encode(&self, symbol: usize) -> (u16, u8) {
        (self.codes[symbol], self.lengths[symbol])
    }

    /// Decodes one bucket symbol from the reader.
    pub fn decode(&self, context: u16, reader: &mut BitReader<'_>) -> BitResult<usize> {
        let mut code = 0u16;
        for len in 1..=MAX_CODE_LEN {
            code = (code << 1) | u16::from(reader.read_bit()?);
            let n = self.count[len as usize];
            if n == 0 {
                continue;
            }
            let first = self.first_code[len as usize];
            if code >= first && code < first + u16::from(n) {
                let index = self.first_index[len as usize] + (code - first) as u8;
                return Ok(self.sorted[index as usize] as usize);
            }
        }
        Err(BitError::InvalidSymbol { context })
    }
}

/// A set of per-context canonical codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionModel {
    contexts: Vec<ContextModel>,
}

impl CompressionModel {
    /// Creates a model where every context uses a balanced (3-bit) code.
    ///
    /// This is the default model both peers assume before a trained model
    /// has been exchanged.
    #[must_use]
    pub fn uniform(contexts: usize) -> Self {
        let lengths = [3u8; BUCKET_COUNT];
        let context = ContextModel::from_lengths(0, lengths)
            .unwrap_or_else(|_| unreachable!("balanced lengths satisfy Kraft"));
        Self {
            contexts: vec![context; contexts.max(1)],
        }
    }

    /// Returns the number of contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Returns the model for a context, falling back to context 0 when out
    /// of range.
    #[must_use]
    pub fn context(&self, context: u16) -> &ContextModel {
        self.contexts
            .get(context as usize)
            .unwrap_or(&self.contexts[0])
    }

    /// Serializes the model to a blob: context count, then nibble-packed
    /// code lengths per context.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.contexts.len() * CONTEXT_BLOB_BYTES);
        out.extend_from_slice(&(self.contexts.len() as u16).to_le_bytes());
        for context in &self.contexts {
            let lengths = context.lengths();
            for pair in 0..CONTEXT_BLOB_BYTES {
                let lo = lengths[pair * 2];
                let hi = if pair * 2 + 1 < BUCKET_COUNT {
                    lengths[pair * 2 + 1]
                } else {
                    0
                };
                out.push(lo | (hi << 4));
            }
        }
        out
    }

    /// Deserializes a model blob, validating every context's code.
    pub fn from_bytes(bytes: &[u8]) -> ModelResult<Self> {
        if bytes.len() < 2 {
            return Err(ModelError::Truncated {
                needed: 2,
                available: bytes.len(),
            });
        }
        let count = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        if count == 0 || count > MAX_MODEL_CONTEXTS {
            return Err(ModelError::TooManyContexts {
                count,
                max: MAX_MODEL_CONTEXTS,
            });
        }
        let needed = 2 + count * CONTEXT_BLOB_BYTES;
        if bytes.len() < needed {
            return Err(ModelError::Truncated {
                needed,
                available: bytes.len(),
            });
        }

        let mut contexts = Vec::with_capacity(count);
        for index in 0..count {
            let blob = &bytes[2 + index * CONTEXT_BLOB_BYTES..];
            let mut lengths = [0u8; BUCKET_COUNT];
            for (symbol, slot) in lengths.iter_mut().enumerate() {
                let byte = blob[symbol / 2];
                *slot = if symbol % 2 == 0 {
                    byte & 0x0F
                } else {
                    byte >> 4
                };
            }
            contexts.push(ContextModel::from_lengths(index, lengths)?);
        }
        Ok(Self { contexts })
    }
}

/// Per-context symbol frequency capture for model training.
///
/// Attach a capture to an output stream during a live session, then bake a
/// static model from the recorded counts.
#[derive(Debug, Clone)]
pub struct FrequencyCapture {
    counts: Vec<[u64; BUCKET_COUNT]>,
}

impl FrequencyCapture {
    /// Creates a capture for the given number of contexts.
    #[must_use]
    pub fn new(contexts: usize) -> Self {
        Self {
            counts: vec![[0; BUCKET_COUNT]; contexts.max(1)],
        }
    }

    /// Records one occurrence of a bucket symbol in a context.
    pub fn record(&mut self, context: u16, symbol: usize) {
        let index = (context as usize).min(self.counts.len() - 1);
        self.counts[index][symbol] += 1;
    }

    /// Returns the total number of recorded symbols.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .map(|c| c.iter().sum::<u64>())
            .sum::<u64>()
    }

    /// Builds a static model from the recorded frequencies.
    ///
    /// Counts are smoothed by one so every symbol stays encodable.
    #[must_use]
    pub fn build_model(&self) -> CompressionModel {
        let contexts = self
            .counts
            .iter()
            .enumerate()
            .map(|(index, counts)| {
                let lengths = huffman_lengths(counts);
                ContextModel::from_lengths(index, lengths)
                    .unwrap_or_else(|_| unreachable!("huffman lengths satisfy Kraft"))
            })
            .collect();
        CompressionModel { contexts }
    }
}

/// Computes Huffman code lengths for the smoothed counts.
fn huffman_lengths(counts: &[u64; BUCKET_COUNT]) -> [u8; BUCKET_COUNT] {
    // (weight, member symbols) groups, merged smallest-first.
    let mut groups: Vec<(u64, Vec<usize>)> = counts
        .iter()
        .enumerate()
        .map(|(symbol, &count)| (count + 1, vec![symbol]))
        .collect();
    let mut lengths = [0u8; BUCKET_COUNT];

    while groups.len() > 1 {
        groups.sort_by(|a, b| b.0.cmp(&a.0));
        let (w1, s1) = groups.pop().unwrap_or_else(|| unreachable!());
        let (w2, s2) = groups.pop().unwrap_or_else(|| unreachable!());
        for &symbol in s1.iter().chain(s2.iter()) {
            lengths[symbol] += 1;
        }
        let mut merged = s1;
        merged.extend(s2);
        groups.push((w1 + w2, merged));
    }
    lengths
}
