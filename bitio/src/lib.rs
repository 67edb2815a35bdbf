//! Bit packing, packed integer coding, and entropy-coded streams for repnet.
//!
//! This crate provides the lowest layer of the replication protocol:
//! [`BitWriter`] and [`BitReader`] for bit-level encoding and decoding, the
//! bucketed packed-integer coding used for almost every protocol field, and
//! the [`OutputStream`]/[`InputStream`] pair that layers an optional
//! per-context Huffman model on top.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads/writes are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about entities,
//!   snapshots, or connections; contexts are opaque indices.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitio::{CompressionModel, InputStream, OutputStream, StreamMode};
//!
//! let model = CompressionModel::uniform(4);
//! let mut out = OutputStream::new(StreamMode::Raw, &model);
//! out.write_bool(true);
//! out.write_packed_uint(0, 42).unwrap();
//! let bytes = out.finish();
//!
//! let mut input = InputStream::new(StreamMode::Raw, &model, &bytes);
//! assert!(input.read_bool().unwrap());
//! assert_eq!(input.read_packed_uint(0).unwrap(), 42);
//! ```

mod error;
mod model;
mod packed;
mod reader;
mod stream;
mod writer;

pub use error::{BitError, BitResult};
pub use model::{
    CompressionModel, ContextModel, FrequencyCapture, ModelError, ModelResult, MAX_CODE_LEN,
    MAX_MODEL_CONTEXTS,
};
pub use packed::{
    join_packed, read_packed, split_packed, write_packed, zigzag_decode, zigzag_encode,
    BUCKET_COUNT, BUCKET_OFFSETS, BUCKET_WIDTHS,
};
pub use reader::BitReader;
pub use stream::{InputStream, OutputStream, StreamMode};
pub use writer::BitWriter;
