//! Top-level framing.
//!
//! - Uncompressed: `QSER` magic + version byte + root value
//! - Compressed: `QSERZ` magic + varint uncompressed size + zstd data
//!
//! The decoder detects the format from the magic bytes. Each call owns a
//! fresh identity stack.

use std::io::Read;

use crate::codec::object::{ObjectDecoder, ObjectEncoder};
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{
    DEFAULT_MAX_DEPTH, FORMAT_VERSION, MAGIC_COMPRESSED, MAGIC_UNCOMPRESSED, MAX_PAYLOAD_SIZE,
    MIN_FORMAT_VERSION,
};
use crate::model::{ObjectRef, Value};
use crate::schema::ClassRegistry;

/// Options for encoding and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Maximum nesting of objects, lists and maps.
    pub max_depth: usize,
    /// zstd level; `None` writes an uncompressed frame. Ignored when decoding.
    pub compression_level: Option<i32>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            compression_level: None,
        }
    }
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compressed(level: i32) -> Self {
        Self {
            compression_level: Some(level),
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Encodes the object graph rooted at `root`.
pub fn encode(registry: &ClassRegistry, root: &ObjectRef) -> Result<Vec<u8>, EncodeError> {
    encode_with_options(registry, root, CodecOptions::default())
}

/// Encodes the object graph rooted at `root` with zstd compression.
pub fn encode_compressed(
    registry: &ClassRegistry,
    root: &ObjectRef,
    level: i32,
) -> Result<Vec<u8>, EncodeError> {
    encode_with_options(registry, root, CodecOptions::compressed(level))
}

pub fn encode_with_options(
    registry: &ClassRegistry,
    root: &ObjectRef,
    options: CodecOptions,
) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = ObjectEncoder::with_max_depth(registry, options.max_depth);
    encoder.writer().write_bytes(MAGIC_UNCOMPRESSED);
    encoder.writer().write_byte(FORMAT_VERSION);
    encoder.write_value(&Value::Object(root.clone()))?;
    let uncompressed = encoder.into_bytes();

    let Some(level) = options.compression_level else {
        return Ok(uncompressed);
    };
    let compressed = zstd::encode_all(uncompressed.as_slice(), level)
        .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;

    let mut writer = Writer::with_capacity(5 + 10 + compressed.len());
    writer.write_bytes(MAGIC_COMPRESSED);
    writer.write_varint(uncompressed.len() as u64);
    writer.write_bytes(&compressed);
    Ok(writer.into_bytes())
}

/// Decodes an object graph written by [`encode`] or [`encode_compressed`].
pub fn decode(registry: &ClassRegistry, input: &[u8]) -> Result<ObjectRef, DecodeError> {
    decode_with_options(registry, input, CodecOptions::default())
}

pub fn decode_with_options(
    registry: &ClassRegistry,
    input: &[u8],
    options: CodecOptions,
) -> Result<ObjectRef, DecodeError> {
    if input.len() < 4 {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }
    if input.starts_with(MAGIC_COMPRESSED) {
        let decompressed = decompress_zstd(&input[5..])?;
        decode_frame(registry, &decompressed, options)
    } else if input.starts_with(MAGIC_UNCOMPRESSED) {
        if input.len() > MAX_PAYLOAD_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "payload",
                len: input.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        decode_frame(registry, input, options)
    } else {
        Err(invalid_magic(input))
    }
}

/// Unwraps a compressed frame into the equivalent uncompressed frame.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if input.len() < 5 {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }
    if !input.starts_with(MAGIC_COMPRESSED) {
        return Err(invalid_magic(input));
    }
    decompress_zstd(&input[5..])
}

fn invalid_magic(input: &[u8]) -> DecodeError {
    let mut found = [0u8; 4];
    found.copy_from_slice(&input[0..4]);
    DecodeError::InvalidMagic { found }
}

fn decode_frame(
    registry: &ClassRegistry,
    frame: &[u8],
    options: CodecOptions,
) -> Result<ObjectRef, DecodeError> {
    let mut decoder = ObjectDecoder::with_max_depth(registry, frame, options.max_depth);
    let magic = decoder.reader().read_bytes(4, "magic")?;
    if magic != MAGIC_UNCOMPRESSED {
        return Err(invalid_magic(frame));
    }
    let version = decoder.reader().read_byte("version")?;
    if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(DecodeError::UnsupportedVersion { version });
    }

    let root = match decoder.read_value()? {
        Value::Object(obj) => obj,
        _ => {
            return Err(DecodeError::MalformedEncoding {
                context: "root value is not an object",
            });
        }
    };
    let remaining = decoder.reader().remaining_len();
    if remaining > 0 {
        return Err(DecodeError::TrailingBytes { remaining });
    }
    Ok(root)
}

fn decompress_zstd(compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut reader = Reader::new(compressed);
    let declared_size = reader.read_len(MAX_PAYLOAD_SIZE, "uncompressed_size")?;

    let decoder = zstd::Decoder::new(reader.remaining())
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    // Never inflate past the declared size; one extra byte exposes a mismatch
    let mut decompressed = Vec::with_capacity(declared_size);
    decoder
        .take(declared_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() != declared_size {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }
    Ok(decompressed)
}
