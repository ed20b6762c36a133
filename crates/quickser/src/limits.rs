//! Format constants and security limits for decoding.
//!
//! Every length read from the wire is checked against one of these bounds
//! before anything is allocated.

/// Magic bytes of an uncompressed frame.
pub const MAGIC_UNCOMPRESSED: &[u8; 4] = b"QSER";

/// Magic bytes of a zstd-compressed frame.
pub const MAGIC_COMPRESSED: &[u8; 5] = b"QSERZ";

/// Current frame format version.
pub const FORMAT_VERSION: u8 = 1;

/// Oldest frame format version the decoder accepts.
pub const MIN_FORMAT_VERSION: u8 = 1;

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum length of a text value in bytes.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum length of a byte blob (also bounds decimal mantissas).
pub const MAX_BYTES_LEN: usize = 64 * 1024 * 1024;

/// Maximum element count of a list or map.
pub const MAX_COLLECTION_LEN: usize = 16 * 1024 * 1024;

/// Maximum number of fields in one encoded object or schema record.
pub const MAX_FIELDS_PER_OBJECT: usize = 65_536;

/// Maximum length of a type or field name.
pub const MAX_NAME_LEN: usize = 4096;

/// Maximum number of classes in a persisted schema table.
pub const MAX_SCHEMA_TABLE_LEN: usize = 1 << 20;

/// Maximum size of a decompressed payload.
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

/// Default bound on object nesting during one encode or decode call.
pub const DEFAULT_MAX_DEPTH: usize = 512;
