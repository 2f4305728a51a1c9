//! Decoder limits and file-format constants.
//!
//! Every length read from the wire is checked against one of these before
//! anything is allocated.

/// Maximum length of a string or error message, NUL included (16 MiB).
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum length of a binary blob (64 MiB).
pub const MAX_BIN_LEN: usize = 64 * 1024 * 1024;

/// Maximum number of elements in a list, dict or collection attribute set.
pub const MAX_CONTAINER_LEN: usize = 4 * 1024 * 1024;

/// Maximum nesting depth of lists, dicts and collections.
pub const MAX_DEPTH: usize = 256;

/// Maximum number of reference hops followed while evaluating a collection.
pub const MAX_REFERENCE_DEPTH: usize = 64;

/// Maximum size of a decompressed DAG snapshot file (256 MiB).
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024;

/// Magic bytes of an uncompressed DAG snapshot file.
pub const MAGIC_UNCOMPRESSED: &[u8; 4] = b"MDAG";

/// Magic bytes of a zstd-compressed DAG snapshot file.
pub const MAGIC_COMPRESSED: &[u8; 5] = b"MDAGZ";

/// Current snapshot file format version.
pub const FORMAT_VERSION: u8 = 1;
