//! Error types for the value model, the wire codec, the collection DAG and
//! the playlist engine.

use thiserror::Error;

use crate::dag::Namespace;
use crate::model::ValueType;

/// Error taxonomy shared by every operation in the crate.
///
/// Every [`CoreError`] maps onto exactly one kind; clients receive the kind's
/// code as the prefix of the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// E001: unknown name, namespace or media entry
    NotFound,
    /// E002: save would create a direct or indirect self-reference
    CyclicCollection,
    /// E003: value accessed as the wrong type, or list restriction violated
    TypeMismatch,
    /// E004: list or idlist index out of range
    InvalidIndex,
    /// E005: malformed request, collection structure or wire data
    InvalidRequest,
}

impl ErrorKind {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "E001",
            ErrorKind::CyclicCollection => "E002",
            ErrorKind::TypeMismatch => "E003",
            ErrorKind::InvalidIndex => "E004",
            ErrorKind::InvalidRequest => "E005",
        }
    }
}

/// Error raised by collection, query and playlist operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    // === E001: not found ===
    #[error("[E001] no collection named '{name}' in namespace {namespace}")]
    CollectionNotFound { name: String, namespace: Namespace },

    #[error("[E001] invalid collection namespace '{0}'")]
    InvalidNamespace(String),

    #[error("[E001] no media entry with id {0}")]
    EntryNotFound(i64),

    #[error("[E001] no dict entry with key '{0}'")]
    KeyNotFound(String),

    #[error("[E001] no current entry in playlist '{0}'")]
    NoCurrentEntry(String),

    // === E002: cycles ===
    #[error("[E002] saving '{name}' in {namespace} would create a reference cycle")]
    CyclicCollection { name: String, namespace: Namespace },

    // === E003: type mismatch ===
    #[error("[E003] expected a {expected} value, found {found}")]
    TypeMismatch { expected: ValueType, found: ValueType },

    #[error("[E003] list restricted to {restricted} cannot hold a {found} value")]
    RestrictionViolated { restricted: ValueType, found: ValueType },

    // === E004: index ===
    #[error("[E004] index {index} out of range for length {len}")]
    InvalidIndex { index: i64, len: usize },

    // === E005: malformed requests ===
    #[error("[E005] invalid request: {0}")]
    InvalidRequest(String),

    #[error("[E005] invalid collection structure: {0}")]
    InvalidCollection(String),

    #[error("[E005] collection '{name}' in {namespace} is referenced by '{referrer}'")]
    CollectionInUse {
        name: String,
        namespace: Namespace,
        referrer: String,
    },

    #[error("[E005] {0}")]
    Decode(#[from] DecodeError),

    #[error("[E005] {0}")]
    Encode(#[from] EncodeError),

    #[error("[E005] i/o error on {path}: {message}")]
    Io { path: String, message: String },
}

impl CoreError {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::CollectionNotFound { .. }
            | CoreError::InvalidNamespace(_)
            | CoreError::EntryNotFound(_)
            | CoreError::KeyNotFound(_)
            | CoreError::NoCurrentEntry(_) => ErrorKind::NotFound,
            CoreError::CyclicCollection { .. } => ErrorKind::CyclicCollection,
            CoreError::TypeMismatch { .. } | CoreError::RestrictionViolated { .. } => {
                ErrorKind::TypeMismatch
            }
            CoreError::InvalidIndex { .. } => ErrorKind::InvalidIndex,
            _ => ErrorKind::InvalidRequest,
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        CoreError::InvalidRequest(message.into())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error during wire decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("invalid value type tag {tag}")]
    InvalidTypeTag { tag: u32 },

    #[error("invalid collection type {kind}")]
    InvalidCollectionType { kind: u32 },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("{field} is not NUL terminated")]
    MissingNul { field: &'static str },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },

    #[error("list restricted to {restricted} holds a {found} element")]
    RestrictionViolated {
        restricted: ValueType,
        found: ValueType,
    },

    #[error("{count} trailing bytes after value")]
    TrailingBytes { count: usize },

    #[error("invalid magic bytes: expected MDAG or MDAGZ, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("unsupported snapshot version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },
}

/// Error during wire encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{0} values cannot be serialized")]
    NotSerializable(ValueType),

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} contains an interior NUL byte")]
    InteriorNul { field: &'static str },

    #[error("nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),
}
