//! DAG snapshot files.
//!
//! Two framings share one payload, the wire encoding of
//! [`CollectionDag::snapshot`]:
//!
//! ```text
//! uncompressed: "MDAG"  version:u8 value
//! compressed:   "MDAGZ" size:u32   zstd(uncompressed file)
//! ```
//!
//! `size` is the length of the uncompressed file and is checked after
//! decompression.

use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::codec::{Reader, Writer, decode_value, encode_value};
use crate::config::PersistConfig;
use crate::dag::CollectionDag;
use crate::error::{CoreError, DecodeError, EncodeError, Result};
use crate::limits::{FORMAT_VERSION, MAGIC_COMPRESSED, MAGIC_UNCOMPRESSED, MAX_SNAPSHOT_SIZE};
use crate::model::Value;

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a snapshot value into a file image.
pub fn encode_dag(snapshot: &Value, options: &PersistConfig) -> std::result::Result<Vec<u8>, EncodeError> {
    let payload = encode_value(snapshot)?;
    let mut writer = Writer::with_capacity(MAGIC_UNCOMPRESSED.len() + 1 + payload.len());
    writer.write_bytes(MAGIC_UNCOMPRESSED);
    writer.write_byte(FORMAT_VERSION);
    writer.write_bytes(&payload);
    let uncompressed = writer.into_bytes();

    if !options.compress {
        return Ok(uncompressed);
    }
    if uncompressed.len() > MAX_SNAPSHOT_SIZE {
        return Err(EncodeError::LengthExceedsLimit {
            field: "snapshot",
            len: uncompressed.len(),
            max: MAX_SNAPSHOT_SIZE,
        });
    }

    let compressed = zstd::encode_all(uncompressed.as_slice(), options.zstd_level)
        .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;

    let mut writer = Writer::with_capacity(MAGIC_COMPRESSED.len() + 4 + compressed.len());
    writer.write_bytes(MAGIC_COMPRESSED);
    writer.write_u32(uncompressed.len() as u32);
    writer.write_bytes(&compressed);
    Ok(writer.into_bytes())
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a file image in either framing back into the snapshot value.
pub fn decode_dag(input: &[u8]) -> std::result::Result<Value, DecodeError> {
    if input.len() < MAGIC_UNCOMPRESSED.len() {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }

    if input.starts_with(MAGIC_COMPRESSED) {
        let decompressed = decompress(&input[MAGIC_COMPRESSED.len()..])?;
        if decompressed.starts_with(MAGIC_COMPRESSED) {
            return Err(invalid_magic(&decompressed));
        }
        decode_dag(&decompressed)
    } else if input.starts_with(MAGIC_UNCOMPRESSED) {
        if input.len() > MAX_SNAPSHOT_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "snapshot",
                len: input.len(),
                max: MAX_SNAPSHOT_SIZE,
            });
        }
        let mut reader = Reader::new(&input[MAGIC_UNCOMPRESSED.len()..]);
        let version = reader.read_byte("version")?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion { version });
        }
        let remaining = reader.remaining_len();
        decode_value(reader.read_bytes(remaining, "snapshot")?)
    } else {
        Err(invalid_magic(input))
    }
}

fn invalid_magic(input: &[u8]) -> DecodeError {
    let mut found = [0u8; 4];
    let n = input.len().min(4);
    found[..n].copy_from_slice(&input[..n]);
    DecodeError::InvalidMagic { found }
}

fn decompress(compressed: &[u8]) -> std::result::Result<Vec<u8>, DecodeError> {
    let mut reader = Reader::new(compressed);
    let declared_size = reader.read_u32("uncompressed_size")? as usize;
    if declared_size > MAX_SNAPSHOT_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "uncompressed_size",
            len: declared_size,
            max: MAX_SNAPSHOT_SIZE,
        });
    }

    let remaining = reader.remaining_len();
    let decoder = zstd::Decoder::new(reader.read_bytes(remaining, "compressed")?)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    // One byte past the declared size is enough to detect a lie.
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

// =============================================================================
// FILES
// =============================================================================

fn io_error(path: &Path, err: impl std::fmt::Display) -> CoreError {
    CoreError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Writes the DAG to `path`, replacing the file atomically.
pub fn save(dag: &CollectionDag, path: impl AsRef<Path>, options: &PersistConfig) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_dag(&dag.snapshot(), options)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(path, e))?;
    file.write_all(&bytes).map_err(|e| io_error(path, e))?;
    file.as_file().sync_all().map_err(|e| io_error(path, e))?;
    file.persist(path).map_err(|e| io_error(path, e.error))?;

    info!(path = %path.display(), bytes = bytes.len(), compressed = options.compress, "collection DAG saved");
    Ok(())
}

/// Replaces the DAG's contents with the snapshot stored at `path`.
pub fn load(dag: &CollectionDag, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
    let snapshot = decode_dag(&bytes)?;
    dag.restore(&snapshot)?;
    info!(path = %path.display(), bytes = bytes.len(), "collection DAG loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Namespace;
    use crate::error::ErrorKind;
    use crate::model::{Collection, CollectionBuilder};

    fn sample_dag() -> CollectionDag {
        let dag = CollectionDag::default();
        dag.save(
            "rock",
            Namespace::Collections,
            CollectionBuilder::universe().equals("genre", "rock").build(),
        )
        .unwrap();
        dag.save(
            "mix",
            Namespace::Playlists,
            Collection::idlist_of([3, 1, 2]),
        )
        .unwrap();
        dag
    }

    #[test]
    fn test_both_framings_decode() {
        let snapshot = sample_dag().snapshot();
        for compress in [false, true] {
            let options = PersistConfig {
                compress,
                ..PersistConfig::default()
            };
            let bytes = encode_dag(&snapshot, &options).unwrap();
            assert_eq!(bytes.starts_with(MAGIC_COMPRESSED), compress);
            assert_eq!(decode_dag(&bytes).unwrap(), snapshot);
        }
    }

    #[test]
    fn test_bad_headers() {
        assert!(matches!(
            decode_dag(b"XYZW\x01"),
            Err(DecodeError::InvalidMagic { found }) if &found == b"XYZW"
        ));
        assert!(matches!(
            decode_dag(b"MDAG\x09\x00"),
            Err(DecodeError::UnsupportedVersion { version: 9 })
        ));
        assert!(matches!(
            decode_dag(b"MD"),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_size_mismatch() {
        let snapshot = sample_dag().snapshot();
        let mut bytes = encode_dag(&snapshot, &PersistConfig::default()).unwrap();
        // declared size lives right after the magic
        bytes[8] = bytes[8].wrapping_add(1);
        assert!(matches!(
            decode_dag(&bytes),
            Err(DecodeError::UncompressedSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collections.mdag");
        let original = sample_dag();
        save(&original, &path, &PersistConfig::default()).unwrap();

        let restored = CollectionDag::default();
        load(&restored, &path).unwrap();
        assert_eq!(restored.snapshot(), original.snapshot());
        assert_eq!(
            restored.get("mix", Namespace::Playlists).unwrap().ids(),
            vec![3, 1, 2]
        );

        let err = load(&restored, dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
