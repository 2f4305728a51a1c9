//! medley: collections, playlists and the value wire format of a
//! music-library daemon.
//!
//! # Overview
//!
//! Everything clients exchange with the daemon is a [`Value`]: scalars,
//! lists, dicts, bit buffers and [`Collection`]s. A collection is a query
//! expression tree over the media library (set operations, property filters,
//! ordering, windows, literal id lists). Named collections live in the
//! [`CollectionDag`], split into the Collections and Playlists namespaces,
//! where they may reference each other but never form a cycle.
//!
//! # Quick Start
//!
//! ```rust
//! use medley::codec::{decode_value, encode_value};
//! use medley::{CollectionBuilder, CollectionDag, MemoryLibrary, Namespace, Value};
//!
//! let library = MemoryLibrary::new();
//! let a = library.insert_with([("artist", "Air"), ("title", "La femme d'argent")]);
//! let b = library.insert_with([("artist", "Blur"), ("title", "Tender")]);
//!
//! let dag = CollectionDag::default();
//! let air = CollectionBuilder::universe().equals("artist", "air").build();
//! dag.save("air", Namespace::Collections, air.clone()).unwrap();
//!
//! assert_eq!(dag.query_ids(&air, &library).unwrap(), vec![a]);
//! assert_eq!(dag.find(b, Namespace::Collections, &library).unwrap(), Vec::<String>::new());
//!
//! // Collections travel as values
//! let bytes = encode_value(&Value::Collection(air.clone())).unwrap();
//! assert_eq!(decode_value(&bytes).unwrap(), Value::Collection(air));
//! ```
//!
//! # Modules
//!
//! - [`model`]: values, lists, dicts, bit buffers, collections and builders
//! - [`codec`]: the big-endian value wire format
//! - [`validate`]: structural and referential collection checks
//! - [`dag`]: the namespaced collection store
//! - [`query`]: collection evaluation, collations and projections
//! - [`playlist`]: playlist cursor, mutations and party shuffle
//! - [`signal`]: change notifications
//! - [`persist`]: DAG snapshot files
//! - [`ipc`]: the value-in, value-out call surface
//! - [`medialib`]: the media library seen by the evaluator
//! - [`config`]: startup configuration
//! - [`error`]: error types
//! - [`limits`]: decoder limits and file constants
//!
//! # Wire Format
//!
//! Values are encoded as a big-endian `u32` type tag followed by the payload.
//! DAG snapshot files wrap an encoded value:
//! - Uncompressed: `MDAG` magic + version + value
//! - Compressed: `MDAGZ` magic + uncompressed size + zstd data

pub mod codec;
pub mod config;
pub mod dag;
pub mod error;
pub mod ipc;
pub mod limits;
pub mod medialib;
pub mod model;
pub mod persist;
pub mod playlist;
pub mod query;
pub mod signal;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{decode_value, encode_value};
pub use config::{ConfigError, CoreConfig};
pub use dag::{ALL_MEDIA, CollectionDag, CollectionResolver, DEFAULT_PLAYLIST, Namespace};
pub use error::{CoreError, DecodeError, EncodeError, ErrorKind, Result};
pub use ipc::{CoreService, Method};
pub use medialib::{MediaLibrary, MemoryLibrary};
pub use model::{
    Bitbuffer, Collection, CollectionBuilder, CollectionType, Dict, DictCursor, List, ListCursor,
    Value, ValueType,
};
pub use playlist::{PartyShuffleUpdater, PlaylistEngine};
pub use query::Projection;
pub use signal::{CollectionChange, PlaylistChange, Signal, SignalBus, Subscription};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
