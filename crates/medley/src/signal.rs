//! Change notifications.
//!
//! Mutations of the collection DAG, the playlists and the media library are
//! published on a [`SignalBus`]. Each subscriber gets its own ordered queue;
//! emission order is preserved per bus.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{trace, warn};

use crate::dag::Namespace;
use crate::model::{Dict, List, Value};

/// Default number of signals buffered per subscriber.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 256;

/// Kind of change reported by [`Signal::CollectionChanged`] (wire codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CollectionChange {
    Add = 0,
    Update = 1,
    Rename = 2,
    Remove = 3,
}

/// Kind of change reported by [`Signal::PlaylistChanged`] (wire codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PlaylistChange {
    Add = 0,
    Insert = 1,
    Shuffle = 2,
    Remove = 3,
    Clear = 4,
    Move = 5,
    Sort = 6,
    Update = 7,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    CollectionChanged {
        change: CollectionChange,
        namespace: Namespace,
        name: String,
        /// Set for renames only.
        new_name: Option<String>,
    },
    PlaylistChanged {
        change: PlaylistChange,
        name: String,
        position: Option<i32>,
        /// Set for moves only.
        new_position: Option<i32>,
        id: Option<i64>,
    },
    PlaylistCurrentPos {
        name: String,
        position: i32,
    },
    PlaylistLoaded {
        name: String,
    },
    MedialibEntryRemoved {
        id: i64,
    },
}

impl Signal {
    pub(crate) fn collection(change: CollectionChange, namespace: Namespace, name: &str) -> Self {
        Signal::CollectionChanged {
            change,
            namespace,
            name: name.to_string(),
            new_name: None,
        }
    }

    pub(crate) fn playlist(change: PlaylistChange, name: &str) -> Self {
        Signal::PlaylistChanged {
            change,
            name: name.to_string(),
            position: None,
            new_position: None,
            id: None,
        }
    }

    /// Returns the client-facing signal name.
    pub fn name(&self) -> &'static str {
        match self {
            Signal::CollectionChanged { .. } => "collection_changed",
            Signal::PlaylistChanged { .. } => "playlist_changed",
            Signal::PlaylistCurrentPos { .. } => "playlist_current_pos",
            Signal::PlaylistLoaded { .. } => "playlist_loaded",
            Signal::MedialibEntryRemoved { .. } => "medialib_entry_removed",
        }
    }

    /// Renders the signal payload as delivered to clients.
    pub fn to_value(&self) -> Value {
        match self {
            Signal::CollectionChanged {
                change,
                namespace,
                name,
                new_name,
            } => {
                let mut dict = Dict::new();
                dict.set("type", *change as i32);
                dict.set("namespace", namespace.as_str());
                dict.set("name", name.as_str());
                if let Some(new_name) = new_name {
                    dict.set("newname", new_name.as_str());
                }
                Value::Dict(dict)
            }
            Signal::PlaylistChanged {
                change,
                name,
                position,
                new_position,
                id,
            } => {
                let mut dict = Dict::new();
                dict.set("type", *change as i32);
                dict.set("name", name.as_str());
                if let Some(position) = position {
                    dict.set("position", *position);
                }
                if let Some(new_position) = new_position {
                    dict.set("newposition", *new_position);
                }
                if let Some(id) = id {
                    dict.set("id", *id);
                }
                Value::Dict(dict)
            }
            Signal::PlaylistCurrentPos { name, position } => {
                let mut dict = Dict::new();
                dict.set("name", name.as_str());
                dict.set("position", *position);
                Value::Dict(dict)
            }
            Signal::PlaylistLoaded { name } => Value::from(name.as_str()),
            Signal::MedialibEntryRemoved { id } => Value::Int64(*id),
        }
    }
}

/// Multi-subscriber signal channel.
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<Signal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}

impl SignalBus {
    /// Creates a bus buffering up to `capacity` signals per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes a signal to every current subscriber.
    pub fn emit(&self, signal: Signal) {
        trace!(signal = signal.name(), ?signal, "emit");
        if self.tx.send(signal).is_err() {
            trace!("no signal subscribers");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A subscriber's queue of signals emitted after it subscribed.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Signal>,
}

impl Subscription {
    /// Returns the next queued signal without waiting.
    pub fn try_next(&mut self) -> Option<Signal> {
        loop {
            match self.rx.try_recv() {
                Ok(signal) => return Some(signal),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "signal subscriber lagged, dropping oldest signals");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Takes every queued signal.
    pub fn drain(&mut self) -> Vec<Signal> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Takes every queued signal, rendered as a list of payload values.
    pub fn drain_value(&mut self) -> Value {
        Value::List(self.drain().iter().map(Signal::to_value).collect::<List>())
    }

    /// Waits for the next signal. Returns `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<Signal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) => return Some(signal),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "signal subscriber lagged, dropping oldest signals");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
