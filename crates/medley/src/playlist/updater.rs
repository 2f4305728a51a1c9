//! Background replenishment of party shuffle playlists.
//!
//! The updater watches the signal bus. Playlist changes, cursor moves, loads
//! and Playlists-namespace collection changes schedule the named playlist;
//! scheduled playlists are then replenished one at a time. Media entry
//! removals are forwarded to [`PlaylistEngine::handle_entry_removed`].
//!
//! The updater hears the signals its own replenishment emits. Replenishing
//! an already full window changes nothing and emits nothing, so that echo
//! dies out after one extra pass.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::dag::Namespace;
use crate::playlist::PlaylistEngine;
use crate::signal::{CollectionChange, Signal, Subscription};

/// Upper bound on schedule/replenish rounds per [`PartyShuffleUpdater::process_pending`] call.
const MAX_ROUNDS: usize = 16;

pub struct PartyShuffleUpdater {
    engine: Arc<PlaylistEngine>,
    subscription: Subscription,
    /// Scheduled playlist names, most recent last, without duplicates.
    pending: Vec<String>,
}

impl PartyShuffleUpdater {
    /// Subscribes to the engine's signal bus. Only signals emitted from now
    /// on are seen.
    pub fn new(engine: Arc<PlaylistEngine>) -> Self {
        let subscription = engine.dag().signals().subscribe();
        Self {
            engine,
            subscription,
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    fn schedule(&mut self, name: &str) {
        if !self.pending.iter().any(|p| p == name) {
            self.pending.push(name.to_string());
        }
    }

    fn observe(&mut self, signal: Signal) {
        match signal {
            Signal::PlaylistChanged { name, .. }
            | Signal::PlaylistCurrentPos { name, .. }
            | Signal::PlaylistLoaded { name } => self.schedule(&name),
            Signal::CollectionChanged {
                namespace: Namespace::Playlists,
                change,
                name,
                new_name,
            } => match change {
                CollectionChange::Remove => self.pending.retain(|p| *p != name),
                CollectionChange::Rename => {
                    self.pending.retain(|p| *p != name);
                    if let Some(new_name) = new_name {
                        self.schedule(&new_name);
                    }
                }
                CollectionChange::Add | CollectionChange::Update => self.schedule(&name),
            },
            Signal::CollectionChanged { .. } => {}
            Signal::MedialibEntryRemoved { id } => {
                if let Err(err) = self.engine.handle_entry_removed(id) {
                    warn!(id, %err, "failed to drop removed entry from playlists");
                }
            }
        }
    }

    /// Replenishes every scheduled playlist. Returns how many changed.
    fn flush(&mut self) -> usize {
        let mut changed = 0;
        while let Some(name) = self.pending.pop() {
            match self.engine.update_party_shuffle(&name) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(err) => debug!(playlist = %name, %err, "party shuffle update skipped"),
            }
        }
        changed
    }

    /// Handles every queued signal, including the ones the updates
    /// themselves emit, until nothing is left. Returns the number of
    /// playlist updates that changed something.
    pub fn process_pending(&mut self) -> usize {
        let mut changed = 0;
        for _ in 0..MAX_ROUNDS {
            for signal in self.subscription.drain() {
                self.observe(signal);
            }
            if self.pending.is_empty() {
                break;
            }
            changed += self.flush();
        }
        changed
    }

    /// Waits for one signal, then handles it along with everything queued.
    /// Returns `None` once the bus is gone.
    pub async fn process_next(&mut self) -> Option<usize> {
        let signal = self.subscription.recv().await?;
        self.observe(signal);
        Some(self.process_pending())
    }

    /// Runs until the bus is gone.
    pub async fn run(mut self) {
        debug!("party shuffle updater started");
        while self.process_next().await.is_some() {}
        debug!("party shuffle updater stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaylistConfig;
    use crate::dag::{CollectionDag, DEFAULT_PLAYLIST};
    use crate::medialib::{MediaLibrary, MemoryLibrary};
    use crate::signal::SignalBus;

    fn setup(entries: usize) -> (Arc<PlaylistEngine>, Arc<MemoryLibrary>, Vec<i64>) {
        let bus = SignalBus::default();
        let dag = Arc::new(CollectionDag::new(bus.clone()));
        let library = Arc::new(MemoryLibrary::with_signals(bus));
        let ids = (0..entries)
            .map(|i| library.insert_with([("title", format!("t{i}"))]))
            .collect();
        let engine = Arc::new(PlaylistEngine::new(
            dag,
            library.clone(),
            PlaylistConfig::default(),
        ));
        (engine, library, ids)
    }

    #[test]
    fn test_refills_after_advance() {
        let (engine, _, _) = setup(5);
        let mut updater = PartyShuffleUpdater::new(engine.clone());
        engine.create_party_shuffle("party", None, 1, 2).unwrap();

        for _ in 0..6 {
            engine.advance("party").unwrap();
            updater.process_pending();
            assert!(engine.entries("party").unwrap().len() <= 4);
            assert!(updater.pending().is_empty());
        }
        assert_eq!(engine.current_position("party").unwrap(), 1);
        assert_eq!(engine.entries("party").unwrap().len(), 4);
    }

    #[test]
    fn test_converges_on_own_signals() {
        let (engine, _, _) = setup(3);
        let mut updater = PartyShuffleUpdater::new(engine.clone());
        engine.create_party_shuffle("party", None, 0, 3).unwrap();
        engine.advance("party").unwrap();
        assert_eq!(updater.process_pending(), 1);
        assert_eq!(updater.process_pending(), 0);
    }

    #[test]
    fn test_entry_removal_is_forwarded() {
        let (engine, library, ids) = setup(2);
        let mut updater = PartyShuffleUpdater::new(engine.clone());
        engine.add_entry(DEFAULT_PLAYLIST, ids[0]).unwrap();
        engine.add_entry(DEFAULT_PLAYLIST, ids[1]).unwrap();
        library.remove(ids[0]).unwrap();
        updater.process_pending();
        assert_eq!(engine.entries(DEFAULT_PLAYLIST).unwrap(), vec![ids[1]]);
    }

    #[test]
    fn test_removed_playlist_is_unscheduled() {
        let (engine, _, _) = setup(1);
        let mut updater = PartyShuffleUpdater::new(engine.clone());
        engine.create("gone").unwrap();
        engine.dag().remove("gone", Namespace::Playlists).unwrap();
        for signal in updater.subscription.drain() {
            updater.observe(signal);
        }
        assert!(updater.pending().is_empty());
    }
}
