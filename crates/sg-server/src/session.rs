//! In-memory registry of in-flight game sessions.
//!
//! One live session per player, last write wins. Entries idle past the TTL
//! are evicted by the periodic sweep; a successful submission removes its
//! session immediately.

use std::time::Duration;

use dashmap::DashMap;
use sg_core::GameSession;

pub struct SessionRegistry {
    map: DashMap<String, GameSession>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            map: DashMap::new(),
            ttl,
        }
    }

    /// Create (or overwrite) the player's session.
    pub fn start(&self, player_id: &str, seed: u32) {
        self.map
            .insert(player_id.to_string(), GameSession::new(player_id, seed));
    }

    /// Seed of the player's live session, if one exists and is not expired.
    pub fn seed(&self, player_id: &str) -> Option<u32> {
        let entry = self.map.get(player_id)?;
        if entry.started.elapsed() > self.ttl {
            return None;
        }
        Some(entry.seed)
    }

    pub fn remove(&self, player_id: &str) {
        self.map.remove(player_id);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Evict expired sessions; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, s| s.started.elapsed() <= self.ttl);
        before - self.map.len()
    }
}
