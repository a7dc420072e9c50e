//! Room lifecycle and the cross-room "one player in at most one room"
//! invariant (§4.8, §3 Player invariant).
//!
//! Modeled on the teacher's `ClientManager` (`server/src/client_manager.rs`):
//! a capacity-bounded registry keyed by a generated id, with lookups by
//! that id. Here the id is the 6-character room code rather than a
//! monotonic counter, and the registry holds `RoomHandle`s for live worker
//! tasks instead of `Client` structs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rand::Rng;
use tokio::sync::mpsc;
use uuid::Uuid;

use shared::map::MapRegistry;

use crate::account::{Account, AccountStore};
use crate::chat::PermissiveFilter;
use crate::config::{RoomConfig, RoomOptions};
use crate::error::JoinError;
use crate::room::GameHost;
use crate::transport::{RoomHandle, COMMAND_CHANNEL_CAPACITY};

const ROOM_ID_LEN: usize = 6;
const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn generate_room_id(rng: &mut impl Rng, taken: &HashSet<String>) -> String {
    loop {
        let candidate: String = (0..ROOM_ID_LEN)
            .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect();
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}

/// Creates, looks up, and tears down rooms; enforces that a username can be
/// active in at most one room at a time, hub-wide.
pub struct RoomManager {
    maps: Arc<MapRegistry>,
    account_store: Arc<dyn AccountStore>,
    config: RoomConfig,
    rooms: Mutex<HashMap<String, RoomHandle>>,
    active_usernames: Mutex<HashSet<String>>,
}

impl RoomManager {
    pub fn new(maps: Arc<MapRegistry>, account_store: Arc<dyn AccountStore>, config: RoomConfig) -> Self {
        RoomManager {
            maps,
            account_store,
            config,
            rooms: Mutex::new(HashMap::new()),
            active_usernames: Mutex::new(HashSet::new()),
        }
    }

    /// Allocate a room id, spawn its worker task, and register the handle
    /// (spec §4.8 `createGame`).
    pub fn create_game(&self, host_username: String, options: RoomOptions, map_id: &str) -> Option<RoomHandle> {
        let map = self.maps.get(map_id)?.clone();

        let mut rooms = self.rooms.lock().expect("room registry lock poisoned");
        let mut rng = rand::thread_rng();
        let taken: HashSet<String> = rooms.keys().cloned().collect();
        let room_id = generate_room_id(&mut rng, &taken);

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = RoomHandle::new(room_id.clone(), tx);

        let host = GameHost::new(
            room_id.clone(),
            host_username,
            options,
            self.config.clone(),
            map,
            Arc::clone(&self.account_store),
            Box::new(PermissiveFilter),
            rx,
        );
        tokio::spawn(host.run());

        rooms.insert(room_id, handle.clone());
        Some(handle)
    }

    pub fn get_game(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.lock().expect("room registry lock poisoned").get(room_id).cloned()
    }

    pub fn get_games(&self) -> Vec<RoomHandle> {
        self.rooms.lock().expect("room registry lock poisoned").values().cloned().collect()
    }

    /// Hub shutdown entry point (spec §4.8 `endGame`): drop the handle so no
    /// further commands are admitted, and tell the worker to stop.
    pub async fn end_game(&self, room_id: &str) {
        let handle = self.rooms.lock().expect("room registry lock poisoned").remove(room_id);
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    /// §4.8 join entry point: enforce the cross-room uniqueness invariant
    /// and load the account before delegating to the room's own in-room
    /// admission check (capacity, in-room duplicate).
    pub async fn join(&self, room_id: &str, username: &str) -> Result<(RoomHandle, Uuid), JoinError> {
        let handle = self.get_game(room_id).ok_or(JoinError::AccountUnavailable)?;

        {
            let mut active = self.active_usernames.lock().expect("active usernames lock poisoned");
            if active.contains(username) {
                return Err(JoinError::AlreadyInAnotherRoom);
            }
            active.insert(username.to_string());
        }

        let account = self
            .account_store
            .load(username)
            .unwrap_or_else(|_| Account::new(username));

        match handle.join(account).await {
            Ok(code) => Ok((handle, code)),
            Err(err) => {
                self.active_usernames.lock().expect("active usernames lock poisoned").remove(username);
                Err(err)
            }
        }
    }

    /// Release the cross-room reservation once a player has actually left
    /// their room (disconnect, kick, or room shutdown).
    pub fn release(&self, username: &str) {
        self.active_usernames.lock().expect("active usernames lock poisoned").remove(username);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::InMemoryAccountStore;
    use shared::map::{Map, RawLayer, RawMap};
    use shared::tileset::Tileset;

    fn registry_with_open_map() -> Arc<MapRegistry> {
        let tileset_json = r#"{
            "tilewidth": 1, "tileheight": 1, "tilecount": 1,
            "tiles": [{ "id": 0, "properties": [{"name": "spawnpoint", "value": "player"}] }]
        }"#;
        let tileset = Tileset::load(tileset_json.as_bytes()).unwrap();
        let raw = RawMap {
            id: "arena".into(),
            name: None,
            pool: None,
            width: 4,
            height: 4,
            layers: vec![RawLayer { name: "spawns".into(), width: 4, height: 4, data: vec![1; 16] }],
        };
        let map = Map::build(&raw, &tileset).unwrap();
        let mut registry = MapRegistry::new();
        registry.register(map);
        Arc::new(registry)
    }

    fn manager() -> RoomManager {
        RoomManager::new(
            registry_with_open_map(),
            Arc::new(InMemoryAccountStore::new()),
            RoomConfig::default(),
        )
    }

    #[test]
    fn generate_room_id_avoids_already_taken_codes() {
        let mut rng = rand::thread_rng();
        let mut taken = HashSet::new();
        taken.insert("AAAAAA".to_string());
        let id = generate_room_id(&mut rng, &taken);
        assert_eq!(id.len(), ROOM_ID_LEN);
        assert!(id.chars().all(|c| ROOM_ID_ALPHABET.contains(&(c as u8))));
    }

    #[tokio::test]
    async fn create_game_registers_a_lookup_handle() {
        let manager = manager();
        let handle = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();
        assert_eq!(handle.room_id.len(), ROOM_ID_LEN);
        assert!(manager.get_game(&handle.room_id).is_some());
        assert_eq!(manager.get_games().len(), 1);
    }

    #[tokio::test]
    async fn create_game_with_unknown_map_fails() {
        let manager = manager();
        assert!(manager.create_game("host".to_string(), RoomOptions::default(), "nonexistent").is_none());
    }

    #[tokio::test]
    async fn end_game_removes_the_room_from_lookup() {
        let manager = manager();
        let handle = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();
        manager.end_game(&handle.room_id).await;
        assert!(manager.get_game(&handle.room_id).is_none());
    }

    #[tokio::test]
    async fn join_rejects_a_username_already_active_in_another_room() {
        let manager = manager();
        let room_a = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();
        let room_b = manager.create_game("host2".to_string(), RoomOptions::default(), "arena").unwrap();

        assert!(manager.join(&room_a.room_id, "alice").await.is_ok());
        let second = manager.join(&room_b.room_id, "alice").await;
        assert_eq!(second.err(), Some(JoinError::AlreadyInAnotherRoom));

        manager.release("alice");
        assert!(manager.join(&room_b.room_id, "alice").await.is_ok());
    }

    #[tokio::test]
    async fn join_unknown_room_is_account_unavailable() {
        let manager = manager();
        let result = manager.join("MISSING", "alice").await;
        assert_eq!(result.err(), Some(JoinError::AccountUnavailable));
    }
}
