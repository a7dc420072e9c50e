//! End-to-end tests across the `shared`/`server` crate boundary: a room's
//! full join → tick → disconnect lifecycle, the anticheat kick path, chat
//! relay, and the cross-room join race the hub's `RoomManager` guards
//! against.
//!
//! Unlike the per-module unit tests, these drive `RoomManager`/`GameHost`
//! the way the TCP gateway in `server::main` does: through `RoomHandle`,
//! never by reaching into `World` directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use shared::map::{Map, MapRegistry, RawLayer, RawMap};
use shared::protocol::{ClientEvent, EndPosition, InputFlags, PlayerTickInput, ServerEvent};
use shared::tileset::Tileset;

use server::account::{AccountStore, InMemoryAccountStore};
use server::config::{RoomConfig, RoomOptions};
use server::error::JoinError;
use server::room_manager::RoomManager;
use server::transport::OUTBOUND_CHANNEL_CAPACITY;

const TEST_TIMEOUT: Duration = Duration::from_secs(2);

/// A 4x4 arena where every tile is a player spawn point and nothing
/// collides — enough room for every test here to seat several players.
fn arena_registry() -> Arc<MapRegistry> {
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

fn manager() -> Arc<RoomManager> {
    Arc::new(RoomManager::new(arena_registry(), Arc::new(InMemoryAccountStore::new()), RoomConfig::default()))
}

fn idle_input(tick: u32) -> PlayerTickInput {
    PlayerTickInput {
        tick,
        modifiers: Vec::new(),
        inputs: InputFlags::default(),
        position: EndPosition { endx: 0.0, endy: 0.0 },
    }
}

/// Joins `username` into `room_id`, redeems the auth code, and returns the
/// connected `RoomHandle` plus the receiving half of its outbound channel —
/// the same two steps a gateway connection performs after its first frame.
async fn connect(
    manager: &RoomManager,
    room_id: &str,
    username: &str,
) -> (server::transport::RoomHandle, mpsc::Receiver<ServerEvent>) {
    let (handle, auth_code) = manager.join(room_id, username).await.expect("join should succeed");
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
    assert!(handle.connect(username.to_string(), auth_code, outbound_tx).await, "connect should redeem the code");
    (handle, outbound_rx)
}

#[tokio::test]
async fn join_connect_delivers_game_info_then_physics_init() {
    let manager = manager();
    let room = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();

    let (_handle, mut outbound) = connect(&manager, &room.room_id, "alice").await;

    let first = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap().unwrap();
    assert!(matches!(first, ServerEvent::GameInfo(_)), "expected GameInfo first, got {first:?}");

    let second = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap().unwrap();
    assert!(matches!(second, ServerEvent::InitPlayerPhysics { .. }), "expected InitPlayerPhysics, got {second:?}");
}

#[tokio::test]
async fn connected_player_receives_tick_snapshots() {
    let manager = manager();
    let room = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();
    let (_handle, mut outbound) = connect(&manager, &room.room_id, "alice").await;

    // drain the join handshake frames
    let _ = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap();
    let _ = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap();

    let tick_event = loop {
        let event = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap().unwrap();
        if let ServerEvent::Tick(snapshot) = event {
            break snapshot;
        }
    };
    assert_eq!(tick_event.players.len(), 1);
    assert_eq!(tick_event.players[0].username, "alice");
}

#[tokio::test]
async fn connect_with_stale_auth_code_is_rejected() {
    let manager = manager();
    let room = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();
    let (_handle, _auth_code) = manager.join(&room.room_id, "alice").await.unwrap();

    let (outbound_tx, _outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
    let bogus_code = uuid::Uuid::new_v4();
    let connected = room.connect("alice".to_string(), bogus_code, outbound_tx).await;
    assert!(!connected, "an auth code that was never issued must not redeem");
}

#[tokio::test]
async fn bad_modifier_id_kicks_and_records_an_infraction() {
    let store = Arc::new(InMemoryAccountStore::new());
    let registry = arena_registry();
    let manager = Arc::new(RoomManager::new(registry, store.clone() as Arc<dyn AccountStore>, RoomConfig::default()));

    let room = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();
    let (handle, mut outbound) = connect(&manager, &room.room_id, "cheater").await;

    let _ = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap();
    let _ = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap();

    let mut bad_input = idle_input(1);
    bad_input.modifiers.push(9999);
    handle.send_event("cheater".to_string(), ClientEvent::Tick(bad_input));

    let kicked = loop {
        let event = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap().unwrap();
        if let ServerEvent::Kicked(reason) = event {
            break reason;
        }
    };
    assert_eq!(kicked.as_str(), "bad_modifiers");

    let account = store.load("cheater").unwrap();
    assert_eq!(account.infractions, vec![("bad_modifiers".to_string(), 1)]);
}

#[tokio::test]
async fn chat_is_broadcast_to_every_connected_player_and_then_rate_limited() {
    // zero grace so the second back-to-back message is unambiguously limited
    let config = RoomConfig { chat_spam_grace_count: 0, ..RoomConfig::default() };
    let manager = Arc::new(RoomManager::new(arena_registry(), Arc::new(InMemoryAccountStore::new()), config));
    let room = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();

    let (handle_a, mut outbound_a) = connect(&manager, &room.room_id, "alice").await;
    let (_handle_b, mut outbound_b) = connect(&manager, &room.room_id, "bob").await;

    // drain each connection's join handshake
    for outbound in [&mut outbound_a, &mut outbound_b] {
        let _ = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap();
        let _ = timeout(TEST_TIMEOUT, outbound.recv()).await.unwrap();
    }

    handle_a.send_event("alice".to_string(), ClientEvent::ChatMessage("hello room".to_string()));

    let received_by_bob = loop {
        let event = timeout(TEST_TIMEOUT, outbound_b.recv()).await.unwrap().unwrap();
        if let ServerEvent::ChatMessage(fields) = event {
            break fields;
        }
    };
    assert_eq!(received_by_bob, vec!["alice".to_string(), "hello room".to_string()]);

    // a second message sent immediately after falls inside the configured
    // `chatMinMillisPerMessage` window and must not be relayed at all.
    handle_a.send_event("alice".to_string(), ClientEvent::ChatMessage("spam".to_string()));
    let mut saw_spam = false;
    while let Ok(Some(event)) = timeout(Duration::from_millis(200), outbound_b.recv()).await {
        if matches!(event, ServerEvent::ChatMessage(ref fields) if fields[1] == "spam") {
            saw_spam = true;
        }
    }
    assert!(!saw_spam, "message sent inside the rate-limit window should have been dropped");
}

#[tokio::test]
async fn room_manager_rejects_a_username_already_active_in_another_room() {
    let manager = manager();
    let room_a = manager.create_game("host-a".to_string(), RoomOptions::default(), "arena").unwrap();
    let room_b = manager.create_game("host-b".to_string(), RoomOptions::default(), "arena").unwrap();

    let (_handle, _auth_code) = manager.join(&room_a.room_id, "alice").await.unwrap();

    let race_attempt = manager.join(&room_b.room_id, "alice").await;
    assert_eq!(race_attempt.err(), Some(JoinError::AlreadyInAnotherRoom));

    // freeing the reservation (disconnect) lets the same username join elsewhere
    manager.release("alice");
    assert!(manager.join(&room_b.room_id, "alice").await.is_ok());
}

#[tokio::test]
async fn room_ends_when_player_count_drops_below_two_after_start() {
    let manager = manager();
    let room = manager.create_game("host".to_string(), RoomOptions::default(), "arena").unwrap();

    let (handle_a, mut outbound_a) = connect(&manager, &room.room_id, "alice").await;
    let (_handle_b, mut outbound_b) = connect(&manager, &room.room_id, "bob").await;

    let _ = timeout(TEST_TIMEOUT, outbound_a.recv()).await.unwrap();
    let _ = timeout(TEST_TIMEOUT, outbound_a.recv()).await.unwrap();
    let _ = timeout(TEST_TIMEOUT, outbound_b.recv()).await.unwrap();
    let _ = timeout(TEST_TIMEOUT, outbound_b.recv()).await.unwrap();

    handle_a.send_event("alice".to_string(), ClientEvent::ReadyStart(true));
    handle_a.disconnect("alice".to_string());
    manager.release("alice");

    // alice's own outbound sink is dropped the moment she's removed, well
    // before the room notices it's down to one player and shuts down.
    assert!(timeout(TEST_TIMEOUT, outbound_a.recv()).await.unwrap().is_none());

    // bob stays connected long enough to observe the shutdown broadcast.
    let game_end = loop {
        let event = timeout(TEST_TIMEOUT, outbound_b.recv()).await.unwrap();
        match event {
            Some(ServerEvent::GameEnd) => break true,
            Some(_) => continue,
            None => break false,
        }
    };
    assert!(game_end, "expected a GameEnd broadcast before the outbound channel closed");

    // the room's worker task has exited; its command channel is closed, so
    // a later join attempt fails even though nothing deregistered the room.
    let late_join = manager.join(&room.room_id, "carol").await;
    assert_eq!(late_join.err(), Some(JoinError::AccountUnavailable));
}
