//! Wire protocol types (§6): the per-tick contract between a client and its
//! room, and the room-namespace event payloads either side emits.
//!
//! Mirrors the teacher's flat, named-field `Packet` enum in
//! `shared::lib` — plain `serde`-derived structs, no behaviour.

use serde::{Deserialize, Serialize};

use crate::player::{KickReason, ModifierKind, ModifierState, PlayerProperties};

/// Client → server, once per client-driven physics tick (§6
/// PlayerTickInput).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTickInput {
    pub tick: u32,
    pub modifiers: Vec<u32>,
    pub inputs: InputFlags,
    pub position: EndPosition,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InputFlags {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EndPosition {
    pub endx: f32,
    pub endy: f32,
}

/// Server → client, once per server tick, per player (§6 PlayerTickData).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTickData {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub vx: f32,
    pub vy: f32,
    pub va: f32,
    pub username: String,
    pub color: String,
    pub properties: PlayerPropertiesWire,
    pub modifiers: Vec<ModifierWire>,
    pub override_position: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerPropertiesWire {
    pub gravity: f32,
    pub move_power: f32,
    pub jump_power: f32,
    pub wall_jump_power: f32,
    pub air_move_power: f32,
    pub drag: f32,
    pub air_drag: f32,
    pub wall_drag: f32,
    pub grip: f32,
    pub fly: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModifierWire {
    pub id: u32,
    pub modifier: ModifierKind,
    pub length: u32,
}

impl From<&PlayerProperties> for PlayerPropertiesWire {
    fn from(props: &PlayerProperties) -> Self {
        PlayerPropertiesWire {
            gravity: props.gravity,
            move_power: props.move_power,
            jump_power: props.jump_power,
            wall_jump_power: props.wall_jump_power,
            air_move_power: props.air_move_power,
            drag: props.drag,
            air_drag: props.air_drag,
            wall_drag: props.wall_drag,
            grip: props.grip,
            fly: props.fly,
        }
    }
}

/// A modifier map entry plus its key, in wire shape. The key lives outside
/// `ModifierState` (it's the `HashMap` key a player's modifiers are stored
/// under), so this can't be a plain `From` impl.
pub fn modifier_wire(id: u32, state: &ModifierState) -> ModifierWire {
    ModifierWire { id, modifier: state.kind, length: state.remaining_ticks }
}

/// One global-tick snapshot broadcast to every client in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub tps: f32,
    pub players: Vec<PlayerTickData>,
}

/// Room metadata surfaced to clients on join (`gameInfo`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInfo {
    pub room_id: String,
    pub host_username: String,
    pub map_id: String,
    pub max_players: u32,
    pub public: bool,
}

/// Events the room namespace receives from a client socket (§4.7/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientEvent {
    Ping,
    Ready,
    Tick(PlayerTickInput),
    ChatMessage(String),
    ReadyStart(bool),
}

/// Events the room namespace emits to a client socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerEvent {
    Pong,
    InitPlayerPhysics { username: String, base_properties: PlayerPropertiesWire },
    Tick(TickSnapshot),
    GameInfo(GameInfo),
    GameEnd,
    ChatMessage(Vec<String>),
    Leave(String),
    Kicked(KickReason),
}
