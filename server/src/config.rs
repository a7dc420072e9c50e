//! Configuration (§6 "Configuration"): the enumerated options the core
//! recognises, loaded from a JSON file and overridable from the CLI —
//! following the teacher's `clap::Parser` `Args` pattern, generalized from
//! a bare host/port pair to the room engine's full option set.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

fn default_max_players() -> u32 {
    8
}
fn default_physics_resolution() -> u32 {
    64
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_chat_min_millis() -> u64 {
    250
}
fn default_chat_spam_grace() -> u32 {
    3
}
fn default_chat_max_spam_per_minute() -> u32 {
    20
}

/// Config keys a room consults, with the defaults spec §6 states.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub game_max_players: u32,
    pub game_max_bots: u32,
    pub game_physics_resolution: u32,
    pub game_connect_timeout_secs: u64,
    pub chat_min_millis_per_message: u64,
    pub chat_spam_grace_count: u32,
    pub chat_max_spam_per_minute: u32,
    pub chat_banned_word_list: Vec<String>,
    pub debug_mode: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        RoomConfig {
            game_max_players: default_max_players(),
            game_max_bots: 0,
            game_physics_resolution: default_physics_resolution(),
            game_connect_timeout_secs: default_connect_timeout_secs(),
            chat_min_millis_per_message: default_chat_min_millis(),
            chat_spam_grace_count: default_chat_spam_grace(),
            chat_max_spam_per_minute: default_chat_max_spam_per_minute(),
            chat_banned_word_list: Vec::new(),
            debug_mode: false,
        }
    }
}

impl RoomConfig {
    pub fn load_from_file(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Options a `createGame` call may override (spec §4.8), merged with
/// `RoomConfig` defaults at room-creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomOptions {
    pub max_players: u32,
    pub ai_players: u32,
    pub public: bool,
}

impl Default for RoomOptions {
    fn default() -> Self {
        RoomOptions { max_players: 8, ai_players: 2, public: true }
    }
}

#[derive(Debug, Parser)]
#[command(name = "room-engine-server", about = "Multi-room platformer/shooter room engine")]
pub struct CliArgs {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, default_value_t = 7777)]
    pub port: u16,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "maps")]
    pub maps_dir: PathBuf,
}
