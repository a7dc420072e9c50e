//! # Room engine server library
//!
//! The per-room game engine and lockstep anticheat contract for a
//! multi-room 2-D platformer/shooter. A front-of-house hub process
//! (outside this crate) authenticates players and routes connections to
//! the room that owns them; this crate owns what happens once a room
//! exists: its physics simulation, its join protocol, and its tick loop.
//!
//! ## Module organization
//!
//! - [`config`] — CLI args and the JSON-loaded per-room option set.
//! - [`error`] — typed failure enums for account and join operations.
//! - [`account`] — the account record shape and the `AccountStore`
//!   boundary to the (external) account database.
//! - [`logging`] — the framed hub-forwarding log channel and its
//!   handshake/close state machine.
//! - [`chat`] — chat rate limiting and the pluggable profanity filter.
//! - [`world`] — the per-room `World` aggregate: entity arenas, chunk
//!   indices, and the global tick.
//! - [`transport`] — the command/event shapes a room's worker consumes
//!   and produces.
//! - [`room`] — `GameHost`, the per-room worker task.
//! - [`room_manager`] — room creation, lookup, teardown, and the
//!   cross-room one-player-one-room invariant.
//!
//! Everything that must behave identically on client and server — map
//! loading, the entity kernel, player movement, projectiles, loot boxes,
//! and the wire protocol — lives in the sibling `shared` crate so a
//! future client could depend on the exact same code.

pub mod account;
pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod room;
pub mod room_manager;
pub mod transport;
pub mod world;
