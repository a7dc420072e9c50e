//! # Room Engine Shared Contract
//!
//! This crate holds everything that must behave identically wherever it
//! runs: the map/tileset loader, the oriented-box entity kernel, the
//! player movement ruleset, the projectile and loot-box models, and the
//! wire protocol types that pass between a room and its clients.
//!
//! ## Design philosophy
//!
//! Nothing in this crate performs I/O, logs anything, or owns process-wide
//! state. The per-tick player physics routine (`player::apply_tick`) is a
//! pure function over value types precisely so the lockstep anticheat
//! protocol can compare a client's self-reported end position against a
//! server re-simulation that ran the identical code path.
//!
//! ## Module layout
//!
//! - [`geometry`] — oriented-box math and convex polygon intersection.
//! - [`tileset`] — authored tile collision templates and spawn tags.
//! - [`map`] — tileset instantiation into an absolute collision grid.
//! - [`entity`] — the moving oriented-box body, sub-stepped translation,
//!   and the chunk-based broad-phase index.
//! - [`player`] — movement ruleset, modifiers, anticheat counters.
//! - [`projectile`] — typed projectile templates and hit handling.
//! - [`lootbox`] — stationary pickups and respawn timers.
//! - [`protocol`] — the wire types exchanged between a room and a client.
//! - [`palette`] — the fixed per-room player colour palette.
//! - [`error`] — content load-time error types.

pub mod entity;
pub mod error;
pub mod geometry;
pub mod lootbox;
pub mod map;
pub mod palette;
pub mod player;
pub mod projectile;
pub mod protocol;
pub mod tileset;
