//! Fixed per-room player colour palette.
//!
//! Adapted from the teacher's `generate_color`, which indexed a fixed
//! 8-entry palette by raw client id. Here colour is assigned by a room from
//! a pool of unused entries so it stays unique within the room (spec §3
//! Player invariant) rather than merely a function of id.

pub const PALETTE: [&str; 8] = [
    "blue", "red", "green", "purple", "orange", "cyan", "magenta", "yellow",
];

/// Picks the first colour in `PALETTE` not already present in `taken`.
/// Returns `None` once every slot in the palette is in use.
pub fn next_free_colour(taken: &[String]) -> Option<&'static str> {
    PALETTE.iter().find(|c| !taken.iter().any(|t| t == *c)).copied()
}
