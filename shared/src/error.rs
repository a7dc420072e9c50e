use thiserror::Error;

/// Fatal load-time errors for authored content (§4.1/§4.2).
///
/// Content errors never surface past load time: a map or tileset that fails
/// to parse is simply never registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("tileset has non-square tiles: {width}x{height}")]
    NonSquareTile { width: u32, height: u32 },

    #[error("collision rectangle on tile {tile_id} is missing a numeric `friction` property")]
    MissingFriction { tile_id: u32 },

    #[error("tile {tile_id} has unrecognised spawnpoint value `{value}`")]
    BadSpawnpoint { tile_id: u32, value: String },

    #[error("layer `{name}` has {actual} tiles, expected {expected} ({width}x{height})")]
    LayerSizeMismatch {
        name: String,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("map references unknown tileset tile id {tile_id}")]
    UnknownTile { tile_id: u32 },

    #[error("malformed content: {0}")]
    Malformed(String),
}
