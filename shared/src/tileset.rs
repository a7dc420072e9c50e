//! Tileset loading (§4.1): compiles authored tile records into reusable
//! per-tile collision templates and spawn classifiers.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::geometry::Point;

/// Variants a loot-box spawnpoint tag may name. The authored value is
/// `lootbox=<variant>`, matched case-sensitively against these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LootVariant {
    Health,
    Ammo,
    Shield,
    Speed,
}

impl LootVariant {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "health" => Some(LootVariant::Health),
            "ammo" => Some(LootVariant::Ammo),
            "shield" => Some(LootVariant::Shield),
            "speed" => Some(LootVariant::Speed),
            _ => None,
        }
    }
}

/// A map collision expanded from one tile's authored rectangle, in
/// tile-local coordinates centred on the unit tile (range roughly
/// `[-0.5, 0.5]` before scaling by the tile size at map-instantiation time).
#[derive(Debug, Clone, PartialEq)]
pub struct MapCollisionTemplate {
    pub centre: Point,
    pub width: f32,
    pub height: f32,
    pub friction: f32,
}

/// Raw authored tileset JSON shape (§6 "Authored content").
#[derive(Debug, Deserialize)]
struct RawTileset {
    tilewidth: u32,
    tileheight: u32,
    #[allow(dead_code)]
    tilecount: u32,
    #[serde(default)]
    tiles: Vec<RawTile>,
}

#[derive(Debug, Deserialize)]
struct RawTile {
    id: u32,
    #[serde(default)]
    objectgroup: Option<RawObjectGroup>,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawObjectGroup {
    #[serde(default)]
    objects: Vec<RawObject>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    name: String,
    value: serde_json::Value,
}

fn find_property<'a>(properties: &'a [RawProperty], name: &str) -> Option<&'a serde_json::Value> {
    properties.iter().find(|p| p.name == name).map(|p| &p.value)
}

/// Compiled tileset: immutable once loaded (spec §3 Tileset invariant).
#[derive(Debug, Clone)]
pub struct Tileset {
    pub tile_width: u32,
    pub tile_height: u32,
    collisions: HashMap<u32, Vec<MapCollisionTemplate>>,
    player_spawn_tiles: HashSet<u32>,
    lootbox_spawn_tiles: HashMap<u32, LootVariant>,
}

impl Tileset {
    /// Parse authored JSON bytes into a compiled tileset.
    pub fn load(bytes: &[u8]) -> Result<Self, ContentError> {
        let raw: RawTileset = serde_json::from_slice(bytes)
            .map_err(|e| ContentError::Malformed(format!("tileset JSON: {e}")))?;

        if raw.tilewidth != raw.tileheight {
            return Err(ContentError::NonSquareTile {
                width: raw.tilewidth,
                height: raw.tileheight,
            });
        }

        let tile_width = raw.tilewidth;
        let tile_height = raw.tileheight;
        let mut collisions = HashMap::new();
        let mut player_spawn_tiles = HashSet::new();
        let mut lootbox_spawn_tiles = HashMap::new();

        for tile in &raw.tiles {
            if let Some(group) = &tile.objectgroup {
                let mut templates = Vec::with_capacity(group.objects.len());
                for object in &group.objects {
                    let friction = find_property(&object.properties, "friction")
                        .and_then(|v| v.as_f64())
                        .ok_or(ContentError::MissingFriction { tile_id: tile.id })?
                        as f32;
                    templates.push(compile_collision(object, tile_width, tile_height, friction));
                }
                if !templates.is_empty() {
                    collisions.insert(tile.id, templates);
                }
            }

            if let Some(value) = find_property(&tile.properties, "spawnpoint") {
                let value = value.as_str().unwrap_or_default();
                if value == "player" {
                    player_spawn_tiles.insert(tile.id);
                } else if let Some(variant) = value.strip_prefix("lootbox=").and_then(LootVariant::parse) {
                    lootbox_spawn_tiles.insert(tile.id, variant);
                } else {
                    return Err(ContentError::BadSpawnpoint {
                        tile_id: tile.id,
                        value: value.to_string(),
                    });
                }
            }
        }

        Ok(Tileset {
            tile_width,
            tile_height,
            collisions,
            player_spawn_tiles,
            lootbox_spawn_tiles,
        })
    }

    pub fn collisions_for(&self, tile_id: u32) -> &[MapCollisionTemplate] {
        self.collisions.get(&tile_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_player_spawn(&self, tile_id: u32) -> bool {
        self.player_spawn_tiles.contains(&tile_id)
    }

    pub fn lootbox_variant(&self, tile_id: u32) -> Option<LootVariant> {
        self.lootbox_spawn_tiles.get(&tile_id).copied()
    }
}

/// Remap an authored rectangle (authoring y down, origin top-left of tile)
/// into tile-local coordinates centred on the unit tile with y flipped.
fn compile_collision(
    object: &RawObject,
    tile_width: u32,
    tile_height: u32,
    friction: f32,
) -> MapCollisionTemplate {
    let centre_x_down = (object.x + object.width / 2.0) / tile_width as f32;
    let centre_y_down = (object.y + object.height / 2.0) / tile_height as f32;

    MapCollisionTemplate {
        centre: Point::new(centre_x_down - 0.5, 0.5 - centre_y_down),
        width: object.width / tile_width as f32,
        height: object.height / tile_height as f32,
        friction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tileset_json() -> &'static str {
        r#"{
            "tilewidth": 16, "tileheight": 16, "tilecount": 2,
            "tiles": [
                {
                    "id": 0,
                    "objectgroup": { "objects": [
                        { "x": 0, "y": 0, "width": 16, "height": 16,
                          "properties": [{"name": "friction", "value": 1.2}] }
                    ]}
                },
                {
                    "id": 1,
                    "properties": [{"name": "spawnpoint", "value": "player"}]
                }
            ]
        }"#
    }

    #[test]
    fn loads_full_tile_collision() {
        let ts = Tileset::load(sample_tileset_json().as_bytes()).unwrap();
        let collisions = ts.collisions_for(0);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].friction, 1.2);
        assert!((collisions[0].centre.x).abs() < 1e-5);
        assert!((collisions[0].centre.y).abs() < 1e-5);
    }

    #[test]
    fn player_spawn_tag_recorded() {
        let ts = Tileset::load(sample_tileset_json().as_bytes()).unwrap();
        assert!(ts.is_player_spawn(1));
        assert!(!ts.is_player_spawn(0));
    }

    #[test]
    fn missing_friction_is_fatal() {
        let json = r#"{
            "tilewidth": 16, "tileheight": 16, "tilecount": 1,
            "tiles": [{ "id": 0, "objectgroup": { "objects": [
                { "x": 0, "y": 0, "width": 16, "height": 16, "properties": [] }
            ]}}]
        }"#;
        let err = Tileset::load(json.as_bytes()).unwrap_err();
        assert_eq!(err, ContentError::MissingFriction { tile_id: 0 });
    }

    #[test]
    fn non_square_tile_is_rejected() {
        let json = r#"{"tilewidth": 16, "tileheight": 32, "tilecount": 0, "tiles": []}"#;
        let err = Tileset::load(json.as_bytes()).unwrap_err();
        assert_eq!(err, ContentError::NonSquareTile { width: 16, height: 32 });
    }

    #[test]
    fn unknown_spawnpoint_value_is_fatal() {
        let json = r#"{
            "tilewidth": 16, "tileheight": 16, "tilecount": 1,
            "tiles": [{ "id": 0, "properties": [{"name": "spawnpoint", "value": "boss"}] }]
        }"#;
        let err = Tileset::load(json.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            ContentError::BadSpawnpoint { tile_id: 0, value: "boss".to_string() }
        );
    }
}
