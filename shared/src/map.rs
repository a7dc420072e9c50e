//! Map instantiation (§4.2): expands a Tileset against a tile grid into an
//! absolute-coordinate collision grid plus spawn tables.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ContentError;
use crate::geometry::{oriented_box, Collidable, Point};
use crate::tileset::{LootVariant, Tileset};

pub const DEFAULT_POOL: &str = "default-pool";
pub const ALL_POOL: &str = "all";

/// An absolute-coordinate, axis-aligned map collision rectangle. Immutable
/// after map load (spec §3 MapCollision).
#[derive(Debug, Clone, PartialEq)]
pub struct MapCollision {
    pub centre: Point,
    pub width: f32,
    pub height: f32,
    pub friction: f32,
    vertices: [Point; 4],
    half_extents: (f32, f32),
}

impl MapCollision {
    fn new(centre: Point, width: f32, height: f32, friction: f32) -> Self {
        let (vertices, half_extents) = oriented_box(centre, width, height, 0.0);
        MapCollision { centre, width, height, friction, vertices, half_extents }
    }
}

impl Collidable for MapCollision {
    fn centre(&self) -> Point {
        self.centre
    }
    fn half_extents(&self) -> (f32, f32) {
        self.half_extents
    }
    fn vertices(&self) -> [Point; 4] {
        self.vertices
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LootSpawn {
    pub point: Point,
    pub variant: LootVariant,
}

/// Raw authored map JSON shape (§6).
#[derive(Debug, Deserialize)]
pub struct RawMap {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pool: Option<String>,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<RawLayer>,
}

#[derive(Debug, Deserialize)]
pub struct RawLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>,
}

/// Cloning duplicates the collision grid; each room that runs a map holds
/// its own copy rather than sharing one immutable instance, since nothing
/// else in the core needs maps to be interned.
#[derive(Clone)]
pub struct Map {
    pub id: String,
    pub display_name: String,
    pub pool: String,
    pub width: u32,
    pub height: u32,
    /// `grid[y][x]`, y = 0 is the bottom row.
    grid: Vec<Vec<Vec<MapCollision>>>,
    pub player_spawns: Vec<Point>,
    pub loot_spawns: Vec<LootSpawn>,
}

impl Map {
    /// Instantiate a map against a pre-loaded tileset (§4.2).
    pub fn build(raw: &RawMap, tileset: &Tileset) -> Result<Self, ContentError> {
        let width = raw.width;
        let height = raw.height;
        let expected = (width * height) as usize;

        let mut grid: Vec<Vec<Vec<MapCollision>>> =
            (0..height).map(|_| (0..width).map(|_| Vec::new()).collect()).collect();
        let mut player_spawns = Vec::new();
        let mut loot_spawns = Vec::new();

        for layer in &raw.layers {
            if layer.data.len() != expected {
                return Err(ContentError::LayerSizeMismatch {
                    name: layer.name.clone(),
                    width,
                    height,
                    expected,
                    actual: layer.data.len(),
                });
            }

            let is_spawn_layer = layer.name.eq_ignore_ascii_case("spawns");

            for row in 0..height {
                for col in 0..width {
                    let raw_tile = layer.data[(row * width + col) as usize];
                    if raw_tile == 0 {
                        continue;
                    }
                    let tile_id = raw_tile - 1;

                    // authoring rows run top-down; flip so index 0 is the bottom row.
                    let grid_y = height - 1 - row;

                    if is_spawn_layer {
                        let world_point = Point::new(col as f32 + 0.5, grid_y as f32 + 0.5);
                        if tileset.is_player_spawn(tile_id) {
                            player_spawns.push(world_point);
                        }
                        if let Some(variant) = tileset.lootbox_variant(tile_id) {
                            loot_spawns.push(LootSpawn { point: world_point, variant });
                        }
                        continue;
                    }

                    for template in tileset.collisions_for(tile_id) {
                        let centre = Point::new(
                            col as f32 + 0.5 + template.centre.x,
                            grid_y as f32 + 0.5 + template.centre.y,
                        );
                        grid[grid_y as usize][col as usize].push(MapCollision::new(
                            centre,
                            template.width,
                            template.height,
                            template.friction,
                        ));
                    }
                }
            }
        }

        Ok(Map {
            id: raw.id.clone(),
            display_name: raw.name.clone().unwrap_or_else(|| raw.id.clone()),
            pool: raw.pool.clone().unwrap_or_else(|| DEFAULT_POOL.to_string()),
            width,
            height,
            grid,
            player_spawns,
            loot_spawns,
        })
    }

    /// Validate the spawn-count invariant against a configured player cap.
    /// Spec §3: logged as an error, not a fatal load failure.
    pub fn has_enough_spawns(&self, max_players: usize) -> bool {
        self.player_spawns.len() >= max_players
    }

    /// Collisions at grid cell (x, y); empty slice out of range.
    pub fn collisions_at(&self, x: i32, y: i32) -> &[MapCollision] {
        if x < 0 || y < 0 || y as u32 >= self.height || x as u32 >= self.width {
            return &[];
        }
        &self.grid[y as usize][x as usize]
    }
}

/// Registry of loaded maps keyed by id and grouped into pools (spec §4.2).
#[derive(Default)]
pub struct MapRegistry {
    maps: HashMap<String, Map>,
    pools: HashMap<String, Vec<String>>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, map: Map) {
        let id = map.id.clone();
        let pool = map.pool.clone();
        self.pools.entry(pool).or_default().push(id.clone());
        self.pools.entry(ALL_POOL.to_string()).or_default().push(id.clone());
        self.maps.insert(id, map);
    }

    pub fn get(&self, id: &str) -> Option<&Map> {
        self.maps.get(id)
    }

    pub fn pool(&self, pool: &str) -> &[String] {
        self.pools.get(pool).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Picks a uniformly-random map id from a pool, using the caller's rng.
    pub fn random_in_pool(&self, pool: &str, rng: &mut impl rand::Rng) -> Option<&str> {
        let ids = self.pool(pool);
        if ids.is_empty() {
            return None;
        }
        Some(ids[rng.gen_range(0..ids.len())].as_str())
    }
}
