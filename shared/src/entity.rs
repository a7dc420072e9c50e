//! Entity kernel (§4.3): the oriented-box moving body shared by players,
//! projectiles and loot boxes, its sub-stepped translation against the map,
//! and the chunk-based broad-phase index.

use std::collections::{HashMap, HashSet};

use crate::geometry::{aabb_overlap, oriented_box, polygons_intersect, Collidable, Point};
use crate::map::{Map, MapCollision};

pub type EntityId = u64;

pub const DEFAULT_PHYSICS_RESOLUTION: u32 = 64;
pub const DEFAULT_CHUNK_SIZE: u32 = 8;

/// Friction of whichever map collision currently touches each of the four
/// directions; zero means "not touching" (spec §3 Entity / GLOSSARY).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContactEdges {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// The abstract moving body every entity variant embeds. Mutating position,
/// angle or size invalidates the cached vertices/bounds until
/// `recompute_geometry` runs, which every mutator here calls before
/// returning — callers never need to call it themselves.
#[derive(Debug, Clone)]
pub struct EntityBody {
    pub id: EntityId,
    pub position: Point,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
    pub vx: f32,
    pub vy: f32,
    pub angular_velocity: f32,
    pub contact_edges: ContactEdges,
    pub collision_enabled: bool,
    vertices: [Point; 4],
    half_extents: (f32, f32),
}

impl EntityBody {
    pub fn new(id: EntityId, position: Point, width: f32, height: f32) -> Self {
        let mut body = EntityBody {
            id,
            position,
            width,
            height,
            angle: 0.0,
            vx: 0.0,
            vy: 0.0,
            angular_velocity: 0.0,
            contact_edges: ContactEdges::default(),
            collision_enabled: true,
            vertices: [Point::default(); 4],
            half_extents: (0.0, 0.0),
        };
        body.recompute_geometry();
        body
    }

    fn recompute_geometry(&mut self) {
        let (vertices, half_extents) = oriented_box(self.position, self.width, self.height, self.angle);
        self.vertices = vertices;
        self.half_extents = half_extents;
    }

    pub fn half_extents(&self) -> (f32, f32) {
        self.half_extents
    }

    pub fn vertices(&self) -> [Point; 4] {
        self.vertices
    }

    /// Floor of the current position — the tile this body's centre sits in.
    pub fn grid_cell(&self) -> (i32, i32) {
        (self.position.x.floor() as i32, self.position.y.floor() as i32)
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
        self.recompute_geometry();
    }

    pub fn set_velocity(&mut self, vx: f32, vy: f32) {
        self.vx = vx;
        self.vy = vy;
    }

    /// Vertex offsets relative to the centre, valid as long as angle and
    /// size don't change mid-substep (true for the whole duration of one
    /// `next_position` call: angle only advances after translation).
    fn local_offsets(&self) -> [Point; 4] {
        self.vertices.map(|v| Point::new(v.x - self.position.x, v.y - self.position.y))
    }

    /// First map collision overlapping a candidate placement of this body's
    /// box (polygon test after an axis-separation pre-filter). Spec §4.3
    /// `collidesWithMap`.
    fn first_map_collision<'m>(
        &self,
        map: &'m Map,
        candidate: Point,
        offsets: &[Point; 4],
    ) -> Option<&'m MapCollision> {
        let half = self.half_extents;
        let min_x = (candidate.x - half.0).floor() as i32;
        let max_x = (candidate.x + half.0).floor() as i32;
        let min_y = (candidate.y - half.1).floor() as i32;
        let max_y = (candidate.y + half.1).floor() as i32;
        let verts = offsets.map(|o| Point::new(candidate.x + o.x, candidate.y + o.y));

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                for collision in map.collisions_at(x, y) {
                    if !aabb_overlap(candidate, half, collision.centre(), collision.half_extents()) {
                        continue;
                    }
                    if polygons_intersect(&verts, &collision.vertices()) {
                        return Some(collision);
                    }
                }
            }
        }
        None
    }

    pub fn collides_with_map(&self, map: &Map, at: Point) -> bool {
        self.first_map_collision(map, at, &self.local_offsets()).is_some()
    }

    /// Snap the centre against a collision's face, pushed back by the
    /// boundary-test over-push factor so the bodies end up separated
    /// (spec §8 boundary behaviour: "the snap factor 1.01 guarantees
    /// separation").
    fn snap_against(&self, collision: &MapCollision, axis_x: bool) -> f32 {
        const OVER_PUSH: f32 = 1.01;
        let combined = if axis_x {
            self.half_extents.0 + collision.half_extents().0
        } else {
            self.half_extents.1 + collision.half_extents().1
        };
        let (from, to) = if axis_x {
            (collision.centre().x, self.position.x)
        } else {
            (collision.centre().y, self.position.y)
        };
        let direction = if to >= from { 1.0 } else { -1.0 };
        from + direction * combined * OVER_PUSH
    }

    /// Sub-stepped translation and collision response (spec §4.3
    /// `nextPosition`). `resolution` is the configured physics resolution
    /// (ticks of sub-step precision per unit velocity).
    pub fn next_position(&mut self, map: &Map, resolution: u32) {
        if self.collision_enabled {
            self.translate(map, resolution);
        } else {
            self.position.x += self.vx;
            self.position.y += self.vy;
            self.recompute_geometry();
        }

        self.angle += self.angular_velocity;
        self.recompute_geometry();

        if self.collision_enabled {
            self.refresh_contact_edges(map);
        }
    }

    fn translate(&mut self, map: &Map, resolution: u32) {
        let (vx, vy) = (self.vx, self.vy);
        if vx == 0.0 && vy == 0.0 {
            return;
        }

        let steps = (vx.abs().max(vy.abs()) * resolution as f32).ceil().max(1.0) as u32;
        let step_fraction = 1.0 / steps as f32;
        let offsets = self.local_offsets();

        for _ in 0..steps {
            let dx = vx * step_fraction;
            let dy = vy * step_fraction;
            let candidate_xy = Point::new(self.position.x + dx, self.position.y + dy);

            if self.first_map_collision(map, candidate_xy, &offsets).is_none() {
                self.position = candidate_xy;
                self.recompute_geometry();
                continue;
            }

            let candidate_x_only = Point::new(self.position.x + dx, self.position.y);
            let candidate_y_only = Point::new(self.position.x, self.position.y + dy);
            let x_hit = self.first_map_collision(map, candidate_x_only, &offsets);
            let y_hit = self.first_map_collision(map, candidate_y_only, &offsets);

            match (x_hit, y_hit) {
                (None, _) => {
                    // horizontal slide: x motion is clear, snap y against the
                    // obstacle blocking the diagonal step.
                    let blocker = self
                        .first_map_collision(map, candidate_xy, &offsets)
                        .expect("xy step collided to reach this branch");
                    let snapped_y = self.snap_against(blocker, false);
                    self.position = Point::new(candidate_x_only.x, snapped_y);
                    self.vy = 0.0;
                    self.recompute_geometry();
                }
                (Some(_), None) => {
                    // vertical slide: y motion is clear, snap x.
                    let blocker = self
                        .first_map_collision(map, candidate_xy, &offsets)
                        .expect("xy step collided to reach this branch");
                    let snapped_x = self.snap_against(blocker, true);
                    self.position = Point::new(snapped_x, candidate_y_only.y);
                    self.vx = 0.0;
                    self.recompute_geometry();
                }
                (Some(x_blocker), Some(_)) => {
                    // stuck: snap both axes away from the obstacle, zero
                    // both velocity components, and stop sub-stepping.
                    let snapped_x = self.snap_against(x_blocker, true);
                    let y_blocker = y_hit.unwrap();
                    let snapped_y = self.snap_against(y_blocker, false);
                    self.position = Point::new(snapped_x, snapped_y);
                    self.vx = 0.0;
                    self.vy = 0.0;
                    self.recompute_geometry();
                    break;
                }
            }
        }
    }

    fn refresh_contact_edges(&mut self, map: &Map) {
        const SUB_UNIT: f32 = 0.01;
        let offsets = self.local_offsets();
        let probe = |dx: f32, dy: f32| -> f32 {
            let candidate = Point::new(self.position.x + dx, self.position.y + dy);
            self.first_map_collision(map, candidate, &offsets)
                .map(|c| c.friction)
                .unwrap_or(0.0)
        };
        self.contact_edges = ContactEdges {
            left: probe(-SUB_UNIT, 0.0),
            right: probe(SUB_UNIT, 0.0),
            top: probe(0.0, SUB_UNIT),
            bottom: probe(0.0, -SUB_UNIT),
        };
    }
}

/// Fixed-size square broad-phase bucket index (spec §4.3, GLOSSARY
/// "Chunk"). Generic over the id type stored so players, projectiles and
/// loot boxes each keep their own independent grid.
pub struct ChunkIndex {
    chunk_size: f32,
    grid: HashMap<(i32, i32), HashSet<EntityId>>,
    membership: HashMap<EntityId, Vec<(i32, i32)>>,
}

impl ChunkIndex {
    pub fn new(chunk_size_tiles: u32) -> Self {
        ChunkIndex {
            chunk_size: chunk_size_tiles as f32,
            grid: HashMap::new(),
            membership: HashMap::new(),
        }
    }

    fn chunks_for(&self, centre: Point, half_extents: (f32, f32)) -> Vec<(i32, i32)> {
        let min_cx = ((centre.x - half_extents.0) / self.chunk_size).floor() as i32;
        let max_cx = ((centre.x + half_extents.0) / self.chunk_size).floor() as i32;
        let min_cy = ((centre.y - half_extents.1) / self.chunk_size).floor() as i32;
        let max_cy = ((centre.y + half_extents.1) / self.chunk_size).floor() as i32;
        let mut chunks = Vec::with_capacity(4);
        for cy in min_cy..=max_cy {
            for cx in min_cx..=max_cx {
                chunks.push((cx, cy));
            }
        }
        chunks
    }

    /// Recompute and update an entity's chunk membership from its current
    /// position/bounds. Call after every position update.
    pub fn update(&mut self, id: EntityId, centre: Point, half_extents: (f32, f32)) {
        self.remove(id);
        let chunks = self.chunks_for(centre, half_extents);
        for &chunk in &chunks {
            self.grid.entry(chunk).or_default().insert(id);
        }
        self.membership.insert(id, chunks);
    }

    /// Deregister an entity from all chunks. Idempotent.
    pub fn remove(&mut self, id: EntityId) {
        if let Some(chunks) = self.membership.remove(&id) {
            for chunk in chunks {
                if let Some(set) = self.grid.get_mut(&chunk) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.grid.remove(&chunk);
                    }
                }
            }
        }
    }

    /// Union of every entity occupying any chunk the given bounds overlap.
    pub fn in_same_chunks(&self, centre: Point, half_extents: (f32, f32)) -> HashSet<EntityId> {
        let mut result = HashSet::new();
        for chunk in self.chunks_for(centre, half_extents) {
            if let Some(set) = self.grid.get(&chunk) {
                result.extend(set.iter().copied());
            }
        }
        result
    }

    pub fn is_registered(&self, id: EntityId) -> bool {
        self.membership.contains_key(&id)
    }
}
