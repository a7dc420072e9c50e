//! The per-room `World` aggregate (Design Notes §9): owns the current map,
//! every entity arena, their chunk indices, and the global tick counter.
//! Replaces the teacher's flat `GameState{tick, players: HashMap<...>}`
//! (`server/src/game.rs`) and the static-member anti-pattern the spec's
//! own source exhibits — everything here is instance-owned, so two rooms
//! never share state.

use std::collections::HashMap;

use shared::entity::{ChunkIndex, EntityBody, EntityId, DEFAULT_CHUNK_SIZE};
use shared::geometry::Point;
use shared::lootbox::{LootBox, LootBoxRespawnTimer};
use shared::map::{Map, MapRegistry};
use shared::palette::next_free_colour;
use shared::player::{
    apply_tick, background_tick, decay_override, mark_server_override, random_spawnpoint,
    AnticheatState, KickReason, ModifierState, PlayerProperties, SpawnPool,
};
use shared::projectile::{Projectile, ProjectileOutcome, ProjectileTemplate};
use shared::protocol::PlayerTickInput;
use shared::tileset::LootVariant;

use crate::account::Account;

pub struct PlayerEntity {
    pub body: EntityBody,
    pub username: String,
    pub color: &'static str,
    pub connected: bool,
    pub anticheat: AnticheatState,
    pub base_properties: PlayerProperties,
    pub modifiers: HashMap<u32, ModifierState>,
    pub account: Account,
}

/// Things that happened during one `World::step` that the room runtime
/// (which owns sockets and the account store) must act on.
#[derive(Default)]
pub struct TickReport {
    pub kicks: Vec<(EntityId, KickReason)>,
    pub respawned_lootboxes: Vec<EntityId>,
}

/// A projectile hit reported out of `World::step_projectiles` (spec §4.5
/// steps 5-6): either a player or, when the template opts in, another
/// projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileHit {
    Player { projectile: EntityId, player: EntityId },
    Projectile { projectile: EntityId, other: EntityId },
}

pub struct World {
    tick: u64,
    next_id: EntityId,
    physics_resolution: u32,
    maps: MapRegistry,
    current_map: Option<String>,

    pub players: HashMap<EntityId, PlayerEntity>,
    username_to_id: HashMap<String, EntityId>,
    pub player_chunks: ChunkIndex,

    pub projectiles: HashMap<EntityId, Projectile>,
    pub projectile_chunks: ChunkIndex,

    pub lootboxes: HashMap<EntityId, LootBox>,
    pub respawn_timers: HashMap<EntityId, LootBoxRespawnTimer>,
}

impl World {
    pub fn new(physics_resolution: u32) -> Self {
        World {
            tick: 0,
            next_id: 1,
            physics_resolution,
            maps: MapRegistry::new(),
            current_map: None,
            players: HashMap::new(),
            username_to_id: HashMap::new(),
            player_chunks: ChunkIndex::new(DEFAULT_CHUNK_SIZE),
            projectiles: HashMap::new(),
            projectile_chunks: ChunkIndex::new(DEFAULT_CHUNK_SIZE),
            lootboxes: HashMap::new(),
            respawn_timers: HashMap::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn register_map(&mut self, map: Map) {
        self.maps.register(map);
    }

    pub fn maps(&self) -> &MapRegistry {
        &self.maps
    }

    /// Swap the current map and invalidate every chunk index (Design
    /// Notes: "invalidate on map change rather than retaining stale
    /// grids").
    pub fn set_current_map(&mut self, map_id: &str) -> bool {
        if self.maps.get(map_id).is_none() {
            return false;
        }
        self.current_map = Some(map_id.to_string());
        self.player_chunks = ChunkIndex::new(DEFAULT_CHUNK_SIZE);
        self.projectile_chunks = ChunkIndex::new(DEFAULT_CHUNK_SIZE);
        true
    }

    pub fn current_map(&self) -> Option<&Map> {
        self.current_map.as_deref().and_then(|id| self.maps.get(id))
    }

    /// Spawn a player at a uniformly random spawn point (spec §4.4
    /// `toRandomSpawnpoint`), inserting it into the arena and chunk index.
    pub fn add_player(&mut self, account: Account, rng: &mut impl rand::Rng) -> Option<EntityId> {
        let map = self.current_map()?;
        let spawn = random_spawnpoint(&map.player_spawns, rng)?;
        let id = self.next_entity_id();

        let taken: Vec<String> = self.players.values().map(|p| p.color.to_string()).collect();
        let color = next_free_colour(&taken).unwrap_or("blue");

        let body = EntityBody::new(id, spawn, 0.75, 0.75);
        let half_extents = body.half_extents();
        let position = body.position;
        let username = account.username.clone();

        self.players.insert(
            id,
            PlayerEntity {
                body,
                username: username.clone(),
                color,
                connected: true,
                anticheat: AnticheatState::default(),
                base_properties: PlayerProperties::default(),
                modifiers: HashMap::new(),
                account,
            },
        );
        self.username_to_id.insert(username, id);
        self.player_chunks.update(id, position, half_extents);
        // Initial placement is a server-initiated position write (spec
        // §4.4's "e.g. respawn, teleport" list) — the freshly joined
        // player's first snapshot must hard-snap like any other one.
        self.mark_override(id);
        Some(id)
    }

    /// Draw spawn points for a whole roster without replacement (spec
    /// §4.4 `spreadPlayers`). Returns one point per id, in the order
    /// given, stopping (and logging, per spec) if the pool runs dry.
    pub fn spread_players(&self, ids: &[EntityId], rng: &mut impl rand::Rng) -> HashMap<EntityId, Point> {
        let mut assigned = HashMap::new();
        let Some(map) = self.current_map() else { return assigned };
        let mut pool = SpawnPool::new(&map.player_spawns, rng);
        for &id in ids {
            match pool.take_one() {
                Some(point) => {
                    assigned.insert(id, point);
                }
                None => {
                    log::error!("spawn pool exhausted before all {} players were placed", ids.len());
                    break;
                }
            }
        }
        assigned
    }

    pub fn id_for_username(&self, username: &str) -> Option<EntityId> {
        self.username_to_id.get(username).copied()
    }

    pub fn username_for_id(&self, id: EntityId) -> Option<&str> {
        self.players.get(&id).map(|p| p.username.as_str())
    }

    /// Remove a player. Idempotent (spec §3 Entity lifecycle).
    pub fn remove_player(&mut self, id: EntityId) -> Option<PlayerEntity> {
        self.player_chunks.remove(id);
        let removed = self.players.remove(&id);
        if let Some(player) = &removed {
            self.username_to_id.remove(&player.username);
        }
        removed
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Apply one client-driven physics tick to a single player (spec
    /// §4.4). Independent of the global tick loop.
    pub fn apply_player_input(&mut self, id: EntityId, input: &PlayerTickInput) -> Option<KickReason> {
        let current_id = self.current_map.clone()?;
        let map = self.maps.get(&current_id)?;
        let resolution = self.physics_resolution;
        let player = self.players.get_mut(&id)?;
        let kick = apply_tick(
            &mut player.body,
            &mut player.anticheat,
            &player.base_properties,
            &mut player.modifiers,
            input,
            map,
            resolution,
        );
        let (position, half_extents) = (player.body.position, player.body.half_extents());
        self.player_chunks.update(id, position, half_extents);
        kick
    }

    /// Spec §4.4 "server-initiated position/velocity writes... e.g.
    /// respawn, teleport": any time room code moves a player without going
    /// through `apply_player_input`, it must call this so the next
    /// snapshot hard-snaps the client. `add_player` is the one call site
    /// today, since nothing else in this crate repositions a player
    /// outside of their own physics tick.
    pub fn mark_override(&mut self, id: EntityId) {
        if let Some(player) = self.players.get_mut(&id) {
            mark_server_override(&mut player.anticheat);
        }
    }

    /// One global tick: background anticheat bookkeeping for every player
    /// and respawn-timer aging. Spec §4.3 "Global tick" / §4.4 background
    /// tick / §4.6 respawn timers.
    pub fn step(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport::default();

        for (&id, player) in self.players.iter_mut() {
            if let Some(kick) = background_tick(&mut player.anticheat, self.tick) {
                report.kicks.push((id, kick));
            }
        }

        let mut matured = Vec::new();
        for (&id, timer) in self.respawn_timers.iter_mut() {
            if timer.tick() {
                matured.push((id, timer.position, timer.variant));
            }
        }
        for (timer_id, position, variant) in matured {
            self.respawn_timers.remove(&timer_id);
            let id = self.next_entity_id();
            if let Some(current_id) = self.current_map.clone() {
                if let Some(map) = self.maps.get(&current_id) {
                    let lootbox = LootBox::spawn(id, position, variant, map, self.physics_resolution);
                    self.lootboxes.insert(id, lootbox);
                    report.respawned_lootboxes.push(id);
                }
            }
        }

        report
    }

    /// Decrement every player's override countdown by one. Must run after
    /// the room has broadcast this tick's snapshot (spec §8 Scenario 3):
    /// `background_tick` no longer decrements it itself so the snapshot for
    /// the triggering tick and the one after it both read the counter as
    /// still positive.
    pub fn decay_overrides(&mut self) {
        for player in self.players.values_mut() {
            decay_override(&mut player.anticheat);
        }
    }

    /// Remove a loot box, scheduling a respawn timer at its location if it
    /// was spawned from the current map (spec §4.6).
    pub fn take_lootbox(&mut self, id: EntityId) -> Option<LootVariant> {
        let lootbox = self.lootboxes.remove(&id)?;
        let timer = LootBoxRespawnTimer::new(lootbox.body.position, lootbox.variant);
        let timer_id = self.next_entity_id();
        self.respawn_timers.insert(timer_id, timer);
        Some(lootbox.variant)
    }

    /// Clear all loot boxes and timers, then spawn one box per
    /// `lootboxSpawnpoints` entry of the current map (spec §4.6
    /// `spawnLootBoxes`).
    pub fn spawn_lootboxes(&mut self) {
        self.lootboxes.clear();
        self.respawn_timers.clear();
        let Some(current_id) = self.current_map.clone() else { return };
        let Some(map) = self.maps.get(&current_id) else { return };
        let spawns = map.loot_spawns.clone();
        for spawn in spawns {
            let id = self.next_entity_id();
            let map = self.maps.get(&current_id).expect("map checked above");
            let lootbox = LootBox::spawn(id, spawn.point, spawn.variant, map, self.physics_resolution);
            self.lootboxes.insert(id, lootbox);
        }
    }

    pub fn fire_projectile(
        &mut self,
        owner: EntityId,
        angle: f32,
        template: ProjectileTemplate,
    ) -> Option<EntityId> {
        let owner_velocity = {
            let player = self.players.get(&owner)?;
            (player.body.vx, player.body.vy)
        };
        let position = self.players.get(&owner)?.body.position;
        let id = self.next_entity_id();
        let projectile = Projectile::new(id, owner, position, angle, owner_velocity, template);
        let (pos, half) = (projectile.body.position, projectile.body.half_extents());
        self.projectile_chunks.update(id, pos, half);
        self.projectiles.insert(id, projectile);
        Some(id)
    }

    /// Advance every projectile one tick: move, cull out-of-bounds, and
    /// resolve hits against players and, for templates that opt in,
    /// against other projectiles in the same chunk (spec §4.5 steps 1-6).
    pub fn step_projectiles(&mut self) -> Vec<ProjectileHit> {
        let Some(current_id) = self.current_map.clone() else { return Vec::new() };
        let Some(map) = self.maps.get(&current_id) else { return Vec::new() };
        let (map_width, map_height) = (map.width, map.height);
        let resolution = self.physics_resolution;

        let mut hits = Vec::new();
        let mut to_remove: Vec<EntityId> = Vec::new();

        let ids: Vec<EntityId> = self.projectiles.keys().copied().collect();
        for id in ids {
            if to_remove.contains(&id) {
                continue;
            }

            let outcome = {
                let map = self.maps.get(&current_id).expect("map checked above");
                let projectile = self.projectiles.get_mut(&id).expect("id from live key set");
                projectile.tick(map, resolution, map_width, map_height)
            };

            match outcome {
                ProjectileOutcome::RemovedOutOfBounds | ProjectileOutcome::RemovedMapHit => {
                    to_remove.push(id);
                    continue;
                }
                ProjectileOutcome::Continue | ProjectileOutcome::HitEntity(_) => {}
            }

            let (pos, half, owner, collides_with_projectiles) = {
                let projectile = &self.projectiles[&id];
                (
                    projectile.body.position,
                    projectile.body.half_extents(),
                    projectile.owner,
                    projectile.template.collides_with_projectiles,
                )
            };
            self.projectile_chunks.update(id, pos, half);

            let mut hit_something = false;
            let nearby_players = self.player_chunks.in_same_chunks(pos, half);
            for player_id in nearby_players {
                if player_id == owner {
                    continue;
                }
                let Some(player) = self.players.get(&player_id) else { continue };
                let overlap = shared::geometry::polygons_intersect(
                    &self.projectiles[&id].body.vertices(),
                    &player.body.vertices(),
                );
                if overlap {
                    hits.push(ProjectileHit::Player { projectile: id, player: player_id });
                    to_remove.push(id);
                    hit_something = true;
                    break;
                }
            }

            if !hit_something && collides_with_projectiles {
                let nearby_projectiles = self.projectile_chunks.in_same_chunks(pos, half);
                for other_id in nearby_projectiles {
                    if other_id == id || to_remove.contains(&other_id) {
                        continue;
                    }
                    let Some(other) = self.projectiles.get(&other_id) else { continue };
                    let overlap = shared::geometry::polygons_intersect(
                        &self.projectiles[&id].body.vertices(),
                        &other.body.vertices(),
                    );
                    if overlap {
                        hits.push(ProjectileHit::Projectile { projectile: id, other: other_id });
                        to_remove.push(id);
                        break;
                    }
                }
            }
        }

        for id in to_remove {
            if let Some(mut projectile) = self.projectiles.remove(&id) {
                projectile.halt();
            }
            self.projectile_chunks.remove(id);
        }

        hits
    }
}
