//! Player model (§4.4): movement ruleset, modifier effects, the lockstep
//! anticheat counters, and spawn selection.
//!
//! `apply_tick` is the pure per-tick routine the Design Notes call for:
//! value types in, value types out, no I/O — so a client could in
//! principle call the exact same function.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::entity::EntityBody;
use crate::geometry::Point;
use crate::map::Map;
use crate::protocol::PlayerTickInput;

/// Base movement tuning. Spec §3: "initialised from fixed base values."
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerProperties {
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

impl Default for PlayerProperties {
    fn default() -> Self {
        PlayerProperties {
            gravity: 0.012,
            move_power: 0.02,
            jump_power: 0.22,
            wall_jump_power: 0.8,
            air_move_power: 0.008,
            drag: 0.85,
            air_drag: 0.98,
            wall_drag: 0.7,
            grip: 1.0,
            fly: false,
        }
    }
}

/// The closed set of modifier variants (spec §9: "six variants").
///
/// Tuning placeholder: no client or original implementation was available
/// to recover the authoritative per-variant coefficients (§9 Open
/// Questions), so `modifier_effect` below encodes one self-consistent
/// guess per variant rather than an authoritative table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierKind {
    Speed,
    Ice,
    StickyGrip,
    Feather,
    Heavy,
    Fly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifierState {
    pub kind: ModifierKind,
    pub remaining_ticks: u32,
    pub activated: bool,
}

/// Recompute the effective property struct from base + every activated
/// modifier. Spec §4.4 step 2: "Refresh effective properties from base
/// properties after any drop."
pub fn refresh_properties(
    base: &PlayerProperties,
    modifiers: &HashMap<u32, ModifierState>,
) -> PlayerProperties {
    let mut effective = *base;
    for state in modifiers.values().filter(|m| m.activated) {
        modifier_effect(state.kind, &mut effective);
    }
    effective
}

fn modifier_effect(kind: ModifierKind, props: &mut PlayerProperties) {
    match kind {
        ModifierKind::Speed => props.move_power *= 2.0,
        ModifierKind::Ice => {
            props.drag = 1.0;
            props.grip *= 0.3;
        }
        ModifierKind::StickyGrip => props.grip *= 2.0,
        ModifierKind::Feather => props.gravity *= 0.25,
        ModifierKind::Heavy => props.gravity *= 2.5,
        ModifierKind::Fly => props.fly = true,
    }
}

/// Anticheat counters and lockstep bookkeeping (spec §3 Player
/// client-physics state).
#[derive(Debug, Clone, Copy, Default)]
pub struct AnticheatState {
    pub client_tick: u32,
    pub fast_tick_infractions: u32,
    pub slow_tick_infractions: u32,
    pub override_next_tick: u8,
}

pub const MAX_TICK_LEAD: i64 = 40;
pub const MAX_TICK_LAG: i64 = 80;
pub const MAX_FAST_TICK_INFRACTIONS: u32 = 10;
pub const MAX_SLOW_TICK_INFRACTIONS: u32 = 20;
pub const INFRACTION_DECAY_RATE: u64 = 20;

/// Closed set of anticheat/protocol kick reasons (spec §4.4/§7), also used
/// as the wire-level `leave(reason)` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KickReason {
    ClientTooFast,
    ClientTooSlow,
    BadModifiers,
}

impl KickReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            KickReason::ClientTooFast => "client_too_fast",
            KickReason::ClientTooSlow => "client_too_slow",
            KickReason::BadModifiers => "bad_modifiers",
        }
    }
}

/// Background tick run for every player every global tick (spec §4.4).
/// Returns a kick reason once the relevant infraction threshold is
/// crossed.
pub fn background_tick(state: &mut AnticheatState, server_tick: u64) -> Option<KickReason> {
    let lead = state.client_tick as i64 - server_tick as i64;
    let mut kick = None;

    if lead > MAX_TICK_LEAD {
        state.fast_tick_infractions += 1;
        if state.fast_tick_infractions >= MAX_FAST_TICK_INFRACTIONS {
            kick = Some(KickReason::ClientTooFast);
        }
    }
    if -lead > MAX_TICK_LAG {
        state.slow_tick_infractions += 1;
        if state.slow_tick_infractions >= MAX_SLOW_TICK_INFRACTIONS {
            kick = Some(KickReason::ClientTooSlow);
        }
    }
    if server_tick % INFRACTION_DECAY_RATE == 0 {
        state.fast_tick_infractions = state.fast_tick_infractions.saturating_sub(1);
        state.slow_tick_infractions = state.slow_tick_infractions.saturating_sub(1);
    }
    kick
}

/// Decrement a still-running override countdown by one. Spec §8 Scenario 3:
/// the tick that sets the counter to 2 and the tick after it must *both*
/// broadcast `overridePosition = true`, with only the third reading it as
/// false — so this must run after the snapshot for the current tick has
/// already read `override_next_tick`, never before (read-then-decrement).
pub fn decay_override(state: &mut AnticheatState) {
    if state.override_next_tick > 0 {
        state.override_next_tick -= 1;
    }
}

const POSITION_MATCH_EPSILON: f32 = 1e-3;

/// Client-driven physics tick, run once per received input packet (spec
/// §4.4). Mutates the body/modifier map in place and returns the
/// server-authoritative outcome.
pub fn apply_tick(
    body: &mut EntityBody,
    anticheat: &mut AnticheatState,
    base_properties: &PlayerProperties,
    modifiers: &mut HashMap<u32, ModifierState>,
    input: &PlayerTickInput,
    map: &Map,
    physics_resolution: u32,
) -> Option<KickReason> {
    anticheat.client_tick = input.tick;

    let mut dropped = false;
    for state in modifiers.values_mut() {
        if state.activated {
            state.remaining_ticks = state.remaining_ticks.saturating_sub(1);
        }
    }
    modifiers.retain(|_, state| {
        let keep = !(state.activated && state.remaining_ticks == 0);
        dropped |= !keep;
        keep
    });

    for id in &input.modifiers {
        match modifiers.get_mut(id) {
            Some(state) => state.activated = true,
            None => return Some(KickReason::BadModifiers),
        }
    }

    let properties = refresh_properties(base_properties, modifiers);
    let _ = dropped; // refresh always recomputed regardless; named for clarity above

    if properties.fly {
        let ix = (input.inputs.right as i32 - input.inputs.left as i32) as f32;
        let iy = (input.inputs.up as i32 - input.inputs.down as i32) as f32;
        let len = (ix * ix + iy * iy).sqrt();
        if len > 0.0 {
            body.vx = ix / len * properties.move_power;
            body.vy = iy / len * properties.move_power;
        } else {
            body.vx = 0.0;
            body.vy = 0.0;
        }
    } else {
        let edges = body.contact_edges;
        body.vx *= properties.drag.powf(edges.top + edges.bottom);
        body.vy *= properties.drag.powf(edges.left + edges.right);
        body.vx *= properties.air_drag;
        body.vy *= properties.air_drag;

        let move_input = (input.inputs.right as i32 - input.inputs.left as i32) as f32;
        let pushing_into_wall =
            edges.left * move_input < 0.0 || edges.right * move_input > 0.0;

        if pushing_into_wall {
            let total_wall_friction = edges.left + edges.right;
            body.vy *= properties.wall_drag.powf(total_wall_friction);
            let on_ground = edges.bottom != 0.0;
            if input.inputs.up || (input.inputs.down && !on_ground) {
                body.vx -= move_input
                    * properties.jump_power
                    * properties.grip
                    * total_wall_friction
                    * properties.wall_jump_power;
                if input.inputs.up {
                    body.vy += properties.jump_power * properties.grip * total_wall_friction;
                }
            }
        } else if edges.bottom != 0.0 {
            body.vx += move_input * properties.move_power * properties.grip * edges.bottom;
            if input.inputs.up {
                body.vy += properties.jump_power;
            }
        } else {
            body.vx += move_input * properties.air_move_power;
        }

        body.vy -= properties.gravity * body.angle.cos();
        body.vx += properties.gravity * body.angle.sin();
    }

    body.next_position(map, physics_resolution);

    let dx = (body.position.x - input.position.endx).abs();
    let dy = (body.position.y - input.position.endy).abs();
    if dx > POSITION_MATCH_EPSILON || dy > POSITION_MATCH_EPSILON {
        anticheat.override_next_tick = 2;
    }

    None
}

/// Mark a player for a server-authoritative hard snap on the next
/// broadcast (spec §4.4: "Any explicit set-position or set-velocity from
/// server code... sets override-next-tick to 2").
pub fn mark_server_override(anticheat: &mut AnticheatState) {
    anticheat.override_next_tick = 2;
}

/// A shuffled, consumable pool of spawn points (spec §4.4 `spreadPlayers`:
/// "draws without replacement... logging an error and halting if the set
/// is exhausted before players"). Logging the exhaustion is the caller's
/// job — this type has no logging dependency, matching the rest of
/// `shared`.
pub struct SpawnPool {
    remaining: Vec<Point>,
}

impl SpawnPool {
    pub fn new(spawns: &[Point], rng: &mut impl Rng) -> Self {
        let mut remaining = spawns.to_vec();
        remaining.shuffle(rng);
        SpawnPool { remaining }
    }

    /// Draws one spawn point without replacement. `None` means the pool is
    /// exhausted — the caller must log and halt per spec §4.4.
    pub fn take_one(&mut self) -> Option<Point> {
        self.remaining.pop()
    }
}

pub fn random_spawnpoint(spawns: &[Point], rng: &mut impl Rng) -> Option<Point> {
    spawns.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Map, RawLayer, RawMap};
    use crate::tileset::Tileset;
    use rand::rngs::mock::StepRng;

    fn open_map() -> Map {
        let tileset_json = r#"{"tilewidth": 1, "tileheight": 1, "tilecount": 0, "tiles": []}"#;
        let tileset = Tileset::load(tileset_json.as_bytes()).unwrap();
        let raw = RawMap {
            id: "m".into(),
            name: None,
            pool: None,
            width: 10,
            height: 10,
            layers: vec![RawLayer { name: "ground".into(), width: 10, height: 10, data: vec![0; 100] }],
        };
        Map::build(&raw, &tileset).unwrap()
    }

    fn default_input(tick: u32) -> PlayerTickInput {
        use crate::protocol::{EndPosition, InputFlags};
        PlayerTickInput {
            tick,
            modifiers: vec![],
            inputs: InputFlags::default(),
            position: EndPosition { endx: 5.0, endy: 5.0 },
        }
    }

    #[test]
    fn bad_modifier_id_is_kicked() {
        let map = open_map();
        let mut body = EntityBody::new(1, Point::new(5.0, 5.0), 0.5, 0.5);
        let mut anticheat = AnticheatState::default();
        let props = PlayerProperties::default();
        let mut modifiers = HashMap::new();
        let mut input = default_input(1);
        input.modifiers.push(99);
        let kick = apply_tick(&mut body, &mut anticheat, &props, &mut modifiers, &input, &map, 64);
        assert_eq!(kick, Some(KickReason::BadModifiers));
    }

    #[test]
    fn mismatched_end_position_sets_override() {
        let map = open_map();
        let mut body = EntityBody::new(1, Point::new(5.0, 5.0), 0.5, 0.5);
        let mut anticheat = AnticheatState::default();
        let props = PlayerProperties::default();
        let mut modifiers = HashMap::new();
        let mut input = default_input(1);
        input.position.endx = 999.0;
        apply_tick(&mut body, &mut anticheat, &props, &mut modifiers, &input, &map, 64);
        assert_eq!(anticheat.override_next_tick, 2);
    }

    #[test]
    fn override_countdown_reads_true_for_two_ticks_then_false() {
        let mut anticheat = AnticheatState::default();
        mark_server_override(&mut anticheat);

        assert!(anticheat.override_next_tick > 0, "tick of the mismatch itself must read true");
        decay_override(&mut anticheat);

        assert!(anticheat.override_next_tick > 0, "the tick after must also read true");
        decay_override(&mut anticheat);

        assert_eq!(anticheat.override_next_tick, 0, "the third tick must read false");
    }

    #[test]
    fn fast_tick_lead_accumulates_to_kick_threshold() {
        let mut anticheat = AnticheatState { client_tick: 45, ..Default::default() };
        let mut kicked = None;
        for tick in 1..=MAX_FAST_TICK_INFRACTIONS as u64 {
            anticheat.client_tick = 45; // constant +45 lead vs server tick 0
            kicked = background_tick(&mut anticheat, 0);
            if kicked.is_some() {
                assert_eq!(tick, MAX_FAST_TICK_INFRACTIONS as u64);
            }
        }
        assert_eq!(kicked, Some(KickReason::ClientTooFast));
    }

    #[test]
    fn spawn_pool_exhausts_after_all_points_taken() {
        let spawns = vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        let mut rng = StepRng::new(0, 1);
        let mut pool = SpawnPool::new(&spawns, &mut rng);
        assert!(pool.take_one().is_some());
        assert!(pool.take_one().is_some());
        assert!(pool.take_one().is_none());
    }
}
