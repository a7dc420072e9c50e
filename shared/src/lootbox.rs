//! Loot boxes and respawn timers (§4.6): stationary pickups with
//! gravity-drop on spawn and delayed respawn.

use crate::entity::{EntityBody, EntityId};
use crate::geometry::Point;
use crate::map::Map;
use crate::tileset::LootVariant;

pub const RESPAWN_DELAY_TICKS: u32 = 800;
const LOOT_BOX_SIZE: f32 = 1.0;

pub struct LootBox {
    pub body: EntityBody,
    pub variant: LootVariant,
}

impl LootBox {
    /// Spawns at `position`, drops to the nearest ground below it, and
    /// settles: spec §4.6 "sets vy = -1 and immediately calls
    /// `nextPosition`... it does not move thereafter."
    pub fn spawn(id: EntityId, position: Point, variant: LootVariant, map: &Map, physics_resolution: u32) -> Self {
        let mut body = EntityBody::new(id, position, LOOT_BOX_SIZE, LOOT_BOX_SIZE);
        body.vy = -1.0;
        body.next_position(map, physics_resolution);
        body.vx = 0.0;
        body.vy = 0.0;
        LootBox { body, variant }
    }
}

/// A no-collision timer entity that replaces itself with a fresh loot box
/// of the same variant at the same location once it reaches zero.
pub struct LootBoxRespawnTimer {
    pub position: Point,
    pub variant: LootVariant,
    pub ticks_remaining: u32,
}

impl LootBoxRespawnTimer {
    pub fn new(position: Point, variant: LootVariant) -> Self {
        LootBoxRespawnTimer { position, variant, ticks_remaining: RESPAWN_DELAY_TICKS }
    }

    /// Advance one tick. Returns `true` once the timer has elapsed — the
    /// caller then spawns a fresh `LootBox` and removes this timer.
    pub fn tick(&mut self) -> bool {
        if self.ticks_remaining == 0 {
            return true;
        }
        self.ticks_remaining -= 1;
        self.ticks_remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Map, RawLayer, RawMap};
    use crate::tileset::Tileset;

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

    #[test]
    fn loot_box_settles_with_zero_velocity() {
        let map = open_map();
        let crate_box = LootBox::spawn(1, Point::new(5.0, 5.0), LootVariant::Health, &map, 64);
        assert_eq!(crate_box.body.vx, 0.0);
        assert_eq!(crate_box.body.vy, 0.0);
    }

    #[test]
    fn respawn_timer_fires_after_delay() {
        let mut timer = LootBoxRespawnTimer::new(Point::new(1.0, 1.0), LootVariant::Ammo);
        for _ in 0..RESPAWN_DELAY_TICKS - 1 {
            assert!(!timer.tick());
        }
        assert!(timer.tick());
    }
}
