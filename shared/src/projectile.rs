//! Projectile model (§4.5): typed templates, out-of-bounds culling, and
//! per-chunk broad-phase hit handling against players and other
//! projectiles.

use serde::{Deserialize, Serialize};

use crate::entity::{ContactEdges, EntityBody, EntityId};
use crate::geometry::Point;
use crate::map::Map;

pub const OUT_OF_BOUNDS_LIMIT_TILES: f32 = 20.0;

/// The closed set of projectile templates. Only `Linear` exists today — its
/// move function is a no-op per spec §4.5 ("translation is by constant
/// velocity"), matching the spec's explicit statement that no other move
/// function is defined yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileKind {
    Linear,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProjectileTemplate {
    pub kind: ProjectileKind,
    pub width: f32,
    pub height: f32,
    pub speed: f32,
    pub damage: u32,
    pub collides_with_projectiles: bool,
}

impl ProjectileTemplate {
    pub const fn linear(width: f32, height: f32, speed: f32, damage: u32) -> Self {
        ProjectileTemplate {
            kind: ProjectileKind::Linear,
            width,
            height,
            speed,
            damage,
            collides_with_projectiles: false,
        }
    }

    /// Same as [`linear`](Self::linear), but also collides with other
    /// projectiles in flight (spec §4.5 step 6).
    pub const fn linear_colliding(width: f32, height: f32, speed: f32, damage: u32) -> Self {
        let mut template = Self::linear(width, height, speed, damage);
        template.collides_with_projectiles = true;
        template
    }
}

pub struct Projectile {
    pub body: EntityBody,
    pub template: ProjectileTemplate,
    pub owner: EntityId,
}

/// Outcome of advancing one projectile by one tick, reported back to the
/// owning world so it can apply damage and deregister ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileOutcome {
    Continue,
    RemovedOutOfBounds,
    RemovedMapHit,
    HitEntity(EntityId),
}

impl Projectile {
    /// Construct a projectile owned by `owner`, whose velocity is seeded
    /// from the owner's velocity plus template speed along the firing
    /// angle (spec §4.5): `velocity = owner_velocity * 0.25 + speed along
    /// angle`.
    pub fn new(
        id: EntityId,
        owner: EntityId,
        position: Point,
        angle: f32,
        owner_velocity: (f32, f32),
        template: ProjectileTemplate,
    ) -> Self {
        let mut body = EntityBody::new(id, position, template.width, template.height);
        body.angle = angle;
        let (sin, cos) = angle.sin_cos();
        body.vx = owner_velocity.0 * 0.25 + template.speed * cos;
        body.vy = owner_velocity.1 * 0.25 + template.speed * sin;
        Projectile { body, template, owner }
    }

    /// Per-tick move function. Only `Linear` exists, which is a no-op:
    /// translation happens via constant velocity in `next_position`.
    fn apply_move(&mut self) {
        match self.template.kind {
            ProjectileKind::Linear => {}
        }
    }

    fn out_of_bounds(&self, map_width: u32, map_height: u32) -> bool {
        let x = self.body.position.x;
        let y = self.body.position.y;
        x < -OUT_OF_BOUNDS_LIMIT_TILES
            || y < -OUT_OF_BOUNDS_LIMIT_TILES
            || x > map_width as f32 + OUT_OF_BOUNDS_LIMIT_TILES
            || y > map_height as f32 + OUT_OF_BOUNDS_LIMIT_TILES
    }

    fn touching_anything(edges: ContactEdges) -> bool {
        edges.left != 0.0 || edges.right != 0.0 || edges.top != 0.0 || edges.bottom != 0.0
    }

    /// Advance one tick (spec §4.5 steps 1-4; steps 5-6, hit resolution
    /// against players/projectiles, are driven by the caller using the
    /// chunk index since that requires world-level entity lookup).
    pub fn tick(&mut self, map: &Map, physics_resolution: u32, map_width: u32, map_height: u32) -> ProjectileOutcome {
        if self.out_of_bounds(map_width, map_height) {
            return ProjectileOutcome::RemovedOutOfBounds;
        }

        self.apply_move();
        self.body.next_position(map, physics_resolution);

        if Self::touching_anything(self.body.contact_edges) {
            return ProjectileOutcome::RemovedMapHit;
        }

        ProjectileOutcome::Continue
    }

    /// Zero velocity before deregistering so the final snapshot shows the
    /// projectile halted rather than teleporting (spec §4.5).
    pub fn halt(&mut self) {
        self.body.vx = 0.0;
        self.body.vy = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_seeded_from_owner_and_template_speed() {
        let template = ProjectileTemplate::linear(0.25, 0.25, 2.0, 1);
        let projectile = Projectile::new(1, 0, Point::new(0.0, 0.0), 0.0, (4.0, 0.0), template);
        assert_eq!(projectile.body.vx, 4.0 * 0.25 + 2.0);
        assert_eq!(projectile.body.vy, 0.0);
    }

    #[test]
    fn linear_colliding_opts_into_projectile_vs_projectile_hits() {
        let template = ProjectileTemplate::linear_colliding(0.25, 0.25, 2.0, 1);
        assert!(template.collides_with_projectiles);
        assert!(!ProjectileTemplate::linear(0.25, 0.25, 2.0, 1).collides_with_projectiles);
    }

    #[test]
    fn far_out_of_bounds_projectile_is_flagged_for_removal() {
        let template = ProjectileTemplate::linear(0.25, 0.25, 1.0, 1);
        let mut projectile = Projectile::new(1, 0, Point::new(-100.0, 0.0), 0.0, (0.0, 0.0), template);
        assert!(projectile.out_of_bounds(32, 32));
        projectile.halt();
        assert_eq!(projectile.body.vx, 0.0);
    }
}
