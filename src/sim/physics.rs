//! Collision world and movement resolution
//!
//! The tricky part of a platformer: turning an intended movement into a
//! collision-free position against solids and one-way platforms, without
//! tunneling and without snapping up through platforms from below.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::Rect;
use crate::consts::COLLISION_EPSILON;
use crate::settings::PhysicsTuning;
use crate::{finite_or_zero, sanitize_vec};

/// Passes over the solid list per sub-step (pushes out of one solid can land in another)
const RESOLVE_PASSES: usize = 4;
/// Upper bound on sub-steps for a single resolve call
const MAX_SUBSTEPS: usize = 64;
/// Size of the raycast probe square
const RAY_PROBE_SIZE: f32 = 2.0;
/// Rays are cut short after this many probes
const MAX_RAY_STEPS: usize = 4096;

/// Static geometry categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolidKind {
    /// Blocks from every side
    Solid,
    /// One-way: only blocks bodies falling onto its top
    Platform,
    /// Blocks like a solid until destroyed, then respawns
    Destructible,
}

impl SolidKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "solid" | "ground" | "wall" => Some(SolidKind::Solid),
            "platform" | "one_way" => Some(SolidKind::Platform),
            "destructible" => Some(SolidKind::Destructible),
            _ => None,
        }
    }
}

/// A blocking rectangle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solid {
    pub id: u32,
    pub rect: Rect,
    pub kind: SolidKind,
    /// Destroyed destructibles stop blocking until they respawn
    pub active: bool,
    /// Seconds until a destroyed destructible comes back
    pub respawn_timer: f32,
}

/// A rectangle that hurts on contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hazard {
    pub rect: Rect,
    pub damage: i32,
}

/// Per-body movement switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOptions {
    /// Apply gravity (false for flying bodies)
    pub gravity: bool,
    /// Fall through one-way platforms (drop-down)
    pub ignore_platforms: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            gravity: true,
            ignore_platforms: false,
        }
    }
}

/// Outcome of resolving one body's movement for one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub rect: Rect,
    pub velocity: Vec2,
    pub on_ground: bool,
    /// Pushed out horizontally this step
    pub hit_wall: bool,
    /// Pushed down out of a ceiling this step
    pub hit_ceiling: bool,
}

/// Static collision geometry for the active level
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    pub tuning: PhysicsTuning,
    /// Solid and destructible rectangles, in insertion order
    solids: Vec<Solid>,
    /// One-way platform rectangles
    platforms: Vec<Rect>,
    hazards: Vec<Hazard>,
    /// Bodies whose top passes this line are out of the world
    kill_y: f32,
    next_id: u32,
}

impl PhysicsWorld {
    pub fn new(tuning: PhysicsTuning) -> Self {
        Self {
            tuning,
            solids: Vec::new(),
            platforms: Vec::new(),
            hazards: Vec::new(),
            kill_y: f32::INFINITY,
            next_id: 1,
        }
    }

    /// Remove all geometry (level unload)
    pub fn clear(&mut self) {
        self.solids.clear();
        self.platforms.clear();
        self.hazards.clear();
        self.kill_y = f32::INFINITY;
        self.next_id = 1;
    }

    /// Add geometry, returning its id (platforms share the id space)
    pub fn add_solid(&mut self, rect: Rect, kind: SolidKind) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        match kind {
            SolidKind::Platform => self.platforms.push(rect),
            SolidKind::Solid | SolidKind::Destructible => self.solids.push(Solid {
                id,
                rect,
                kind,
                active: true,
                respawn_timer: 0.0,
            }),
        }
        let floor = rect.bottom() + self.tuning.kill_margin;
        self.kill_y = if self.kill_y.is_finite() {
            self.kill_y.max(floor)
        } else {
            floor
        };
        id
    }

    pub fn add_hazard(&mut self, rect: Rect, damage: i32) {
        self.hazards.push(Hazard {
            rect,
            damage: damage.max(0),
        });
    }

    pub fn solids(&self) -> &[Solid] {
        &self.solids
    }

    pub fn platforms(&self) -> &[Rect] {
        &self.platforms
    }

    /// Currently blocking solid rectangles
    pub fn active_solids(&self) -> impl Iterator<Item = &Rect> {
        self.solids.iter().filter(|s| s.active).map(|s| &s.rect)
    }

    /// Destroy a destructible solid; returns false for unknown ids and plain solids
    pub fn destroy(&mut self, id: u32) -> bool {
        let respawn = self.tuning.destructible_respawn;
        match self
            .solids
            .iter_mut()
            .find(|s| s.id == id && s.kind == SolidKind::Destructible && s.active)
        {
            Some(solid) => {
                solid.active = false;
                solid.respawn_timer = respawn;
                log::debug!("Destructible {} destroyed", id);
                true
            }
            None => false,
        }
    }

    /// Advance respawn timers of destroyed destructibles
    pub fn update(&mut self, dt: f32) {
        let dt = finite_or_zero(dt).max(0.0);
        for solid in self.solids.iter_mut().filter(|s| !s.active) {
            solid.respawn_timer -= dt;
            if solid.respawn_timer <= 0.0 {
                solid.active = true;
                solid.respawn_timer = 0.0;
                log::debug!("Destructible {} respawned", solid.id);
            }
        }
    }

    /// True if `rect` overlaps any blocking solid
    pub fn overlaps_solid(&self, rect: &Rect) -> bool {
        self.active_solids().any(|s| rect.intersects(s))
    }

    /// Highest hazard damage touching `rect`
    pub fn hazard_damage(&self, rect: &Rect) -> Option<i32> {
        self.hazards
            .iter()
            .filter(|h| rect.intersects(&h.rect))
            .map(|h| h.damage)
            .max()
    }

    /// True once a body has fallen below all geometry
    pub fn is_out_of_world(&self, rect: &Rect) -> bool {
        rect.top() > self.kill_y
    }

    /// Resolve movement with default options (gravity on, platforms solid)
    pub fn resolve(&self, rect: Rect, velocity: Vec2, dt: f32) -> Resolved {
        self.resolve_with(rect, velocity, dt, MoveOptions::default())
    }

    /// Integrate `velocity` over `dt` and push the box out of any geometry
    ///
    /// The box moves with the incoming velocity, then gravity accelerates the
    /// returned vy up to the fall cap. A supported box starts from vy = 0, so a
    /// resting body reports the same vy every frame. Movement is split into sub-steps no
    /// longer than `max_step` so fast bodies cannot skip through thin solids.
    pub fn resolve_with(&self, rect: Rect, velocity: Vec2, dt: f32, opts: MoveOptions) -> Resolved {
        let dt = finite_or_zero(dt).max(0.0);
        let mut rect = Rect::from_pos_size(sanitize_vec(rect.pos()), rect.size());
        let mut vel = self.clamp_velocity(sanitize_vec(velocity));
        // Already standing: last frame's gravity must not sink the box into the floor
        if opts.gravity && vel.y > 0.0 && self.is_supported(&rect, opts.ignore_platforms) {
            vel.y = 0.0;
        }

        let mut step = vel * dt;
        if opts.gravity {
            vel.y = (vel.y + self.tuning.gravity * dt).min(self.tuning.max_fall_speed);
        }

        let mut out = Resolved {
            rect,
            velocity: vel,
            on_ground: false,
            hit_wall: false,
            hit_ceiling: false,
        };

        let longest = step.x.abs().max(step.y.abs());
        let substeps = ((longest / self.tuning.max_step.max(0.5)).ceil() as usize).clamp(1, MAX_SUBSTEPS);
        step /= substeps as f32;

        for _ in 0..substeps {
            let before = rect;
            rect = rect.translated(step);

            let (pushed_x, pushed_y) = self.push_out_of_solids(&mut rect, &mut out);
            if pushed_x {
                step.x = 0.0;
            }
            if pushed_y {
                step.y = 0.0;
            }

            if !opts.ignore_platforms && self.land_on_platforms(&before, &mut rect, &mut out) {
                step.y = 0.0;
            }
        }

        if out.velocity.y >= 0.0 && self.is_supported(&rect, opts.ignore_platforms) {
            out.on_ground = true;
        }

        out.rect = rect;
        out
    }

    fn clamp_velocity(&self, vel: Vec2) -> Vec2 {
        let max_x = self.tuning.max_horizontal_speed;
        // Upward speed shares the larger of the two caps
        let max_up = self.tuning.max_fall_speed.max(max_x);
        Vec2::new(
            vel.x.clamp(-max_x, max_x),
            vel.y.clamp(-max_up, self.tuning.max_fall_speed),
        )
    }

    /// Push `rect` out of overlapping solids along the shallower axis
    ///
    /// Returns (pushed horizontally, pushed vertically).
    fn push_out_of_solids(&self, rect: &mut Rect, out: &mut Resolved) -> (bool, bool) {
        let mut pushed_x = false;
        let mut pushed_y = false;

        for _ in 0..RESOLVE_PASSES {
            // Deepest contact first so seams between adjacent tiles don't snag
            let mut contacts: Vec<(f32, Rect)> = self
                .active_solids()
                .filter(|s| rect.penetrates(s, COLLISION_EPSILON))
                .map(|s| (rect.overlap_x(s) * rect.overlap_y(s), *s))
                .collect();
            if contacts.is_empty() {
                break;
            }
            contacts.sort_by(|a, b| b.0.total_cmp(&a.0));

            for (_, solid) in contacts {
                if !rect.penetrates(&solid, COLLISION_EPSILON) {
                    continue;
                }
                let overlap_x = rect.overlap_x(&solid);
                let overlap_y = rect.overlap_y(&solid);

                if overlap_x < overlap_y {
                    if rect.center().x < solid.center().x {
                        rect.x = solid.left() - rect.w;
                    } else {
                        rect.x = solid.right();
                    }
                    out.velocity.x = 0.0;
                    out.hit_wall = true;
                    pushed_x = true;
                } else if rect.center().y < solid.center().y {
                    // Landing
                    rect.y = solid.top() - rect.h;
                    out.velocity.y = 0.0;
                    out.on_ground = true;
                    pushed_y = true;
                } else {
                    // Head bump: only allow falling afterwards
                    rect.y = solid.bottom();
                    out.velocity.y = out.velocity.y.max(0.0);
                    out.hit_ceiling = true;
                    pushed_y = true;
                }
            }
        }

        (pushed_x, pushed_y)
    }

    /// Land on one-way platforms the box was above before this sub-step
    fn land_on_platforms(&self, before: &Rect, rect: &mut Rect, out: &mut Resolved) -> bool {
        if out.velocity.y < 0.0 {
            return false;
        }
        let mut landed = false;
        for platform in &self.platforms {
            if rect.intersects(platform) && before.bottom() <= platform.top() + COLLISION_EPSILON {
                rect.y = platform.top() - rect.h;
                out.velocity.y = 0.0;
                out.on_ground = true;
                landed = true;
            }
        }
        landed
    }

    /// Something solid (or a platform top) directly under the box
    fn is_supported(&self, rect: &Rect, ignore_platforms: bool) -> bool {
        let probe = Rect::new(rect.x, rect.bottom(), rect.w, self.tuning.ground_probe.max(COLLISION_EPSILON));
        if self.active_solids().any(|s| probe.intersects(s)) {
            return true;
        }
        !ignore_platforms
            && self.platforms.iter().any(|p| {
                probe.intersects(p) && rect.bottom() <= p.top() + COLLISION_EPSILON
            })
    }

    /// True when the box is resting on a one-way platform (drop-through is possible)
    pub fn standing_on_platform(&self, rect: &Rect) -> bool {
        let probe = Rect::new(rect.x, rect.bottom(), rect.w, self.tuning.ground_probe.max(COLLISION_EPSILON));
        self.platforms
            .iter()
            .any(|p| probe.intersects(p) && rect.bottom() <= p.top() + COLLISION_EPSILON)
    }

    /// March from `start` to `end`, returning the first point inside a solid
    ///
    /// At most `MAX_RAY_STEPS` probes are taken; anything past that is not checked.
    pub fn raycast(&self, start: Vec2, end: Vec2) -> Option<Vec2> {
        let start = sanitize_vec(start);
        let end = sanitize_vec(end);
        // Halved so far-apart finite points cannot overflow
        let half = end * 0.5 - start * 0.5;
        let largest = half.abs().max_element();
        if largest <= f32::EPSILON {
            return None;
        }

        let dir = (half / largest).normalize();
        let step = self.tuning.raycast_step.max(0.1);
        let distance = (2.0 * half.length()).min(step * MAX_RAY_STEPS as f32);
        let steps = (distance / step) as usize;

        (0..=steps)
            .map(|i| start + dir * (step * i as f32).min(distance))
            .find(|&p| {
                let probe = Rect::from_center(p, Vec2::splat(RAY_PROBE_SIZE));
                self.overlaps_solid(&probe)
            })
    }

    /// No solid between the two points
    pub fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        self.raycast(from, to).is_none()
    }

    /// Y of the first solid surface below (x, y) within `max_distance`
    pub fn ground_below(&self, x: f32, y: f32, max_distance: f32) -> Option<f32> {
        self.raycast(Vec2::new(x, y), Vec2::new(x, y + max_distance.max(0.0)))
            .map(|p| p.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;

    fn world_with_floor() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        world.add_solid(Rect::new(0.0, 200.0, 1000.0, 32.0), SolidKind::Solid);
        world
    }

    #[test]
    fn test_resting_body_gains_gravity_but_stays_put() {
        let world = world_with_floor();
        let body = Rect::new(100.0, 176.0, 16.0, 24.0);
        let out = world.resolve(body, Vec2::ZERO, SIM_DT);
        assert_eq!(out.rect, body);
        assert!((out.velocity.y - 800.0 / 60.0).abs() < 0.01);
        assert!(out.on_ground);
    }

    #[test]
    fn test_resting_body_reports_steady_vy() {
        let world = world_with_floor();
        let mut body = Rect::new(100.0, 176.0, 16.0, 24.0);
        let mut vel = Vec2::ZERO;
        for _ in 0..6 {
            let out = world.resolve(body, vel, SIM_DT);
            assert_eq!(out.rect.y, 176.0);
            assert!((out.velocity.y - 800.0 / 60.0).abs() < 0.01);
            assert!(out.on_ground);
            body = out.rect;
            vel = out.velocity;
        }
    }

    #[test]
    fn test_landing_resets_vy_and_sets_ground() {
        let world = world_with_floor();
        let body = Rect::new(100.0, 170.0, 16.0, 24.0);
        let out = world.resolve(body, Vec2::new(0.0, 400.0), SIM_DT);
        assert!((out.rect.bottom() - 200.0).abs() < 1e-3);
        assert_eq!(out.velocity.y, 0.0);
        assert!(out.on_ground);
    }

    #[test]
    fn test_wall_stops_horizontal_movement() {
        let mut world = world_with_floor();
        world.add_solid(Rect::new(120.0, 100.0, 32.0, 100.0), SolidKind::Solid);
        let body = Rect::new(100.0, 176.0, 16.0, 24.0);
        let out = world.resolve(body, Vec2::new(600.0, 0.0), SIM_DT);
        assert!((out.rect.right() - 120.0).abs() < 1e-3);
        assert_eq!(out.velocity.x, 0.0);
        assert!(out.hit_wall);
    }

    #[test]
    fn test_head_bump_allows_only_falling() {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        world.add_solid(Rect::new(0.0, 0.0, 200.0, 20.0), SolidKind::Solid);
        let body = Rect::new(50.0, 22.0, 16.0, 24.0);
        let out = world.resolve(body, Vec2::new(0.0, -300.0), SIM_DT);
        assert!((out.rect.top() - 20.0).abs() < 1e-3);
        assert!(out.velocity.y >= 0.0);
        assert!(out.hit_ceiling);
    }

    #[test]
    fn test_platform_blocks_from_above_only() {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        world.add_solid(Rect::new(0.0, 100.0, 200.0, 8.0), SolidKind::Platform);

        // Jumping up through the platform
        let below = Rect::new(50.0, 105.0, 16.0, 24.0);
        let out = world.resolve(below, Vec2::new(0.0, -300.0), SIM_DT);
        assert!(out.rect.top() < 105.0);
        assert!(!out.on_ground);

        // Falling onto it
        let above = Rect::new(50.0, 74.0, 16.0, 24.0);
        let out = world.resolve(above, Vec2::new(0.0, 300.0), SIM_DT);
        assert!((out.rect.bottom() - 100.0).abs() < 1e-3);
        assert!(out.on_ground);
        assert_eq!(out.velocity.y, 0.0);
    }

    #[test]
    fn test_drop_through_platform() {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        world.add_solid(Rect::new(0.0, 100.0, 200.0, 8.0), SolidKind::Platform);
        let standing = Rect::new(50.0, 76.0, 16.0, 24.0);
        assert!(world.standing_on_platform(&standing));

        let opts = MoveOptions {
            ignore_platforms: true,
            ..Default::default()
        };
        let out = world.resolve_with(standing, Vec2::new(0.0, 120.0), SIM_DT, opts);
        assert!(out.rect.bottom() > 100.0);
        assert!(!out.on_ground);
    }

    #[test]
    fn test_non_finite_velocity_is_clamped() {
        let world = world_with_floor();
        let body = Rect::new(100.0, 50.0, 16.0, 24.0);
        let out = world.resolve(body, Vec2::new(f32::NAN, f32::INFINITY), SIM_DT);
        assert_eq!(out.rect.x, 100.0);
        assert!(out.velocity.x == 0.0 && out.velocity.y.is_finite());
    }

    #[test]
    fn test_flying_body_ignores_gravity() {
        let world = world_with_floor();
        let body = Rect::new(100.0, 50.0, 16.0, 10.0);
        let opts = MoveOptions {
            gravity: false,
            ..Default::default()
        };
        let out = world.resolve_with(body, Vec2::ZERO, SIM_DT, opts);
        assert_eq!(out.velocity, Vec2::ZERO);
        assert_eq!(out.rect, body);
    }

    #[test]
    fn test_raycast_hits_first_solid() {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        world.add_solid(Rect::new(50.0, 0.0, 10.0, 100.0), SolidKind::Solid);
        let hit = world.raycast(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0)).unwrap();
        assert!(hit.x >= 48.0 && hit.x <= 52.0);
        assert!(world.line_of_sight(Vec2::new(0.0, 150.0), Vec2::new(100.0, 150.0)));
        assert_eq!(world.raycast(Vec2::ZERO, Vec2::ZERO), None);
    }

    #[test]
    fn test_raycast_length_is_capped() {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        world.add_solid(Rect::new(-100.0, 200.0, 200.0, 32.0), SolidKind::Solid);

        let hit = world.raycast(Vec2::ZERO, Vec2::new(0.0, f32::MAX)).unwrap();
        assert!((198.0..=202.0).contains(&hit.y));
        assert_eq!(world.ground_below(0.0, 0.0, 1.0e30), Some(hit.y));

        // Beyond the probe budget nothing is reported
        let far = PhysicsTuning::default().raycast_step * MAX_RAY_STEPS as f32 + 500.0;
        assert!(world.line_of_sight(Vec2::new(0.0, -far), Vec2::new(0.0, f32::MAX)));
        assert!(world.line_of_sight(Vec2::new(-f32::MAX, -1.0), Vec2::new(f32::MAX, -1.0)));
    }

    #[test]
    fn test_platforms_do_not_block_raycasts() {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        world.add_solid(Rect::new(0.0, 100.0, 200.0, 8.0), SolidKind::Platform);
        assert!(world.line_of_sight(Vec2::new(50.0, 50.0), Vec2::new(50.0, 150.0)));
    }

    #[test]
    fn test_ground_below() {
        let world = world_with_floor();
        let y = world.ground_below(100.0, 150.0, 100.0).unwrap();
        assert!((y - 200.0).abs() <= 2.0);
        assert_eq!(world.ground_below(100.0, 0.0, 50.0), None);
    }

    #[test]
    fn test_destructible_lifecycle() {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        let id = world.add_solid(Rect::new(0.0, 100.0, 50.0, 16.0), SolidKind::Destructible);
        let probe = Rect::new(10.0, 105.0, 4.0, 4.0);
        assert!(world.overlaps_solid(&probe));
        assert!(world.destroy(id));
        assert!(!world.overlaps_solid(&probe));
        assert!(!world.destroy(id));
        world.update(3.1);
        assert!(world.overlaps_solid(&probe));
    }

    #[test]
    fn test_hazard_damage_takes_max() {
        let mut world = PhysicsWorld::new(PhysicsTuning::default());
        world.add_hazard(Rect::new(0.0, 0.0, 20.0, 20.0), 1);
        world.add_hazard(Rect::new(10.0, 0.0, 20.0, 20.0), 2);
        assert_eq!(world.hazard_damage(&Rect::new(12.0, 5.0, 4.0, 4.0)), Some(2));
        assert_eq!(world.hazard_damage(&Rect::new(50.0, 5.0, 4.0, 4.0)), None);
    }

    #[test]
    fn test_out_of_world() {
        let world = world_with_floor();
        assert!(!world.is_out_of_world(&Rect::new(0.0, 300.0, 16.0, 24.0)));
        assert!(world.is_out_of_world(&Rect::new(0.0, 400.0, 16.0, 24.0)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arena() -> PhysicsWorld {
            let mut world = PhysicsWorld::new(PhysicsTuning::default());
            world.add_solid(Rect::new(-500.0, 200.0, 2000.0, 32.0), SolidKind::Solid);
            world.add_solid(Rect::new(300.0, -1000.0, 32.0, 1200.0), SolidKind::Solid);
            world.add_solid(Rect::new(120.0, 120.0, 64.0, 16.0), SolidKind::Solid);
            world.add_solid(Rect::new(400.0, 140.0, 80.0, 8.0), SolidKind::Platform);
            world
        }

        proptest! {
            #[test]
            fn never_tunnels_into_solids(
                x in prop_oneof![0.0f32..100.0, 340.0f32..800.0],
                y in 0.0f32..90.0,
                vx in -600.0f32..600.0,
                vy in -400.0f32..400.0,
                frames in 1usize..120,
            ) {
                let world = arena();
                let mut rect = Rect::new(x, y, 16.0, 24.0);
                let mut vel = Vec2::new(vx, vy);
                prop_assume!(!world.overlaps_solid(&rect));

                for _ in 0..frames {
                    let out = world.resolve(rect, vel, SIM_DT);
                    for solid in world.active_solids() {
                        prop_assert!(
                            !out.rect.penetrates(solid, COLLISION_EPSILON),
                            "body {:?} penetrates {:?}", out.rect, solid
                        );
                    }
                    rect = out.rect;
                    // Keep pushing horizontally like a held stick
                    vel = Vec2::new(vx, out.velocity.y);
                }
            }
        }
    }
}
