//! Hitbox combat
//!
//! Attacks run on an integer frame timeline (startup, active, recovery). One
//! `CombatResolver::update` call advances every attack instance by exactly one
//! frame. While an instance is in its active window it produces one hitbox in
//! front of its owner; any registered hurtbox it overlaps is hit at most once
//! per instance.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::effects::{EffectKind, EffectSet};
use super::entity::{EntityId, Health};
use super::geom::Rect;
use crate::{finite_or_zero, sanitize_vec};

/// Special on-hit behaviour of an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackEffect {
    #[default]
    None,
    Knockdown,
    Stun,
    /// Pops the defender into the air
    Launcher,
}

/// Attacks that fire a moving hitbox instead of a melee one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    /// px/s
    pub speed: f32,
    /// Seconds before the projectile fizzles
    pub lifetime: f32,
}

/// Immutable attack data, keyed by name in the `AttackLibrary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackDefinition {
    pub name: String,
    pub damage: i32,
    /// Hitbox size (projectile size for ranged attacks)
    pub hitbox: Vec2,
    pub startup: u32,
    pub active: u32,
    pub recovery: u32,
    /// Knockback for an attacker facing right
    pub knockback: Vec2,
    #[serde(default)]
    pub effect: AttackEffect,
    /// Can be cut short by `CombatResolver::cancel`
    #[serde(default)]
    pub cancelable: bool,
    /// Owner has super armor while the attack runs
    #[serde(default)]
    pub armor: bool,
    #[serde(default)]
    pub projectile: Option<ProjectileSpec>,
}

impl AttackDefinition {
    pub fn new(name: &str, damage: i32, hitbox: (f32, f32), frames: (u32, u32, u32), knockback: (f32, f32)) -> Self {
        Self {
            name: name.to_string(),
            damage,
            hitbox: Vec2::new(hitbox.0, hitbox.1),
            startup: frames.0,
            active: frames.1,
            recovery: frames.2,
            knockback: Vec2::new(knockback.0, knockback.1),
            effect: AttackEffect::None,
            cancelable: false,
            armor: false,
            projectile: None,
        }
    }

    pub fn with_effect(mut self, effect: AttackEffect) -> Self {
        self.effect = effect;
        self
    }

    pub fn cancelable(mut self) -> Self {
        self.cancelable = true;
        self
    }

    pub fn armored(mut self) -> Self {
        self.armor = true;
        self
    }

    pub fn projectile(mut self, speed: f32, lifetime: f32) -> Self {
        self.projectile = Some(ProjectileSpec { speed, lifetime });
        self
    }

    /// Startup + active + recovery
    pub fn total_frames(&self) -> u32 {
        self.startup + self.active + self.recovery
    }

    pub fn phase_at(&self, elapsed: u32) -> AttackPhase {
        if elapsed < self.startup {
            AttackPhase::Startup
        } else if elapsed < self.startup + self.active {
            AttackPhase::Active
        } else {
            AttackPhase::Recovery
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackPhase {
    Startup,
    Active,
    Recovery,
}

/// Named attack definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackLibrary {
    attacks: BTreeMap<String, AttackDefinition>,
}

impl Default for AttackLibrary {
    fn default() -> Self {
        let mut library = Self {
            attacks: BTreeMap::new(),
        };

        // === Player ===
        library.insert(AttackDefinition::new("player_light_1", 8, (24.0, 16.0), (4, 6, 8), (50.0, -20.0)).cancelable());
        library.insert(AttackDefinition::new("player_light_2", 10, (28.0, 18.0), (3, 8, 6), (60.0, -15.0)).cancelable());
        library.insert(
            AttackDefinition::new("player_light_3", 12, (32.0, 20.0), (5, 10, 12), (80.0, -40.0))
                .with_effect(AttackEffect::Launcher),
        );
        library.insert(
            AttackDefinition::new("player_heavy", 20, (36.0, 24.0), (8, 12, 15), (120.0, -60.0))
                .with_effect(AttackEffect::Knockdown)
                .armored(),
        );

        // === Enemies ===
        library.insert(AttackDefinition::new("maton_punch", 15, (30.0, 20.0), (15, 8, 20), (100.0, -30.0)).armored());
        library.insert(
            AttackDefinition::new("chacal_knife", 8, (6.0, 6.0), (2, 60, 5), (40.0, -10.0)).projectile(200.0, 3.0),
        );
        library.insert(
            AttackDefinition::new("luchador_grab", 20, (24.0, 28.0), (6, 10, 12), (150.0, -50.0))
                .with_effect(AttackEffect::Stun),
        );
        library.insert(AttackDefinition::new("drone_laser", 5, (4.0, 4.0), (3, 30, 8), (30.0, 0.0)).projectile(240.0, 2.0));

        library
    }
}

impl AttackLibrary {
    pub fn insert(&mut self, attack: AttackDefinition) {
        self.attacks.insert(attack.name.clone(), attack);
    }

    pub fn get(&self, name: &str) -> Option<&AttackDefinition> {
        self.attacks.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attacks.keys().map(String::as_str)
    }

    /// Overlay attacks from a JSON list onto the built-in set
    pub fn extend_from_json(&mut self, json: &str) -> Result<usize, serde_json::Error> {
        let attacks: Vec<AttackDefinition> = serde_json::from_str(json)?;
        let count = attacks.len();
        for attack in attacks {
            self.insert(attack);
        }
        log::info!("Loaded {} attack definitions", count);
        Ok(count)
    }
}

/// Handle of one running attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttackId(pub u32);

/// Per-start modifiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackOptions {
    /// Multiplier on the definition's damage
    pub damage_scale: f32,
    /// World-space point projectiles are thrown at (None fires straight ahead)
    pub aim_at: Option<Vec2>,
}

impl Default for AttackOptions {
    fn default() -> Self {
        Self {
            damage_scale: 1.0,
            aim_at: None,
        }
    }
}

/// A running attack
#[derive(Debug, Clone)]
pub struct AttackInstance {
    pub id: AttackId,
    pub owner: EntityId,
    pub attack: AttackDefinition,
    /// Frames advanced so far
    pub elapsed: u32,
    pub owner_box: Rect,
    pub facing_right: bool,
    pub options: AttackOptions,
    /// Defenders already hit by this instance
    hit: BTreeSet<EntityId>,
}

impl AttackInstance {
    pub fn phase(&self) -> AttackPhase {
        self.attack.phase_at(self.elapsed)
    }

    fn damage(&self) -> i32 {
        (self.attack.damage as f32 * finite_or_zero(self.options.damage_scale).max(0.0)).round() as i32
    }

    fn facing_sign(&self) -> f32 {
        if self.facing_right { 1.0 } else { -1.0 }
    }

    fn knockback(&self) -> Vec2 {
        Vec2::new(self.attack.knockback.x * self.facing_sign(), self.attack.knockback.y)
    }

    /// Melee hitbox in front of the owner, vertically centered on it
    fn hitbox_rect(&self) -> Rect {
        let size = self.attack.hitbox;
        let x = if self.facing_right {
            self.owner_box.right()
        } else {
            self.owner_box.left() - size.x
        };
        let y = self.owner_box.center().y - size.y / 2.0;
        Rect::new(x, y, size.x, size.y)
    }
}

/// Transient damage rectangle, rebuilt every update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hitbox {
    pub owner: EntityId,
    pub attack: AttackId,
    pub rect: Rect,
    pub damage: i32,
    pub knockback: Vec2,
    pub effect: AttackEffect,
}

/// A moving hitbox thrown by a ranged attack
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub owner: EntityId,
    pub attack: AttackId,
    pub rect: Rect,
    pub velocity: Vec2,
    /// Seconds left
    pub lifetime: f32,
    pub damage: i32,
    pub knockback: Vec2,
    pub effect: AttackEffect,
}

/// One confirmed hitbox/hurtbox contact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    pub attacker: EntityId,
    pub defender: EntityId,
    pub attack: AttackId,
    pub damage: i32,
    pub knockback: Vec2,
    pub effect: AttackEffect,
    /// Midpoint between the hitbox and hurtbox centers
    pub hit_point: Vec2,
}

/// How a defender absorbed a hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DamageOutcome {
    /// Health was reduced
    Applied { damage: i32, knockback: Vec2 },
    /// Invulnerable or already dead: nothing happened
    Blocked,
    /// Parry window consumed the hit
    Parried,
}

impl DamageOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DamageOutcome::Applied { .. })
    }
}

/// Apply a hit to health, honoring invulnerability and super armor
pub fn apply_damage(health: &mut Health, effects: &EffectSet, damage: i32, knockback: Vec2) -> DamageOutcome {
    if health.is_dead() || effects.has(EffectKind::Invulnerable) {
        return DamageOutcome::Blocked;
    }
    let damage = health.damage(damage);
    let knockback = if effects.has(EffectKind::SuperArmor) {
        Vec2::ZERO
    } else {
        sanitize_vec(knockback)
    };
    DamageOutcome::Applied { damage, knockback }
}

/// Owns attack timelines and detects hits
#[derive(Debug, Clone, Default)]
pub struct CombatResolver {
    /// Sorted by id (registration order)
    attacks: Vec<AttackInstance>,
    /// Hurtboxes by entity
    defenders: BTreeMap<EntityId, Rect>,
    projectiles: Vec<Projectile>,
    hitboxes: Vec<Hitbox>,
    next_id: u32,
}

impl CombatResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an attack for `owner`
    pub fn register_attacker(
        &mut self,
        owner: EntityId,
        attack: &AttackDefinition,
        owner_box: Rect,
        facing_right: bool,
    ) -> AttackId {
        self.register_attacker_with(owner, attack, owner_box, facing_right, AttackOptions::default())
    }

    pub fn register_attacker_with(
        &mut self,
        owner: EntityId,
        attack: &AttackDefinition,
        owner_box: Rect,
        facing_right: bool,
        options: AttackOptions,
    ) -> AttackId {
        self.next_id += 1;
        let id = AttackId(self.next_id);
        log::debug!("{} starts {} ({:?})", owner, attack.name, id);
        self.attacks.push(AttackInstance {
            id,
            owner,
            attack: attack.clone(),
            elapsed: 0,
            owner_box,
            facing_right,
            options,
            hit: BTreeSet::new(),
        });
        id
    }

    /// Set or move an entity's hurtbox
    pub fn register_defender(&mut self, entity: EntityId, hurtbox: Rect) {
        self.defenders.insert(entity, hurtbox);
    }

    /// Remove an entity's hurtbox and stop its attacks
    pub fn unregister(&mut self, entity: EntityId) {
        self.defenders.remove(&entity);
        self.interrupt(entity);
    }

    /// Track the owner's current pose so hitboxes follow it
    pub fn update_owner(&mut self, owner: EntityId, owner_box: Rect, facing_right: bool) {
        for instance in self.attacks.iter_mut().filter(|a| a.owner == owner) {
            instance.owner_box = owner_box;
            instance.facing_right = facing_right;
        }
    }

    /// Advance every attack one frame and move projectiles by `dt`
    pub fn update(&mut self, dt: f32) -> Vec<HitEvent> {
        self.update_with(dt, |_| false)
    }

    /// Like `update`, with `blocked` deciding which projectiles hit a wall
    pub fn update_with(&mut self, dt: f32, blocked: impl Fn(&Rect) -> bool) -> Vec<HitEvent> {
        let dt = finite_or_zero(dt).max(0.0);
        let mut events = Vec::new();
        self.hitboxes.clear();

        for instance in &mut self.attacks {
            let attack = &instance.attack;
            let in_window = instance.elapsed >= attack.startup && instance.elapsed < attack.startup + attack.active;

            if let Some(spec) = attack.projectile {
                if instance.elapsed == attack.startup && attack.active > 0 {
                    self.projectiles.push(spawn_projectile(instance, spec));
                }
            } else if in_window {
                let hitbox = Hitbox {
                    owner: instance.owner,
                    attack: instance.id,
                    rect: instance.hitbox_rect(),
                    damage: instance.damage(),
                    knockback: instance.knockback(),
                    effect: attack.effect,
                };
                for (&defender, hurtbox) in &self.defenders {
                    if defender == instance.owner || instance.hit.contains(&defender) {
                        continue;
                    }
                    if hitbox.rect.intersects(hurtbox) {
                        instance.hit.insert(defender);
                        events.push(HitEvent {
                            attacker: instance.owner,
                            defender,
                            attack: instance.id,
                            damage: hitbox.damage,
                            knockback: hitbox.knockback,
                            effect: hitbox.effect,
                            hit_point: (hitbox.rect.center() + hurtbox.center()) / 2.0,
                        });
                    }
                }
                self.hitboxes.push(hitbox);
            }

            instance.elapsed += 1;
        }

        self.attacks.retain(|a| a.elapsed < a.attack.total_frames());

        self.update_projectiles(dt, &blocked, &mut events);
        events
    }

    fn update_projectiles(&mut self, dt: f32, blocked: &impl Fn(&Rect) -> bool, events: &mut Vec<HitEvent>) {
        let defenders = &self.defenders;
        self.projectiles.retain_mut(|projectile| {
            projectile.rect = projectile.rect.translated(projectile.velocity * dt);
            projectile.lifetime -= dt;

            // First defender by id wins; the projectile is spent either way
            let target = defenders
                .iter()
                .find(|(id, hurtbox)| **id != projectile.owner && projectile.rect.intersects(hurtbox));
            if let Some((&defender, hurtbox)) = target {
                events.push(HitEvent {
                    attacker: projectile.owner,
                    defender,
                    attack: projectile.attack,
                    damage: projectile.damage,
                    knockback: projectile.knockback,
                    effect: projectile.effect,
                    hit_point: (projectile.rect.center() + hurtbox.center()) / 2.0,
                });
                return false;
            }

            projectile.lifetime > 0.0 && !blocked(&projectile.rect)
        });
    }

    /// Stop the owner's cancelable attacks; returns true if any was cancelled
    pub fn cancel(&mut self, owner: EntityId) -> bool {
        let before = self.attacks.len();
        self.attacks.retain(|a| !(a.owner == owner && a.attack.cancelable));
        let cancelled = self.attacks.len() != before;
        if cancelled {
            self.drop_stale_hitboxes();
            log::debug!("{} cancelled an attack", owner);
        }
        cancelled
    }

    /// Stop all of the owner's attacks regardless of cancelability (hurt, death)
    pub fn interrupt(&mut self, owner: EntityId) {
        let before = self.attacks.len();
        self.attacks.retain(|a| a.owner != owner);
        if self.attacks.len() != before {
            self.drop_stale_hitboxes();
        }
    }

    fn drop_stale_hitboxes(&mut self) {
        let live: BTreeSet<AttackId> = self.attacks.iter().map(|a| a.id).collect();
        self.hitboxes.retain(|h| live.contains(&h.attack));
    }

    pub fn is_attacking(&self, owner: EntityId) -> bool {
        self.attacks.iter().any(|a| a.owner == owner)
    }

    /// The owner's most recent running attack
    pub fn current_attack(&self, owner: EntityId) -> Option<&AttackInstance> {
        self.attacks.iter().rev().find(|a| a.owner == owner)
    }

    pub fn attacks(&self) -> &[AttackInstance] {
        &self.attacks
    }

    /// Hitboxes produced by the last update (for debug drawing)
    pub fn hitboxes(&self) -> &[Hitbox] {
        &self.hitboxes
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn defender(&self, entity: EntityId) -> Option<&Rect> {
        self.defenders.get(&entity)
    }

    /// Drop everything (level unload)
    pub fn clear(&mut self) {
        self.attacks.clear();
        self.defenders.clear();
        self.projectiles.clear();
        self.hitboxes.clear();
    }
}

fn spawn_projectile(instance: &AttackInstance, spec: ProjectileSpec) -> Projectile {
    let size = instance.attack.hitbox;
    let origin = instance.owner_box.center();
    let ahead = Vec2::new(instance.facing_sign(), 0.0);
    let direction = instance
        .options
        .aim_at
        .map(|target| (sanitize_vec(target) - origin).normalize_or_zero())
        .filter(|d| *d != Vec2::ZERO)
        .unwrap_or(ahead);

    let start = Vec2::new(
        if direction.x >= 0.0 {
            instance.owner_box.right() + size.x / 2.0
        } else {
            instance.owner_box.left() - size.x / 2.0
        },
        origin.y,
    );

    Projectile {
        owner: instance.owner,
        attack: instance.id,
        rect: Rect::from_center(start, size),
        velocity: direction * spec.speed,
        lifetime: spec.lifetime,
        damage: instance.damage(),
        knockback: Vec2::new(instance.attack.knockback.x * direction.x.signum(), instance.attack.knockback.y),
        effect: instance.attack.effect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: EntityId = EntityId(1);
    const E: EntityId = EntityId(2);

    fn player_box() -> Rect {
        Rect::new(0.0, 0.0, 16.0, 24.0)
    }

    fn run(resolver: &mut CombatResolver, frames: u32) -> Vec<HitEvent> {
        (0..frames).flat_map(|_| resolver.update(1.0 / 60.0)).collect()
    }

    #[test]
    fn test_default_library_contents() {
        let lib = AttackLibrary::default();
        let light = lib.get("player_light_1").unwrap();
        assert_eq!(light.damage, 8);
        assert_eq!(light.total_frames(), 18);
        assert!(light.cancelable);
        assert_eq!(lib.get("player_light_3").unwrap().effect, AttackEffect::Launcher);
        assert!(lib.get("chacal_knife").unwrap().projectile.is_some());
        assert!(lib.get("nope").is_none());
    }

    #[test]
    fn test_no_hit_before_startup() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(E, Rect::new(18.0, 0.0, 20.0, 24.0));
        resolver.register_attacker(P, lib.get("player_light_1").unwrap(), player_box(), true);

        assert!(run(&mut resolver, 4).is_empty());
        let hits = resolver.update(1.0 / 60.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].defender, E);
        assert_eq!(hits[0].damage, 8);
        assert_eq!(hits[0].knockback, Vec2::new(50.0, -20.0));
    }

    #[test]
    fn test_defender_hit_once_per_instance() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(E, Rect::new(18.0, 0.0, 20.0, 24.0));
        resolver.register_attacker(P, lib.get("player_heavy").unwrap(), player_box(), true);

        let hits = run(&mut resolver, 60);
        assert_eq!(hits.len(), 1);
        assert!(!resolver.is_attacking(P));
    }

    #[test]
    fn test_second_instance_can_hit_again() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(E, Rect::new(18.0, 0.0, 20.0, 24.0));
        let attack = lib.get("player_light_1").unwrap();
        resolver.register_attacker(P, attack, player_box(), true);
        let first = run(&mut resolver, 18);
        resolver.register_attacker(P, attack, player_box(), true);
        let second = run(&mut resolver, 18);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].attack, second[0].attack);
    }

    #[test]
    fn test_owner_never_hits_itself() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(P, Rect::new(-100.0, -100.0, 400.0, 400.0));
        resolver.register_attacker(P, lib.get("player_heavy").unwrap(), player_box(), true);
        assert!(run(&mut resolver, 40).is_empty());
    }

    #[test]
    fn test_facing_left_places_hitbox_behind_x() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(E, Rect::new(-30.0, 0.0, 20.0, 24.0));
        resolver.register_attacker(P, lib.get("player_light_1").unwrap(), player_box(), false);
        let hits = run(&mut resolver, 18);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].knockback.x, -50.0);
        assert!(hits[0].hit_point.x < 0.0);
    }

    #[test]
    fn test_hitboxes_only_during_active_window() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_attacker(P, lib.get("player_light_1").unwrap(), player_box(), true);
        let mut active_frames = 0;
        for _ in 0..18 {
            resolver.update(1.0 / 60.0);
            if !resolver.hitboxes().is_empty() {
                active_frames += 1;
            }
        }
        assert_eq!(active_frames, 6);
    }

    #[test]
    fn test_cancel_respects_cancelable_flag() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_attacker(P, lib.get("player_heavy").unwrap(), player_box(), true);
        assert!(!resolver.cancel(P));
        assert!(resolver.is_attacking(P));
        resolver.interrupt(P);
        assert!(!resolver.is_attacking(P));

        resolver.register_attacker(P, lib.get("player_light_1").unwrap(), player_box(), true);
        run(&mut resolver, 5);
        assert!(!resolver.hitboxes().is_empty());
        assert!(resolver.cancel(P));
        assert!(resolver.hitboxes().is_empty());
    }

    #[test]
    fn test_hitbox_follows_owner() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(E, Rect::new(218.0, 0.0, 20.0, 24.0));
        resolver.register_attacker(P, lib.get("player_light_1").unwrap(), player_box(), true);
        resolver.update_owner(P, Rect::new(200.0, 0.0, 16.0, 24.0), true);
        assert_eq!(run(&mut resolver, 18).len(), 1);
    }

    #[test]
    fn test_projectile_travels_and_hits_once() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(P, Rect::new(100.0, 0.0, 16.0, 24.0));
        let enemy_box = Rect::new(0.0, 4.0, 16.0, 16.0);
        let options = AttackOptions {
            aim_at: Some(Vec2::new(108.0, 12.0)),
            ..Default::default()
        };
        resolver.register_attacker_with(E, lib.get("chacal_knife").unwrap(), enemy_box, true, options);

        let hits = run(&mut resolver, 120);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].defender, P);
        assert!(resolver.projectiles().is_empty());
    }

    #[test]
    fn test_projectile_stopped_by_wall() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(P, Rect::new(100.0, 0.0, 16.0, 24.0));
        resolver.register_attacker(E, lib.get("chacal_knife").unwrap(), Rect::new(0.0, 4.0, 16.0, 16.0), true);
        let wall = Rect::new(50.0, -100.0, 8.0, 200.0);
        let hits: Vec<_> = (0..120)
            .flat_map(|_| resolver.update_with(1.0 / 60.0, |r| r.intersects(&wall)))
            .collect();
        assert!(hits.is_empty());
        assert!(resolver.projectiles().is_empty());
    }

    #[test]
    fn test_damage_scale() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(P, Rect::new(20.0, 0.0, 16.0, 24.0));
        let options = AttackOptions {
            damage_scale: 0.5,
            ..Default::default()
        };
        resolver.register_attacker_with(E, lib.get("maton_punch").unwrap(), Rect::new(0.0, 0.0, 20.0, 24.0), true, options);
        let hits = run(&mut resolver, 43);
        assert_eq!(hits[0].damage, 8);
    }

    #[test]
    fn test_apply_damage_rules() {
        let mut health = Health::new(20);
        let mut effects = EffectSet::new();

        let out = apply_damage(&mut health, &effects, 5, Vec2::new(50.0, -20.0));
        assert_eq!(out, DamageOutcome::Applied { damage: 5, knockback: Vec2::new(50.0, -20.0) });

        effects.apply(EffectKind::SuperArmor, 1.0, None);
        let out = apply_damage(&mut health, &effects, 5, Vec2::new(50.0, -20.0));
        assert_eq!(out, DamageOutcome::Applied { damage: 5, knockback: Vec2::ZERO });

        effects.apply(EffectKind::Invulnerable, 1.0, None);
        assert_eq!(apply_damage(&mut health, &effects, 5, Vec2::ZERO), DamageOutcome::Blocked);
        assert_eq!(health.current(), 10);
    }

    #[test]
    fn test_clear_drops_everything() {
        let lib = AttackLibrary::default();
        let mut resolver = CombatResolver::new();
        resolver.register_defender(E, Rect::new(18.0, 0.0, 20.0, 24.0));
        resolver.register_attacker(P, lib.get("player_light_1").unwrap(), player_box(), true);
        resolver.clear();
        assert!(!resolver.is_attacking(P));
        assert!(resolver.defender(E).is_none());
        assert!(resolver.update(1.0 / 60.0).is_empty());
    }

    #[test]
    fn test_library_json_overlay() {
        let mut lib = AttackLibrary::default();
        let json = r#"[{ "name": "test_jab", "damage": 3, "hitbox": [10.0, 10.0],
            "startup": 1, "active": 2, "recovery": 3, "knockback": [10.0, 0.0] }]"#;
        assert_eq!(lib.extend_from_json(json).unwrap(), 1);
        assert_eq!(lib.get("test_jab").unwrap().total_frames(), 6);
        assert!(lib.extend_from_json("not json").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn at_most_one_hit_per_instance_and_defender(
                defenders in prop::collection::vec((-60.0f32..60.0, -30.0f32..30.0), 1..6),
                attack_index in 0usize..4,
                facing_right in any::<bool>(),
            ) {
                let lib = AttackLibrary::default();
                let names = ["player_light_1", "player_light_2", "player_light_3", "player_heavy"];
                let attack = lib.get(names[attack_index]).unwrap();

                let mut resolver = CombatResolver::new();
                for (i, (x, y)) in defenders.iter().enumerate() {
                    resolver.register_defender(EntityId(10 + i as u32), Rect::new(*x, *y, 16.0, 24.0));
                }
                resolver.register_attacker(P, attack, player_box(), facing_right);

                let hits = run(&mut resolver, attack.total_frames() + 5);
                let mut seen = BTreeSet::new();
                for hit in &hits {
                    prop_assert!(seen.insert((hit.attack, hit.defender)), "duplicate hit {:?}", hit);
                    prop_assert_ne!(hit.defender, P);
                }
            }
        }
    }
}
