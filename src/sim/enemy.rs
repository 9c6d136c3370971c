//! Enemy archetypes
//!
//! Each enemy is a `Pawn` (body, stats, combat state) driven by its own
//! `AiMachine`. Archetypes only differ in their profile numbers and in the
//! behavior functions and extra transitions registered in their `Brain`.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ai::{AiAgent, AiContext, AiMachine, AiState, BlackboardValue, Brain};
use super::combat::{AttackEffect, DamageOutcome, apply_damage};
use super::effects::{EffectKind, EffectSet};
use super::entity::{Body, EntityId, Health};
use super::geom::Rect;
use super::physics::{MoveOptions, Resolved};
use crate::approach;
use crate::error::AiError;
use crate::settings::{CombatTuning, EnemyProfile, EnemyRoster};

/// Range multiplier after which a chased player counts as lost
const LOSE_RANGE_FACTOR: f32 = 1.5;
const PATROL_SPEED_FACTOR: f32 = 0.5;
const FLEE_SPEED_FACTOR: f32 = 1.2;
/// Seconds of fleeing before calming down
const FLEE_DURATION: f32 = 3.0;
/// Flying units correct toward their hover height at this rate (1/s)
const HOVER_GAIN: f32 = 2.0;
/// Horizontal deceleration while stunned (px/s²)
const STUN_FRICTION: f32 = 400.0;

// Blackboard keys
const KEY_PATROL_ANCHOR: &str = "patrol_anchor";
const KEY_LAST_SEEN: &str = "last_seen";
const KEY_TARGET: &str = "target";
const KEY_IDLE_FOR: &str = "idle_for";
const KEY_PATROL_FOR: &str = "patrol_for";
const KEY_WINDUP: &str = "windup";
const KEY_LAUNCHED: &str = "attack_launched";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    /// Slow brute with a telegraphed punch
    Melee,
    /// Knife thrower
    Ranged,
    /// Lunging wrestler
    Grappler,
    /// Hovering drone
    Flying,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [Archetype::Melee, Archetype::Ranged, Archetype::Grappler, Archetype::Flying];

    /// Accepts both role names and character names from level files
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "melee" | "maton" => Some(Archetype::Melee),
            "ranged" | "chacal" => Some(Archetype::Ranged),
            "grappler" | "luchador" => Some(Archetype::Grappler),
            "flying" | "drone" => Some(Archetype::Flying),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Melee => "melee",
            Archetype::Ranged => "ranged",
            Archetype::Grappler => "grappler",
            Archetype::Flying => "flying",
        }
    }

    pub fn profile<'a>(&self, roster: &'a EnemyRoster) -> &'a EnemyProfile {
        match self {
            Archetype::Melee => &roster.melee,
            Archetype::Ranged => &roster.ranged,
            Archetype::Grappler => &roster.grappler,
            Archetype::Flying => &roster.flying,
        }
    }
}

/// An attack the AI wants started this frame
#[derive(Debug, Clone, PartialEq)]
pub struct AttackRequest {
    pub attack: String,
    pub aim_at: Option<Vec2>,
}

/// Body, stats and combat state of one enemy
#[derive(Debug, Clone)]
pub struct Pawn {
    pub id: EntityId,
    pub archetype: Archetype,
    pub profile: EnemyProfile,
    pub body: Body,
    pub health: Health,
    pub effects: EffectSet,
    /// Spawn point; patrols center on it
    pub home: Vec2,
    /// Target top edge for flying units
    pub hover_y: f32,
    /// Seconds until the next attack may start
    pub cooldown: f32,
    /// Mirrors the combat resolver (set by the world before AI runs)
    pub attacking: bool,
    pub attack_request: Option<AttackRequest>,
    /// Seconds of lunge movement left
    pub lunge_timer: f32,
}

impl AiAgent for Pawn {
    fn halt(&mut self) {
        self.body.velocity.x = 0.0;
        if self.profile.flies {
            self.body.velocity.y = 0.0;
        }
        self.lunge_timer = 0.0;
        self.attack_request = None;
    }
}

impl Pawn {
    fn distance_to(&self, point: Vec2) -> f32 {
        self.body.center().distance(point)
    }

    /// Chase speed toward `x`, facing it
    fn walk_toward(&mut self, x: f32, speed: f32) {
        let dx = x - self.body.center().x;
        if dx.abs() < 1.0 {
            self.body.velocity.x = 0.0;
            return;
        }
        self.body.face(dx);
        self.body.velocity.x = dx.signum() * speed;
    }

    fn hover(&mut self) {
        if self.profile.flies {
            self.body.velocity.y = (self.hover_y - self.body.rect.y) * HOVER_GAIN;
        }
    }

    fn request_attack(&mut self, aim_at: Option<Vec2>) {
        self.attack_request = Some(AttackRequest {
            attack: self.profile.attack.clone(),
            aim_at,
        });
        self.cooldown = self.profile.attack_cooldown;
    }
}

/// A live enemy: pawn plus its private state machine
#[derive(Debug, Clone)]
pub struct Enemy {
    pub pawn: Pawn,
    pub ai: AiMachine,
    /// Seconds until a dead enemy is removed
    pub death_timer: Option<f32>,
}

impl Enemy {
    pub fn new(id: EntityId, archetype: Archetype, profile: EnemyProfile, pos: Vec2, seed: u64) -> Self {
        let size = Vec2::new(profile.width, profile.height);
        let mut ai = AiMachine::new(seed ^ (id.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        ai.blackboard
            .set(KEY_PATROL_ANCHOR, BlackboardValue::Vec2(pos + size / 2.0));
        Self {
            pawn: Pawn {
                id,
                archetype,
                health: Health::new(profile.max_hp),
                body: Body::new(pos, size),
                effects: EffectSet::new(),
                home: pos,
                hover_y: pos.y,
                cooldown: 0.0,
                attacking: false,
                attack_request: None,
                lunge_timer: 0.0,
                profile,
            },
            ai,
            death_timer: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.pawn.id
    }

    pub fn is_dead(&self) -> bool {
        self.pawn.health.is_dead()
    }

    /// Ready to be removed from the world
    pub fn is_gone(&self) -> bool {
        matches!(self.death_timer, Some(t) if t <= 0.0)
    }

    pub fn hurtbox(&self) -> Option<Rect> {
        (!self.is_dead()).then_some(self.pawn.body.rect)
    }

    pub fn move_options(&self) -> MoveOptions {
        MoveOptions {
            gravity: !self.pawn.profile.flies,
            ignore_platforms: false,
        }
    }

    /// Run the state machine for one frame (no-op while dead)
    pub fn think(&mut self, brain: &Brain<Pawn>, ctx: &AiContext) -> Result<(), AiError> {
        if self.is_dead() {
            return Ok(());
        }
        self.ai.update(brain, &mut self.pawn, ctx)
    }

    pub fn after_physics(&mut self, resolved: Resolved) {
        let dead = self.is_dead();
        let body = &mut self.pawn.body;
        body.rect = resolved.rect;
        body.velocity = resolved.velocity;
        body.on_ground = resolved.on_ground;
        if dead {
            body.velocity.x = 0.0;
        }
        if resolved.hit_wall {
            self.pawn.lunge_timer = 0.0;
        }
    }

    /// Receive a hit; stuns the enemy unless it has super armor
    ///
    /// The caller interrupts the enemy's running attack when this returns an
    /// applied outcome and the enemy ended up dead or stunned.
    pub fn take_damage(
        &mut self,
        damage: i32,
        knockback: Vec2,
        effect: AttackEffect,
        source: Option<EntityId>,
        tuning: &CombatTuning,
    ) -> DamageOutcome {
        let armored = self.pawn.effects.has(EffectKind::SuperArmor);
        let outcome = apply_damage(&mut self.pawn.health, &self.pawn.effects, damage, knockback);
        let DamageOutcome::Applied { knockback, .. } = outcome else {
            return outcome;
        };

        self.pawn.body.velocity += knockback;
        if self.pawn.health.is_dead() {
            self.die(tuning);
            return outcome;
        }

        if !armored {
            let stun = match effect {
                AttackEffect::Stun => tuning.stun_duration,
                AttackEffect::Knockdown => tuning.knockdown_duration,
                AttackEffect::Launcher => {
                    self.pawn.body.velocity.y += tuning.launcher_lift;
                    self.pawn.body.on_ground = false;
                    tuning.enemy_flinch
                }
                AttackEffect::None => tuning.enemy_flinch,
            };
            self.pawn.effects.apply(EffectKind::Stun, stun, source);
            self.pawn.attack_request = None;
            self.pawn.lunge_timer = 0.0;
            self.ai.force_state(AiState::Stunned);
        }
        outcome
    }

    /// Fell below the level: dies outright
    pub fn fall_out(&mut self, tuning: &CombatTuning) {
        if self.is_dead() {
            return;
        }
        let remaining = self.pawn.health.current();
        self.pawn.health.damage(remaining);
        self.die(tuning);
    }

    fn die(&mut self, tuning: &CombatTuning) {
        self.pawn.body.velocity.x = 0.0;
        self.pawn.effects.clear();
        self.pawn.attack_request = None;
        self.pawn.lunge_timer = 0.0;
        self.death_timer = Some(tuning.death_duration);
        log::info!("Enemy {} ({}) defeated", self.pawn.id, self.pawn.archetype.as_str());
    }

    /// Cooldowns, lunge, effects and death timer
    pub fn tick_timers(&mut self, dt: f32) {
        let pawn = &mut self.pawn;
        pawn.cooldown = (pawn.cooldown - dt).max(0.0);
        pawn.lunge_timer = (pawn.lunge_timer - dt).max(0.0);
        pawn.effects.tick(dt);
        if let Some(timer) = &mut self.death_timer {
            *timer -= dt;
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

fn player_visible(pawn: &Pawn, ctx: &AiContext, _: &AiMachine) -> Result<bool, AiError> {
    let Some(target) = ctx.target else {
        return Ok(false);
    };
    if pawn.distance_to(target.center()) > pawn.profile.detection_range {
        return Ok(false);
    }
    Ok(!pawn.profile.needs_line_of_sight || ctx.physics.line_of_sight(pawn.body.center(), target.center()))
}

fn player_in_attack_range(pawn: &Pawn, ctx: &AiContext, _: &AiMachine) -> Result<bool, AiError> {
    Ok(ctx
        .target
        .is_some_and(|t| pawn.distance_to(t.center()) <= pawn.profile.attack_range))
}

/// In range and not hidden behind a wall
fn can_attack(pawn: &Pawn, ctx: &AiContext, m: &AiMachine) -> Result<bool, AiError> {
    let Some(target) = ctx.target else {
        return Ok(false);
    };
    if !player_in_attack_range(pawn, ctx, m)? {
        return Ok(false);
    }
    Ok(!pawn.profile.needs_line_of_sight || ctx.physics.line_of_sight(pawn.body.center(), target.center()))
}

fn player_lost(pawn: &Pawn, ctx: &AiContext, _: &AiMachine) -> Result<bool, AiError> {
    Ok(match ctx.target {
        None => true,
        Some(t) => pawn.distance_to(t.center()) > pawn.profile.detection_range * LOSE_RANGE_FACTOR,
    })
}

/// Player died or left the level
fn target_gone(_: &Pawn, ctx: &AiContext, _: &AiMachine) -> Result<bool, AiError> {
    Ok(ctx.target.is_none())
}

fn attack_finished(pawn: &Pawn, _: &AiContext, m: &AiMachine) -> Result<bool, AiError> {
    Ok(m.blackboard.flag_or_false(KEY_LAUNCHED)?
        && !pawn.attacking
        && pawn.attack_request.is_none()
        && pawn.lunge_timer <= 0.0
        && !m.blackboard.contains(KEY_WINDUP))
}

fn finished_and_chasing(pawn: &Pawn, ctx: &AiContext, m: &AiMachine) -> Result<bool, AiError> {
    Ok(attack_finished(pawn, ctx, m)? && player_visible(pawn, ctx, m)? && !can_attack(pawn, ctx, m)?)
}

fn finished_and_lost_sight(pawn: &Pawn, ctx: &AiContext, m: &AiMachine) -> Result<bool, AiError> {
    Ok(attack_finished(pawn, ctx, m)? && !player_visible(pawn, ctx, m)?)
}

fn health_low(pawn: &Pawn, ctx: &AiContext, _: &AiMachine) -> Result<bool, AiError> {
    let threshold = pawn.profile.flee_threshold;
    // Nothing to flee from
    Ok(ctx.target.is_some() && threshold > 0.0 && !pawn.health.is_dead() && pawn.health.fraction() < threshold)
}

fn stun_expired(pawn: &Pawn, _: &AiContext, _: &AiMachine) -> Result<bool, AiError> {
    Ok(!pawn.effects.has(EffectKind::Stun))
}

fn flee_over(pawn: &Pawn, ctx: &AiContext, m: &AiMachine) -> Result<bool, AiError> {
    Ok(m.time_in_state() >= FLEE_DURATION || player_lost(pawn, ctx, m)?)
}

/// Compare time in state to a duration stored by the state's behavior
fn timer_expired(m: &AiMachine, key: &'static str) -> Result<bool, AiError> {
    match m.blackboard.float(key) {
        Ok(limit) => Ok(m.time_in_state() >= limit),
        // Behavior has not run yet in this state
        Err(AiError::MissingKey(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

fn idle_expired(_: &Pawn, _: &AiContext, m: &AiMachine) -> Result<bool, AiError> {
    timer_expired(m, KEY_IDLE_FOR)
}

fn patrol_expired(_: &Pawn, _: &AiContext, m: &AiMachine) -> Result<bool, AiError> {
    timer_expired(m, KEY_PATROL_FOR)
}

// ============================================================================
// Behaviors
// ============================================================================

fn idle_behavior(pawn: &mut Pawn, ctx: &AiContext, m: &mut AiMachine) -> Result<(), AiError> {
    pawn.body.velocity.x = 0.0;
    pawn.hover();
    if !m.blackboard.contains(KEY_IDLE_FOR) {
        let duration = m.rng.random_range(1.5..3.0);
        m.blackboard
            .set_transient(KEY_IDLE_FOR, BlackboardValue::Float(duration));
    }
    // Glance around now and then
    if m.time_in_state() > 2.0 && m.rng.random_bool((0.5 * ctx.dt).clamp(0.0, 1.0) as f64) {
        pawn.body.facing_right = !pawn.body.facing_right;
    }
    Ok(())
}

fn patrol_behavior(pawn: &mut Pawn, ctx: &AiContext, m: &mut AiMachine) -> Result<(), AiError> {
    if !m.blackboard.contains(KEY_PATROL_FOR) {
        let duration = m.rng.random_range(4.0..8.0);
        m.blackboard
            .set_transient(KEY_PATROL_FOR, BlackboardValue::Float(duration));
    }
    let anchor = m.blackboard.vec2(KEY_PATROL_ANCHOR)?;
    let speed = pawn.profile.speed * PATROL_SPEED_FACTOR;
    let x = pawn.body.center().x;

    if (x - anchor.x).abs() >= pawn.profile.patrol_distance {
        // Head back toward the anchor
        pawn.body.face(anchor.x - x);
    } else if !pawn.profile.flies && blocked_ahead(pawn, ctx) {
        pawn.body.facing_right = !pawn.body.facing_right;
    }
    pawn.body.velocity.x = pawn.body.facing_sign() * speed;
    Ok(())
}

/// Wall in front or no floor under the next step
fn blocked_ahead(pawn: &Pawn, ctx: &AiContext) -> bool {
    let rect = pawn.body.rect;
    let sign = pawn.body.facing_sign();
    let front_x = if sign > 0.0 { rect.right() + 2.0 } else { rect.left() - 2.0 };
    let wall = !ctx
        .physics
        .line_of_sight(rect.center(), Vec2::new(front_x, rect.center().y));
    let foot = Vec2::new(front_x, rect.bottom() + 1.0);
    let ledge = pawn.body.on_ground
        && ctx
            .physics
            .ground_below(front_x, rect.bottom() - 1.0, 8.0)
            .is_none()
        && !ctx.physics.platforms().iter().any(|p| p.contains_point(foot));
    wall || ledge
}

fn flying_patrol_behavior(pawn: &mut Pawn, ctx: &AiContext, m: &mut AiMachine) -> Result<(), AiError> {
    patrol_behavior(pawn, ctx, m)?;
    pawn.hover();
    Ok(())
}

fn chase_behavior(pawn: &mut Pawn, ctx: &AiContext, m: &mut AiMachine) -> Result<(), AiError> {
    let target = ctx.require_target()?;
    pawn.walk_toward(target.center().x, pawn.profile.speed);
    pawn.hover();
    m.blackboard
        .set(KEY_LAST_SEEN, BlackboardValue::Vec2(target.center()));
    m.blackboard.set(KEY_TARGET, BlackboardValue::Entity(target.id));
    Ok(())
}

fn flee_behavior(pawn: &mut Pawn, ctx: &AiContext, _: &mut AiMachine) -> Result<(), AiError> {
    let target = ctx.require_target()?;
    let away = pawn.body.center().x - target.center().x;
    let direction = if away >= 0.0 { 1.0 } else { -1.0 };
    pawn.body.face(direction);
    pawn.body.velocity.x = direction * pawn.profile.speed * FLEE_SPEED_FACTOR;
    pawn.hover();
    Ok(())
}

fn stunned_behavior(pawn: &mut Pawn, ctx: &AiContext, _: &mut AiMachine) -> Result<(), AiError> {
    // Let knockback slide out
    pawn.body.velocity.x = approach(pawn.body.velocity.x, 0.0, STUN_FRICTION * ctx.dt);
    pawn.hover();
    Ok(())
}

/// Stand still, face the player and swing when off cooldown (with optional windup)
fn melee_attack_behavior(pawn: &mut Pawn, ctx: &AiContext, m: &mut AiMachine) -> Result<(), AiError> {
    let target = ctx.require_target()?;
    pawn.body.velocity.x = 0.0;
    pawn.body.face(target.center().x - pawn.body.center().x);

    if pawn.attacking || pawn.cooldown > 0.0 {
        return Ok(());
    }

    if pawn.profile.windup > 0.0 {
        let remaining = match m.blackboard.float(KEY_WINDUP) {
            Ok(left) => left - ctx.dt,
            Err(AiError::MissingKey(_)) => {
                log::debug!("Enemy {} winds up", pawn.id);
                pawn.profile.windup
            }
            Err(e) => return Err(e),
        };
        if remaining > 0.0 {
            m.blackboard
                .set_transient(KEY_WINDUP, BlackboardValue::Float(remaining));
            return Ok(());
        }
        m.blackboard.remove(KEY_WINDUP);
    }

    pawn.request_attack(None);
    m.blackboard
        .set_transient(KEY_LAUNCHED, BlackboardValue::Bool(true));
    Ok(())
}

/// Throw at the player from range
fn ranged_attack_behavior(pawn: &mut Pawn, ctx: &AiContext, m: &mut AiMachine) -> Result<(), AiError> {
    let target = ctx.require_target()?;
    pawn.body.velocity.x = 0.0;
    pawn.hover();
    pawn.body.face(target.center().x - pawn.body.center().x);

    if !pawn.attacking && pawn.cooldown <= 0.0 {
        pawn.request_attack(Some(target.center()));
        m.blackboard
            .set_transient(KEY_LAUNCHED, BlackboardValue::Bool(true));
    }
    Ok(())
}

/// Dash at the player and grab on the way
fn lunge_attack_behavior(pawn: &mut Pawn, ctx: &AiContext, m: &mut AiMachine) -> Result<(), AiError> {
    let target = ctx.require_target()?;

    if pawn.lunge_timer > 0.0 {
        let duration = pawn.profile.lunge_duration.max(f32::EPSILON);
        pawn.body.velocity.x = pawn.body.facing_sign() * pawn.profile.lunge_distance / duration;
        return Ok(());
    }

    pawn.body.velocity.x = 0.0;
    pawn.body.face(target.center().x - pawn.body.center().x);
    if pawn.attacking || pawn.cooldown > 0.0 {
        return Ok(());
    }

    if pawn.profile.lunge_distance > 0.0 && pawn.profile.lunge_duration > 0.0 {
        pawn.lunge_timer = pawn.profile.lunge_duration;
        pawn.body.velocity.x = pawn.body.facing_sign() * pawn.profile.lunge_distance / pawn.profile.lunge_duration;
    }
    pawn.request_attack(None);
    m.blackboard
        .set_transient(KEY_LAUNCHED, BlackboardValue::Bool(true));
    Ok(())
}

// ============================================================================
// Brains
// ============================================================================

/// Transitions shared by every archetype
fn base_brain(name: &'static str) -> Brain<Pawn> {
    use AiState::*;

    let mut brain = Brain::new(name);
    brain
        .add_transition(Stunned, Idle, 9, "stun_expired", stun_expired)
        .add_transition(Chase, Attack, 8, "in_attack_range", can_attack)
        .add_transition(Attack, Patrol, 8, "target_gone", target_gone)
        .add_transition(Chase, Flee, 7, "health_low", health_low)
        .add_transition(Attack, Flee, 7, "health_low", health_low)
        .add_transition(Attack, Chase, 6, "attack_finished", finished_and_chasing)
        .add_transition(Idle, Chase, 5, "player_visible", player_visible)
        .add_transition(Patrol, Chase, 5, "player_visible", player_visible)
        .add_transition(Attack, Patrol, 4, "attack_finished_lost", finished_and_lost_sight)
        .add_transition(Chase, Patrol, 3, "player_lost", player_lost)
        .add_transition(Flee, Idle, 3, "flee_over", flee_over)
        .add_transition(Idle, Patrol, 1, "idle_expired", idle_expired)
        .add_transition(Patrol, Idle, 1, "patrol_expired", patrol_expired);

    brain
        .set_behavior(Idle, idle_behavior)
        .set_behavior(Patrol, patrol_behavior)
        .set_behavior(Chase, chase_behavior)
        .set_behavior(Attack, melee_attack_behavior)
        .set_behavior(Flee, flee_behavior)
        .set_behavior(Stunned, stunned_behavior);
    brain
}

/// Build the state machine table for an archetype
pub fn brain_for(archetype: Archetype) -> Brain<Pawn> {
    use AiState::*;

    let mut brain = base_brain(archetype.as_str());
    match archetype {
        Archetype::Melee => {}
        Archetype::Ranged => {
            // Attacks from wherever it stands once the player is in throwing range
            brain
                .add_transition(Idle, Attack, 8, "in_attack_range", can_attack)
                .add_transition(Patrol, Attack, 8, "in_attack_range", can_attack)
                .set_behavior(Attack, ranged_attack_behavior);
        }
        Archetype::Grappler => {
            brain.set_behavior(Attack, lunge_attack_behavior);
        }
        Archetype::Flying => {
            brain
                .add_transition(Idle, Attack, 8, "in_attack_range", can_attack)
                .add_transition(Patrol, Attack, 8, "in_attack_range", can_attack)
                .set_behavior(Patrol, flying_patrol_behavior)
                .set_behavior(Attack, ranged_attack_behavior);
        }
    }
    brain
}

/// One brain per archetype, built once and shared by all enemies
#[derive(Debug)]
pub struct BrainTable {
    melee: Brain<Pawn>,
    ranged: Brain<Pawn>,
    grappler: Brain<Pawn>,
    flying: Brain<Pawn>,
}

impl Default for BrainTable {
    fn default() -> Self {
        Self {
            melee: brain_for(Archetype::Melee),
            ranged: brain_for(Archetype::Ranged),
            grappler: brain_for(Archetype::Grappler),
            flying: brain_for(Archetype::Flying),
        }
    }
}

impl BrainTable {
    pub fn get(&self, archetype: Archetype) -> &Brain<Pawn> {
        match archetype {
            Archetype::Melee => &self.melee,
            Archetype::Ranged => &self.ranged,
            Archetype::Grappler => &self.grappler,
            Archetype::Flying => &self.flying,
        }
    }
}
