//! Player controller
//!
//! A state machine driving the playable character. Each frame runs in two
//! halves around physics: `control` turns input intent into velocity, state
//! changes and attack starts; `after_physics` takes the resolved body and
//! settles airborne/grounded transitions. Timers decay in `tick_timers` at
//! the end of the frame.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::combat::{AttackLibrary, AttackPhase, CombatResolver, DamageOutcome, apply_damage};
use super::effects::{EffectKind, EffectSet};
use super::entity::{Body, EntityId, Health};
use super::geom::Rect;
use super::physics::{MoveOptions, Resolved};
use crate::consts::RUN_THRESHOLD;
use crate::settings::PlayerTuning;
use crate::{approach, finite_or_zero, frames_to_secs};

/// Stick values below this count as no input
const STICK_DEAD_ZONE: f32 = 0.1;
/// Downward stick needed to drop through a platform
const DROP_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerState {
    #[default]
    Idle,
    Running,
    Jumping,
    Falling,
    Rolling,
    Attacking,
    Hurt,
    /// Terminal
    Dead,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Running => "running",
            PlayerState::Jumping => "jumping",
            PlayerState::Falling => "falling",
            PlayerState::Rolling => "rolling",
            PlayerState::Attacking => "attacking",
            PlayerState::Hurt => "hurt",
            PlayerState::Dead => "dead",
        }
    }
}

/// Input intent for one frame; buttons are edge-triggered ("just pressed")
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    /// -1 (left) to 1 (right)
    pub move_x: f32,
    /// -1 (up) to 1 (down)
    pub move_y: f32,
    pub jump: bool,
    pub attack_light: bool,
    pub attack_heavy: bool,
    pub roll: bool,
    pub parry: bool,
}

impl PlayerInput {
    /// Clamp stick axes to [-1, 1], NaN to 0
    pub fn sanitized(mut self) -> Self {
        self.move_x = finite_or_zero(self.move_x).clamp(-1.0, 1.0);
        self.move_y = finite_or_zero(self.move_y).clamp(-1.0, 1.0);
        self
    }
}

/// Unlockable abilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Skill {
    /// Roll / dash with invulnerability
    Dash,
    DoubleJump,
}

impl Skill {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "dash" | "roll" => Some(Skill::Dash),
            "double_jump" => Some(Skill::DoubleJump),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Skills {
    pub dash: bool,
    pub double_jump: bool,
}

impl Skills {
    pub fn has(&self, skill: Skill) -> bool {
        match skill {
            Skill::Dash => self.dash,
            Skill::DoubleJump => self.double_jump,
        }
    }
}

/// What the controller needs from the rest of the frame
pub struct PlayerContext<'a> {
    pub combat: &'a mut CombatResolver,
    pub attacks: &'a AttackLibrary,
    /// Standing on a one-way platform (drop-through possible)
    pub on_platform: bool,
}

/// Reported when a combo window runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboFinished {
    pub count: u32,
    pub meter_awarded: bool,
}

/// The playable character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: EntityId,
    pub body: Body,
    pub state: PlayerState,
    /// Seconds spent in the current state
    pub state_time: f32,
    pub health: Health,
    pub effects: EffectSet,
    pub skills: Skills,
    pub tuning: PlayerTuning,
    pub spawn: Vec2,

    // === Combo / meter ===
    pub combo_count: u32,
    /// Position in the light-attack chain (0 when not chaining)
    pub combo_stage: u32,
    pub combo_timer: f32,
    pub super_meter: u32,

    // === Timers ===
    coyote_timer: f32,
    jump_buffer: f32,
    double_jump_used: bool,
    roll_timer: f32,
    roll_direction: f32,
    hurt_timer: f32,
    parry_timer: f32,
    drop_through_timer: f32,
}

impl Player {
    pub fn new(spawn: Vec2, tuning: PlayerTuning) -> Self {
        Self {
            id: EntityId::PLAYER,
            body: Body::new(spawn, Vec2::new(tuning.width, tuning.height)),
            state: PlayerState::Idle,
            state_time: 0.0,
            health: Health::new(tuning.max_hp),
            effects: EffectSet::new(),
            skills: Skills::default(),
            tuning,
            spawn,
            combo_count: 0,
            combo_stage: 0,
            combo_timer: 0.0,
            super_meter: 0,
            coyote_timer: 0.0,
            jump_buffer: 0.0,
            double_jump_used: false,
            roll_timer: 0.0,
            roll_direction: 1.0,
            hurt_timer: 0.0,
            parry_timer: 0.0,
            drop_through_timer: 0.0,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.state == PlayerState::Dead
    }

    pub fn is_invulnerable(&self) -> bool {
        self.effects.has(EffectKind::Invulnerable)
    }

    pub fn parry_active(&self) -> bool {
        self.parry_timer > 0.0
    }

    /// Collision box doubles as hurtbox while alive
    pub fn hurtbox(&self) -> Option<Rect> {
        (!self.is_dead()).then_some(self.body.rect)
    }

    pub fn move_options(&self) -> MoveOptions {
        MoveOptions {
            gravity: true,
            ignore_platforms: self.drop_through_timer > 0.0,
        }
    }

    fn set_state(&mut self, state: PlayerState) {
        if self.state != state {
            log::trace!("Player {} -> {}", self.state.as_str(), state.as_str());
            self.state = state;
            self.state_time = 0.0;
        }
    }

    /// Idle or Running depending on horizontal speed, Falling when airborne
    fn settle_state(&mut self) {
        let next = if !self.body.on_ground {
            if self.body.velocity.y < 0.0 {
                PlayerState::Jumping
            } else {
                PlayerState::Falling
            }
        } else if self.body.velocity.x.abs() > RUN_THRESHOLD {
            PlayerState::Running
        } else {
            PlayerState::Idle
        };
        self.set_state(next);
    }

    // ========================================================================
    // Pre-physics
    // ========================================================================

    /// Apply one frame of input intent
    pub fn control(&mut self, input: &PlayerInput, dt: f32, ctx: &mut PlayerContext) {
        let input = input.sanitized();
        let dt = finite_or_zero(dt).max(0.0);

        if self.is_dead() {
            self.body.velocity.x = 0.0;
            return;
        }

        if self.state == PlayerState::Attacking && !ctx.combat.is_attacking(self.id) {
            self.combo_stage_reset_if_idle();
            self.settle_state();
        }

        match self.state {
            PlayerState::Dead => {}
            PlayerState::Hurt => {
                if self.hurt_timer > 0.0 {
                    self.apply_friction(dt);
                    return;
                }
                self.settle_state();
            }
            PlayerState::Rolling => {
                if self.roll_timer > 0.0 {
                    self.body.velocity.x = self.roll_direction * self.tuning.roll_speed;
                    return;
                }
                self.settle_state();
            }
            _ => {}
        }

        // Parry
        if input.parry {
            self.parry_timer = self.tuning.parry_window;
            log::debug!("Parry window open");
        }

        // Horizontal movement (attacks root the player on the ground)
        if self.state == PlayerState::Attacking && self.body.on_ground {
            self.apply_friction(dt);
        } else if input.move_x.abs() > STICK_DEAD_ZONE {
            self.body.face(input.move_x);
            self.accelerate(input.move_x * self.tuning.run_speed, dt);
        } else {
            self.apply_friction(dt);
        }

        // Drop through one-way platforms
        if input.move_y > DROP_THRESHOLD && self.body.on_ground && ctx.on_platform {
            self.drop_through_timer = self.tuning.drop_through_time;
            self.body.on_ground = false;
            self.coyote_timer = 0.0;
            if self.state != PlayerState::Attacking {
                self.set_state(PlayerState::Falling);
            }
            return;
        }

        // Jump (ground, coyote, buffered) or double jump
        if input.jump {
            self.jump_buffer = self.tuning.jump_buffer_time;
        }
        if self.jump_buffer > 0.0 && self.state != PlayerState::Attacking {
            if self.body.on_ground || self.coyote_timer > 0.0 {
                self.jump(self.tuning.jump_force);
                self.double_jump_used = false;
                return;
            }
            if input.jump && self.skills.double_jump && !self.double_jump_used {
                self.jump(self.tuning.double_jump_force);
                self.double_jump_used = true;
                return;
            }
        }

        // Roll
        if input.roll
            && self.skills.dash
            && matches!(self.state, PlayerState::Idle | PlayerState::Running | PlayerState::Falling)
        {
            self.start_roll(input.move_x);
            return;
        }

        // Attacks
        if input.attack_light {
            self.try_light_attack(ctx);
        } else if input.attack_heavy {
            self.try_heavy_attack(ctx);
        }
    }

    fn combo_stage_reset_if_idle(&mut self) {
        if self.combo_timer <= 0.0 {
            self.combo_stage = 0;
        }
    }

    fn accelerate(&mut self, target: f32, dt: f32) {
        let vx = self.body.velocity.x;
        self.body.velocity.x = if target.abs() > vx.abs() {
            approach(vx, target, self.tuning.acceleration * dt)
        } else {
            target
        };
    }

    fn apply_friction(&mut self, dt: f32) {
        self.body.velocity.x = approach(self.body.velocity.x, 0.0, self.tuning.friction * dt);
    }

    fn jump(&mut self, force: f32) {
        self.body.velocity.y = -force;
        self.body.on_ground = false;
        self.coyote_timer = 0.0;
        self.jump_buffer = 0.0;
        self.set_state(PlayerState::Jumping);
    }

    fn start_roll(&mut self, move_x: f32) {
        self.roll_direction = if move_x.abs() > STICK_DEAD_ZONE {
            move_x.signum()
        } else {
            self.body.facing_sign()
        };
        self.body.face(self.roll_direction);
        self.roll_timer = self.tuning.roll_duration;
        self.body.velocity.x = self.roll_direction * self.tuning.roll_speed;
        self.effects
            .apply(EffectKind::Invulnerable, self.tuning.roll_duration, Some(self.id));
        self.set_state(PlayerState::Rolling);
    }

    fn try_light_attack(&mut self, ctx: &mut PlayerContext) {
        let chaining = match ctx.combat.current_attack(self.id) {
            None => false,
            Some(current) => {
                let can_cancel = current.attack.cancelable
                    && current.phase() == AttackPhase::Recovery
                    && self.combo_stage < self.tuning.max_combo_stage;
                if !can_cancel {
                    return;
                }
                true
            }
        };

        let stage = if self.combo_timer > 0.0 && self.combo_stage < self.tuning.max_combo_stage {
            self.combo_stage + 1
        } else {
            1
        };
        let name = format!("player_light_{}", stage);
        let Some(attack) = ctx.attacks.get(&name) else {
            log::warn!("Attack {} missing from library", name);
            return;
        };

        if chaining {
            ctx.combat.cancel(self.id);
        }
        ctx.combat
            .register_attacker(self.id, attack, self.body.rect, self.body.facing_right);

        self.combo_stage = stage;
        self.combo_count = if self.combo_timer > 0.0 { self.combo_count.saturating_add(1) } else { 1 };
        self.combo_timer = self.tuning.combo_window;
        self.set_state(PlayerState::Attacking);
        log::debug!("Light attack {} (combo {})", stage, self.combo_count);
    }

    fn try_heavy_attack(&mut self, ctx: &mut PlayerContext) {
        if ctx.combat.is_attacking(self.id) || self.super_meter < self.tuning.heavy_meter_cost {
            return;
        }
        let Some(attack) = ctx.attacks.get("player_heavy") else {
            log::warn!("Attack player_heavy missing from library");
            return;
        };

        self.super_meter -= self.tuning.heavy_meter_cost;
        ctx.combat
            .register_attacker(self.id, attack, self.body.rect, self.body.facing_right);
        if attack.armor {
            self.effects
                .apply(EffectKind::SuperArmor, frames_to_secs(attack.total_frames()), Some(self.id));
        }

        self.combo_stage = 0;
        self.combo_count = self.combo_count.saturating_add(2);
        self.combo_timer = self.tuning.combo_window;
        self.set_state(PlayerState::Attacking);
        log::debug!("Heavy attack (meter {}, combo {})", self.super_meter, self.combo_count);
    }

    // ========================================================================
    // Post-physics
    // ========================================================================

    /// Take the resolved body and settle airborne/grounded states
    pub fn after_physics(&mut self, resolved: Resolved) {
        let was_on_ground = self.body.on_ground;
        self.body.rect = resolved.rect;
        self.body.velocity = resolved.velocity;
        self.body.on_ground = resolved.on_ground;

        if self.is_dead() {
            self.body.velocity.x = 0.0;
            return;
        }

        if was_on_ground && !resolved.on_ground && resolved.velocity.y >= 0.0 {
            // Walked off a ledge
            self.coyote_timer = self.tuning.coyote_time;
        }
        if resolved.on_ground {
            self.double_jump_used = false;
        }

        match self.state {
            PlayerState::Idle | PlayerState::Running => self.settle_state(),
            PlayerState::Jumping => {
                if self.body.velocity.y >= 0.0 {
                    if self.body.on_ground {
                        self.settle_state();
                    } else {
                        self.set_state(PlayerState::Falling);
                    }
                }
            }
            PlayerState::Falling => {
                if self.body.on_ground {
                    self.settle_state();
                }
            }
            PlayerState::Rolling | PlayerState::Attacking | PlayerState::Hurt | PlayerState::Dead => {}
        }
    }

    // ========================================================================
    // Damage and resources
    // ========================================================================

    /// Receive a hit
    ///
    /// Invulnerability blocks everything; an open parry window turns the hit
    /// into a parry (no damage, +1 meter). The caller interrupts the player's
    /// running attack when damage is applied.
    pub fn take_damage(&mut self, damage: i32, knockback: Vec2, source: Option<EntityId>) -> DamageOutcome {
        if self.is_dead() || self.is_invulnerable() {
            return DamageOutcome::Blocked;
        }

        if self.parry_active() {
            self.parry_timer = 0.0;
            self.add_super(1);
            log::info!("Parry! meter {}", self.super_meter);
            return DamageOutcome::Parried;
        }

        let outcome = apply_damage(&mut self.health, &self.effects, damage, knockback);
        if let DamageOutcome::Applied { damage, knockback } = outcome {
            self.body.velocity += knockback;
            self.combo_count = 0;
            self.combo_timer = 0.0;
            self.combo_stage = 0;
            self.roll_timer = 0.0;

            if self.health.is_dead() {
                self.die();
            } else {
                self.effects
                    .apply(EffectKind::Invulnerable, self.tuning.hurt_iframes, source);
                self.hurt_timer = self.tuning.hurt_stun;
                self.set_state(PlayerState::Hurt);
            }
            log::debug!("Player took {} damage ({} left)", damage, self.health.current());
        }
        outcome
    }

    /// Lengthen the current hurt stun (stun/knockdown hits)
    pub fn extend_stun(&mut self, seconds: f32) {
        if self.state == PlayerState::Hurt {
            self.hurt_timer = self.hurt_timer.max(finite_or_zero(seconds));
        }
    }

    fn die(&mut self) {
        self.body.velocity.x = 0.0;
        self.effects.clear();
        self.parry_timer = 0.0;
        self.set_state(PlayerState::Dead);
        log::info!("Player defeated");
    }

    /// Fell below the level: lose health and return to spawn
    pub fn fall_out(&mut self) {
        if self.is_dead() {
            return;
        }
        self.health.damage(self.tuning.fall_damage);
        if self.health.is_dead() {
            self.die();
            return;
        }
        self.body.place(self.spawn);
        self.effects
            .apply(EffectKind::Invulnerable, self.tuning.hurt_iframes, None);
        self.set_state(PlayerState::Falling);
        log::info!("Player fell out of the world ({} hp left)", self.health.current());
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        if self.is_dead() {
            return 0;
        }
        self.health.heal(amount)
    }

    /// Add meter up to the cap, returning the amount gained
    pub fn add_super(&mut self, amount: u32) -> u32 {
        let before = self.super_meter;
        self.super_meter = (self.super_meter + amount).min(self.tuning.super_meter_max);
        self.super_meter - before
    }

    /// Returns false for unknown skill names
    pub fn unlock_skill(&mut self, name: &str) -> bool {
        match Skill::from_name(name) {
            Some(Skill::Dash) => self.skills.dash = true,
            Some(Skill::DoubleJump) => self.skills.double_jump = true,
            None => {
                log::warn!("Unknown skill `{}`", name);
                return false;
            }
        }
        log::info!("Skill unlocked: {}", name);
        true
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Decay timers and effects; reports an expired combo
    pub fn tick_timers(&mut self, dt: f32) -> Option<ComboFinished> {
        let dt = finite_or_zero(dt).max(0.0);
        self.state_time += dt;
        self.coyote_timer = (self.coyote_timer - dt).max(0.0);
        self.jump_buffer = (self.jump_buffer - dt).max(0.0);
        self.roll_timer = (self.roll_timer - dt).max(0.0);
        self.hurt_timer = (self.hurt_timer - dt).max(0.0);
        self.parry_timer = (self.parry_timer - dt).max(0.0);
        self.drop_through_timer = (self.drop_through_timer - dt).max(0.0);
        self.effects.tick(dt);

        // Roll ends together with its invulnerability
        if self.state == PlayerState::Rolling && self.roll_timer <= 0.0 {
            self.settle_state();
        }

        if self.combo_timer > 0.0 {
            self.combo_timer = (self.combo_timer - dt).max(0.0);
            if self.combo_timer <= 0.0 && self.combo_count > 0 {
                return Some(self.finish_combo());
            }
        }
        None
    }

    fn finish_combo(&mut self) -> ComboFinished {
        let count = self.combo_count;
        let meter_awarded = count >= self.tuning.combo_bonus_threshold && self.add_super(1) > 0;
        if meter_awarded {
            log::info!("{}-hit combo! +1 super meter", count);
        }
        self.combo_count = 0;
        self.combo_stage = 0;
        ComboFinished { count, meter_awarded }
    }
}
