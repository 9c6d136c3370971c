//! World orchestration
//!
//! Owns every subsystem for the active level and advances them in a fixed
//! order each step:
//!
//! 1. Player controller (input intent, attack starts)
//! 2. Enemy AI (reads previous-frame positions), then queued enemy attacks
//! 3. Physics for the player and every enemy, hazards, fall-out
//! 4. Combat (hitboxes follow their owners, hit detection)
//! 5. Damage application
//! 6. Pickups, timers, removals, respawns and level completion
//!
//! Entities are kept sorted by id so iteration order never depends on
//! insertion history.

use glam::Vec2;

use super::ai::{AiContext, AiState, Target};
use super::clock::FixedTimestep;
use super::combat::{AttackEffect, AttackLibrary, AttackOptions, CombatResolver, DamageOutcome, HitEvent};
use super::effects::EffectKind;
use super::enemy::{BrainTable, Enemy};
use super::entity::EntityId;
use super::events::GameEvent;
use super::geom::Rect;
use super::level::{
    CollectibleKind, CollectibleSpec, CompletionRequirements, DEFAULT_PLAYER_SPAWN, LevelData, SpawnSpec, ValidatedLevel,
};
use super::physics::{PhysicsWorld, SolidKind};
use super::player::{Player, PlayerContext, PlayerInput};
use crate::consts::SIM_DT;
use crate::error::LevelError;
use crate::frames_to_secs;
use crate::settings::Settings;

/// Upward shove applied by hazards (px/s)
const HAZARD_KNOCKBACK: Vec2 = Vec2::new(0.0, -150.0);

/// A pickup placed in the level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collectible {
    pub id: u32,
    pub spec: CollectibleSpec,
    pub collected: bool,
}

/// Where an enemy comes from, and whether it comes back
#[derive(Debug, Clone)]
struct SpawnPoint {
    spec: SpawnSpec,
    /// Enemy currently alive from this point
    enemy: Option<EntityId>,
    /// Seconds until respawn (only counts down with no live enemy)
    timer: f32,
    /// Set once a non-respawning point has produced its enemy
    exhausted: bool,
}

/// The whole running simulation
#[derive(Debug)]
pub struct World {
    pub settings: Settings,
    pub physics: PhysicsWorld,
    pub combat: CombatResolver,
    pub attacks: AttackLibrary,
    pub player: Player,
    /// Sorted by id
    pub enemies: Vec<Enemy>,
    pub collectibles: Vec<Collectible>,
    pub level_name: String,
    pub requirements: CompletionRequirements,
    pub coins: u32,
    pub enemies_defeated: u32,
    pub completed: bool,
    /// Fixed steps simulated so far
    pub frame: u64,
    brains: BrainTable,
    spawns: Vec<SpawnPoint>,
    clock: FixedTimestep,
    events: Vec<GameEvent>,
    seed: u64,
    loaded: bool,
    next_id: u32,
}

impl World {
    pub fn new(settings: Settings, seed: u64) -> Self {
        let player = Player::new(Vec2::from(DEFAULT_PLAYER_SPAWN), settings.player.clone());
        Self {
            physics: PhysicsWorld::new(settings.physics.clone()),
            combat: CombatResolver::new(),
            attacks: AttackLibrary::default(),
            player,
            enemies: Vec::new(),
            collectibles: Vec::new(),
            level_name: String::new(),
            requirements: CompletionRequirements::default(),
            coins: 0,
            enemies_defeated: 0,
            completed: false,
            frame: 0,
            brains: BrainTable::default(),
            spawns: Vec::new(),
            clock: FixedTimestep::default(),
            events: Vec::new(),
            seed,
            loaded: false,
            next_id: EntityId::PLAYER.0 + 1,
            settings,
        }
    }

    /// Allocate a new entity id (the player always owns id 1)
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Ensure entities are sorted by id for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.enemies.sort_by_key(|e| e.id());
        self.collectibles.sort_by_key(|c| c.id);
    }

    // ========================================================================
    // Level lifecycle
    // ========================================================================

    /// Replace the current level; bad descriptors are logged and skipped
    pub fn load_level(&mut self, data: &LevelData) -> Vec<LevelError> {
        let (level, errors) = data.validate();
        for error in &errors {
            log::warn!("Level {}: skipping descriptor: {}", data.name, error);
        }
        self.load_validated(level);
        errors
    }

    pub fn load_level_json(&mut self, json: &str) -> Result<Vec<LevelError>, LevelError> {
        let data = LevelData::from_json(json)?;
        Ok(self.load_level(&data))
    }

    fn load_validated(&mut self, level: ValidatedLevel) {
        self.unload();

        for (rect, kind) in &level.solids {
            self.physics.add_solid(*rect, *kind);
        }
        for hazard in &level.hazards {
            self.physics.add_hazard(hazard.rect, hazard.damage);
        }
        self.collectibles = level
            .collectibles
            .iter()
            .enumerate()
            .map(|(i, spec)| Collectible {
                id: i as u32,
                spec: *spec,
                collected: false,
            })
            .collect();

        let mut player = Player::new(level.player_spawn, self.settings.player.clone());
        player.skills = self.player.skills;
        self.player = player;

        self.spawns = level
            .enemy_spawns
            .iter()
            .map(|spec| SpawnPoint {
                spec: *spec,
                enemy: None,
                timer: 0.0,
                exhausted: false,
            })
            .collect();
        for index in 0..self.spawns.len() {
            self.spawn_enemy(index);
        }

        self.level_name = level.name;
        self.requirements = level.requirements;
        self.loaded = true;
        log::info!(
            "Level {} loaded: {} solids, {} hazards, {} pickups, {} enemies",
            self.level_name,
            level.solids.len(),
            level.hazards.len(),
            self.collectibles.len(),
            self.enemies.len()
        );
    }

    /// Drop all level state, registered attackers/defenders and AI instances
    pub fn unload(&mut self) {
        if self.loaded {
            log::info!("Level {} unloaded", self.level_name);
        }
        self.physics.clear();
        self.combat.clear();
        self.enemies.clear();
        self.collectibles.clear();
        self.spawns.clear();
        self.events.clear();
        self.clock.reset();
        self.coins = 0;
        self.enemies_defeated = 0;
        self.completed = false;
        self.loaded = false;
        self.frame = 0;
        self.next_id = EntityId::PLAYER.0 + 1;
    }

    fn spawn_enemy(&mut self, index: usize) {
        let Some(spec) = self.spawns.get(index).map(|s| s.spec) else {
            return;
        };
        let id = self.next_entity_id();
        let mut profile = spec.archetype.profile(&self.settings.enemies).clone();
        profile.max_hp = profile.max_hp.max(1);
        let enemy = Enemy::new(id, spec.archetype, profile, spec.pos, self.seed);
        self.enemies.push(enemy);
        self.normalize_order();

        let point = &mut self.spawns[index];
        point.enemy = Some(id);
        point.exhausted = !spec.respawn;
        self.events.push(GameEvent::EnemySpawned {
            id,
            archetype: spec.archetype,
        });
        log::info!("Spawned {} {} at ({:.0}, {:.0})", spec.archetype.as_str(), id, spec.pos.x, spec.pos.y);
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    /// Feed real elapsed time; runs zero or more fixed steps
    ///
    /// Edge-triggered input only applies to the first step of the batch.
    pub fn advance(&mut self, real_dt: f32, input: &PlayerInput) -> u32 {
        let steps = self.clock.advance(real_dt);
        for i in 0..steps {
            if i == 0 {
                self.step(input);
            } else {
                let held = PlayerInput {
                    move_x: input.move_x,
                    move_y: input.move_y,
                    ..Default::default()
                };
                self.step(&held);
            }
        }
        steps
    }

    /// Run exactly one fixed step
    pub fn step(&mut self, input: &PlayerInput) {
        let dt = SIM_DT;
        self.frame += 1;

        self.update_player(input, dt);
        self.update_enemy_ai(dt);
        self.update_physics(dt);
        let hits = self.update_combat(dt);
        self.apply_hits(hits);
        self.collect_pickups();
        self.tick_timers(dt);
        self.check_completion();
    }

    /// Take every event queued since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies
            .binary_search_by_key(&id, |e| e.id())
            .ok()
            .map(|i| &self.enemies[i])
    }

    fn enemy_index(&self, id: EntityId) -> Option<usize> {
        self.enemies.binary_search_by_key(&id, |e| e.id()).ok()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    // ------------------------------------------------------------------------

    fn update_player(&mut self, input: &PlayerInput, dt: f32) {
        let on_platform = self.physics.standing_on_platform(&self.player.body.rect);
        let mut ctx = PlayerContext {
            combat: &mut self.combat,
            attacks: &self.attacks,
            on_platform,
        };
        self.player.control(input, dt, &mut ctx);
    }

    fn update_enemy_ai(&mut self, dt: f32) {
        let target = self.player.hurtbox().map(|rect| Target {
            id: self.player.id,
            rect,
        });
        let ctx = AiContext {
            physics: &self.physics,
            target,
            dt,
        };
        let damage_scale = self.settings.enemy_damage_scale();

        for enemy in &mut self.enemies {
            let id = enemy.id();
            enemy.pawn.attacking = self.combat.is_attacking(id);

            if enemy.think(self.brains.get(enemy.pawn.archetype), &ctx).is_err() {
                // Fell back to idle: whatever it was swinging stops too
                self.combat.interrupt(id);
                continue;
            }

            let Some(request) = enemy.pawn.attack_request.take() else {
                continue;
            };
            let Some(attack) = self.attacks.get(&request.attack) else {
                log::warn!("Enemy {} requested unknown attack {}", id, request.attack);
                continue;
            };
            let options = AttackOptions {
                damage_scale,
                aim_at: request.aim_at,
            };
            self.combat
                .register_attacker_with(id, attack, enemy.pawn.body.rect, enemy.pawn.body.facing_right, options);
            if attack.armor {
                enemy
                    .pawn
                    .effects
                    .apply(EffectKind::SuperArmor, frames_to_secs(attack.total_frames()), Some(id));
            }
        }
    }

    fn update_physics(&mut self, dt: f32) {
        let physics = &self.physics;

        let resolved = physics.resolve_with(
            self.player.body.rect,
            self.player.body.velocity,
            dt,
            self.player.move_options(),
        );
        self.player.after_physics(resolved);

        for enemy in &mut self.enemies {
            let resolved = physics.resolve_with(enemy.pawn.body.rect, enemy.pawn.body.velocity, dt, enemy.move_options());
            enemy.after_physics(resolved);
        }

        // Fall-out
        if !self.player.is_dead() && physics.is_out_of_world(&self.player.body.rect) {
            self.combat.interrupt(self.player.id);
            self.player.fall_out();
            self.events.push(GameEvent::FellOut { id: self.player.id });
            if self.player.is_dead() {
                self.events.push(GameEvent::EntityDied { id: self.player.id });
            }
        }
        let combat_tuning = &self.settings.combat;
        let mut fallen = Vec::new();
        for enemy in self.enemies.iter_mut().filter(|e| !e.is_dead()) {
            if physics.is_out_of_world(&enemy.pawn.body.rect) {
                enemy.fall_out(combat_tuning);
                fallen.push(enemy.id());
            }
        }
        for id in fallen {
            self.combat.interrupt(id);
            self.on_enemy_defeated(id);
        }

        // Hazards only hurt the player; i-frames space out repeated contact
        if let Some(damage) = self.physics.hazard_damage(&self.player.body.rect) {
            let outcome = self.player.take_damage(damage, HAZARD_KNOCKBACK, None);
            if let DamageOutcome::Applied { damage, .. } = outcome {
                self.combat.interrupt(self.player.id);
                self.events.push(GameEvent::HazardDamage {
                    id: self.player.id,
                    damage,
                });
                if self.player.is_dead() {
                    self.events.push(GameEvent::EntityDied { id: self.player.id });
                }
            }
        }

        self.physics.update(dt);
    }

    fn update_combat(&mut self, dt: f32) -> Vec<HitEvent> {
        match self.player.hurtbox() {
            Some(rect) => self.combat.register_defender(self.player.id, rect),
            None => self.combat.unregister(self.player.id),
        }
        self.combat
            .update_owner(self.player.id, self.player.body.rect, self.player.body.facing_right);

        for enemy in &self.enemies {
            match enemy.hurtbox() {
                Some(rect) => self.combat.register_defender(enemy.id(), rect),
                None => self.combat.unregister(enemy.id()),
            }
            self.combat
                .update_owner(enemy.id(), enemy.pawn.body.rect, enemy.pawn.body.facing_right);
        }

        let physics = &self.physics;
        let hits = self.combat.update_with(dt, |rect| physics.overlaps_solid(rect));

        // Player strikes break destructible blocks
        let broken: Vec<u32> = self
            .combat
            .hitboxes()
            .iter()
            .filter(|h| h.owner == self.player.id)
            .flat_map(|h| {
                physics
                    .solids()
                    .iter()
                    .filter(move |s| s.kind == SolidKind::Destructible && s.active && s.rect.intersects(&h.rect))
                    .map(|s| s.id)
            })
            .collect();
        for id in broken {
            self.physics.destroy(id);
        }

        hits
    }

    fn apply_hits(&mut self, hits: Vec<HitEvent>) {
        let player_id = self.player.id;
        for hit in hits {
            if hit.defender == player_id {
                self.hit_player(hit);
            } else if hit.attacker == player_id {
                self.hit_enemy(hit);
            }
            // Enemies never hurt each other
        }
    }

    fn hit_player(&mut self, hit: HitEvent) {
        match self
            .player
            .take_damage(hit.damage, hit.knockback, Some(hit.attacker))
        {
            DamageOutcome::Applied { damage, knockback } => {
                self.combat.interrupt(self.player.id);
                match hit.effect {
                    AttackEffect::Stun => self.player.extend_stun(self.settings.combat.stun_duration),
                    AttackEffect::Knockdown => self.player.extend_stun(self.settings.combat.knockdown_duration),
                    AttackEffect::Launcher | AttackEffect::None => {}
                }
                self.events.push(GameEvent::Hit(HitEvent {
                    damage,
                    knockback,
                    ..hit
                }));
                if self.player.is_dead() {
                    self.events.push(GameEvent::EntityDied { id: self.player.id });
                }
            }
            DamageOutcome::Parried => {
                self.events.push(GameEvent::Parried {
                    attacker: hit.attacker,
                    defender: hit.defender,
                });
            }
            DamageOutcome::Blocked => {}
        }
    }

    fn hit_enemy(&mut self, hit: HitEvent) {
        let Some(index) = self.enemy_index(hit.defender) else {
            return;
        };
        let enemy = &mut self.enemies[index];
        let outcome = enemy.take_damage(hit.damage, hit.knockback, hit.effect, Some(hit.attacker), &self.settings.combat);
        let DamageOutcome::Applied { damage, knockback } = outcome else {
            return;
        };

        self.events.push(GameEvent::Hit(HitEvent {
            damage,
            knockback,
            ..hit
        }));
        if enemy.is_dead() {
            self.combat.interrupt(hit.defender);
            self.on_enemy_defeated(hit.defender);
        } else if enemy.ai.state() == AiState::Stunned {
            self.combat.interrupt(hit.defender);
        }
    }

    fn on_enemy_defeated(&mut self, id: EntityId) {
        self.enemies_defeated += 1;
        self.events.push(GameEvent::EntityDied { id });
    }

    fn collect_pickups(&mut self) {
        let Some(hurtbox) = self.player.hurtbox() else {
            return;
        };
        for item in self.collectibles.iter_mut().filter(|c| !c.collected) {
            if !item.spec.rect.intersects(&hurtbox) {
                continue;
            }
            item.collected = true;
            let value = item.spec.value;
            match item.spec.kind {
                CollectibleKind::Coin => self.coins += value.max(0) as u32,
                CollectibleKind::Health => {
                    self.player.heal(value);
                }
                CollectibleKind::Powerup => {
                    self.player.add_super(value.max(0) as u32);
                }
            }
            log::debug!("Collected {} ({})", item.spec.kind.as_str(), value);
            self.events.push(GameEvent::Collected {
                kind: item.spec.kind,
                value,
            });
        }
    }

    fn tick_timers(&mut self, dt: f32) {
        if let Some(combo) = self.player.tick_timers(dt) {
            self.events.push(GameEvent::ComboFinished {
                count: combo.count,
                meter_awarded: combo.meter_awarded,
            });
        }

        for enemy in &mut self.enemies {
            enemy.tick_timers(dt);
        }

        // Remove enemies whose death timer ran out
        let gone: Vec<EntityId> = self
            .enemies
            .iter()
            .filter(|e| e.is_gone())
            .map(|e| e.id())
            .collect();
        if !gone.is_empty() {
            self.enemies.retain(|e| !e.is_gone());
            for id in &gone {
                self.combat.unregister(*id);
            }
            for point in &mut self.spawns {
                if point.enemy.is_some_and(|id| gone.contains(&id)) {
                    point.enemy = None;
                    point.timer = point.spec.spawn_delay;
                }
            }
        }

        // Respawns
        let mut due = Vec::new();
        for (index, point) in self.spawns.iter_mut().enumerate() {
            if point.enemy.is_some() || point.exhausted {
                continue;
            }
            point.timer -= dt;
            if point.timer <= 0.0 {
                due.push(index);
            }
        }
        for index in due {
            self.spawn_enemy(index);
        }
    }

    fn check_completion(&mut self) {
        if !self.loaded || self.completed {
            return;
        }
        if self.requirements.is_met(self.coins, self.enemies_defeated) {
            self.completed = true;
            log::info!(
                "Level {} completed ({} coins, {} enemies)",
                self.level_name,
                self.coins,
                self.enemies_defeated
            );
            self.events.push(GameEvent::LevelCompleted {
                coins: self.coins,
                enemies_defeated: self.enemies_defeated,
            });
        }
    }
}

/// Hurtboxes of every live entity, player first (debug drawing and tests)
pub fn live_hurtboxes(world: &World) -> Vec<(EntityId, Rect)> {
    world
        .player
        .hurtbox()
        .map(|r| (world.player.id, r))
        .into_iter()
        .chain(world.enemies.iter().filter_map(|e| e.hurtbox().map(|r| (e.id(), r))))
        .collect()
}
