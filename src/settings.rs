//! Game balance and tuning
//!
//! Every gameplay constant the simulation reads lives here so that a level
//! designer can override it from a JSON file. Missing fields fall back to
//! the shipped defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Difficulty presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "normal" | "norm" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Multiplier on enemy max HP
    pub fn enemy_hp_scale(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.75,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.5,
        }
    }

    /// Multiplier on damage dealt by enemies
    pub fn enemy_damage_scale(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.5,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.25,
        }
    }
}

/// World physics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Downward acceleration (px/s²)
    pub gravity: f32,
    /// Terminal fall speed (px/s)
    pub max_fall_speed: f32,
    /// Cap on horizontal speed accepted by the resolver (px/s)
    pub max_horizontal_speed: f32,
    /// Largest distance a body moves between two collision passes (px)
    pub max_step: f32,
    /// Distance probed below a body to decide ground contact (px)
    pub ground_probe: f32,
    /// Raycast march increment (px)
    pub raycast_step: f32,
    /// Seconds before a destroyed destructible solid comes back
    pub destructible_respawn: f32,
    /// Bodies falling this far below the lowest solid are out of the world (px)
    pub kill_margin: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: 800.0,
            max_fall_speed: 400.0,
            max_horizontal_speed: 600.0,
            max_step: 4.0,
            ground_probe: 1.0,
            raycast_step: 2.0,
            destructible_respawn: 3.0,
            kill_margin: 100.0,
        }
    }
}

/// Player controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub max_hp: i32,
    pub width: f32,
    pub height: f32,

    // === Movement ===
    pub run_speed: f32,
    pub acceleration: f32,
    pub friction: f32,
    pub jump_force: f32,
    pub double_jump_force: f32,
    pub roll_speed: f32,
    pub roll_duration: f32,
    /// Seconds after walking off a ledge during which jump still works
    pub coyote_time: f32,
    /// Seconds a mid-air jump press is remembered for landing
    pub jump_buffer_time: f32,
    /// Seconds one-way platforms are ignored after a drop-through
    pub drop_through_time: f32,

    // === Damage ===
    pub hurt_iframes: f32,
    pub hurt_stun: f32,
    pub parry_window: f32,
    /// Damage taken when falling out of the world
    pub fall_damage: i32,

    // === Combo / meter ===
    pub combo_window: f32,
    /// Number of light attacks in one chain
    pub max_combo_stage: u32,
    /// Combo count needed at expiry to earn a meter point
    pub combo_bonus_threshold: u32,
    pub super_meter_max: u32,
    /// Meter spent by a heavy attack
    pub heavy_meter_cost: u32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_hp: 50,
            width: crate::consts::PLAYER_WIDTH,
            height: crate::consts::PLAYER_HEIGHT,

            run_speed: 120.0,
            acceleration: 800.0,
            friction: 600.0,
            jump_force: 300.0,
            double_jump_force: 280.0,
            roll_speed: 200.0,
            roll_duration: 0.3,
            coyote_time: 0.12,
            jump_buffer_time: 0.1,
            drop_through_time: 0.25,

            hurt_iframes: 0.6,
            hurt_stun: 0.3,
            parry_window: 0.15,
            fall_damage: 10,

            combo_window: 0.5,
            max_combo_stage: 3,
            combo_bonus_threshold: 10,
            super_meter_max: 3,
            heavy_meter_cost: 1,
        }
    }
}

/// Shared combat timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Seconds a stun hit disables the defender
    pub stun_duration: f32,
    /// Seconds a knockdown hit disables the defender
    pub knockdown_duration: f32,
    /// Extra upward speed added by launcher hits (px/s, negative is up)
    pub launcher_lift: f32,
    /// Seconds an enemy flinches from a plain hit
    pub enemy_flinch: f32,
    /// Seconds a dead enemy stays before it is removed
    pub death_duration: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            stun_duration: 1.0,
            knockdown_duration: 1.0,
            launcher_lift: -150.0,
            enemy_flinch: 0.3,
            death_duration: 0.5,
        }
    }
}

/// Stats and senses for one enemy archetype
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyProfile {
    pub max_hp: i32,
    pub speed: f32,
    pub width: f32,
    pub height: f32,
    pub detection_range: f32,
    pub attack_range: f32,
    /// Name of the attack in the attack library
    pub attack: String,
    /// Seconds between two attacks
    pub attack_cooldown: f32,
    /// Seconds of telegraph before the attack starts
    pub windup: f32,
    pub patrol_distance: f32,
    /// Health fraction under which the enemy flees
    pub flee_threshold: f32,
    /// Distance covered by a lunge attack (0 disables lunging)
    pub lunge_distance: f32,
    pub lunge_duration: f32,
    /// Ignores gravity and holds a hover height
    pub flies: bool,
    /// Require a clear line of sight for detection
    pub needs_line_of_sight: bool,
}

impl Default for EnemyProfile {
    fn default() -> Self {
        Self::melee()
    }
}

impl EnemyProfile {
    /// Slow brute with a telegraphed punch
    pub fn melee() -> Self {
        Self {
            max_hp: 30,
            speed: 40.0,
            width: 20.0,
            height: 24.0,
            detection_range: 80.0,
            attack_range: 24.0,
            attack: "maton_punch".to_string(),
            attack_cooldown: 2.0,
            windup: 1.0,
            patrol_distance: 64.0,
            flee_threshold: 0.2,
            lunge_distance: 0.0,
            lunge_duration: 0.0,
            flies: false,
            needs_line_of_sight: true,
        }
    }

    /// Knife thrower that keeps its distance
    pub fn ranged() -> Self {
        Self {
            max_hp: 20,
            speed: 60.0,
            width: 16.0,
            height: 16.0,
            detection_range: 80.0,
            attack_range: 100.0,
            attack: "chacal_knife".to_string(),
            attack_cooldown: 2.0,
            windup: 0.0,
            patrol_distance: 64.0,
            flee_threshold: 0.2,
            lunge_distance: 0.0,
            lunge_duration: 0.0,
            flies: false,
            needs_line_of_sight: true,
        }
    }

    /// Wrestler that lunges into a grab
    pub fn grappler() -> Self {
        Self {
            max_hp: 35,
            speed: 80.0,
            width: 18.0,
            height: 26.0,
            detection_range: 80.0,
            attack_range: 25.0,
            attack: "luchador_grab".to_string(),
            attack_cooldown: 3.0,
            windup: 0.0,
            patrol_distance: 64.0,
            flee_threshold: 0.2,
            lunge_distance: 64.0,
            lunge_duration: 0.5,
            flies: false,
            needs_line_of_sight: true,
        }
    }

    /// Security drone that hovers and fires a laser
    pub fn flying() -> Self {
        Self {
            max_hp: 15,
            speed: 50.0,
            width: 14.0,
            height: 10.0,
            detection_range: 60.0,
            attack_range: 80.0,
            attack: "drone_laser".to_string(),
            attack_cooldown: 1.5,
            windup: 0.0,
            patrol_distance: 128.0,
            flee_threshold: 0.0,
            lunge_distance: 0.0,
            lunge_duration: 0.0,
            flies: true,
            needs_line_of_sight: false,
        }
    }
}

/// Enemy profiles by archetype
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyRoster {
    pub melee: EnemyProfile,
    pub ranged: EnemyProfile,
    pub grappler: EnemyProfile,
    pub flying: EnemyProfile,
}

impl Default for EnemyRoster {
    fn default() -> Self {
        Self {
            melee: EnemyProfile::melee(),
            ranged: EnemyProfile::ranged(),
            grappler: EnemyProfile::grappler(),
            flying: EnemyProfile::flying(),
        }
    }
}

/// Complete tuning set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub difficulty: Difficulty,
    pub physics: PhysicsTuning,
    pub player: PlayerTuning,
    pub combat: CombatTuning,
    pub enemies: EnemyRoster,
}

impl Settings {
    /// Create settings for a difficulty preset
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        let mut settings = Self::default();
        settings.apply_difficulty(difficulty);
        settings
    }

    /// Apply a difficulty preset (rescales enemy health)
    pub fn apply_difficulty(&mut self, difficulty: Difficulty) {
        let previous = self.difficulty.enemy_hp_scale();
        self.difficulty = difficulty;
        let scale = difficulty.enemy_hp_scale() / previous;
        for profile in [
            &mut self.enemies.melee,
            &mut self.enemies.ranged,
            &mut self.enemies.grappler,
            &mut self.enemies.flying,
        ] {
            profile.max_hp = ((profile.max_hp as f32 * scale).round() as i32).max(1);
        }
    }

    /// Damage multiplier applied to enemy attacks
    pub fn enemy_damage_scale(&self) -> f32 {
        self.difficulty.enemy_damage_scale()
    }

    /// Parse settings from JSON, missing fields take defaults
    ///
    /// Enemy `max_hp` values in the file are Normal-difficulty baselines; the
    /// file's `difficulty` is applied on top of them.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = serde_json::from_str(json)?;
        let difficulty = settings.difficulty;
        settings.difficulty = Difficulty::Normal;
        settings.apply_difficulty(difficulty);
        log::info!("Loaded settings (difficulty: {})", difficulty.as_str());
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }
}
