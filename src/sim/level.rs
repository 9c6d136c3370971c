//! Level data contract
//!
//! Levels arrive as JSON produced by external tools. Parsing only checks the
//! shape of the file; `validate` then turns each descriptor into simulation
//! types, collecting a `LevelError` for every descriptor it has to skip.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::enemy::Archetype;
use super::geom::Rect;
use super::physics::{Hazard, SolidKind};
use crate::error::LevelError;
use crate::sanitize_vec;

/// Player spawn used when a level does not name one
pub const DEFAULT_PLAYER_SPAWN: [f32; 2] = [100.0, 100.0];
/// Size of a collectible pickup box
pub const COLLECTIBLE_SIZE: f32 = 16.0;
/// Health restored by one unit of a health pickup
pub const HEAL_PER_UNIT: i32 = 10;

fn default_solid_type() -> String {
    "solid".to_string()
}

fn default_enemy_type() -> String {
    "maton".to_string()
}

fn default_collectible_type() -> String {
    "coin".to_string()
}

fn default_player_spawn() -> [f32; 2] {
    DEFAULT_PLAYER_SPAWN
}

// ============================================================================
// Raw descriptors (as found in the file)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelMetadata {
    pub display_name: String,
    pub description: String,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolidDescriptor {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// solid | platform | destructible
    #[serde(rename = "type", default = "default_solid_type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardDescriptor {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// spikes | lava | anything else
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Overrides the per-type damage
    #[serde(default)]
    pub damage: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectibleDescriptor {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type", default = "default_collectible_type")]
    pub kind: String,
    #[serde(default)]
    pub value: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnProperties {
    /// Bring the enemy back after it dies
    pub respawn: bool,
    /// Seconds between death and respawn
    pub spawn_delay: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemySpawnDescriptor {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type", default = "default_enemy_type")]
    pub kind: String,
    #[serde(default)]
    pub properties: SpawnProperties,
}

/// Goals that complete the level; zero means "not required"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionRequirements {
    pub coins: u32,
    pub enemies_defeated: u32,
}

impl CompletionRequirements {
    pub fn is_met(&self, coins: u32, enemies_defeated: u32) -> bool {
        coins >= self.coins && enemies_defeated >= self.enemies_defeated
    }
}

/// A level file as parsed, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelData {
    pub name: String,
    pub metadata: LevelMetadata,
    pub player_spawn: [f32; 2],
    #[serde(alias = "solids")]
    pub platforms: Vec<SolidDescriptor>,
    pub hazards: Vec<HazardDescriptor>,
    pub collectibles: Vec<CollectibleDescriptor>,
    pub enemy_spawns: Vec<EnemySpawnDescriptor>,
    pub completion_requirements: CompletionRequirements,
}

impl Default for LevelData {
    fn default() -> Self {
        Self {
            name: String::new(),
            metadata: LevelMetadata::default(),
            player_spawn: default_player_spawn(),
            platforms: Vec::new(),
            hazards: Vec::new(),
            collectibles: Vec::new(),
            enemy_spawns: Vec::new(),
            completion_requirements: CompletionRequirements::default(),
        }
    }
}

// ============================================================================
// Validated level (what the world consumes)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectibleKind {
    Coin,
    /// Taco: restores health
    Health,
    /// Horchata: super meter
    Powerup,
}

impl CollectibleKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "coin" => Some(CollectibleKind::Coin),
            "health" | "taco" => Some(CollectibleKind::Health),
            "powerup" | "horchata" | "super" => Some(CollectibleKind::Powerup),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectibleKind::Coin => "coin",
            CollectibleKind::Health => "health",
            CollectibleKind::Powerup => "powerup",
        }
    }

    /// Value when the descriptor gives none
    pub fn default_value(&self) -> i32 {
        match self {
            CollectibleKind::Coin => 1,
            CollectibleKind::Health => HEAL_PER_UNIT,
            CollectibleKind::Powerup => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollectibleSpec {
    pub rect: Rect,
    pub kind: CollectibleKind,
    pub value: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub pos: Vec2,
    pub archetype: Archetype,
    pub respawn: bool,
    pub spawn_delay: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatedLevel {
    pub name: String,
    pub player_spawn: Vec2,
    pub solids: Vec<(Rect, SolidKind)>,
    pub hazards: Vec<Hazard>,
    pub collectibles: Vec<CollectibleSpec>,
    pub enemy_spawns: Vec<SpawnSpec>,
    pub requirements: CompletionRequirements,
}

fn hazard_damage(kind: &str) -> i32 {
    match kind.to_lowercase().as_str() {
        "spikes" => 2,
        "lava" => 3,
        _ => 1,
    }
}

fn check_rect(index: usize, x: f32, y: f32, width: f32, height: f32) -> Result<Rect, LevelError> {
    let rect = Rect::new(x, y, width, height);
    if ![x, y, width, height].iter().all(|v| v.is_finite()) {
        return Err(LevelError::MalformedRect {
            index,
            reason: "non-finite value",
        });
    }
    if !rect.is_well_formed() {
        return Err(LevelError::MalformedRect {
            index,
            reason: "width and height must be positive",
        });
    }
    Ok(rect)
}

impl LevelData {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a level file; the file stem names the level when the file does not
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let mut level = Self::from_json(&json)?;
        if level.name.is_empty() {
            level.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(level)
    }

    /// Convert descriptors, skipping (and reporting) the bad ones
    pub fn validate(&self) -> (ValidatedLevel, Vec<LevelError>) {
        let mut errors = Vec::new();
        let mut level = ValidatedLevel {
            name: self.name.clone(),
            player_spawn: sanitize_vec(Vec2::from(self.player_spawn)),
            requirements: self.completion_requirements,
            ..Default::default()
        };

        for (index, solid) in self.platforms.iter().enumerate() {
            let Some(kind) = SolidKind::from_name(&solid.kind) else {
                errors.push(LevelError::UnknownSolidKind {
                    index,
                    kind: solid.kind.clone(),
                });
                continue;
            };
            match check_rect(index, solid.x, solid.y, solid.width, solid.height) {
                Ok(rect) => level.solids.push((rect, kind)),
                Err(e) => errors.push(e),
            }
        }

        for (index, hazard) in self.hazards.iter().enumerate() {
            match check_rect(index, hazard.x, hazard.y, hazard.width, hazard.height) {
                Ok(rect) => level.hazards.push(Hazard {
                    rect,
                    damage: hazard.damage.unwrap_or_else(|| hazard_damage(&hazard.kind)).max(0),
                }),
                Err(e) => errors.push(e),
            }
        }

        for (index, item) in self.collectibles.iter().enumerate() {
            let Some(kind) = CollectibleKind::from_name(&item.kind) else {
                errors.push(LevelError::UnknownCollectible {
                    index,
                    kind: item.kind.clone(),
                });
                continue;
            };
            match check_rect(index, item.x, item.y, COLLECTIBLE_SIZE, COLLECTIBLE_SIZE) {
                Ok(rect) => level.collectibles.push(CollectibleSpec {
                    rect,
                    kind,
                    value: item.value.unwrap_or_else(|| kind.default_value()).max(0),
                }),
                Err(e) => errors.push(e),
            }
        }

        for (index, spawn) in self.enemy_spawns.iter().enumerate() {
            let Some(archetype) = Archetype::from_name(&spawn.kind) else {
                errors.push(LevelError::UnknownEnemyType {
                    index,
                    kind: spawn.kind.clone(),
                });
                continue;
            };
            if !(spawn.x.is_finite() && spawn.y.is_finite()) {
                errors.push(LevelError::MalformedSpawn { index });
                continue;
            }
            level.enemy_spawns.push(SpawnSpec {
                pos: Vec2::new(spawn.x, spawn.y),
                archetype,
                respawn: spawn.properties.respawn,
                spawn_delay: crate::finite_or_zero(spawn.properties.spawn_delay).max(0.0),
            });
        }

        (level, errors)
    }

    /// Small built-in level for the headless runner and tests
    pub fn demo() -> Self {
        let solid = |x: f32, y: f32, width: f32, height: f32, kind: &str| SolidDescriptor {
            x,
            y,
            width,
            height,
            kind: kind.to_string(),
        };
        let enemy = |x: f32, y: f32, kind: &str| EnemySpawnDescriptor {
            x,
            y,
            kind: kind.to_string(),
            properties: SpawnProperties::default(),
        };
        let coin = |x: f32, y: f32| CollectibleDescriptor {
            x,
            y,
            kind: "coin".to_string(),
            value: None,
        };

        Self {
            name: "demo".to_string(),
            metadata: LevelMetadata {
                display_name: "Culiacán Streets".to_string(),
                description: "Training grounds".to_string(),
                width: 1280.0,
                height: 360.0,
            },
            player_spawn: [64.0, 176.0],
            platforms: vec![
                solid(0.0, 200.0, 1280.0, 40.0, "solid"),
                solid(-16.0, 0.0, 16.0, 240.0, "solid"),
                solid(1280.0, 0.0, 16.0, 240.0, "solid"),
                solid(300.0, 140.0, 96.0, 8.0, "platform"),
                solid(640.0, 168.0, 32.0, 32.0, "destructible"),
            ],
            hazards: vec![HazardDescriptor {
                x: 900.0,
                y: 192.0,
                width: 48.0,
                height: 8.0,
                kind: "spikes".to_string(),
                damage: None,
            }],
            collectibles: vec![
                coin(200.0, 176.0),
                coin(340.0, 116.0),
                CollectibleDescriptor {
                    x: 500.0,
                    y: 176.0,
                    kind: "taco".to_string(),
                    value: None,
                },
            ],
            enemy_spawns: vec![enemy(420.0, 176.0, "maton"), enemy(760.0, 184.0, "chacal"), enemy(1000.0, 120.0, "drone")],
            completion_requirements: CompletionRequirements {
                coins: 2,
                enemies_defeated: 0,
            },
        }
    }
}
