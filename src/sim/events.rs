//! Outbound simulation events
//!
//! The world queues these every frame; HUD and save collaborators drain them
//! instead of registering callbacks.

use serde::{Deserialize, Serialize};

use super::combat::HitEvent;
use super::enemy::Archetype;
use super::entity::EntityId;
use super::level::CollectibleKind;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Damage landed on a defender
    Hit(HitEvent),
    /// The player parried an attack
    Parried { attacker: EntityId, defender: EntityId },
    /// A hazard hurt an entity
    HazardDamage { id: EntityId, damage: i32 },
    /// The player fell out of the world
    FellOut { id: EntityId },
    EntityDied { id: EntityId },
    EnemySpawned { id: EntityId, archetype: Archetype },
    Collected { kind: CollectibleKind, value: i32 },
    ComboFinished { count: u32, meter_awarded: bool },
    /// Emitted once per level
    LevelCompleted { coins: u32, enemies_defeated: u32 },
}

impl GameEvent {
    /// Short tag for logs
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Hit(_) => "hit",
            GameEvent::Parried { .. } => "parried",
            GameEvent::HazardDamage { .. } => "hazard_damage",
            GameEvent::FellOut { .. } => "fell_out",
            GameEvent::EntityDied { .. } => "entity_died",
            GameEvent::EnemySpawned { .. } => "enemy_spawned",
            GameEvent::Collected { .. } => "collected",
            GameEvent::ComboFinished { .. } => "combo_finished",
            GameEvent::LevelCompleted { .. } => "level_completed",
        }
    }
}
