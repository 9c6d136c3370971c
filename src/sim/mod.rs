//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (one `Pcg32` per enemy)
//! - Stable iteration order (by entity ID)
//! - No rendering, audio or save-file dependencies

pub mod ai;
pub mod clock;
pub mod combat;
pub mod effects;
pub mod enemy;
pub mod entity;
pub mod events;
pub mod geom;
pub mod level;
pub mod physics;
pub mod player;
pub mod world;

pub use ai::{AiAgent, AiContext, AiMachine, AiState, Blackboard, BlackboardValue, Brain, Target};
pub use clock::FixedTimestep;
pub use combat::{
    AttackDefinition, AttackEffect, AttackId, AttackLibrary, AttackOptions, AttackPhase, CombatResolver,
    DamageOutcome, HitEvent, Hitbox, Projectile, apply_damage,
};
pub use effects::{EffectKind, EffectSet, TimedEffect};
pub use enemy::{Archetype, AttackRequest, BrainTable, Enemy, Pawn, brain_for};
pub use entity::{Body, EntityId, Health};
pub use events::GameEvent;
pub use geom::Rect;
pub use level::{CollectibleKind, CompletionRequirements, LevelData, ValidatedLevel};
pub use physics::{Hazard, MoveOptions, PhysicsWorld, Resolved, Solid, SolidKind};
pub use player::{ComboFinished, Player, PlayerInput, PlayerState, Skill, Skills};
pub use world::{Collectible, World, live_hurtboxes};
