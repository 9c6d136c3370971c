//! Timed status effects (invulnerability, stun, super armor)

use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use crate::finite_or_zero;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Incoming damage is ignored
    Invulnerable,
    /// Entity cannot act
    Stun,
    /// Damage still lands but knockback and flinch do not
    SuperArmor,
}

/// One active effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedEffect {
    pub kind: EffectKind,
    /// Seconds left
    pub remaining: f32,
    /// Entity that caused the effect (None for self-applied)
    pub source: Option<EntityId>,
}

/// The active effects on one entity, at most one per kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectSet {
    effects: Vec<TimedEffect>,
}

impl EffectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an effect or extend it; a shorter reapplication never shortens it
    pub fn apply(&mut self, kind: EffectKind, duration: f32, source: Option<EntityId>) {
        let duration = finite_or_zero(duration);
        if duration <= 0.0 {
            return;
        }
        match self.effects.iter_mut().find(|e| e.kind == kind) {
            Some(effect) => {
                if duration > effect.remaining {
                    effect.remaining = duration;
                    effect.source = source;
                }
            }
            None => self.effects.push(TimedEffect {
                kind,
                remaining: duration,
                source,
            }),
        }
    }

    pub fn has(&self, kind: EffectKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    /// Seconds left on `kind` (0 when inactive)
    pub fn remaining(&self, kind: EffectKind) -> f32 {
        self.effects
            .iter()
            .find(|e| e.kind == kind)
            .map_or(0.0, |e| e.remaining)
    }

    pub fn remove(&mut self, kind: EffectKind) {
        self.effects.retain(|e| e.kind != kind);
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Count down and drop expired effects
    pub fn tick(&mut self, dt: f32) {
        let dt = finite_or_zero(dt).max(0.0);
        for effect in &mut self.effects {
            effect.remaining -= dt;
        }
        self.effects.retain(|e| e.remaining > 0.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedEffect> {
        self.effects.iter()
    }
}
