//! Shared entity data: ids, bodies and health

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::Rect;
use crate::sanitize_vec;

/// Stable entity handle (index into the world's entity tables, never a reference)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The player always gets the first id
    pub const PLAYER: EntityId = EntityId(1);
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position, velocity and collision box of a moving entity
///
/// The box doubles as the hurtbox while the entity is alive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub rect: Rect,
    pub velocity: Vec2,
    pub on_ground: bool,
    pub facing_right: bool,
}

impl Body {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self {
            rect: Rect::from_pos_size(sanitize_vec(pos), size),
            velocity: Vec2::ZERO,
            on_ground: false,
            facing_right: true,
        }
    }

    #[inline]
    pub fn pos(&self) -> Vec2 {
        self.rect.pos()
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }

    /// Teleport, clearing velocity
    pub fn place(&mut self, pos: Vec2) {
        self.rect = self.rect.with_pos(sanitize_vec(pos));
        self.velocity = Vec2::ZERO;
        self.on_ground = false;
    }

    /// Turn toward a horizontal direction (0 keeps the current facing)
    pub fn face(&mut self, direction: f32) {
        if direction > 0.0 {
            self.facing_right = true;
        } else if direction < 0.0 {
            self.facing_right = false;
        }
    }

    /// +1 when facing right, -1 otherwise
    pub fn facing_sign(&self) -> f32 {
        if self.facing_right { 1.0 } else { -1.0 }
    }
}

/// Hit points, clamped to `0..=max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    current: i32,
    max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        let max = max.max(1);
        Self { current: max, max }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn is_dead(&self) -> bool {
        self.current == 0
    }

    pub fn fraction(&self) -> f32 {
        self.current as f32 / self.max as f32
    }

    /// Subtract damage, returning the amount actually removed
    pub fn damage(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0).min(self.current);
        self.current -= amount;
        amount
    }

    /// Restore health, returning the amount actually restored
    pub fn heal(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0).min(self.max - self.current);
        self.current += amount;
        amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_never_goes_negative() {
        let mut hp = Health::new(10);
        assert_eq!(hp.damage(25), 10);
        assert_eq!(hp.current(), 0);
        assert!(hp.is_dead());
        assert_eq!(hp.damage(5), 0);
    }

    #[test]
    fn test_negative_damage_is_ignored() {
        let mut hp = Health::new(10);
        assert_eq!(hp.damage(-5), 0);
        assert_eq!(hp.current(), 10);
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut hp = Health::new(10);
        hp.damage(4);
        assert_eq!(hp.heal(100), 4);
        assert_eq!(hp.current(), 10);
    }

    #[test]
    fn test_body_facing() {
        let mut body = Body::new(Vec2::ZERO, Vec2::new(16.0, 24.0));
        body.face(-1.0);
        assert!(!body.facing_right);
        body.face(0.0);
        assert!(!body.facing_right);
        assert_eq!(body.facing_sign(), -1.0);
    }

    #[test]
    fn test_place_sanitizes_position() {
        let mut body = Body::new(Vec2::ZERO, Vec2::new(16.0, 24.0));
        body.velocity = Vec2::new(5.0, 5.0);
        body.place(Vec2::new(f32::NAN, 3.0));
        assert_eq!(body.pos(), Vec2::new(0.0, 3.0));
        assert_eq!(body.velocity, Vec2::ZERO);
    }
}
