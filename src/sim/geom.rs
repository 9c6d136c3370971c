//! Axis-aligned rectangles
//!
//! Screen convention: origin top-left, +x right, +y down. A rectangle is its
//! top-left corner plus a size.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned box in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Box of `size` whose top-left corner is `pos`
    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self::new(pos.x, pos.y, size.x, size.y)
    }

    /// Box of `size` centered on `center`
    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        Self::new(center.x - size.x / 2.0, center.y - size.y / 2.0, size.x, size.y)
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.w, self.h)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Copy moved by `delta`
    #[inline]
    pub fn translated(&self, delta: Vec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.w, self.h)
    }

    /// Copy with the top-left corner at `pos`
    #[inline]
    pub fn with_pos(&self, pos: Vec2) -> Self {
        Self::new(pos.x, pos.y, self.w, self.h)
    }

    /// Strict overlap test (touching edges do not count)
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Penetration depth along x (<= 0 when separated on that axis)
    #[inline]
    pub fn overlap_x(&self, other: &Rect) -> f32 {
        (self.right() - other.left()).min(other.right() - self.left())
    }

    /// Penetration depth along y (<= 0 when separated on that axis)
    #[inline]
    pub fn overlap_y(&self, other: &Rect) -> f32 {
        (self.bottom() - other.top()).min(other.bottom() - self.top())
    }

    /// Overlap deeper than `epsilon` on both axes
    #[inline]
    pub fn penetrates(&self, other: &Rect, epsilon: f32) -> bool {
        self.overlap_x(other) > epsilon && self.overlap_y(other) > epsilon
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// All components finite and size strictly positive
    pub fn is_well_formed(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.w.is_finite()
            && self.h.is_finite()
            && self.w > 0.0
            && self.h > 0.0
    }
}
