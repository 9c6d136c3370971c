//! Sinaloa Dragon - simulation core of a 2D side-scrolling brawler
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, hitbox combat, player FSM, enemy AI)
//! - `settings`: Data-driven game balance
//! - `stats`: Per-run statistics accumulated from simulation events
//! - `error`: Load-boundary error types
//!
//! Rendering, audio, input devices and save files live outside this crate;
//! they only see the data contracts exposed by `sim::World`.

pub mod error;
pub mod settings;
pub mod sim;
pub mod stats;

pub use error::{AiError, ConfigError, LevelError};
pub use settings::{Difficulty, Settings};
pub use stats::RunStats;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Target simulation rate
    pub const TARGET_FPS: u32 = 60;
    /// Fixed simulation timestep (60 Hz, one update per rendered frame)
    pub const SIM_DT: f32 = 1.0 / TARGET_FPS as f32;
    /// Largest real-time slice accepted per frame (avoids catch-up after a stall)
    pub const MAX_FRAME_DT: f32 = 2.0 * SIM_DT;

    /// Default body size for the player (pixels)
    pub const PLAYER_WIDTH: f32 = 16.0;
    pub const PLAYER_HEIGHT: f32 = 24.0;

    /// Horizontal speed under which a grounded body counts as standing still
    pub const RUN_THRESHOLD: f32 = 10.0;

    /// Penetration allowed by collision resolution before it counts as overlap
    pub const COLLISION_EPSILON: f32 = 0.01;
}

/// Replace NaN/infinite values with zero
#[inline]
pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

/// Component-wise `finite_or_zero` for vectors
#[inline]
pub fn sanitize_vec(v: Vec2) -> Vec2 {
    Vec2::new(finite_or_zero(v.x), finite_or_zero(v.y))
}

/// Move `current` toward `target` by at most `max_delta`
#[inline]
pub fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    if current < target {
        (current + max_delta).min(target)
    } else {
        (current - max_delta).max(target)
    }
}

/// Convert a frame count to seconds at the fixed step
#[inline]
pub fn frames_to_secs(frames: u32) -> f32 {
    frames as f32 * consts::SIM_DT
}
