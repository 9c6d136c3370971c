//! Error types for the load boundary and AI evaluation
//!
//! Nothing here ever aborts a frame: level errors are reported once at load
//! and the offending descriptor is skipped, AI errors drop the entity back
//! to Idle for the frame.

use thiserror::Error;

/// Problems found while reading level data
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("level parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("enemy spawn #{index}: unknown enemy type `{kind}`")]
    UnknownEnemyType { index: usize, kind: String },
    #[error("solid #{index}: unknown solid type `{kind}`")]
    UnknownSolidKind { index: usize, kind: String },
    #[error("solid #{index}: malformed rectangle ({reason})")]
    MalformedRect { index: usize, reason: &'static str },
    #[error("collectible #{index}: unknown collectible type `{kind}`")]
    UnknownCollectible { index: usize, kind: String },
    #[error("enemy spawn #{index}: non-finite position")]
    MalformedSpawn { index: usize },
}

/// Problems loading a settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure inside an AI condition or behavior function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("blackboard key `{0}` missing")]
    MissingKey(&'static str),
    #[error("blackboard key `{key}` is not a {expected}")]
    TypeMismatch {
        key: &'static str,
        expected: &'static str,
    },
    #[error("no target in context")]
    NoTarget,
}
