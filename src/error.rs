use camino::Utf8PathBuf;
use thiserror::Error;

use crate::types::WdlType;

pub use anyhow::Error as ScriptError;

/// Every way a build can fail. None of these are transient: each one points at
/// a definition or wiring mistake, and the build stops at the first one.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Task '{task}', input {slot}: expected {expected}, got {found}")]
    TypeMismatch {
        task: String,
        slot: usize,
        expected: WdlType,
        found: String,
    },

    #[error("Task '{task}': expected {expected} inputs, got {found}")]
    ArityMismatch {
        task: String,
        expected: usize,
        found: usize,
    },

    #[error("Array literal of {expected} contains an item of type {found}")]
    LiteralMismatch { expected: WdlType, found: WdlType },

    #[error("Invalid task '{task}': {reason}")]
    InvalidTaskDefinition { task: String, reason: String },

    #[error("Invalid use of '{operator}': {reason}")]
    InvalidOperatorUse { operator: String, reason: String },

    #[error("Unsupported operator '{0}'")]
    UnsupportedOperator(String),

    #[error("Task '{task}' merges producers placed at different levels ({levels})")]
    InconsistentFanInLevel { task: String, levels: String },

    #[error("Task graph can't be ordered: task '{task}' {reason}")]
    UnresolvableGraph { task: String, reason: String },

    #[error("Script for task '{0}':\n{1}")]
    Script(String, ScriptError),

    #[error("Couldn't parse settings.\n{0}")]
    Settings(#[from] serde_json::Error),

    #[error("Couldn't write '{0}'.\n{1}")]
    Write(Utf8PathBuf, std::io::Error),
}
