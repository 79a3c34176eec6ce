#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod blueprint;
mod component;
mod config;
pub mod emit;
mod error;
mod manager;
mod output;
pub mod plan;
mod script;
mod task;
mod types;
mod utils;
mod value;
mod workflow;

pub use crate::blueprint::{Blueprint, TaskDef};
pub use crate::component::Component;
pub use crate::config::Settings;
pub use crate::error::*;
pub use crate::manager::Manager;
pub use crate::output::Translation;
pub use crate::plan::Plan;
pub use crate::script::{EmbeddedBody, Script, ScriptExporter};
pub use crate::task::{Task, TaskId};
pub use crate::types::{Literal, WdlType};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
pub use crate::value::{Consumer, Producer, Role, Source, Value, ValueId, Values, ValuesId};
pub use crate::workflow::{Operator, Workflow, branch, forward, gather, join, scatter};
