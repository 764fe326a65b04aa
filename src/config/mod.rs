// src/config/mod.rs

//! Configuration loading and validation for buildloop.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate semantic invariants like trigger cycles (`validate.rs`).
//! - Watch the config file for edits (`watch.rs`).

pub mod loader;
pub mod model;
pub mod validate;
pub mod watch;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConditionConfig, ConfigFile, GroupSection, ProjectConfig, ScmConfig, ServerSection,
    TaskConfig, TriggerConfig,
};
pub use validate::{parse_schedule_days, parse_schedule_time, validate_config};
pub use watch::spawn_config_watcher;
