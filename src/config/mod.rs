// src/config/mod.rs

//! Task file loading and validation.
//!
//! The task file stands in for the task store when `dagrun` runs as a
//! binary. Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a task file from disk (`loader.rs`).
//! - Validate it and build task records (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigSection, RawTaskFile, TaskConfig, TaskFile};
