// src/config/mod.rs

//! Step file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a step file from disk or a string (`loader.rs`).
//! - Validate it into ready-to-run commands (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_and_validate};
pub use model::{
    ExpandedCmd, PlannedCommand, RawStep, RawStepFile, RunEntries, RunEntry, RunInput, RunItem,
    StepConfig, StepFile, StepKind,
};
