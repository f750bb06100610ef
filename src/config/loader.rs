// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawStepFile, StepFile};
use crate::errors::Result;

/// Load a step file from a given path and return the raw `RawStepFile`.
///
/// This only performs TOML deserialization; it does **not** build or check
/// any commands. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawStepFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawStepFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a step file from path and validate every step.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - duplicate or missing step names,
///   - empty `run` values,
///   - `save` combined with `stdout`/`stderr`,
///   - unknown encodings and misplaced output sentinels.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<StepFile> {
    let raw = load_from_path(&path)?;
    StepFile::try_from(raw)
}

/// Same as [`load_and_validate`] for TOML already in memory.
pub fn parse_and_validate(contents: &str) -> Result<StepFile> {
    let raw: RawStepFile = toml::from_str(contents)?;
    StepFile::try_from(raw)
}

/// `Cmdpipe.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Cmdpipe.toml")
}
