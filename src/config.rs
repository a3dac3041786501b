use std::ffi::OsString;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::vm::VmConfig;
use crate::error::ToyError;

/// Compiler and runtime options, persisted as JSON.
///
/// Missing fields fall back to their defaults, so a config file only needs
/// the keys it wants to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Name of the entry function.
    pub entry: String,
    /// Report functions that are called but never defined as errors (true)
    /// or only log a warning (false).
    pub strict_forward_refs: bool,
    /// Process `\n \t \\ \"` inside text literals.
    pub text_escapes: bool,
    pub vm: VmConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
            strict_forward_refs: true,
            text_escapes: true,
            vm: VmConfig::default(),
        }
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ToyError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

/// Write through a sibling `.tmp` file and rename, so a crash never leaves a
/// half-written config behind.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ToyError> {
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp_name = OsString::from(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);
    fs::write(&tmp_path, json.as_bytes())?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_config(path: &Path) -> Result<CompilerConfig, ToyError> {
    let config: CompilerConfig = read_json(path)?;
    log::debug!("[config] loaded {}", path.display());
    Ok(config)
}

pub fn save_config(path: &Path, config: &CompilerConfig) -> Result<(), ToyError> {
    write_json(path, config)
}
