//! Runtime and bridge settings

use crate::error::ScriptError;
use netval_core::AttrMask;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings applied when a [`crate::ScriptRuntime`] is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub engine: EngineSettings,
    pub exposure: ExposureSettings,
}

/// QuickJS runtime limits. `None` keeps the engine default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub memory_limit_bytes: Option<usize>,
    pub gc_threshold_bytes: Option<usize>,
    pub max_stack_size_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureSettings {
    /// Expose only `&log` fields of records handed to scripts.
    pub loggable_only: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            exposure: ExposureSettings::default(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            memory_limit_bytes: None,
            gc_threshold_bytes: None,
            max_stack_size_bytes: Some(1024 * 1024),
        }
    }
}

impl Default for ExposureSettings {
    fn default() -> Self {
        Self {
            loggable_only: false,
        }
    }
}

impl BridgeSettings {
    pub fn from_json(source: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(source).map_err(ScriptError::Settings)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&source)
    }

    /// Mask used by [`crate::ScriptRuntime::expose`].
    pub fn default_mask(&self) -> AttrMask {
        if self.exposure.loggable_only {
            AttrMask::LOGGABLE
        } else {
            AttrMask::ALL
        }
    }
}
