//! Engine initialization settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SvmError;

/// Settings passed to the engine once per process by [`Svm::init`](crate::Svm::init).
///
/// Every runtime created afterwards uses these settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    /// Keep the global state in memory. When set, `path` is ignored.
    pub in_memory: bool,

    /// Directory under which the engine persists its global state.
    pub path: Option<PathBuf>,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            in_memory: true,
            path: None,
        }
    }
}

impl SvmConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            in_memory: false,
            path: Some(path.into()),
        }
    }

    /// Reject settings the engine cannot act on.
    pub fn validate(&self) -> Result<(), SvmError> {
        if self.in_memory {
            return Ok(());
        }
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(()),
            _ => Err(SvmError::InvalidConfig(
                "a persistent state requires a path".into(),
            )),
        }
    }

    /// Path bytes as handed to the engine. Empty for in-memory state.
    pub(crate) fn path_bytes(&self) -> Vec<u8> {
        if self.in_memory {
            return Vec::new();
        }
        self.path
            .as_deref()
            .map(Path::to_string_lossy)
            .map(|p| p.into_owned().into_bytes())
            .unwrap_or_default()
    }
}
