use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::arch::DEFAULT_NAMESPACE;
use crate::include::sibling_path;

/// Toolkit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Namespace of architecture modules
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// JSON snapshot, relative to the config file
    #[serde(default)]
    pub snapshot: Option<String>,

    /// Colored output
    #[serde(default = "default_color")]
    pub color: bool,

    #[serde(default)]
    pub arch: ArchConfig,

    /// File this configuration was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchConfig {
    /// Machine to resolve arch modules for, instead of the running host
    #[serde(default)]
    pub machine: Option<String>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_color() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            snapshot: None,
            color: default_color(),
            arch: ArchConfig::default(),
            source: None,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = toml::from_str(&content)?;
        config.source = Some(path.as_ref().to_path_buf());
        info!(
            path = %path.as_ref().display(),
            namespace = %config.namespace,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Snapshot path, resolved next to the config file when loaded from one
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        let snapshot = self.snapshot.as_deref()?;
        match &self.source {
            Some(source) if Path::new(snapshot).is_relative() => {
                Some(sibling_path(source, snapshot, "json"))
            }
            _ => Some(PathBuf::from(snapshot)),
        }
    }
}
