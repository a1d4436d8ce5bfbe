//! Configuration schema for osrc
//!
//! Global configuration lives at `~/.config/osrc/config.toml`; a project may
//! override any of it in `.osrc.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Archive packaging
    pub package: PackageConfig,

    /// Custom layer rules
    pub layers: LayersConfig,

    /// Image builds
    pub buildpack: BuildpackConfig,

    /// `osrc launch`
    pub launcher: LauncherConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Packaging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// jar, war, expanded or none; deduced from the file name when unset
    pub layout: Option<String>,

    /// Write a layers index
    pub layered: bool,

    /// Fixed timestamps and sorted entries
    pub reproducible: bool,

    /// Archive whose classes are copied in as the launcher
    pub loader_jar: Option<PathBuf>,

    /// Keep `<source>.original` when repackaging in place
    pub backup: bool,

    /// Annotations marking the service entry point
    pub service_markers: Vec<String>,

    /// Annotations marking task entry points
    pub task_markers: Vec<String>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            layout: None,
            layered: false,
            reproducible: false,
            loader_jar: None,
            backup: true,
            service_markers: vec![],
            task_markers: vec![],
        }
    }
}

/// `[layers]`: an empty config means the standard layering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayersConfig {
    /// Layer order; derived from rule order when empty
    pub order: Vec<String>,

    /// Rules for application entries, first match wins
    pub application: Vec<ApplicationRuleConfig>,

    /// Rules for libraries, first match wins
    pub dependencies: Vec<LibraryRuleConfig>,
}

/// Selects application entries by exact name or `prefix/`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRuleConfig {
    pub layer: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

/// Selects libraries by `*`, `local`, `snapshot`, `scope:<name>` or
/// `group:artifact[:version]` with `*` suffix wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryRuleConfig {
    pub layer: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

/// Image build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildpackConfig {
    /// auto, podman or docker
    pub engine: String,

    /// Builder image
    pub builder: String,

    /// Run image; taken from the builder when unset
    pub run_image: Option<String>,

    /// Network the build container joins
    pub network: Option<String>,

    /// Delete the build cache before building
    pub clean_cache: bool,

    /// Lifecycle debug output
    pub verbose_logging: bool,

    /// Extra `source:destination[:options]` mounts
    pub bindings: Vec<String>,

    /// Platform env passed to buildpacks
    pub env: BTreeMap<String, String>,

    /// Image daemon socket mounted into the creator
    pub daemon_socket: String,
}

impl Default for BuildpackConfig {
    fn default() -> Self {
        Self {
            engine: "auto".to_string(),
            builder: crate::buildpack::DEFAULT_BUILDER.to_string(),
            run_image: None,
            network: None,
            clean_cache: false,
            verbose_logging: false,
            bindings: vec![],
            env: BTreeMap::new(),
            daemon_socket: crate::buildpack::request::DEFAULT_DAEMON_SOCKET.to_string(),
        }
    }
}

/// Launcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Java executable
    pub java: String,

    /// Where archives are extracted before launch
    pub extract_dir: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            extract_dir: None,
        }
    }
}

impl LauncherConfig {
    /// Configured extract dir, or `<cache_dir>/osrc/launch`
    pub fn extract_dir(&self) -> PathBuf {
        self.extract_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("osrc")
                .join("launch")
        })
    }
}
