//! Container engine abstraction
//!
//! The buildpack lifecycle only needs a small slice of a container engine:
//! images, volumes and single-shot containers whose logs are followed while
//! they run. Implementations drive a local engine CLI; tests use an
//! in-memory recorder.

use crate::error::OsrcResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Everything needed to create a single container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    /// Command and arguments, replacing the image entrypoint
    pub command: Vec<String>,
    pub user: Option<String>,
    pub env: BTreeMap<String, String>,
    /// `source:destination` bind mounts (volumes or host paths)
    pub binds: Vec<String>,
    pub network: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub security_options: Vec<String>,
}

/// A tar stream copied into a created container before it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerContent {
    pub archive: Vec<u8>,
    pub destination: String,
}

impl ContainerContent {
    pub fn new(archive: Vec<u8>, destination: impl Into<String>) -> Self {
        Self {
            archive,
            destination: destination.into(),
        }
    }
}

/// Image configuration as reported by `image inspect`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageConfig {
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default)]
    pub env: Option<Vec<String>>,
}

impl ImageConfig {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.as_ref()?.get(key).map(String::as_str)
    }

    /// Value of `KEY` from the `KEY=value` environment list
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.as_ref()?.iter().find_map(|entry| {
            let (name, value) = entry.split_once('=')?;
            (name == key).then_some(value)
        })
    }
}

/// Abstract container engine interface
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Check whether the engine responds
    async fn is_available(&self) -> OsrcResult<bool>;

    async fn image_exists(&self, image: &str) -> OsrcResult<bool>;

    /// Pull an image from its registry
    async fn pull(&self, image: &str) -> OsrcResult<()>;

    async fn inspect_image(&self, image: &str) -> OsrcResult<ImageConfig>;

    /// Build `tag` from a context directory containing a `Containerfile`
    async fn build_image(&self, context: &Path, tag: &str) -> OsrcResult<()>;

    /// Remove an image; a missing image is not an error
    async fn remove_image(&self, image: &str) -> OsrcResult<()>;

    /// Create a container, copy `content` into it and return its id
    async fn create(&self, spec: &ContainerSpec, content: &[ContainerContent])
        -> OsrcResult<String>;

    async fn start(&self, container_id: &str) -> OsrcResult<()>;

    /// Follow the container output until it exits, one call per line
    async fn logs(
        &self,
        container_id: &str,
        on_line: &(dyn Fn(String) + Send + Sync),
    ) -> OsrcResult<()>;

    /// Block until the container exits and return its status code
    async fn wait(&self, container_id: &str) -> OsrcResult<i64>;

    /// Force-remove a container; a missing container is not an error
    async fn remove(&self, container_id: &str) -> OsrcResult<()>;

    /// Force-remove a volume; a missing volume is not an error
    async fn delete_volume(&self, name: &str) -> OsrcResult<()>;

    /// Human-readable engine name for display
    fn engine_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_config_parses_inspect_output() {
        let config: ImageConfig = serde_json::from_str(
            r#"{"Labels":{"io.buildpacks.builder.metadata":"{}"},"Env":["PATH=/bin","CNB_USER_ID=1000"]}"#,
        )
        .unwrap();
        assert_eq!(config.label("io.buildpacks.builder.metadata"), Some("{}"));
        assert_eq!(config.env_value("CNB_USER_ID"), Some("1000"));
        assert_eq!(config.env_value("CNB_GROUP_ID"), None);
    }

    #[test]
    fn image_config_tolerates_null_labels() {
        let config: ImageConfig = serde_json::from_str(r#"{"Labels":null,"Env":null}"#).unwrap();
        assert!(config.label("x").is_none());
        assert!(config.env_value("x").is_none());
    }
}
