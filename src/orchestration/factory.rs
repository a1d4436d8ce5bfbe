//! Engine factory
//!
//! Resolves the configured engine preference to a concrete engine.

use crate::error::{OsrcError, OsrcResult};
use crate::orchestration::cli_engine::{CliEngine, EngineKind};
use crate::orchestration::engine::ContainerEngine;
use tracing::debug;

/// Engine selection from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePreference {
    /// First installed of podman, docker
    Auto,
    Podman,
    Docker,
}

impl EnginePreference {
    pub fn parse(value: &str) -> OsrcResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "podman" => Ok(Self::Podman),
            "docker" => Ok(Self::Docker),
            other => Err(OsrcError::User(format!(
                "Unknown container engine '{}', expected auto, podman or docker",
                other
            ))),
        }
    }

    fn candidates(&self) -> &'static [EngineKind] {
        match self {
            Self::Auto => &[EngineKind::Podman, EngineKind::Docker],
            Self::Podman => &[EngineKind::Podman],
            Self::Docker => &[EngineKind::Docker],
        }
    }
}

/// Create an engine for the given preference
///
/// # Returns
/// * `Ok(Box<dyn ContainerEngine>)` - The first candidate whose CLI is installed
/// * `Err` - If no candidate is installed
pub async fn create_engine(preference: EnginePreference) -> OsrcResult<Box<dyn ContainerEngine>> {
    for kind in preference.candidates() {
        if CliEngine::installed(*kind).await {
            debug!("Using container engine {}", kind.binary());
            return Ok(Box::new(CliEngine::new(*kind)));
        }
    }
    let tried = preference
        .candidates()
        .iter()
        .map(EngineKind::binary)
        .collect::<Vec<_>>()
        .join(", ");
    Err(OsrcError::EngineNotFound(tried))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parse() {
        assert_eq!(EnginePreference::parse("auto").unwrap(), EnginePreference::Auto);
        assert_eq!(EnginePreference::parse("").unwrap(), EnginePreference::Auto);
        assert_eq!(EnginePreference::parse("Docker").unwrap(), EnginePreference::Docker);
        assert_eq!(EnginePreference::parse("podman").unwrap(), EnginePreference::Podman);
        assert!(EnginePreference::parse("containerd").is_err());
    }

    #[test]
    fn auto_tries_podman_first() {
        assert_eq!(
            EnginePreference::Auto.candidates(),
            &[EngineKind::Podman, EngineKind::Docker]
        );
    }
}
