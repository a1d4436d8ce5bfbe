//! Error types for osrc
//!
//! All modules use `OsrcResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for osrc operations
pub type OsrcResult<T> = Result<T, OsrcError>;

/// All errors that can occur in osrc
#[derive(Error, Debug)]
pub enum OsrcError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to deduce layout for '{0}'")]
    LayoutUnknown(PathBuf),

    #[error("Duplicate library {name} at {path}")]
    DuplicateLibrary { name: String, path: String },

    #[error("Unable to find main class")]
    MainClassNotFound,

    #[error("Unable to find a single main class from the following candidates [{}]", .0.join(", "))]
    AmbiguousMainClass(Vec<String>),

    #[error("Service-Class can't have more than one: {existing} and {duplicate}")]
    MultipleServices { existing: String, duplicate: String },

    #[error("Unmatched {kind} '{name}': no layer rule selects it")]
    UnmatchedLayer { kind: &'static str, name: String },

    #[error("Layer index file is malformed: {0}")]
    LayerIndexMalformed(String),

    #[error("Empty layer index file loaded")]
    LayerIndexEmpty,

    #[error("No layer defined in index for file '{0}'")]
    LayerNotIndexed(String),

    #[error("Malformed classpath index line [{0}]")]
    ClasspathIndexMalformed(String),

    #[error("Source must refer to an existing file, got {0}")]
    SourceInvalid(PathBuf),

    // Archive errors
    #[error("No manifest found in {0}")]
    ManifestMissing(PathBuf),

    #[error("Malformed manifest line: {0}")]
    ManifestMalformed(String),

    #[error("Archive error: {context}")]
    Zip {
        context: String,
        #[source]
        source: zip::result::ZipError,
    },

    // Lookup/integrity errors
    #[error("No library found for entry name '{0}'")]
    LibraryNotRegistered(String),

    #[error("Digest mismatch for {name}: expected {expected}, got {actual}")]
    DigestMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    // Launch errors
    #[error("{0}")]
    LaunchSelection(String),

    // Lifecycle/container errors
    #[error("Builder lifecycle '{phase}' failed with status code {code}")]
    BuilderPhase { phase: String, code: i64 },

    #[error("Lifecycle has already been executed")]
    LifecycleAlreadyExecuted,

    #[error("Detected platform API versions '{detected}' are not included in supported versions '{supported}'")]
    PlatformApiUnsupported { detected: String, supported: String },

    #[error("Invalid version '{value}': {reason}")]
    VersionInvalid { value: String, reason: String },

    #[error("Invalid image reference '{0}'")]
    ImageReferenceInvalid(String),

    #[error("Builder metadata not found on image {0}")]
    BuilderMetadataMissing(String),

    #[error("Missing '{0}' value from the builder environment")]
    BuilderEnvMissing(String),

    #[error("Image pull failed: {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Image build failed: {tag}: {reason}")]
    ImageBuild { tag: String, reason: String },

    #[error("Container could not be created: {0}")]
    ContainerCreate(String),

    #[error("Container failed to start: {0}")]
    ContainerStart(String),

    #[error("Container engine not found: {0}")]
    EngineNotFound(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl OsrcError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an archive error with context
    pub fn zip(context: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the error describes an invalid build description rather than
    /// an environmental failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid { .. }
                | Self::LayoutUnknown(_)
                | Self::DuplicateLibrary { .. }
                | Self::MainClassNotFound
                | Self::AmbiguousMainClass(_)
                | Self::MultipleServices { .. }
                | Self::UnmatchedLayer { .. }
                | Self::LayerIndexMalformed(_)
                | Self::LayerIndexEmpty
                | Self::PlatformApiUnsupported { .. }
        )
    }

    /// Process exit code: -1 for entry-point selection failures, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LaunchSelection(_) => -1,
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AmbiguousMainClass(_) => {
                Some("Annotate the entry class with a service or task marker")
            }
            Self::MultipleServices { .. } => {
                Some("Mark all but one entry class as a task instead of a service")
            }
            Self::LayoutUnknown(_) => Some("Pass --layout jar|war|expanded|none"),
            Self::EngineNotFound(_) => Some("Install podman or docker, or set buildpack.engine"),
            Self::UnmatchedLayer { .. } => {
                Some("Add a catch-all layer rule (an empty include list matches everything)")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = OsrcError::AmbiguousMainClass(vec!["a.A".to_string(), "b.B".to_string()]);
        assert_eq!(
            err.to_string(),
            "Unable to find a single main class from the following candidates [a.A, b.B]"
        );
    }

    #[test]
    fn error_hint() {
        let err = OsrcError::MultipleServices {
            existing: "a.A".to_string(),
            duplicate: "b.B".to_string(),
        };
        assert!(err.hint().is_some());
        assert!(OsrcError::Internal("x".to_string()).hint().is_none());
    }

    #[test]
    fn error_exit_code() {
        assert_eq!(OsrcError::LaunchSelection("no".to_string()).exit_code(), -1);
        assert_eq!(OsrcError::LifecycleAlreadyExecuted.exit_code(), 1);
    }

    #[test]
    fn error_configuration_taxonomy() {
        assert!(OsrcError::LayerIndexEmpty.is_configuration());
        assert!(!OsrcError::BuilderPhase {
            phase: "creator".to_string(),
            code: 1
        }
        .is_configuration());
    }
}
