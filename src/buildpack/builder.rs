//! Builder image metadata and the ephemeral builder derived from it

use crate::buildpack::request::ImageReference;
use crate::buildpack::version::{ApiVersion, ApiVersions};
use crate::error::{OsrcError, OsrcResult};
use crate::orchestration::ImageConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Label carrying the builder metadata JSON
pub const METADATA_LABEL: &str = "io.buildpacks.builder.metadata";

/// Label carrying a stack image's stack id
pub const STACK_ID_LABEL: &str = "io.buildpacks.stack.id";

const USER_ID_ENV: &str = "CNB_USER_ID";
const GROUP_ID_ENV: &str = "CNB_GROUP_ID";

/// `io.buildpacks.builder.metadata` contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderMetadata {
    #[serde(default)]
    pub stack: Stack,
    #[serde(default)]
    pub lifecycle: LifecycleInfo,
    #[serde(default)]
    pub created_by: CreatedBy,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    #[serde(default)]
    pub run_image: RunImage,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunImage {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub mirrors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleInfo {
    #[serde(default)]
    pub version: String,
    /// Single supported versions, written by older builders
    #[serde(default)]
    pub api: Option<LifecycleApi>,
    #[serde(default)]
    pub apis: Option<LifecycleApis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleApi {
    #[serde(default)]
    pub buildpack: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleApis {
    #[serde(default)]
    pub buildpack: Option<SupportedApis>,
    #[serde(default)]
    pub platform: Option<SupportedApis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportedApis {
    #[serde(default)]
    pub deprecated: Vec<String>,
    #[serde(default)]
    pub supported: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatedBy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl BuilderMetadata {
    pub fn parse(json: &str) -> OsrcResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read the metadata label of a builder image
    pub fn from_image(config: &ImageConfig, image: &ImageReference) -> OsrcResult<Self> {
        let label = config
            .label(METADATA_LABEL)
            .ok_or_else(|| OsrcError::BuilderMetadataMissing(image.to_string()))?;
        Self::parse(label)
    }

    pub fn to_json(&self) -> OsrcResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Platform API versions the builder's lifecycle accepts
    pub fn platform_apis(&self) -> Vec<String> {
        let supported = self
            .lifecycle
            .apis
            .as_ref()
            .and_then(|apis| apis.platform.as_ref())
            .map(|platform| platform.supported.clone())
            .unwrap_or_default();
        if !supported.is_empty() {
            return supported;
        }
        self.lifecycle
            .api
            .as_ref()
            .and_then(|api| api.platform.clone())
            .into_iter()
            .collect()
    }

    /// Newest platform API both sides support
    pub fn platform_version(&self) -> OsrcResult<ApiVersion> {
        ApiVersions::supported_platforms().find_latest_supported(&self.platform_apis())
    }

    /// Copy of this metadata attributed to `name` `version`
    pub fn created_by(&self, name: &str, version: &str) -> Self {
        let mut copy = self.clone();
        copy.created_by = CreatedBy {
            name: name.to_string(),
            version: version.to_string(),
        };
        copy
    }
}

/// User and group that own the application content inside the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOwner {
    pub uid: u64,
    pub gid: u64,
}

impl BuildOwner {
    pub fn of(uid: u64, gid: u64) -> Self {
        Self { uid, gid }
    }

    /// Read `CNB_USER_ID` and `CNB_GROUP_ID` from the builder environment
    pub fn from_env(config: &ImageConfig) -> OsrcResult<Self> {
        Ok(Self {
            uid: env_id(config, USER_ID_ENV)?,
            gid: env_id(config, GROUP_ID_ENV)?,
        })
    }
}

fn env_id(config: &ImageConfig, key: &str) -> OsrcResult<u64> {
    let value = config
        .env_value(key)
        .ok_or_else(|| OsrcError::BuilderEnvMissing(key.to_string()))?;
    value.trim().parse().map_err(|_| {
        OsrcError::User(format!(
            "Builder environment value {}='{}' is not a number",
            key, value
        ))
    })
}

/// A short-lived builder image carrying the request's platform env
#[derive(Debug, Clone)]
pub struct EphemeralBuilder {
    name: ImageReference,
    base: ImageReference,
    owner: BuildOwner,
    metadata: BuilderMetadata,
    env: BTreeMap<String, String>,
}

impl EphemeralBuilder {
    pub fn new(
        owner: BuildOwner,
        base: &ImageReference,
        metadata: &BuilderMetadata,
        env: &BTreeMap<String, String>,
    ) -> OsrcResult<Self> {
        let random = Uuid::new_v4().simple().to_string();
        let name = ImageReference::parse(&format!("pack.local/builder/{}", &random[..10]))?
            .in_tagged_form();
        Ok(Self {
            name,
            base: base.clone(),
            owner,
            metadata: metadata.created_by("osrc", env!("CARGO_PKG_VERSION")),
            env: env.clone(),
        })
    }

    pub fn name(&self) -> &ImageReference {
        &self.name
    }

    pub fn build_owner(&self) -> &BuildOwner {
        &self.owner
    }

    pub fn metadata(&self) -> &BuilderMetadata {
        &self.metadata
    }

    /// Containerfile deriving this builder from its base image
    pub fn containerfile(&self) -> OsrcResult<String> {
        let label = self.metadata.to_json()?;
        let mut content = format!("FROM {}\n", self.base);
        content.push_str(&format!(
            "LABEL {}=\"{}\"\n",
            METADATA_LABEL,
            escape_label(&label)
        ));
        if !self.env.is_empty() {
            content.push_str("COPY platform/env/ /platform/env/\n");
        }
        Ok(content)
    }

    /// Write the build context: the Containerfile and one file per env entry
    /// under `platform/env/`
    pub fn write_context(&self, dir: &Path) -> OsrcResult<()> {
        let env_dir = dir.join("platform").join("env");
        fs::create_dir_all(&env_dir)
            .map_err(|e| OsrcError::io(format!("creating {}", env_dir.display()), e))?;
        for (key, value) in &self.env {
            let path = env_dir.join(key);
            fs::write(&path, value)
                .map_err(|e| OsrcError::io(format!("writing {}", path.display()), e))?;
        }
        let containerfile = dir.join("Containerfile");
        fs::write(&containerfile, self.containerfile()?)
            .map_err(|e| OsrcError::io(format!("writing {}", containerfile.display()), e))?;
        Ok(())
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$")
}
