//! Image build requests and the references they carry

use crate::buildpack::builder::BuildOwner;
use crate::buildpack::content::archive_to_tar;
use crate::error::{OsrcError, OsrcResult};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

const DEFAULT_DOMAIN: &str = "docker.io";
const LEGACY_DOMAIN: &str = "index.docker.io";
const OFFICIAL_REPOSITORY: &str = "library";
const LATEST: &str = "latest";

/// Builder used when the request does not name one
pub const DEFAULT_BUILDER: &str = "paketobuildpacks/builder:base";

/// Socket bound into phases that talk to the image daemon
pub const DEFAULT_DAEMON_SOCKET: &str = "/var/run/docker.sock";

/// A parsed `domain/name[:tag][@digest]` image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    domain: String,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(value: &str) -> OsrcResult<Self> {
        let invalid = || OsrcError::ImageReferenceInvalid(value.to_string());
        let value = value.trim();
        if value.is_empty() {
            return Err(invalid());
        }

        let (rest, digest) = match value.split_once('@') {
            Some((rest, digest)) => (rest, Some(digest.to_string())),
            None => (value, None),
        };

        let last_slash = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (rest, tag) = match rest[last_slash..].find(':') {
            Some(i) => (
                &rest[..last_slash + i],
                Some(rest[last_slash + i + 1..].to_string()),
            ),
            None => (rest, None),
        };

        let (domain, path) = match rest.split_once('/') {
            Some((first, remainder))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), remainder.to_string())
            }
            _ => (DEFAULT_DOMAIN.to_string(), rest.to_string()),
        };
        let domain = if domain == LEGACY_DOMAIN {
            DEFAULT_DOMAIN.to_string()
        } else {
            domain
        };
        let name = if domain == DEFAULT_DOMAIN && !path.contains('/') {
            format!("{}/{}", OFFICIAL_REPOSITORY, path)
        } else {
            path
        };

        if !is_valid_name(&name) {
            return Err(invalid());
        }
        if let Some(tag) = &tag {
            if !is_valid_tag(tag) {
                return Err(invalid());
            }
        }
        if let Some(digest) = &digest {
            if !is_valid_digest(digest) {
                return Err(invalid());
            }
        }

        Ok(Self {
            domain,
            name,
            tag,
            digest,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// The same reference with `latest` as tag when neither tag nor digest is set
    pub fn in_tagged_form(mut self) -> Self {
        if self.tag.is_none() && self.digest.is_none() {
            self.tag = Some(LATEST.to_string());
        }
        self
    }

    /// Short form used by older tooling: `docker.io/library/` is dropped
    pub fn to_legacy_string(&self) -> String {
        let mut name = if self.domain == DEFAULT_DOMAIN {
            self.name
                .strip_prefix("library/")
                .unwrap_or(&self.name)
                .to_string()
        } else {
            format!("{}/{}", self.domain, self.name)
        };
        self.append_suffix(&mut name);
        name
    }

    fn append_suffix(&self, value: &mut String) {
        if let Some(tag) = &self.tag {
            value.push(':');
            value.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            value.push('@');
            value.push_str(digest);
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = format!("{}/{}", self.domain, self.name);
        self.append_suffix(&mut value);
        f.write_str(&value)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('/').all(|component| {
            !component.is_empty()
                && component
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c))
                && component
                    .chars()
                    .next()
                    .map(|c| c.is_ascii_alphanumeric())
                    .unwrap_or(false)
        })
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 128
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
}

fn is_valid_digest(digest: &str) -> bool {
    match digest.split_once(':') {
        Some((algorithm, hex)) => {
            !algorithm.is_empty() && hex.len() >= 32 && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// A volume or host path bound into the build container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding(String);

impl Binding {
    /// Parse `source:destination[:options]`
    pub fn parse(value: &str) -> OsrcResult<Self> {
        let mut parts = value.splitn(3, ':');
        let source = parts.next().unwrap_or("");
        let destination = parts.next().unwrap_or("");
        if source.is_empty() || destination.is_empty() {
            return Err(OsrcError::User(format!(
                "Binding '{}' must be in the form source:destination[:options]",
                value
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn from(source: impl fmt::Display, destination: &str) -> Self {
        Self(format!("{}:{}", source, destination))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to build an image from a packaged archive
#[derive(Debug, Clone)]
pub struct BuildRequest {
    name: ImageReference,
    application: PathBuf,
    builder: ImageReference,
    run_image: Option<ImageReference>,
    env: BTreeMap<String, String>,
    clean_cache: bool,
    verbose_logging: bool,
    network: Option<String>,
    bindings: Vec<Binding>,
    daemon_socket: String,
}

impl BuildRequest {
    /// Request building `name` from the archive at `application`
    pub fn for_archive(name: ImageReference, application: impl Into<PathBuf>) -> OsrcResult<Self> {
        let application = application.into();
        if !application.is_file() {
            return Err(OsrcError::SourceInvalid(application));
        }
        Ok(Self {
            name: name.in_tagged_form(),
            application,
            builder: ImageReference::parse(DEFAULT_BUILDER)?,
            run_image: None,
            env: BTreeMap::new(),
            clean_cache: false,
            verbose_logging: false,
            network: None,
            bindings: Vec::new(),
            daemon_socket: DEFAULT_DAEMON_SOCKET.to_string(),
        })
    }

    pub fn with_builder(mut self, builder: ImageReference) -> Self {
        self.builder = builder.in_tagged_form();
        self
    }

    pub fn with_run_image(mut self, run_image: ImageReference) -> Self {
        self.run_image = Some(run_image.in_tagged_form());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_clean_cache(mut self, clean_cache: bool) -> Self {
        self.clean_cache = clean_cache;
        self
    }

    pub fn with_verbose_logging(mut self, verbose_logging: bool) -> Self {
        self.verbose_logging = verbose_logging;
        self
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        self.network = network;
        self
    }

    pub fn with_bindings(mut self, bindings: Vec<Binding>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_daemon_socket(mut self, socket: impl Into<String>) -> Self {
        self.daemon_socket = socket.into();
        self
    }

    pub fn name(&self) -> &ImageReference {
        &self.name
    }

    pub fn application(&self) -> &Path {
        &self.application
    }

    pub fn builder(&self) -> &ImageReference {
        &self.builder
    }

    pub fn run_image(&self) -> Option<&ImageReference> {
        self.run_image.as_ref()
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn is_clean_cache(&self) -> bool {
        self.clean_cache
    }

    pub fn is_verbose_logging(&self) -> bool {
        self.verbose_logging
    }

    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn daemon_socket(&self) -> &str {
        &self.daemon_socket
    }

    /// The application archive as a tar stream owned by `owner`
    pub fn application_content(&self, owner: &BuildOwner) -> OsrcResult<Vec<u8>> {
        archive_to_tar(&self.application, owner)
    }
}
