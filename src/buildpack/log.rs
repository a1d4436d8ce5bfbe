//! Build progress reporting

use crate::buildpack::request::{BuildRequest, ImageReference};
use crate::buildpack::version::LifecycleVersion;
use crate::buildpack::volume::VolumeName;
use tracing::{debug, info};

/// Which image of a build is being pulled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Builder,
    Run,
}

impl ImageKind {
    fn description(&self) -> &'static str {
        match self {
            ImageKind::Builder => "builder image",
            ImageKind::Run => "run image",
        }
    }
}

type LineConsumer = Box<dyn Fn(&str, String) + Send + Sync>;

/// Reports build progress through tracing and forwards phase output lines
/// to a consumer as `(phase, line)`
pub struct BuildLog {
    consumer: LineConsumer,
}

impl BuildLog {
    pub fn new(consumer: impl Fn(&str, String) + Send + Sync + 'static) -> Self {
        Self {
            consumer: Box::new(consumer),
        }
    }

    /// A log that only goes to tracing
    pub fn silent() -> Self {
        Self::new(|_, _| {})
    }

    pub fn start(&self, request: &BuildRequest) {
        info!("Building image '{}'", request.name());
    }

    pub fn pulling_image(&self, image: &ImageReference, kind: ImageKind) {
        info!("Pulling {} '{}'", kind.description(), image);
    }

    pub fn pulled_image(&self, image: &ImageReference, kind: ImageKind) {
        info!("Pulled {} '{}'", kind.description(), image);
    }

    pub fn executing_lifecycle(
        &self,
        request: &BuildRequest,
        version: &LifecycleVersion,
        build_cache: &VolumeName,
    ) {
        info!(
            "Executing lifecycle version {} for '{}'",
            version,
            request.name()
        );
        if request.is_clean_cache() {
            info!("Clean cache requested, deleting {}", build_cache);
        } else {
            info!("Using build cache volume '{}'", build_cache);
        }
    }

    pub fn running_phase(&self, request: &BuildRequest, phase: &str) {
        info!("Running {} for '{}'", phase, request.name());
    }

    /// Forward one line of phase output
    pub fn phase_output(&self, phase: &str, line: String) {
        debug!(phase, "{}", line);
        (self.consumer)(phase, line);
    }

    pub fn executed_lifecycle(&self, request: &BuildRequest) {
        info!("Successfully built image '{}'", request.name());
    }
}

impl Default for BuildLog {
    fn default() -> Self {
        Self::silent()
    }
}
