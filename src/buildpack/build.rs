//! Builds an image from a packaged archive using a buildpack builder

use crate::buildpack::builder::{BuildOwner, BuilderMetadata, EphemeralBuilder, STACK_ID_LABEL};
use crate::buildpack::lifecycle::Lifecycle;
use crate::buildpack::log::{BuildLog, ImageKind};
use crate::buildpack::request::{BuildRequest, ImageReference};
use crate::error::{OsrcError, OsrcResult};
use crate::orchestration::{ContainerEngine, ImageConfig};
use std::fs;
use tracing::debug;
use uuid::Uuid;

pub struct Builder<'a> {
    engine: &'a dyn ContainerEngine,
    log: BuildLog,
}

impl<'a> Builder<'a> {
    pub fn new(engine: &'a dyn ContainerEngine) -> Self {
        Self {
            engine,
            log: BuildLog::silent(),
        }
    }

    pub fn with_log(mut self, log: BuildLog) -> Self {
        self.log = log;
        self
    }

    /// Build `request` into an image in the local daemon.
    ///
    /// The ephemeral builder image is removed whether or not the build
    /// succeeds.
    pub async fn build(&self, request: BuildRequest) -> OsrcResult<()> {
        self.log.start(&request);

        let builder_config = self
            .fetch_image(request.builder(), ImageKind::Builder)
            .await?;
        let metadata = BuilderMetadata::from_image(&builder_config, request.builder())?;
        let request = with_run_image_if_needed(request, &metadata)?;
        if let Some(run_image) = request.run_image() {
            let run_config = self.fetch_image(run_image, ImageKind::Run).await?;
            check_stack_ids(&builder_config, &run_config)?;
        }

        let owner = BuildOwner::from_env(&builder_config)?;
        let builder = EphemeralBuilder::new(owner, request.builder(), &metadata, request.env())?;
        self.create_builder_image(&builder).await?;

        let result = self.execute_lifecycle(&request, &builder).await;
        let removed = self
            .engine
            .remove_image(&builder.name().to_string())
            .await;
        result.and(removed)
    }

    async fn fetch_image(&self, image: &ImageReference, kind: ImageKind) -> OsrcResult<ImageConfig> {
        let name = image.to_string();
        if !self.engine.image_exists(&name).await? {
            self.log.pulling_image(image, kind);
            self.engine.pull(&name).await?;
            self.log.pulled_image(image, kind);
        }
        self.engine.inspect_image(&name).await
    }

    async fn create_builder_image(&self, builder: &EphemeralBuilder) -> OsrcResult<()> {
        let context = std::env::temp_dir().join(format!("osrc-builder-{}", Uuid::new_v4().simple()));
        let result = match builder.write_context(&context) {
            Ok(()) => {
                self.engine
                    .build_image(&context, &builder.name().to_string())
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = fs::remove_dir_all(&context) {
            debug!("Leaving builder context {}: {}", context.display(), e);
        }
        result
    }

    async fn execute_lifecycle(
        &self,
        request: &BuildRequest,
        builder: &EphemeralBuilder,
    ) -> OsrcResult<()> {
        let mut lifecycle = Lifecycle::new(&self.log, self.engine, request, builder)?;
        let result = lifecycle.execute().await;
        let closed = lifecycle.close().await;
        result.and(closed)
    }
}

/// Fill in the run image from the builder's stack when the request has none
fn with_run_image_if_needed(
    request: BuildRequest,
    metadata: &BuilderMetadata,
) -> OsrcResult<BuildRequest> {
    if request.run_image().is_some() {
        return Ok(request);
    }
    match metadata.stack.run_image.image.as_deref() {
        Some(image) => Ok(request.with_run_image(ImageReference::parse(image)?)),
        None => Err(OsrcError::User(format!(
            "Run image must be specified, builder '{}' does not declare one",
            request.builder()
        ))),
    }
}

fn check_stack_ids(builder: &ImageConfig, run_image: &ImageConfig) -> OsrcResult<()> {
    match (builder.label(STACK_ID_LABEL), run_image.label(STACK_ID_LABEL)) {
        (Some(builder_stack), Some(run_stack)) if builder_stack != run_stack => {
            Err(OsrcError::User(format!(
                "Run image stack '{}' does not match builder stack '{}'",
                run_stack, builder_stack
            )))
        }
        _ => Ok(()),
    }
}
