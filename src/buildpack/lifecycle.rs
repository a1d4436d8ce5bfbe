//! Runs the buildpack lifecycle inside the ephemeral builder
//!
//! A lifecycle is single use. It owns four volumes: `layers` and the
//! application volume live only as long as the lifecycle, while the build and
//! launch caches are named after the target image so the next build of the
//! same image finds them again.

use crate::buildpack::builder::EphemeralBuilder;
use crate::buildpack::log::BuildLog;
use crate::buildpack::phase::Phase;
use crate::buildpack::request::{Binding, BuildRequest};
use crate::buildpack::version::{ApiVersion, LifecycleVersion};
use crate::buildpack::volume::VolumeName;
use crate::error::{OsrcError, OsrcResult};
use crate::orchestration::{ContainerContent, ContainerEngine, ContainerSpec};
use tracing::debug;

const LOGGING_MINIMUM_VERSION: &str = "0.0.5";
const PLATFORM_API_VERSION_KEY: &str = "CNB_PLATFORM_API";
const CACHE_DIGEST_LENGTH: usize = 6;

/// Fixed directories inside the build container
pub mod directory {
    /// Buildpack layer contributions
    pub const LAYERS: &str = "/layers";
    /// Application content, uploaded once and shared by every phase
    pub const APPLICATION: &str = "/workspace";
    /// Platform env files written into the ephemeral builder
    pub const PLATFORM: &str = "/platform";
    pub const CACHE: &str = "/cache";
    pub const LAUNCH_CACHE: &str = "/launch-cache";
}

pub struct Lifecycle<'a> {
    log: &'a BuildLog,
    engine: &'a dyn ContainerEngine,
    request: &'a BuildRequest,
    builder: &'a EphemeralBuilder,
    lifecycle_version: LifecycleVersion,
    platform_version: ApiVersion,
    layers_volume: VolumeName,
    application_volume: VolumeName,
    build_cache_volume: VolumeName,
    launch_cache_volume: VolumeName,
    executed: bool,
    application_volume_populated: bool,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        log: &'a BuildLog,
        engine: &'a dyn ContainerEngine,
        request: &'a BuildRequest,
        builder: &'a EphemeralBuilder,
    ) -> OsrcResult<Self> {
        let metadata = builder.metadata();
        let lifecycle_version = LifecycleVersion::parse(&metadata.lifecycle.version)?;
        let platform_version = metadata.platform_version()?;
        let legacy_name = request.name().to_legacy_string();
        Ok(Self {
            log,
            engine,
            request,
            builder,
            lifecycle_version,
            platform_version,
            layers_volume: VolumeName::random("pack-layers-"),
            application_volume: VolumeName::random("pack-app-"),
            build_cache_volume: VolumeName::based_on(
                &legacy_name,
                "pack-cache-",
                ".build",
                CACHE_DIGEST_LENGTH,
            ),
            launch_cache_volume: VolumeName::based_on(
                &legacy_name,
                "pack-cache-",
                ".launch",
                CACHE_DIGEST_LENGTH,
            ),
            executed: false,
            application_volume_populated: false,
        })
    }

    pub fn platform_version(&self) -> ApiVersion {
        self.platform_version
    }

    pub fn build_cache_volume(&self) -> &VolumeName {
        &self.build_cache_volume
    }

    pub fn launch_cache_volume(&self) -> &VolumeName {
        &self.launch_cache_volume
    }

    /// Run every phase in turn. Fails if called a second time.
    pub async fn execute(&mut self) -> OsrcResult<()> {
        if self.executed {
            return Err(OsrcError::LifecycleAlreadyExecuted);
        }
        self.executed = true;
        self.log.executing_lifecycle(
            self.request,
            &self.lifecycle_version,
            &self.build_cache_volume,
        );
        if self.request.is_clean_cache() {
            self.engine
                .delete_volume(self.build_cache_volume.as_str())
                .await?;
        }
        let phase = self.create_phase()?;
        self.run(&phase).await?;
        self.log.executed_lifecycle(self.request);
        Ok(())
    }

    fn create_phase(&self) -> OsrcResult<Phase> {
        let run_image = self.request.run_image().ok_or_else(|| {
            OsrcError::User("Run image must be set before the lifecycle runs".to_string())
        })?;

        let mut phase = Phase::new("creator", self.is_verbose_logging());
        phase.with_daemon_access(self.request.daemon_socket());
        phase.with_log_level_arg();
        phase.with_args(["-app", directory::APPLICATION]);
        phase.with_args(["-platform", directory::PLATFORM]);
        phase.with_args(["-run-image".to_string(), run_image.to_string()]);
        phase.with_args(["-layers", directory::LAYERS]);
        phase.with_args(["-cache-dir", directory::CACHE]);
        phase.with_args(["-launch-cache", directory::LAUNCH_CACHE]);
        phase.with_args(["-daemon"]);
        if self.request.is_clean_cache() {
            phase.with_args(["-skip-restore"]);
        }
        if self.requires_process_type_default() {
            phase.with_args(["-process-type=web"]);
        }
        phase.with_args([self.request.name().to_string()]);
        phase.with_binding(Binding::from(&self.layers_volume, directory::LAYERS));
        phase.with_binding(Binding::from(
            &self.application_volume,
            directory::APPLICATION,
        ));
        phase.with_binding(Binding::from(&self.build_cache_volume, directory::CACHE));
        phase.with_binding(Binding::from(
            &self.launch_cache_volume,
            directory::LAUNCH_CACHE,
        ));
        for binding in self.request.bindings() {
            phase.with_binding(binding.clone());
        }
        phase.with_env(PLATFORM_API_VERSION_KEY, self.platform_version.to_string());
        if let Some(network) = self.request.network() {
            phase.with_network_mode(network);
        }
        Ok(phase)
    }

    fn is_verbose_logging(&self) -> bool {
        let minimum = LifecycleVersion::parse(LOGGING_MINIMUM_VERSION);
        self.request.is_verbose_logging()
            && minimum
                .map(|m| self.lifecycle_version.is_equal_or_greater_than(&m))
                .unwrap_or(false)
    }

    fn requires_process_type_default(&self) -> bool {
        self.platform_version.supports(&ApiVersion::of(0, 4))
    }

    async fn run(&mut self, phase: &Phase) -> OsrcResult<()> {
        self.log.running_phase(self.request, phase.name());
        let spec = phase.apply(&self.builder.name().to_string());
        let container_id = self.create_container(&spec).await?;

        let result = self.run_container(&container_id, phase).await;
        let removed = self.engine.remove(&container_id).await;
        result.and(removed)
    }

    async fn run_container(&self, container_id: &str, phase: &Phase) -> OsrcResult<()> {
        self.engine.start(container_id).await?;

        let log = self.log;
        let name = phase.name();
        let consumer = move |line: String| log.phase_output(name, line);
        let (logs, status) = tokio::join!(
            self.engine.logs(container_id, &consumer),
            self.engine.wait(container_id)
        );
        let code = status?;
        logs?;

        if code != 0 {
            return Err(OsrcError::BuilderPhase {
                phase: phase.name().to_string(),
                code,
            });
        }
        Ok(())
    }

    async fn create_container(&mut self, spec: &ContainerSpec) -> OsrcResult<String> {
        if self.application_volume_populated {
            return self.engine.create(spec, &[]).await;
        }
        // Set before uploading, a failed upload is not retried
        self.application_volume_populated = true;
        let content = self
            .request
            .application_content(self.builder.build_owner())?;
        debug!("Uploading {} bytes of application content", content.len());
        self.engine
            .create(
                spec,
                &[ContainerContent::new(content, directory::APPLICATION)],
            )
            .await
    }

    /// Delete the build-scoped volumes. Cache volumes are kept.
    pub async fn close(&self) -> OsrcResult<()> {
        let layers = self.engine.delete_volume(self.layers_volume.as_str()).await;
        let application = self
            .engine
            .delete_volume(self.application_volume.as_str())
            .await;
        layers.and(application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildpack::builder::{BuildOwner, BuilderMetadata};
    use crate::buildpack::request::ImageReference;
    use crate::buildpack::testing::{write_app_jar, RecordingEngine, METADATA};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        request: BuildRequest,
        builder: EphemeralBuilder,
    }

    fn fixture(configure: impl FnOnce(BuildRequest) -> BuildRequest) -> Fixture {
        let temp = TempDir::new().unwrap();
        let jar = write_app_jar(temp.path());
        let request = BuildRequest::for_archive(ImageReference::parse("my-app").unwrap(), &jar)
            .unwrap()
            .with_run_image(ImageReference::parse("cloudfoundry/run:base-cnb").unwrap());
        let request = configure(request);
        let metadata = BuilderMetadata::parse(METADATA).unwrap();
        let builder = EphemeralBuilder::new(
            BuildOwner::of(1000, 1000),
            request.builder(),
            &metadata,
            &BTreeMap::new(),
        )
        .unwrap();
        Fixture {
            _temp: temp,
            request,
            builder,
        }
    }

    #[tokio::test]
    async fn creator_phase_arguments() {
        let f = fixture(|r| r.with_network(Some("host".to_string())));
        let engine = RecordingEngine::default();
        let log = BuildLog::silent();
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        lifecycle.execute().await.unwrap();

        let specs = engine.specs();
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert_eq!(spec.image, f.builder.name().to_string());
        assert_eq!(
            spec.command,
            vec![
                "/cnb/lifecycle/creator",
                "-app",
                "/workspace",
                "-platform",
                "/platform",
                "-run-image",
                "docker.io/cloudfoundry/run:base-cnb",
                "-layers",
                "/layers",
                "-cache-dir",
                "/cache",
                "-launch-cache",
                "/launch-cache",
                "-daemon",
                "-process-type=web",
                "docker.io/library/my-app:latest",
            ]
        );
        assert_eq!(
            spec.env.get("CNB_PLATFORM_API").map(String::as_str),
            Some("0.4")
        );
        assert_eq!(spec.network.as_deref(), Some("host"));
        assert_eq!(spec.user.as_deref(), Some("root"));
        assert!(spec
            .binds
            .iter()
            .any(|b| b == &format!("{}:/cache", lifecycle.build_cache_volume())));
    }

    #[tokio::test]
    async fn clean_cache_deletes_build_cache_and_skips_restore() {
        let f = fixture(|r| r.with_clean_cache(true));
        let engine = RecordingEngine::default();
        let log = BuildLog::silent();
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        lifecycle.execute().await.unwrap();

        let events = engine.events();
        assert_eq!(
            events[0],
            format!("volume-rm {}", lifecycle.build_cache_volume())
        );
        assert!(engine.specs()[0].command.contains(&"-skip-restore".to_string()));
    }

    #[tokio::test]
    async fn verbose_logging_adds_log_level() {
        let f = fixture(|r| r.with_verbose_logging(true));
        let engine = RecordingEngine::default();
        let log = BuildLog::silent();
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        lifecycle.execute().await.unwrap();
        let command = &engine.specs()[0].command;
        assert_eq!(command[1], "-log-level");
        assert_eq!(command[2], "debug");
    }

    #[tokio::test]
    async fn lifecycle_is_single_use() {
        let f = fixture(|r| r);
        let engine = RecordingEngine::default();
        let log = BuildLog::silent();
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        lifecycle.execute().await.unwrap();
        let err = lifecycle.execute().await.unwrap_err();
        assert!(matches!(err, OsrcError::LifecycleAlreadyExecuted));
        assert_eq!(engine.specs().len(), 1);
    }

    #[tokio::test]
    async fn application_content_uploaded_to_workspace() {
        let f = fixture(|r| r);
        let engine = RecordingEngine::default();
        let log = BuildLog::silent();
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        lifecycle.execute().await.unwrap();
        let uploads = engine.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "/workspace");
        assert!(uploads[0].1 > 0);
    }

    #[tokio::test]
    async fn failing_phase_reports_code_and_removes_container() {
        let f = fixture(|r| r);
        let engine = RecordingEngine {
            exit_code: 9,
            ..Default::default()
        };
        let log = BuildLog::silent();
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        let err = lifecycle.execute().await.unwrap_err();
        match err {
            OsrcError::BuilderPhase { phase, code } => {
                assert_eq!(phase, "creator");
                assert_eq!(code, 9);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(engine.events().contains(&"rm container-1".to_string()));
    }

    #[tokio::test]
    async fn start_failure_still_removes_container() {
        let f = fixture(|r| r);
        let engine = RecordingEngine {
            fail_start: true,
            ..Default::default()
        };
        let log = BuildLog::silent();
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        assert!(lifecycle.execute().await.is_err());
        let events = engine.events();
        assert_eq!(events.last().map(String::as_str), Some("rm container-1"));
        assert!(!events.iter().any(|e| e.starts_with("wait")));
    }

    #[tokio::test]
    async fn logs_are_forwarded_while_waiting() {
        let f = fixture(|r| r);
        let engine = RecordingEngine {
            log_lines: vec!["===> DETECTING".to_string(), "===> BUILDING".to_string()],
            ..Default::default()
        };
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let log = BuildLog::new(move |phase, line| {
            sink.lock().unwrap().push(format!("{}: {}", phase, line));
        });
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        lifecycle.execute().await.unwrap();
        assert_eq!(
            *lines.lock().unwrap(),
            vec!["creator: ===> DETECTING", "creator: ===> BUILDING"]
        );
    }

    #[tokio::test]
    async fn close_keeps_cache_volumes() {
        let f = fixture(|r| r);
        let engine = RecordingEngine::default();
        let log = BuildLog::silent();
        let mut lifecycle = Lifecycle::new(&log, &engine, &f.request, &f.builder).unwrap();
        lifecycle.execute().await.unwrap();
        lifecycle.close().await.unwrap();

        let deleted: Vec<String> = engine
            .events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("volume-rm ").map(String::from))
            .collect();
        assert_eq!(deleted.len(), 2);
        assert!(deleted.iter().all(|v| v.starts_with("pack-layers-") || v.starts_with("pack-app-")));
        assert!(!deleted.iter().any(|v| v.starts_with("pack-cache-")));
    }

    #[test]
    fn cache_volumes_follow_image_name() {
        let a = fixture(|r| r);
        let b = fixture(|r| r);
        let engine = RecordingEngine::default();
        let log = BuildLog::silent();
        let first = Lifecycle::new(&log, &engine, &a.request, &a.builder).unwrap();
        let second = Lifecycle::new(&log, &engine, &b.request, &b.builder).unwrap();
        assert_eq!(first.build_cache_volume(), second.build_cache_volume());
        assert!(first
            .launch_cache_volume()
            .as_str()
            .ends_with(".launch"));
        assert_ne!(first.layers_volume, second.layers_volume);
    }
}
