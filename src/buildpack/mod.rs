//! Cloud Native Buildpacks image builds
//!
//! A packaged archive is turned into an OCI image by running the builder's
//! `creator` phase in a container. [`Builder`] prepares the images and an
//! ephemeral builder, [`Lifecycle`] runs the phase against managed volumes.

pub mod build;
pub mod builder;
pub mod content;
pub mod lifecycle;
pub mod log;
pub mod phase;
pub mod request;
pub mod version;
pub mod volume;

pub use build::Builder;
pub use builder::{BuildOwner, BuilderMetadata, EphemeralBuilder};
pub use lifecycle::Lifecycle;
pub use log::{BuildLog, ImageKind};
pub use phase::Phase;
pub use request::{Binding, BuildRequest, ImageReference, DEFAULT_BUILDER};
pub use version::{ApiVersion, ApiVersions, LifecycleVersion};
pub use volume::VolumeName;

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory engine that records what the lifecycle asks of it

    use crate::error::{OsrcError, OsrcResult};
    use crate::orchestration::{ContainerContent, ContainerEngine, ContainerSpec, ImageConfig};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    pub const METADATA: &str = r#"{
        "stack": {"runImage": {"image": "cloudfoundry/run:base-cnb", "mirrors": []}},
        "lifecycle": {
            "version": "0.7.2",
            "api": {"buildpack": "0.2", "platform": "0.3"},
            "apis": {"platform": {"deprecated": [], "supported": ["0.3", "0.4"]}}
        },
        "createdBy": {"name": "Pack CLI", "version": "v0.9.0"}
    }"#;

    pub fn write_app_jar(dir: &Path) -> PathBuf {
        let path = dir.join("app.jar");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("BOOT-INF/classes/a/App.class", FileOptions::default())
            .unwrap();
        writer.write_all(b"class").unwrap();
        writer.finish().unwrap();
        path
    }

    #[derive(Default)]
    pub struct RecordingEngine {
        pub exit_code: i64,
        pub fail_start: bool,
        pub log_lines: Vec<String>,
        pub(crate) events: Mutex<Vec<String>>,
        pub(crate) specs: Mutex<Vec<ContainerSpec>>,
        pub(crate) uploads: Mutex<Vec<(String, usize)>>,
        pub(crate) images: Mutex<HashMap<String, ImageConfig>>,
        pub(crate) pullable: Mutex<HashMap<String, ImageConfig>>,
        pub(crate) containers: AtomicUsize,
    }

    impl RecordingEngine {
        pub fn add_image(&self, name: &str, config: ImageConfig) {
            self.images.lock().unwrap().insert(name.to_string(), config);
        }

        pub fn add_pullable(&self, name: &str, config: ImageConfig) {
            self.pullable.lock().unwrap().insert(name.to_string(), config);
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        pub fn specs(&self) -> Vec<ContainerSpec> {
            self.specs.lock().unwrap().clone()
        }

        pub fn uploads(&self) -> Vec<(String, usize)> {
            self.uploads.lock().unwrap().clone()
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl ContainerEngine for RecordingEngine {
        async fn is_available(&self) -> OsrcResult<bool> {
            Ok(true)
        }

        async fn image_exists(&self, image: &str) -> OsrcResult<bool> {
            Ok(self.images.lock().unwrap().contains_key(image))
        }

        async fn pull(&self, image: &str) -> OsrcResult<()> {
            self.record(format!("pull {}", image));
            let pulled = self.pullable.lock().unwrap().remove(image);
            match pulled {
                Some(config) => {
                    self.add_image(image, config);
                    Ok(())
                }
                None => Err(OsrcError::ImagePull {
                    image: image.to_string(),
                    reason: "not found".to_string(),
                }),
            }
        }

        async fn inspect_image(&self, image: &str) -> OsrcResult<ImageConfig> {
            self.images
                .lock()
                .unwrap()
                .get(image)
                .cloned()
                .ok_or_else(|| OsrcError::command_exec("image inspect", "no such image"))
        }

        async fn build_image(&self, context: &Path, tag: &str) -> OsrcResult<()> {
            assert!(context.join("Containerfile").is_file());
            self.record(format!("build {}", tag));
            Ok(())
        }

        async fn remove_image(&self, image: &str) -> OsrcResult<()> {
            self.record(format!("rmi {}", image));
            Ok(())
        }

        async fn create(
            &self,
            spec: &ContainerSpec,
            content: &[ContainerContent],
        ) -> OsrcResult<String> {
            let id = format!(
                "container-{}",
                self.containers.fetch_add(1, Ordering::SeqCst) + 1
            );
            self.record(format!("create {}", id));
            self.specs.lock().unwrap().push(spec.clone());
            for item in content {
                self.uploads
                    .lock()
                    .unwrap()
                    .push((item.destination.clone(), item.archive.len()));
            }
            Ok(id)
        }

        async fn start(&self, container_id: &str) -> OsrcResult<()> {
            self.record(format!("start {}", container_id));
            if self.fail_start {
                return Err(OsrcError::ContainerStart("refused".to_string()));
            }
            Ok(())
        }

        async fn logs(
            &self,
            container_id: &str,
            on_line: &(dyn Fn(String) + Send + Sync),
        ) -> OsrcResult<()> {
            self.record(format!("logs {}", container_id));
            for line in &self.log_lines {
                on_line(line.clone());
            }
            Ok(())
        }

        async fn wait(&self, container_id: &str) -> OsrcResult<i64> {
            self.record(format!("wait {}", container_id));
            Ok(self.exit_code)
        }

        async fn remove(&self, container_id: &str) -> OsrcResult<()> {
            self.record(format!("rm {}", container_id));
            Ok(())
        }

        async fn delete_volume(&self, name: &str) -> OsrcResult<()> {
            self.record(format!("volume-rm {}", name));
            Ok(())
        }

        fn engine_name(&self) -> &'static str {
            "Recording"
        }
    }
}
