//! Build-image command - turn a packaged archive into an OCI image

use crate::buildpack::{Binding, BuildLog, BuildRequest, Builder, ImageReference};
use crate::cli::args::BuildImageArgs;
use crate::config::Config;
use crate::error::{OsrcError, OsrcResult};
use crate::orchestration::{create_engine, EnginePreference};
use crate::ui::{self, PhaseProgress, TaskSpinner, UiContext};
use std::sync::Arc;
use tracing::debug;

/// Execute the build-image command
pub async fn execute(args: BuildImageArgs, config: &Config) -> OsrcResult<()> {
    let ctx = UiContext::detect();
    let preference = EnginePreference::parse(
        args.engine
            .as_deref()
            .unwrap_or(&config.buildpack.engine),
    )?;
    let request = build_request(args, config)?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Looking for a container engine...");
    let engine = match create_engine(preference).await {
        Ok(engine) => engine,
        Err(e) => {
            spinner.stop_error("No container engine available");
            return Err(e);
        }
    };
    spinner.stop(&format!("Using {}", engine.engine_name()));

    let name = request.name().to_string();
    let progress = Arc::new(PhaseProgress::new(
        &ctx,
        request.is_verbose_logging() || config.general.verbose,
    ));
    let sink = Arc::clone(&progress);
    let log = BuildLog::new(move |phase, line| sink.on_line(phase, &line));

    let result = Builder::new(engine.as_ref())
        .with_log(log)
        .build(request)
        .await;
    progress.finish();

    match result {
        Ok(()) => {
            ui::step_ok_detail(&ctx, "Image built", &name);
            Ok(())
        }
        Err(e) => {
            ui::step_error_detail(&ctx, "Image build failed", &name);
            Err(e)
        }
    }
}

/// Request from command line flags layered over `[buildpack]`
fn build_request(args: BuildImageArgs, config: &Config) -> OsrcResult<BuildRequest> {
    let settings = &config.buildpack;
    let name = ImageReference::parse(&args.image)?;
    let builder = ImageReference::parse(args.builder.as_deref().unwrap_or(&settings.builder))?;

    let bindings = settings
        .bindings
        .iter()
        .chain(args.bindings.iter())
        .map(|b| Binding::parse(b))
        .collect::<OsrcResult<Vec<_>>>()?;

    let mut request = BuildRequest::for_archive(name, &args.archive)?
        .with_builder(builder)
        .with_clean_cache(args.clean_cache || settings.clean_cache)
        .with_verbose_logging(settings.verbose_logging)
        .with_network(args.network.or_else(|| settings.network.clone()))
        .with_bindings(bindings)
        .with_daemon_socket(settings.daemon_socket.clone());

    if let Some(run_image) = args.run_image.as_deref().or(settings.run_image.as_deref()) {
        request = request.with_run_image(ImageReference::parse(run_image)?);
    }
    for (key, value) in settings.env.iter() {
        request = request.with_env(key.clone(), value.clone());
    }
    for (key, value) in args.env {
        if key.is_empty() {
            return Err(OsrcError::User("Environment variable name is empty".to_string()));
        }
        request = request.with_env(key, value);
    }

    debug!(
        "Build request for {} using builder {}",
        request.name(),
        request.builder()
    );
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildpack::testing::write_app_jar;
    use tempfile::TempDir;

    fn args(archive: std::path::PathBuf) -> BuildImageArgs {
        BuildImageArgs {
            archive,
            image: "my-app".to_string(),
            builder: None,
            run_image: None,
            network: None,
            clean_cache: false,
            bindings: vec![],
            env: vec![("BP_JVM_VERSION".to_string(), "17".to_string())],
            engine: None,
        }
    }

    #[test]
    fn request_merges_flags_over_config() {
        let temp = TempDir::new().unwrap();
        let jar = write_app_jar(temp.path());
        let mut config = Config::default();
        config.buildpack.network = Some("host".to_string());
        config.buildpack.bindings = vec!["/certs:/platform/bindings/certs".to_string()];
        config
            .buildpack
            .env
            .insert("BP_JVM_VERSION".to_string(), "11".to_string());

        let mut args = args(jar);
        args.bindings = vec!["/m2:/home/cnb/.m2:rw".to_string()];
        let request = build_request(args, &config).unwrap();

        assert_eq!(request.name().to_string(), "docker.io/library/my-app:latest");
        assert_eq!(
            request.builder().to_string(),
            "docker.io/paketobuildpacks/builder:base"
        );
        assert_eq!(request.network(), Some("host"));
        assert_eq!(request.bindings().len(), 2);
        assert_eq!(
            request.env().get("BP_JVM_VERSION").map(String::as_str),
            Some("17")
        );
        assert!(request.run_image().is_none());
    }

    #[test]
    fn request_rejects_missing_archive() {
        let temp = TempDir::new().unwrap();
        let err = build_request(args(temp.path().join("missing.jar")), &Config::default())
            .unwrap_err();
        assert!(matches!(err, OsrcError::SourceInvalid(_)));
    }
}
