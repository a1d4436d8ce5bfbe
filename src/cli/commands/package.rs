//! Package command - repackage an archive into an executable one

use crate::cli::args::PackageArgs;
use crate::config::schema::LayersConfig;
use crate::config::Config;
use crate::error::OsrcResult;
use crate::layer::LayerRules;
use crate::package::{Layout, PackageReport, Packager, PodClassifier, ProjectInfo, Repackager};
use crate::ui::{self, UiContext};
use tracing::debug;

/// Execute the package command
pub async fn execute(args: PackageArgs, config: &Config) -> OsrcResult<()> {
    let ctx = UiContext::detect();
    let backup = config.package.backup && !args.no_backup;
    let destination = args.dest.clone();
    let libraries = args.libraries.clone();
    let repackager = Repackager::new(packager(args, config)?).with_backup(backup);

    match repackager.repackage(destination.as_deref(), libraries)? {
        Some(report) => print_report(&ctx, &report),
        None => ui::step_info(&ctx, "Archive is already repackaged, nothing to do"),
    }
    Ok(())
}

/// Packager from command line flags layered over `[package]` and `[layers]`
fn packager(args: PackageArgs, config: &Config) -> OsrcResult<Packager> {
    let settings = &config.package;
    let mut packager = Packager::new(&args.source)?
        .with_reproducible(args.reproducible || settings.reproducible)
        .with_loader_jar(args.loader_jar.or_else(|| settings.loader_jar.clone()))
        .with_main_class(args.main_class)
        .with_pod_classifier(PodClassifier::from_names(
            &settings.service_markers,
            &settings.task_markers,
        ));

    let layout = match (args.layout, settings.layout.as_deref()) {
        (Some(layout), _) => Some(Layout::from(layout)),
        (None, Some(configured)) => Some(configured.parse()?),
        (None, None) => None,
    };
    if let Some(layout) = layout {
        packager = packager.with_layout(layout);
    }

    if args.layered || settings.layered {
        let rules = if config.layers == LayersConfig::default() {
            LayerRules::standard()
        } else {
            debug!("Using layer rules from configuration");
            LayerRules::from_config(&config.layers)?
        };
        packager = packager.with_layers(rules);
    }

    if let Some(name) = args.name {
        let artifact = args
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        packager = packager.with_project(ProjectInfo {
            name,
            artifact,
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        });
    }

    Ok(packager)
}

fn print_report(ctx: &UiContext, report: &PackageReport) {
    ui::step_ok_detail(
        ctx,
        "Packaged executable archive",
        &report.destination.display().to_string(),
    );
    ui::key_value(ctx, "layout", &report.layout.to_string());
    ui::key_value(ctx, "entries", &report.entries.to_string());
    ui::key_value(ctx, "libraries", &report.libraries.len().to_string());
    if let Some(service) = report.pods.service() {
        ui::key_value(ctx, "service", &service.entry);
    }
    for task in report.pods.tasks() {
        ui::key_value(ctx, "task", &task.entry);
    }
    if let Some(ref layers) = report.layers {
        let names: Vec<&str> = layers.iter().map(|(layer, _)| layer.name()).collect();
        ui::key_value(ctx, "layers", &names.join(", "));
    }
}
