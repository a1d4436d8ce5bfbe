//! Layers command - list or extract the layers of a packaged archive

use crate::cli::args::{LayersAction, LayersArgs, OutputFormat};
use crate::config::Config;
use crate::error::{OsrcError, OsrcResult};
use crate::layer::{IndexedLayers, LayeredArchive};
use crate::ui::{self, UiContext};
use console::style;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Execute the layers command
pub async fn execute(args: LayersArgs, _config: &Config) -> OsrcResult<()> {
    match args.action {
        LayersAction::List { archive, format } => list(&archive, format),
        LayersAction::Extract {
            archive,
            destination,
            layers,
        } => extract(&archive, destination, &layers),
    }
}

fn list(archive: &Path, format: OutputFormat) -> OsrcResult<()> {
    let archive = LayeredArchive::open(archive)?;
    let layers = archive.layers();
    match format {
        OutputFormat::Plain => {
            for name in layers.names() {
                println!("{}", name);
            }
        }
        OutputFormat::Json => print_json(layers)?,
        OutputFormat::Table => print_table(layers),
    }
    Ok(())
}

fn print_table(layers: &IndexedLayers) {
    println!("{:<32} {}", style("LAYER").bold(), style("CONTENTS").bold());
    println!("{}", "-".repeat(48));
    for (name, contents) in layers.entries() {
        println!("{:<32} {}", name, contents.len());
    }
}

fn print_json(layers: &IndexedLayers) -> OsrcResult<()> {
    let value: Vec<_> = layers
        .entries()
        .iter()
        .map(|(name, contents)| json!({ "name": name, "contents": contents }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn extract(archive_path: &Path, destination: Option<PathBuf>, layers: &[String]) -> OsrcResult<()> {
    let ctx = UiContext::detect();
    let destination = match destination {
        Some(path) => path,
        None => std::env::current_dir()
            .map_err(|e| OsrcError::io("getting current directory", e))?,
    };

    let mut archive = LayeredArchive::open(archive_path)?;
    let written = archive.extract(&destination, layers)?;
    ui::step_ok_detail(
        &ctx,
        &format!("Extracted {} file(s)", written),
        &destination.display().to_string(),
    );
    Ok(())
}
