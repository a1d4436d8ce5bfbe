//! Scan command - report main classes under a classes directory

use crate::cli::args::{OutputFormat, ScanArgs};
use crate::config::Config;
use crate::error::OsrcResult;
use crate::package::PodClassifier;
use crate::scan::{select_main_classes, MainClassFinder};
use crate::ui::{self, UiContext};
use console::style;
use serde_json::json;

/// Execute the scan command
pub async fn execute(args: ScanArgs, config: &Config) -> OsrcResult<()> {
    let markers = PodClassifier::from_names(
        &config.package.service_markers,
        &config.package.task_markers,
    )
    .marker_names();
    let found = MainClassFinder::new().find_in_directory(&args.root)?;
    let total = found.len();
    let selected = select_main_classes(found, &markers)?;

    match args.format {
        OutputFormat::Plain => {
            for class in &selected {
                println!("{}", class.name);
            }
        }
        OutputFormat::Json => {
            let value: Vec<_> = selected
                .iter()
                .map(|c| json!({ "name": c.name, "annotations": c.annotation_names }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::section(&ctx, "Main classes");
            for class in &selected {
                let marked = class.has_any(&markers);
                let note = if marked {
                    style("marked").green()
                } else {
                    style("unmarked").dim()
                };
                println!("  {:<60} {}", class.name, note);
            }
            println!();
            println!("{} of {} main class(es) selected", selected.len(), total);
        }
    }
    Ok(())
}
