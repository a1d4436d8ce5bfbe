//! osrc - executable archive packager and buildpack image builder
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use osrc::cli::{Cli, Commands, LogFormat};
use osrc::config::{Config, ConfigManager};
use osrc::error::{OsrcError, OsrcResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => exit_code(code),
        Err(OsrcError::LaunchSelection(message)) => {
            println!("{}", message);
            exit_code(-1)
        }
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            exit_code(e.exit_code())
        }
    }
}

/// Process exit status from a signed code, `-1` becoming 255
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}

async fn run() -> OsrcResult<i32> {
    let cli = Cli::parse();

    // Completions need neither logging nor configuration
    if let Commands::Completions(args) = cli.command {
        osrc::cli::commands::completions(args)?;
        return Ok(0);
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| OsrcError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(&cli, &config);
    match local_config_path {
        Some(ref path) => debug!("Found local config: {}", path.display()),
        None if cli.no_local => debug!("Local config discovery disabled (--no-local)"),
        None => {}
    }

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Package(args) => osrc::cli::commands::package(args, &config).await.map(|_| 0),
        Commands::Layers(args) => osrc::cli::commands::layers(args, &config).await.map(|_| 0),
        Commands::Launch(args) => osrc::cli::commands::launch(args, &config).await,
        Commands::BuildImage(args) => {
            osrc::cli::commands::build_image(args, &config).await.map(|_| 0)
        }
        Commands::Scan(args) => osrc::cli::commands::scan(args, &config).await.map(|_| 0),
        Commands::Config(args) => osrc::cli::commands::config(args, &config, &config_manager)
            .await
            .map(|_| 0),
    }
}

/// 0 = warn (spinners only), 1 = info, 2+ = debug; `general.verbose` counts as 1
fn init_logging(cli: &Cli, config: &Config) {
    let level = match cli.verbose {
        0 if config.general.verbose => 1,
        n => n,
    };
    let filter = match level {
        0 => EnvFilter::new("osrc=warn"),
        1 => EnvFilter::new("osrc=info"),
        _ => EnvFilter::new("osrc=debug"),
    };

    let json = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.general.log_format.eq_ignore_ascii_case("json"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
