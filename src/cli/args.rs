//! CLI argument definitions using clap derive

use crate::library::{Library, LibraryScope};
use crate::package::Layout;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// osrc - executable archive packager and buildpack image builder
///
/// Repackages jars and wars into layered executable archives, launches
/// them, and builds OCI images from them with Cloud Native Buildpacks.
#[derive(Parser, Debug)]
#[command(name = "osrc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "OSRC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .osrc.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Log output format (overrides general.log_format)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Repackage a jar or war into an executable archive
    Package(PackageArgs),

    /// Inspect or extract the layers of a layered archive
    Layers(LayersArgs),

    /// Run the entry point of a packaged archive
    Launch(LaunchArgs),

    /// Build an OCI image from a packaged archive with buildpacks
    BuildImage(BuildImageArgs),

    /// Find main classes in a directory of compiled classes
    Scan(ScanArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the package command
#[derive(Parser, Debug)]
pub struct PackageArgs {
    /// Archive to repackage, or an expanded directory (requires --dest)
    pub source: PathBuf,

    /// Write here instead of replacing the source
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Archive layout (deduced from the file name by default)
    #[arg(long, value_enum)]
    pub layout: Option<LayoutArg>,

    /// Write a layers index
    #[arg(long)]
    pub layered: bool,

    /// Fixed timestamps and sorted entries
    #[arg(long)]
    pub reproducible: bool,

    /// Library to nest, as PATH[:scope] (compile, runtime, provided, custom)
    #[arg(short, long = "library", value_parser = parse_library)]
    pub libraries: Vec<Library>,

    /// Application name recorded in the descriptor
    #[arg(long)]
    pub name: Option<String>,

    /// Use this main class instead of scanning
    #[arg(long)]
    pub main_class: Option<String>,

    /// Archive whose classes are copied in as the loader
    #[arg(long)]
    pub loader_jar: Option<PathBuf>,

    /// Do not keep <source>.original when repackaging in place
    #[arg(long)]
    pub no_backup: bool,
}

/// Layout values accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    Jar,
    War,
    Expanded,
    None,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Jar => Layout::Jar,
            LayoutArg::War => Layout::War,
            LayoutArg::Expanded => Layout::Expanded,
            LayoutArg::None => Layout::None,
        }
    }
}

/// Arguments for the layers command
#[derive(Parser, Debug)]
pub struct LayersArgs {
    #[command(subcommand)]
    pub action: LayersAction,
}

/// Layers subcommands
#[derive(Subcommand, Debug)]
pub enum LayersAction {
    /// List layers in index order
    List {
        /// Layered archive
        archive: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "plain")]
        format: OutputFormat,
    },

    /// Extract entries into one directory per layer
    Extract {
        /// Layered archive
        archive: PathBuf,

        /// Destination directory (defaults to current directory)
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Layers to extract (all when omitted)
        layers: Vec<String>,
    },
}

/// Arguments for the launch command
#[derive(Parser, Debug)]
pub struct LaunchArgs {
    /// Packaged archive
    pub archive: PathBuf,

    /// Print the java command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Java executable (overrides launcher.java)
    #[arg(long)]
    pub java: Option<String>,

    /// Arguments for the application, `--osrc.main=<class>` selects a task
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Arguments for the build-image command
#[derive(Parser, Debug)]
pub struct BuildImageArgs {
    /// Packaged archive
    pub archive: PathBuf,

    /// Name of the image to build
    #[arg(short, long)]
    pub image: String,

    /// Builder image (overrides buildpack.builder)
    #[arg(long)]
    pub builder: Option<String>,

    /// Run image (taken from the builder by default)
    #[arg(long)]
    pub run_image: Option<String>,

    /// Network the build container joins
    #[arg(long)]
    pub network: Option<String>,

    /// Delete the build cache first
    #[arg(long)]
    pub clean_cache: bool,

    /// Volume binding, source:destination[:options]
    #[arg(long = "binding")]
    pub bindings: Vec<String>,

    /// Environment for buildpacks (KEY=VALUE)
    #[arg(short, long, value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// Container engine: auto, podman or docker
    #[arg(long)]
    pub engine: Option<String>,
}

/// Arguments for the scan command
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Root of a compiled classes directory
    pub root: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., buildpack.builder)
        key: String,

        /// Value to set
        value: String,

        /// Write to project-local .osrc.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Parse environment variable in KEY=VALUE format
fn parse_env_var(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Parse `PATH[:scope]`; a suffix that is not a scope stays part of the path
fn parse_library(s: &str) -> Result<Library, String> {
    if s.is_empty() {
        return Err("library path is empty".to_string());
    }
    if let Some((path, scope)) = s.rsplit_once(':') {
        if let Ok(scope) = scope.parse::<LibraryScope>() {
            if path.is_empty() {
                return Err(format!("no path before scope in '{s}'"));
            }
            return Ok(Library::new(path, scope));
        }
    }
    Ok(Library::new(s, LibraryScope::Compile))
}
