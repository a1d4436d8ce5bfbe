//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_FILE};
use crate::error::{OsrcError, OsrcResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;
use tokio::fs;

const VALID_KEYS: &[&str] = &[
    "general.verbose",
    "general.log_format",
    "package.layout",
    "package.layered",
    "package.reproducible",
    "package.loader_jar",
    "package.backup",
    "package.service_markers",
    "package.task_markers",
    "buildpack.engine",
    "buildpack.builder",
    "buildpack.run_image",
    "buildpack.network",
    "buildpack.clean_cache",
    "buildpack.verbose_logging",
    "buildpack.bindings",
    "buildpack.daemon_socket",
    "launcher.java",
    "launcher.extract_dir",
];

/// Keys stored as comma-separated lists
const LIST_KEYS: &[&str] = &[
    "package.service_markers",
    "package.task_markers",
    "buildpack.bindings",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> OsrcResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            if local {
                set_local_value(&key, &value).await?
            } else {
                set_value(manager, &key, &value).await?
            }
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> OsrcResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> OsrcResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );

    Ok(())
}

/// Set a key in the global file, leaving the project-local layer out of it
async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> OsrcResult<()> {
    let ctx = UiContext::detect();
    let mut config = manager.load().await?;

    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        ["general", "verbose"] => config.general.verbose = parse_bool(value)?,
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,

        ["package", "layout"] => {
            let layout: crate::package::Layout = value.parse()?;
            config.package.layout = Some(layout.to_string());
        }
        ["package", "layered"] => config.package.layered = parse_bool(value)?,
        ["package", "reproducible"] => config.package.reproducible = parse_bool(value)?,
        ["package", "loader_jar"] => config.package.loader_jar = Some(PathBuf::from(value)),
        ["package", "backup"] => config.package.backup = parse_bool(value)?,
        ["package", "service_markers"] => config.package.service_markers = parse_list(value),
        ["package", "task_markers"] => config.package.task_markers = parse_list(value),

        ["buildpack", "engine"] => {
            crate::orchestration::EnginePreference::parse(value)?;
            config.buildpack.engine = value.to_lowercase();
        }
        ["buildpack", "builder"] => config.buildpack.builder = value.to_string(),
        ["buildpack", "run_image"] => config.buildpack.run_image = Some(value.to_string()),
        ["buildpack", "network"] => config.buildpack.network = Some(value.to_string()),
        ["buildpack", "clean_cache"] => config.buildpack.clean_cache = parse_bool(value)?,
        ["buildpack", "verbose_logging"] => {
            config.buildpack.verbose_logging = parse_bool(value)?
        }
        ["buildpack", "bindings"] => config.buildpack.bindings = parse_list(value),
        ["buildpack", "daemon_socket"] => config.buildpack.daemon_socket = value.to_string(),

        ["launcher", "java"] => config.launcher.java = value.to_string(),
        ["launcher", "extract_dir"] => config.launcher.extract_dir = Some(PathBuf::from(value)),

        _ => {
            ui::step_error_detail(&ctx, "Unknown config key", key);
            print_valid_keys();
            return Ok(());
        }
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));

    Ok(())
}

async fn set_local_value(key: &str, value: &str) -> OsrcResult<()> {
    let ctx = UiContext::detect();

    let cwd =
        std::env::current_dir().map_err(|e| OsrcError::io("getting current directory", e))?;
    let local_path = cwd.join(LOCAL_CONFIG_FILE);

    validate_config_key(key)?;

    let mut doc: toml::Value = if local_path.exists() {
        let content = fs::read_to_string(&local_path)
            .await
            .map_err(|e| OsrcError::io(format!("reading {}", local_path.display()), e))?;
        content
            .parse()
            .map_err(|e: toml::de::Error| OsrcError::ConfigInvalid {
                path: local_path.clone(),
                reason: e.to_string(),
            })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, value)?;

    // Only the keys set here end up in the local file
    let content = toml::to_string_pretty(&doc)?;
    fs::write(&local_path, content)
        .await
        .map_err(|e| OsrcError::io(format!("writing {}", local_path.display()), e))?;

    ui::step_ok(
        &ctx,
        &format!("Set {} = {} in {}", key, value, local_path.display()),
    );

    Ok(())
}

fn validate_config_key(key: &str) -> OsrcResult<()> {
    if VALID_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(OsrcError::User(format!("Unknown config key: {}", key)))
    }
}

/// Set a dot-separated key in a TOML value tree, creating intermediate tables as needed
fn set_toml_value(doc: &mut toml::Value, key: &str, value: &str) -> OsrcResult<()> {
    let (path, leaf) = match key.rsplit_once('.') {
        Some((path, leaf)) => (Some(path), leaf),
        None => (None, key),
    };

    let mut current = doc;
    for part in path.into_iter().flat_map(|p| p.split('.')) {
        current = current
            .as_table_mut()
            .ok_or_else(|| OsrcError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    let table = current
        .as_table_mut()
        .ok_or_else(|| OsrcError::User(format!("Expected table for key: {}", key)))?;

    let toml_value = if LIST_KEYS.contains(&key) {
        toml::Value::Array(parse_list(value).into_iter().map(toml::Value::String).collect())
    } else if let Ok(flag) = value.parse::<bool>() {
        toml::Value::Boolean(flag)
    } else {
        toml::Value::String(value.to_string())
    };

    table.insert(leaf.to_string(), toml_value);
    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> OsrcResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(OsrcError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_log_format(value: &str) -> OsrcResult<String> {
    match value.to_lowercase().as_str() {
        format @ ("text" | "json") => Ok(format.to_string()),
        _ => Err(OsrcError::User(format!(
            "Invalid log format: {}. Use text/json",
            value
        ))),
    }
}

fn print_valid_keys() {
    eprintln!("Valid keys:");
    for key in VALID_KEYS {
        eprintln!("  {}", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_toml_value_creates_tables() {
        let mut doc = toml::Value::Table(toml::map::Map::new());
        set_toml_value(&mut doc, "buildpack.network", "host").unwrap();
        set_toml_value(&mut doc, "package.layered", "true").unwrap();
        set_toml_value(&mut doc, "package.task_markers", "a.Task, b.Task,").unwrap();

        assert_eq!(doc["buildpack"]["network"].as_str(), Some("host"));
        assert_eq!(doc["package"]["layered"].as_bool(), Some(true));
        assert_eq!(
            doc["package"]["task_markers"].as_array().map(Vec::len),
            Some(2)
        );
        let config: Config = doc.try_into().unwrap();
        assert!(config.package.layered);
    }

    #[test]
    fn validate_rejects_unknown_keys() {
        assert!(validate_config_key("launcher.java").is_ok());
        assert!(validate_config_key("vm.name").is_err());
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("yes").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[tokio::test]
    async fn set_value_persists_to_global_file() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("config.toml"));
        set_value(&manager, "buildpack.engine", "Docker").await.unwrap();
        set_value(&manager, "package.layout", "war").await.unwrap();

        let config = manager.load().await.unwrap();
        assert_eq!(config.buildpack.engine, "docker");
        assert_eq!(config.package.layout.as_deref(), Some("war"));
        assert!(set_value(&manager, "buildpack.engine", "lxc").await.is_err());
    }
}
