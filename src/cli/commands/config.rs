//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_NAME};
use crate::error::{ArtcacheError, ArtcacheResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;
use tokio::fs;

/// Every key `config set` accepts
const VALID_KEYS: &[&str] = &[
    "general.verbose",
    "general.log_format",
    "cache.root",
    "cache.workers",
    "cache.jars.enabled",
    "cache.aars.enabled",
    "cache.aars.merge",
    "fetch.timeout_secs",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> ArtcacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
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

fn show_config(config: &Config) -> ArtcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ArtcacheResult<()> {
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
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());

    Ok(())
}

/// Update one key of the global config file
///
/// Reads the global file alone; merged local values are never written back.
async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> ArtcacheResult<()> {
    let ctx = UiContext::detect();
    let mut config = manager.load().await?;

    match key.split('.').collect::<Vec<_>>().as_slice() {
        ["general", "verbose"] => config.general.verbose = parse_bool(value)?,
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,
        ["cache", "root"] => config.cache.root = Some(PathBuf::from(value)),
        ["cache", "workers"] => config.cache.workers = parse_number(value)?,
        ["cache", "jars", "enabled"] => config.cache.jars.enabled = parse_bool(value)?,
        ["cache", "aars", "enabled"] => config.cache.aars.enabled = parse_bool(value)?,
        ["cache", "aars", "merge"] => config.cache.aars.merge = parse_bool(value)?,
        ["fetch", "timeout_secs"] => config.fetch.timeout_secs = parse_number(value)?,
        _ => {
            ui::step_error_detail(&ctx, "Unknown config key", key);
            ui::remark(&ctx, &format!("Valid keys: {}", VALID_KEYS.join(", ")));
            return Err(ArtcacheError::User(format!("Unknown config key: {}", key)));
        }
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));

    Ok(())
}

async fn set_local_value(key: &str, value: &str) -> ArtcacheResult<()> {
    let ctx = UiContext::detect();
    if !VALID_KEYS.contains(&key) {
        return Err(ArtcacheError::User(format!("Unknown config key: {}", key)));
    }

    let cwd = std::env::current_dir().map_err(|e| ArtcacheError::io("getting current directory", e))?;
    let local_path = cwd.join(LOCAL_CONFIG_NAME);

    let mut doc: toml::Value = if local_path.exists() {
        let content = fs::read_to_string(&local_path)
            .await
            .map_err(|e| ArtcacheError::io(format!("reading {}", local_path.display()), e))?;
        content.parse().map_err(|e: toml::de::Error| ArtcacheError::ConfigInvalid {
            path: local_path.clone(),
            reason: e.to_string(),
        })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, value)?;

    // Only the keys set explicitly
    let content = toml::to_string_pretty(&doc)?;
    fs::write(&local_path, content)
        .await
        .map_err(|e| ArtcacheError::io(format!("writing {}", local_path.display()), e))?;

    ui::step_ok(&ctx, &format!("Set {} = {} in {}", key, value, local_path.display()));
    Ok(())
}

/// Set a dot-separated key, creating intermediate tables as needed
fn set_toml_value(doc: &mut toml::Value, key: &str, value: &str) -> ArtcacheResult<()> {
    let (parents, leaf) = match key.rsplit_once('.') {
        Some((parents, leaf)) => (parents.split('.').collect::<Vec<_>>(), leaf),
        None => (Vec::new(), key),
    };

    let mut current = doc;
    for part in parents {
        current = current
            .as_table_mut()
            .ok_or_else(|| ArtcacheError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    let table = current
        .as_table_mut()
        .ok_or_else(|| ArtcacheError::User(format!("Expected table for key: {}", key)))?;

    let toml_value = if let Ok(flag) = value.parse::<bool>() {
        toml::Value::Boolean(flag)
    } else if let Ok(n) = value.parse::<i64>() {
        toml::Value::Integer(n)
    } else {
        toml::Value::String(value.to_string())
    };
    table.insert(leaf.to_string(), toml_value);
    Ok(())
}

fn parse_bool(value: &str) -> ArtcacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ArtcacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ArtcacheResult<T> {
    value
        .parse()
        .map_err(|_| ArtcacheError::User(format!("Invalid number: {}", value)))
}

fn parse_log_format(value: &str) -> ArtcacheResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(ArtcacheError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}
