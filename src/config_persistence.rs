//! Loading and saving of `roqoke.toml`.
//!
//! A missing file is created with defaults. Rewrites of an existing file go
//! through `toml_edit` so user comments and formatting survive.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use toml_edit::{DocumentMut, Item, Table};

use crate::config::{sanitize_config, Config};

pub const CONFIG_FILE_NAME: &str = "roqoke.toml";

/// Location of the persisted config under the user config directory.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Reads the config file, creating it with defaults when missing. Unparsable
/// or unreadable files degrade to defaults with a warning; they are never
/// fatal.
pub fn load_or_create_config(path: &Path) -> Config {
    if !path.exists() {
        let default_config = Config::default();
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!("Failed to create config directory {}: {}", parent.display(), err);
            }
        }
        match toml::to_string(&default_config) {
            Ok(text) => {
                if let Err(err) = std::fs::write(path, text) {
                    warn!("Failed to write default config to {}: {}", path.display(), err);
                }
            }
            Err(err) => warn!("Failed to serialize default config: {}", err),
        }
        return default_config;
    }

    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str::<Config>(&text) {
            Ok(config) => sanitize_config(config),
            Err(err) => {
                warn!("Failed to parse {}, using defaults: {}", path.display(), err);
                Config::default()
            }
        },
        Err(err) => {
            warn!("Failed to read {}, using defaults: {}", path.display(), err);
            Config::default()
        }
    }
}

/// Persists the config. An existing file is rewritten in place with its
/// comments preserved; otherwise a plain serialization is written.
pub fn save_config(path: &Path, config: &Config) {
    let next_text = match std::fs::read_to_string(path) {
        Ok(existing_text) => match serialize_config_with_preserved_comments(&existing_text, config)
        {
            Ok(text) => text,
            Err(err) => {
                warn!("Failed to rewrite config preserving comments: {}", err);
                match toml::to_string(config) {
                    Ok(text) => text,
                    Err(err) => {
                        error!("Failed to serialize config: {}", err);
                        return;
                    }
                }
            }
        },
        Err(_) => match toml::to_string(config) {
            Ok(text) => text,
            Err(err) => {
                error!("Failed to serialize config: {}", err);
                return;
            }
        },
    };
    if let Err(err) = std::fs::write(path, next_text) {
        error!("Failed to persist config to {}: {}", path.display(), err);
    }
}

fn set_value_preserving_decor(table: &mut Table, key: &str, item: Item) {
    let existing_value_decor = table
        .get(key)
        .and_then(|current| current.as_value().map(|value| value.decor().clone()));
    table[key] = item;
    if let Some(existing_value_decor) = existing_value_decor {
        if let Some(next_value) = table[key].as_value_mut() {
            *next_value.decor_mut() = existing_value_decor;
        }
    }
}

fn merge_item_preserving_decor(destination: &mut Table, key: &str, source_item: &Item) {
    match source_item {
        Item::Table(source_table) => {
            if !destination.get(key).is_some_and(Item::is_table) {
                destination.insert(key, Item::Table(Table::new()));
            }
            let destination_table = destination
                .get_mut(key)
                .and_then(Item::as_table_mut)
                .expect("table inserted above");
            for (child_key, child_item) in source_table.iter() {
                merge_item_preserving_decor(destination_table, child_key, child_item);
            }
        }
        Item::ArrayOfTables(source_array) => {
            if !destination.get(key).is_some_and(Item::is_array_of_tables) {
                set_value_preserving_decor(destination, key, source_item.clone());
                return;
            }
            let destination_array = destination
                .get_mut(key)
                .and_then(Item::as_array_of_tables_mut)
                .expect("array-of-tables verified above");
            while destination_array.len() > source_array.len() {
                destination_array.remove(destination_array.len() - 1);
            }
            for (index, source_table) in source_array.iter().enumerate() {
                match destination_array.get_mut(index) {
                    Some(destination_table) => {
                        for (child_key, child_item) in source_table.iter() {
                            merge_item_preserving_decor(destination_table, child_key, child_item);
                        }
                    }
                    None => destination_array.push(source_table.clone()),
                }
            }
        }
        _ => set_value_preserving_decor(destination, key, source_item.clone()),
    }
}

/// Renders `config` on top of an existing config text, keeping the existing
/// document's comments and whitespace wherever a value survives.
pub fn serialize_config_with_preserved_comments(
    existing_text: &str,
    config: &Config,
) -> Result<String, String> {
    let mut document = existing_text
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse existing config as TOML document: {}", err))?;
    let rendered = toml::to_string(config)
        .map_err(|err| format!("failed to serialize config: {}", err))?;
    let source = rendered
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse rendered config: {}", err))?;

    for (key, item) in source.as_table().iter() {
        merge_item_preserving_decor(document.as_table_mut(), key, item);
    }
    Ok(document.to_string())
}
