//! Bridge locator: extracts configured Hue bridges from Home Assistant's
//! persisted config-entry store.

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

/// Integration domain the Hue bridges are registered under.
pub const HUE_DOMAIN: &str = "hue";

#[derive(Clone, Debug, Deserialize)]
struct ConfigEntryStore {
    data: ConfigEntryList,
}

#[derive(Clone, Debug, Deserialize)]
struct ConfigEntryList {
    #[serde(default)]
    entries: Vec<ConfigEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct ConfigEntry {
    domain: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    data: Map<String, Value>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeEntry {
    pub host: String,
    pub api_key: String,
}

fn extract_bridges(store: &ConfigEntryStore) -> Vec<BridgeEntry> {
    let mut bridges = vec![];

    for entry in &store.data.entries {
        if entry.domain != HUE_DOMAIN {
            continue;
        }

        let Some(host) = entry.data.get("host").and_then(Value::as_str) else {
            log::warn!("Skipping hue entry [{}]: no host", entry.title);
            continue;
        };

        let api_key = entry
            .data
            .get("api_key")
            .or_else(|| entry.data.get("username"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if api_key.is_empty() {
            log::warn!("Skipping hue entry [{}]: empty api key", entry.title);
            continue;
        }

        bridges.push(BridgeEntry {
            host: host.to_string(),
            api_key: api_key.to_string(),
        });
    }

    bridges
}

/// Read the config-entry store and return all usable Hue bridges.
///
/// Re-reads the file on every call; the store is owned by Home Assistant
/// and can change between invocations.
pub fn load_bridges(path: &Utf8Path) -> ApiResult<Vec<BridgeEntry>> {
    let text = std::fs::read_to_string(path)?;
    let store: ConfigEntryStore = serde_json::from_str(&text)?;

    let bridges = extract_bridges(&store);
    if bridges.is_empty() {
        return Err(ApiError::NoBridges(path.to_owned()));
    }

    Ok(bridges)
}
