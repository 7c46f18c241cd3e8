use camino::{Utf8Path, Utf8PathBuf};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Source};
use serde::Deserialize;
use url::Url;

#[derive(Clone, Debug, Deserialize)]
pub struct HassConfig {
    /// Base url for both the REST api and the websocket event bus.
    pub url: Url,
    pub token_env: Option<String>,
    pub sensor_entity: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HueConfig {
    /// Home Assistant's persisted config-entry store.
    pub config_entries: Utf8PathBuf,
    /// Scenes whose name contains this keyword are kept in sync.
    pub keyword: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SyncConfig {
    /// Concurrent lightstate updates per bridge. Hue bridges only tolerate
    /// a handful of simultaneous requests.
    pub max_in_flight: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProbeConfig {
    pub attempts: u32,
    pub delay_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub hass: HassConfig,
    pub hue: HueConfig,
    pub sync: SyncConfig,
    pub probe: ProbeConfig,
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("hass.sensor_entity", "sensor.circadian_values")?
        .set_default("hue.config_entries", ".storage/core.config_entries")?
        .set_default("hue.keyword", "Circadian")?
        .set_default("sync.max_in_flight", 4)?
        .set_default("probe.attempts", 3)?
        .set_default("probe.delay_secs", 5)
}

fn from_source<S>(source: S) -> Result<AppConfig, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    let settings = with_defaults(Config::builder())?.add_source(source).build()?;

    settings.try_deserialize()
}

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    from_source(config::File::with_name(filename.as_str()))
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::{AppConfig, from_source};

    fn parse_str(yaml: &str) -> AppConfig {
        from_source(config::File::from_str(yaml, FileFormat::Yaml)).unwrap()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse_str("hass:\n  url: http://127.0.0.1:8123\n");

        assert_eq!(config.hass.sensor_entity, "sensor.circadian_values");
        assert_eq!(config.hass.token_env, None);
        assert_eq!(config.hue.keyword, "Circadian");
        assert_eq!(config.hue.config_entries, ".storage/core.config_entries");
        assert_eq!(config.sync.max_in_flight, 4);
        assert_eq!(config.probe.attempts, 3);
        assert_eq!(config.probe.delay_secs, 5);
    }

    #[test]
    fn defaults_can_be_overridden() {
        let yaml = "
hass:
  url: https://ha.example.org
  token_env: MY_TOKEN
  sensor_entity: sensor.circadian_office
hue:
  keyword: Daylight
sync:
  max_in_flight: 2
probe:
  attempts: 5
  delay_secs: 1
";
        let config = parse_str(yaml);

        assert_eq!(config.hass.token_env.as_deref(), Some("MY_TOKEN"));
        assert_eq!(config.hass.sensor_entity, "sensor.circadian_office");
        assert_eq!(config.hue.keyword, "Daylight");
        assert_eq!(config.sync.max_in_flight, 2);
        assert_eq!(config.probe.attempts, 5);
        assert_eq!(config.probe.delay_secs, 1);
    }
}
