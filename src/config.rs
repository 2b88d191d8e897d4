use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{
    ais_vessel_fields, FeedConfig, FeedSchema, Field, OnMalformed, SpatialReference, DEFAULT_DELAY,
};
use crate::layer::{LabelExpression, TrackSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid duration {value:?}: {message}")]
    Duration { value: String, message: String },
    #[error("no observation source configured")]
    MissingSource,
    #[error("entity id field {0} is not among the configured fields")]
    UnknownEntityIdField(String),
}

/// Feed settings as read from a YAML file. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default = "default_entity_id_field")]
    pub entity_id_field: String,
    #[serde(default = "default_delay", deserialize_with = "deserialize_duration")]
    pub delay: Duration,
    #[serde(default)]
    pub on_malformed: OnMalformed,
    #[serde(default = "default_wkid")]
    pub spatial_reference: u32,
    #[serde(default)]
    pub fields: Option<Vec<Field>>,
    #[serde(default)]
    pub tracks: TrackSettings,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_entity_id_field() -> String {
    "MMSI".to_string()
}

fn default_delay() -> Duration {
    DEFAULT_DELAY
}

fn default_wkid() -> u32 {
    SpatialReference::WGS84.wkid
}

/// Humantime string such as `10ms` or `5m`.
pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_duration(&value).map_err(serde::de::Error::custom)
}

pub(crate) fn deserialize_optional_duration<'de, D>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|value| parse_duration(&value).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Duration {
        value: value.to_string(),
        message: e.to_string(),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            entity_id_field: default_entity_id_field(),
            delay: default_delay(),
            on_malformed: OnMalformed::default(),
            spatial_reference: default_wkid(),
            fields: None,
            tracks: TrackSettings::default(),
            label: None,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn schema(&self) -> Result<FeedSchema, ConfigError> {
        let fields = self.fields.clone().unwrap_or_else(ais_vessel_fields);
        if !fields.iter().any(|f| f.name == self.entity_id_field) {
            return Err(ConfigError::UnknownEntityIdField(
                self.entity_id_field.clone(),
            ));
        }
        Ok(FeedSchema {
            entity_id_field: self.entity_id_field.clone(),
            fields,
            spatial_reference: SpatialReference {
                wkid: self.spatial_reference,
            },
        })
    }

    pub fn feed_config(&self) -> Result<FeedConfig, ConfigError> {
        let source = self.source.clone().ok_or(ConfigError::MissingSource)?;
        Ok(FeedConfig {
            source,
            schema: self.schema()?,
            delay: self.delay,
            on_malformed: self.on_malformed,
        })
    }

    pub fn label_expression(&self) -> Option<LabelExpression> {
        self.label.as_deref().map(LabelExpression::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FieldType;
    use crate::layer::MissingIdentity;

    #[test]
    fn empty_file_takes_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.entity_id_field, "MMSI");
        assert_eq!(config.delay, Duration::from_millis(10));
        assert_eq!(config.on_malformed, OnMalformed::Skip);
        assert_eq!(config.tracks, TrackSettings::default());
        assert!(matches!(config.feed_config(), Err(ConfigError::MissingSource)));
        assert_eq!(config.schema().unwrap(), FeedSchema::ais_vessels("MMSI"));
    }

    #[test]
    fn full_file() {
        let yaml = r#"
source: data/vessels.jsonl
entity_id_field: callsign
delay: 250ms
on_malformed: stop
spatial_reference: 3857
fields:
  - name: callsign
    type: string
    length: 16
  - name: speed
    type: double
tracks:
  maximum_observations: 20
  missing_identity: synthesize
label: "[callsign]"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let feed = config.feed_config().unwrap();
        assert_eq!(feed.source, PathBuf::from("data/vessels.jsonl"));
        assert_eq!(feed.delay, Duration::from_millis(250));
        assert_eq!(feed.on_malformed, OnMalformed::Stop);
        assert_eq!(feed.schema.spatial_reference.wkid, 3857);
        assert_eq!(
            feed.schema.field("callsign").map(|f| &f.field_type),
            Some(&FieldType::String { length: 16 })
        );
        assert_eq!(config.tracks.maximum_observations, Some(20));
        assert_eq!(config.tracks.missing_identity, MissingIdentity::Synthesize);
        assert_eq!(
            config.label_expression().map(|l| l.as_str().to_string()),
            Some("[callsign]".to_string())
        );
    }

    #[test]
    fn rejects_bad_delay() {
        assert!(matches!(
            Config::from_yaml("delay: soon"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(parse_duration("soon"), Err(ConfigError::Duration { .. })));
    }

    #[test]
    fn bundled_config_limits_track_age() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/feed.yaml");
        let config = Config::from_file(path).unwrap();
        assert_eq!(config.tracks.maximum_duration, Some(Duration::from_secs(200)));
        assert_eq!(config.tracks.maximum_observations, Some(200));
        assert_eq!(config.delay, Duration::from_millis(10));
        assert!(config.feed_config().is_ok());
    }

    #[test]
    fn optional_durations_share_the_delay_syntax() {
        let settings: TrackSettings = serde_yaml::from_str("maximum_duration: 90s
").unwrap();
        assert_eq!(settings.maximum_duration, Some(Duration::from_secs(90)));
        assert!(serde_yaml::from_str::<TrackSettings>("maximum_duration: later
").is_err());
        let settings: TrackSettings = serde_yaml::from_str("maximum_duration: null
").unwrap();
        assert_eq!(settings.maximum_duration, None);
    }

    #[test]
    fn entity_id_field_must_be_a_field() {
        let yaml = "entity_id_field: hull\nfields:\n  - name: MMSI\n    type: string\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.schema(),
            Err(ConfigError::UnknownEntityIdField(f)) if f == "hull"
        ));
    }
}
