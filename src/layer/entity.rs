use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::label::LabelExpression;
use crate::config::deserialize_optional_duration;
use crate::feed::{
    Attributes, FeedSchema, FeedStatus, Observation, ObservationSink, Position, RecordError,
};

pub const DEFAULT_MAXIMUM_OBSERVATIONS: usize = 200;

/// What to do with an observation that carries no identity value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissingIdentity {
    #[default]
    Drop,
    /// Give the observation its own entity under a fresh UUID.
    Synthesize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackSettings {
    #[serde(default = "default_maximum_observations")]
    pub maximum_observations: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub maximum_duration: Option<Duration>,
    #[serde(default)]
    pub missing_identity: MissingIdentity,
}

fn default_maximum_observations() -> Option<usize> {
    Some(DEFAULT_MAXIMUM_OBSERVATIONS)
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            maximum_observations: default_maximum_observations(),
            maximum_duration: None,
            missing_identity: MissingIdentity::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub position: Position,
    pub attributes: Attributes,
    pub received_at: DateTime<Utc>,
}

/// One correlated moving entity: its latest attributes and recent track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: String,
    pub attributes: Attributes,
    pub track: VecDeque<TrackPoint>,
    pub observation_count: u64,
}

impl Entity {
    pub fn latest(&self) -> Option<&TrackPoint> {
        self.track.back()
    }
}

#[derive(Debug, Default)]
struct LayerState {
    entities: HashMap<String, Entity>,
    dropped: u64,
    rejected: u64,
    status: Option<FeedStatus>,
}

/// Consumer that folds a feed's observations into per-entity tracks.
#[derive(Debug)]
pub struct EntityLayer {
    entity_id_field: String,
    settings: TrackSettings,
    state: Mutex<LayerState>,
}

impl EntityLayer {
    pub fn new(schema: &FeedSchema, settings: TrackSettings) -> Self {
        Self {
            entity_id_field: schema.entity_id_field.clone(),
            settings,
            state: Mutex::new(LayerState::default()),
        }
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    /// Fold `observation` in as received at `at`. Returns the id of the
    /// entity it was attributed to, or `None` when it was dropped.
    pub fn ingest_at(&self, observation: Observation, at: DateTime<Utc>) -> Option<String> {
        let id = match observation.entity_id(&self.entity_id_field) {
            Some(id) => id,
            None => match self.settings.missing_identity {
                MissingIdentity::Drop => {
                    self.lock().dropped += 1;
                    debug!(
                        "Dropping observation without {} value",
                        self.entity_id_field
                    );
                    return None;
                }
                MissingIdentity::Synthesize => uuid::Uuid::new_v4().to_string(),
            },
        };

        let mut state = self.lock();
        let entity = state.entities.entry(id.clone()).or_insert_with(|| {
            info!("New entity {}", id);
            Entity {
                id: id.clone(),
                attributes: Attributes::new(),
                track: VecDeque::new(),
                observation_count: 0,
            }
        });

        entity.attributes = observation.attributes.clone();
        entity.observation_count += 1;
        entity.track.push_back(TrackPoint {
            position: observation.position,
            attributes: observation.attributes,
            received_at: at,
        });
        trim_track(&mut entity.track, &self.settings, at);

        Some(id)
    }

    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.lock().entities.get(id).cloned()
    }

    /// All entities, ordered by id.
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.lock().entities.values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    pub fn label(&self, id: &str, expression: &LabelExpression) -> Option<String> {
        self.lock()
            .entities
            .get(id)
            .map(|e| expression.evaluate(&e.attributes))
    }

    pub fn len(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observations dropped for lack of an identity value.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Records the feed reported as malformed.
    pub fn rejected(&self) -> u64 {
        self.lock().rejected
    }

    pub fn feed_status(&self) -> Option<FeedStatus> {
        self.lock().status
    }

    fn lock(&self) -> MutexGuard<'_, LayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObservationSink for EntityLayer {
    fn observe(&self, observation: Observation) {
        self.ingest_at(observation, Utc::now());
    }

    fn status_changed(&self, status: FeedStatus) {
        self.lock().status = Some(status);
    }

    fn record_rejected(&self, error: RecordError) {
        warn!("Feed rejected record, {}", error);
        self.lock().rejected += 1;
    }
}

fn trim_track(track: &mut VecDeque<TrackPoint>, settings: &TrackSettings, now: DateTime<Utc>) {
    if let Some(max) = settings.maximum_observations {
        while track.len() > max.max(1) {
            track.pop_front();
        }
    }

    let Some(max_age) = settings
        .maximum_duration
        .and_then(|d| chrono::Duration::from_std(d).ok())
    else {
        return;
    };
    // The newest point always survives.
    while track.len() > 1 && track.front().is_some_and(|p| now - p.received_at > max_age) {
        track.pop_front();
    }
}
