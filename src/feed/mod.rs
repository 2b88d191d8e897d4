mod error;
mod parsing;
mod schema;
mod sink;
mod source;
mod types;

pub use error::{FeedError, ParseError, RecordError};
pub use parsing::{
    decode_line, is_blank, parse_line, parse_observation, validate_source, ValidationReport,
};
pub use schema::{ais_vessel_fields, FeedSchema, Field, FieldType};
pub use sink::{FeedEvent, ObservationSink};
pub use source::{
    FeedConfig, FeedStats, FeedStatus, OnMalformed, ReplaySummary, SimulatedFeed, DEFAULT_DELAY,
};
pub use types::{Attributes, Observation, Position, SpatialReference};
