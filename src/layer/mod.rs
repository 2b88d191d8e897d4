mod entity;
mod label;

pub use entity::{
    Entity, EntityLayer, MissingIdentity, TrackPoint, TrackSettings, DEFAULT_MAXIMUM_OBSERVATIONS,
};
pub use label::LabelExpression;
