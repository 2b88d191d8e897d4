use serde::{Deserialize, Serialize};

/// Attribute name to value, decoded as-is from the source record.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl SpatialReference {
    pub const WGS84: SpatialReference = SpatialReference { wkid: 4326 };
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::WGS84
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub spatial_reference: SpatialReference,
}

/// One entity report as emitted by a feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub position: Position,
    pub attributes: Attributes,
}

impl Observation {
    /// Identity value of this observation, rendered as text.
    ///
    /// Strings are returned verbatim and numbers in their JSON form. Any other
    /// value, or a missing field, yields `None`.
    pub fn entity_id(&self, field: &str) -> Option<String> {
        match self.attributes.get(field)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation(attributes: serde_json::Value) -> Observation {
        Observation {
            position: Position {
                x: -123.6,
                y: 47.9,
                spatial_reference: SpatialReference::WGS84,
            },
            attributes: attributes.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn entity_id_renders_strings_and_numbers() {
        assert_eq!(
            observation(json!({"MMSI": "367123450"})).entity_id("MMSI"),
            Some("367123450".to_string())
        );
        assert_eq!(
            observation(json!({"MMSI": 367123450})).entity_id("MMSI"),
            Some("367123450".to_string())
        );
    }

    #[test]
    fn entity_id_is_absent_for_missing_or_unusable_values() {
        assert_eq!(observation(json!({})).entity_id("MMSI"), None);
        assert_eq!(observation(json!({"MMSI": null})).entity_id("MMSI"), None);
        assert_eq!(observation(json!({"MMSI": ""})).entity_id("MMSI"), None);
    }
}
