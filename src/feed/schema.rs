use serde::{Deserialize, Serialize};

use super::types::SpatialReference;

const DEFAULT_STRING_LENGTH: u32 = 256;

fn default_string_length() -> u32 {
    DEFAULT_STRING_LENGTH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String {
        #[serde(default = "default_string_length")]
        length: u32,
    },
    Double,
    Integer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
}

impl Field {
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::String {
                length: DEFAULT_STRING_LENGTH,
            },
        }
    }

    pub fn double(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Double,
        }
    }
}

/// What every observation of a feed carries, known before streaming starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSchema {
    pub entity_id_field: String,
    pub fields: Vec<Field>,
    pub spatial_reference: SpatialReference,
}

impl FeedSchema {
    /// Field layout of the AIS vessel reports bundled under `data/`.
    pub fn ais_vessels(entity_id_field: &str) -> Self {
        Self {
            entity_id_field: entity_id_field.to_string(),
            fields: ais_vessel_fields(),
            spatial_reference: SpatialReference::WGS84,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub fn ais_vessel_fields() -> Vec<Field> {
    vec![
        Field::string("MMSI"),
        Field::double("BaseDateTime"),
        Field::double("LAT"),
        Field::double("LONG"),
        Field::double("SOG"),
        Field::double("COG"),
        Field::double("Heading"),
        Field::string("VesselName"),
        Field::string("IMO"),
        Field::string("CallSign"),
        Field::string("VesselType"),
        Field::string("Status"),
        Field::double("Length"),
        Field::double("Width"),
        Field::string("Cargo"),
        Field::string("globalid"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vessel_schema_layout() {
        let schema = FeedSchema::ais_vessels("MMSI");
        assert_eq!(schema.fields.len(), 16);
        assert_eq!(schema.entity_id_field, "MMSI");
        assert_eq!(schema.spatial_reference, SpatialReference::WGS84);
        assert_eq!(
            schema.field("VesselName").map(|f| &f.field_type),
            Some(&FieldType::String { length: 256 })
        );
        assert_eq!(
            schema.field("SOG").map(|f| &f.field_type),
            Some(&FieldType::Double)
        );
        assert!(schema.field("Speed").is_none());
    }

    #[test]
    fn field_yaml_defaults_string_length() {
        let fields: Vec<Field> =
            serde_yaml::from_str("- name: MMSI\n  type: string\n- name: SOG\n  type: double\n")
                .unwrap();
        assert_eq!(fields, vec![Field::string("MMSI"), Field::double("SOG")]);
    }
}
