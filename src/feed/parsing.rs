use serde::Deserialize;

use super::error::{ParseError, RecordError};
use super::types::{Attributes, Observation, Position, SpatialReference};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordGeometry {
    x: f64,
    y: f64,
    #[serde(default)]
    spatial_reference: Option<SpatialReference>,
}

#[derive(Debug, Deserialize)]
struct Record {
    geometry: Option<RecordGeometry>,
    #[serde(default)]
    attributes: Attributes,
}

/// True for lines that carry no record at all.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Text of one raw source line, without its line terminator.
pub fn decode_line(bytes: &[u8]) -> Result<&str, ParseError> {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidUtf8(e.to_string()))
}

/// Decode a raw source line. `Ok(None)` for lines that hold no record.
pub fn parse_line(
    bytes: &[u8],
    spatial_reference: SpatialReference,
) -> Result<Option<Observation>, ParseError> {
    let line = decode_line(bytes)?;
    if is_blank(line) {
        return Ok(None);
    }
    parse_observation(line, spatial_reference).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub records: usize,
    pub rejected: Vec<RecordError>,
}

/// Check every line of a whole source without emitting anything.
pub fn validate_source(content: &[u8], spatial_reference: SpatialReference) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (i, bytes) in content.split(|b| *b == b'\n').enumerate() {
        match parse_line(bytes, spatial_reference) {
            Ok(Some(_)) => report.records += 1,
            Ok(None) => {}
            Err(error) => report.rejected.push(RecordError { line: i + 1, error }),
        }
    }
    report
}

/// Decode one source line into an observation positioned in `spatial_reference`.
pub fn parse_observation(
    line: &str,
    spatial_reference: SpatialReference,
) -> Result<Observation, ParseError> {
    let record: Record =
        serde_json::from_str(line).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let geometry = record.geometry.ok_or(ParseError::MissingGeometry)?;

    if let Some(found) = geometry.spatial_reference {
        if found != spatial_reference {
            return Err(ParseError::SpatialReferenceMismatch {
                expected: spatial_reference.wkid,
                found: found.wkid,
            });
        }
    }

    Ok(Observation {
        position: Position {
            x: geometry.x,
            y: geometry.y,
            spatial_reference,
        },
        attributes: record.attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const VESSEL: &str = r#"{"geometry":{"x":-122.41,"y":47.63,"spatialReference":{"wkid":4326}},"attributes":{"MMSI":"367123450","SOG":11.2,"VesselName":"ORCA","Length":null}}"#;

    #[test]
    fn decodes_position_and_attributes() {
        let observation = parse_observation(VESSEL, SpatialReference::WGS84).unwrap();
        assert_eq!(observation.position.x, -122.41);
        assert_eq!(observation.position.y, 47.63);
        assert_eq!(observation.position.spatial_reference.wkid, 4326);
        assert_eq!(
            serde_json::Value::Object(observation.attributes),
            json!({"MMSI":"367123450","SOG":11.2,"VesselName":"ORCA","Length":null})
        );
    }

    #[test]
    fn missing_spatial_reference_takes_the_feed_reference() {
        let line = r#"{"geometry":{"x":1.0,"y":2.0},"attributes":{}}"#;
        let observation = parse_observation(line, SpatialReference { wkid: 3857 }).unwrap();
        assert_eq!(observation.position.spatial_reference.wkid, 3857);
    }

    #[test]
    fn missing_attributes_decode_empty() {
        let line = r#"{"geometry":{"x":1.0,"y":2.0}}"#;
        let observation = parse_observation(line, SpatialReference::WGS84).unwrap();
        assert!(observation.attributes.is_empty());
    }

    #[rstest]
    #[case::truncated(r#"{"geometry":{"x":1.0,"#)]
    #[case::not_json("MMSI,LAT,LONG")]
    #[case::text_coordinate(r#"{"geometry":{"x":"west","y":2.0},"attributes":{}}"#)]
    #[case::attributes_not_object(r#"{"geometry":{"x":1.0,"y":2.0},"attributes":[1,2]}"#)]
    fn rejects_undecodable_lines(#[case] line: &str) {
        assert!(matches!(
            parse_observation(line, SpatialReference::WGS84),
            Err(ParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn rejects_missing_geometry() {
        let line = r#"{"attributes":{"MMSI":"1"}}"#;
        assert_eq!(
            parse_observation(line, SpatialReference::WGS84),
            Err(ParseError::MissingGeometry)
        );
    }

    #[test]
    fn rejects_foreign_spatial_reference() {
        let line = r#"{"geometry":{"x":1.0,"y":2.0,"spatialReference":{"wkid":3857}}}"#;
        assert_eq!(
            parse_observation(line, SpatialReference::WGS84),
            Err(ParseError::SpatialReferenceMismatch {
                expected: 4326,
                found: 3857
            })
        );
    }

    #[test]
    fn invalid_utf8_is_a_record_error() {
        assert!(matches!(
            parse_line(b"{\"geometry\":\xff\xfe}", SpatialReference::WGS84),
            Err(ParseError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn line_terminators_are_stripped() {
        assert_eq!(decode_line(b"abc\r\n"), Ok("abc"));
        assert_eq!(parse_line(b"  \r\n", SpatialReference::WGS84), Ok(None));
    }

    #[test]
    fn validates_against_the_given_spatial_reference() {
        let content = concat!(
            r#"{"geometry":{"x":1.0,"y":2.0,"spatialReference":{"wkid":3857}}}"#,
            "\n\n",
            r#"{"geometry":{"x":1.0,"y":2.0,"spatialReference":{"wkid":4326}}}"#,
            "\n",
        );
        let report = validate_source(content.as_bytes(), SpatialReference { wkid: 3857 });
        assert_eq!(report.records, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 3);

        let mut bytes = content.as_bytes().to_vec();
        bytes.extend_from_slice(b"\xff\n");
        let report = validate_source(&bytes, SpatialReference { wkid: 3857 });
        assert_eq!(report.rejected.len(), 2);
        assert!(matches!(report.rejected[1].error, ParseError::InvalidUtf8(_)));
    }

    #[rstest]
    #[case("", true)]
    #[case("   \t", true)]
    #[case(VESSEL, false)]
    fn blank_lines(#[case] line: &str, #[case] blank: bool) {
        assert_eq!(is_blank(line), blank);
    }
}
