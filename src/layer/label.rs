use serde_json::Value;

use crate::feed::Attributes;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

/// Label text built from literal text and `[Field]` references, e.g.
/// `"[VesselName] ([MMSI])"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelExpression {
    source: String,
    segments: Vec<Segment>,
}

impl LabelExpression {
    /// An unterminated `[` is kept as literal text.
    pub fn parse(expression: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = expression;

        while let Some(open) = rest.find('[') {
            let Some(close) = rest[open..].find(']').map(|i| open + i) else {
                break;
            };
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            segments.push(Segment::Field(rest[open + 1..close].trim().to_string()));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Self {
            source: expression.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Render against `attributes`; missing or null fields render empty.
    pub fn evaluate(&self, attributes: &Attributes) -> String {
        let mut label = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => label.push_str(text),
                Segment::Field(name) => match attributes.get(name) {
                    Some(Value::String(s)) => label.push_str(s),
                    Some(Value::Null) | None => {}
                    Some(other) => label.push_str(&other.to_string()),
                },
            }
        }
        label
    }
}
