use serde_json::{Map, Value};

use crate::error::PayloadError;

pub const FIELD_TEMPERATURE: &str = "temperature";
pub const FIELD_MIN: &str = "min";
pub const FIELD_MAX: &str = "max";

fn parse_object(payload: &str) -> Result<Map<String, Value>, PayloadError> {
    match serde_json::from_str::<Value>(payload)? {
        Value::Object(map) => Ok(map),
        _ => Err(PayloadError::NotAnObject),
    }
}

fn numeric(map: &Map<String, Value>, field: &'static str) -> Result<f64, PayloadError> {
    let value = map.get(field).ok_or(PayloadError::MissingField(field))?;
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|number| number.is_finite())
        .ok_or(PayloadError::NotNumeric(field))
}

/// Remote sensor nodes send `{"temperature": 21.5}`; the value may also be a numeric string.
pub fn parse_remote_temperature(payload: &str) -> Result<f32, PayloadError> {
    let map = parse_object(payload)?;
    Ok(numeric(&map, FIELD_TEMPERATURE)? as f32)
}

/// Range overrides arrive as `{"min": 18, "max": 22}`. Fractions are truncated.
pub fn parse_range_override(payload: &str) -> Result<(i32, i32), PayloadError> {
    let map = parse_object(payload)?;
    let min = numeric(&map, FIELD_MIN)?;
    let max = numeric(&map, FIELD_MAX)?;
    Ok((min as i32, max as i32))
}

pub fn remote_temperature_payload(value: f32) -> String {
    serde_json::json!({ FIELD_TEMPERATURE: format!("{value:.1}") }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_temperature_accepts_number_or_string() {
        assert_eq!(parse_remote_temperature(r#"{"temperature": 21.5}"#).unwrap(), 21.5);
        assert_eq!(
            parse_remote_temperature(r#"{"temperature": "19.0", "humidity": 40}"#).unwrap(),
            19.0
        );
    }

    #[test]
    fn remote_temperature_errors_are_typed() {
        assert!(matches!(
            parse_remote_temperature(r#"{"humidity": 40}"#),
            Err(PayloadError::MissingField("temperature"))
        ));
        assert!(matches!(
            parse_remote_temperature(r#"{"temperature": "warm"}"#),
            Err(PayloadError::NotNumeric("temperature"))
        ));
        assert!(matches!(
            parse_remote_temperature("[1, 2]"),
            Err(PayloadError::NotAnObject)
        ));
        assert!(matches!(
            parse_remote_temperature("{"),
            Err(PayloadError::Json(_))
        ));
    }

    #[test]
    fn range_override_needs_both_bounds() {
        assert_eq!(parse_range_override(r#"{"min": 17, "max": 23}"#).unwrap(), (17, 23));
        assert!(matches!(
            parse_range_override(r#"{"min": 17}"#),
            Err(PayloadError::MissingField("max"))
        ));
    }

    #[test]
    fn sensor_payload_is_parseable() {
        let payload = remote_temperature_payload(20.04);
        assert_eq!(parse_remote_temperature(&payload).unwrap(), 20.0);
    }
}
