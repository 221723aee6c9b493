// Telemetry sample domain model and line decoding
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded record from the simulation stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub time: f64,
    pub voltage: f64,
    pub current: f64,
    pub resistance: f64,
}

impl TelemetrySample {
    #[cfg(test)]
    pub fn new(time: f64, voltage: f64, current: f64, resistance: f64) -> Self {
        Self {
            time,
            voltage,
            current,
            resistance,
        }
    }
}

/// How a record with an absent (or non-numeric) field is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// Read the field as `0.0`.
    #[default]
    Zero,
    /// Fail the whole line.
    Reject,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("malformed telemetry line: {0}")]
    Malformed(String),
    #[error("telemetry field `{0}` is missing")]
    MissingField(&'static str),
    #[error("telemetry field `{0}` is not a number")]
    InvalidField(&'static str),
}

/// Wire shape of a record. Values stay untyped so the missing-field policy
/// decides what a `null` or a string means.
#[derive(Debug, Deserialize)]
struct WireRecord {
    time: Option<Value>,
    voltage: Option<Value>,
    current: Option<Value>,
    resistance: Option<Value>,
}

/// Decode one line of simulator output.
///
/// Blank lines yield `Ok(None)`. Numbers outside the `f64` range (and the
/// non-JSON `NaN`/`Infinity` tokens) fail to decode, so they are reported as
/// `Malformed` and every decoded value is finite.
pub fn parse_line(
    line: &str,
    policy: MissingFieldPolicy,
) -> Result<Option<TelemetrySample>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(line).map_err(|e| ParseError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ParseError::Malformed("expected a JSON object".to_string()));
    }
    let record: WireRecord =
        serde_json::from_value(value).map_err(|e| ParseError::Malformed(e.to_string()))?;

    Ok(Some(TelemetrySample {
        time: field("time", record.time, policy)?,
        voltage: field("voltage", record.voltage, policy)?,
        current: field("current", record.current, policy)?,
        resistance: field("resistance", record.resistance, policy)?,
    }))
}

fn field(
    name: &'static str,
    value: Option<Value>,
    policy: MissingFieldPolicy,
) -> Result<f64, ParseError> {
    match (value, policy) {
        (Some(Value::Number(n)), _) => n.as_f64().ok_or(ParseError::InvalidField(name)),
        (None | Some(Value::Null), MissingFieldPolicy::Zero) => Ok(0.0),
        (None | Some(Value::Null), MissingFieldPolicy::Reject) => {
            Err(ParseError::MissingField(name))
        }
        (Some(_), MissingFieldPolicy::Zero) => Ok(0.0),
        (Some(_), MissingFieldPolicy::Reject) => Err(ParseError::InvalidField(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_record() {
        let line = r#"{"time":1.25,"voltage":3.5,"current":-0.004,"resistance":4200.5}"#;
        let sample = parse_line(line, MissingFieldPolicy::Zero).unwrap().unwrap();

        assert_eq!(sample, TelemetrySample::new(1.25, 3.5, -0.004, 4200.5));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        assert_eq!(parse_line("", MissingFieldPolicy::Zero), Ok(None));
        assert_eq!(parse_line("   \t\r", MissingFieldPolicy::Reject), Ok(None));
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let line = "  {\"time\":0,\"voltage\":1,\"current\":2,\"resistance\":3}\r";
        let sample = parse_line(line, MissingFieldPolicy::Zero).unwrap().unwrap();

        assert_eq!(sample, TelemetrySample::new(0.0, 1.0, 2.0, 3.0));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_line("{\"time\": 1,", MissingFieldPolicy::Zero).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));

        let err = parse_line("[1, 2, 3]", MissingFieldPolicy::Zero).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_out_of_range_numbers_are_malformed() {
        for line in [
            r#"{"time":1e400,"voltage":1,"current":2,"resistance":3}"#,
            r#"{"time":0,"voltage":NaN,"current":2,"resistance":3}"#,
            r#"{"time":0,"voltage":1,"current":-Infinity,"resistance":3}"#,
        ] {
            let err = parse_line(line, MissingFieldPolicy::Zero).unwrap_err();
            assert!(matches!(err, ParseError::Malformed(_)), "{}", line);
        }
    }

    #[test]
    fn test_missing_field_reads_as_zero() {
        let line = r#"{"time":2,"voltage":1.5,"extra":"ignored"}"#;
        let sample = parse_line(line, MissingFieldPolicy::Zero).unwrap().unwrap();

        assert_eq!(sample, TelemetrySample::new(2.0, 1.5, 0.0, 0.0));
    }

    #[test]
    fn test_missing_field_rejected() {
        let line = r#"{"time":2,"voltage":1.5,"current":0.1}"#;
        assert_eq!(
            parse_line(line, MissingFieldPolicy::Reject),
            Err(ParseError::MissingField("resistance"))
        );
    }

    #[test]
    fn test_non_numeric_field() {
        let line = r#"{"time":2,"voltage":"high","current":0.1,"resistance":10}"#;

        let sample = parse_line(line, MissingFieldPolicy::Zero).unwrap().unwrap();
        assert_eq!(sample.voltage, 0.0);

        assert_eq!(
            parse_line(line, MissingFieldPolicy::Reject),
            Err(ParseError::InvalidField("voltage"))
        );
    }
}
