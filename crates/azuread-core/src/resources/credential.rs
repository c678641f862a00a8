//! Password credential resources (`azuread_application_password`,
//! `azuread_service_principal_password`).

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema, Validator};
use crate::{Error, Result};

/// Longest secret the directory accepts
pub const MAX_PASSWORD_LENGTH: usize = 863;

/// Schema for a password credential attached to the object named by `parent_attr`
pub fn password_schema(parent_attr: &'static str) -> Schema {
    Schema::new()
        .attribute(
            parent_attr,
            Attribute::string()
                .required()
                .force_new()
                .validate(Validator::Uuid),
        )
        .attribute(
            "key_id",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .validate(Validator::Uuid),
        )
        .attribute("description", Attribute::string().optional().computed().force_new())
        .attribute(
            "value",
            Attribute::string()
                .required()
                .force_new()
                .sensitive()
                .validate(Validator::StringLenBetween(1, MAX_PASSWORD_LENGTH)),
        )
        .attribute(
            "start_date",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .validate(Validator::Rfc3339),
        )
        .attribute(
            "end_date",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .exactly_one_of(&["end_date_relative"])
                .validate(Validator::Rfc3339),
        )
        .attribute(
            "end_date_relative",
            Attribute::string()
                .optional()
                .force_new()
                .exactly_one_of(&["end_date"])
                .validate(Validator::NoEmptyStrings),
        )
}

/// A password credential as configured, ready to be mapped onto a backend model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSpec {
    pub key_id: String,
    pub value: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
}

impl PasswordSpec {
    /// Build from resource data, generating a key ID when none is configured
    /// and resolving `end_date_relative` against `now`.
    pub fn from_resource(d: &ResourceData, now: DateTime<Utc>) -> Result<Self> {
        let key_id = d
            .get_string("key_id")
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let end_date = if let Some(end) = d.get_string("end_date") {
            parse_rfc3339("end_date", &end)?
        } else if let Some(relative) = d.get_string("end_date_relative") {
            now + parse_relative_duration(&relative)?
        } else {
            return Err(Error::validation(
                "one of `end_date` or `end_date_relative` must be specified",
            ));
        };

        let start_date = d
            .get_string("start_date")
            .map(|s| parse_rfc3339("start_date", &s))
            .transpose()?;

        Ok(Self {
            key_id,
            value: d.get_str("value").to_string(),
            description: d.get_string("description"),
            start_date,
            end_date,
        })
    }
}

fn parse_rfc3339(key: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::validation(format!("unable to parse {key} {value:?}: {e}")))
}

/// Parse a duration such as `240h`, `1h30m` or `-1.5h`.
///
/// Accepts a signed sequence of decimal numbers each followed by one of the
/// units `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`.
pub fn parse_relative_duration(input: &str) -> Result<Duration> {
    let invalid = || Error::validation(format!("unable to parse end_date_relative {input:?} as a duration"));

    let (negative, mut rest) = match input.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    if rest == "0" {
        return Ok(Duration::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total_nanos += number * nanos_per_unit;
    }

    if !total_nanos.is_finite() || total_nanos > i64::MAX as f64 {
        return Err(invalid());
    }
    let nanos = total_nanos.round() as i64;
    Ok(Duration::nanoseconds(if negative { -nanos } else { nanos }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn data(planned: serde_json::Value) -> ResourceData {
        ResourceData::new(
            "azuread_service_principal_password",
            "",
            planned.as_object().cloned().unwrap(),
            Map::new(),
        )
    }

    #[test]
    fn relative_durations() {
        assert_eq!(parse_relative_duration("240h").unwrap(), Duration::hours(240));
        assert_eq!(
            parse_relative_duration("1h30m").unwrap(),
            Duration::minutes(90)
        );
        assert_eq!(
            parse_relative_duration("1.5h").unwrap(),
            Duration::minutes(90)
        );
        assert_eq!(parse_relative_duration("-10s").unwrap(), Duration::seconds(-10));
        assert_eq!(parse_relative_duration("0").unwrap(), Duration::zero());
        assert!(parse_relative_duration("10").is_err());
        assert!(parse_relative_duration("10d").is_err());
        assert!(parse_relative_duration("").is_err());
        assert!(parse_relative_duration("h").is_err());
    }

    #[test]
    fn spec_from_relative_end_date() {
        let now = Utc::now();
        let spec = PasswordSpec::from_resource(
            &data(json!({"value": "s3cret", "end_date_relative": "24h", "description": "ci"})),
            now,
        )
        .unwrap();
        assert_eq!(spec.end_date, now + Duration::hours(24));
        assert_eq!(spec.description.as_deref(), Some("ci"));
        assert!(Uuid::parse_str(&spec.key_id).is_ok());
        assert_eq!(spec.start_date, None);
    }

    #[test]
    fn spec_keeps_configured_key_and_dates() {
        let spec = PasswordSpec::from_resource(
            &data(json!({
                "value": "s3cret",
                "key_id": "00000000-0000-0000-0000-000000000001",
                "start_date": "2020-01-01T00:00:00Z",
                "end_date": "2030-01-01T00:00:00Z",
            })),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(spec.key_id, "00000000-0000-0000-0000-000000000001");
        assert_eq!(spec.end_date.to_rfc3339(), "2030-01-01T00:00:00+00:00");
        assert!(spec.start_date.is_some());
    }

    #[test]
    fn spec_requires_an_end_date() {
        assert!(PasswordSpec::from_resource(&data(json!({"value": "s"})), Utc::now()).is_err());
    }

    #[test]
    fn end_dates_are_mutually_exclusive() {
        let schema = password_schema("service_principal_id");
        let config = json!({
            "service_principal_id": "00000000-0000-0000-0000-000000000001",
            "value": "s",
            "end_date": "2030-01-01T00:00:00Z",
            "end_date_relative": "24h",
        });
        assert!(schema.validate(config.as_object().unwrap()).is_err());
    }
}
