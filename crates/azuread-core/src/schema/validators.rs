//! Element validators attached to schema attributes.

use serde_json::Value;
use url::Url;

/// Value-level checks applied to a string attribute or each string element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// Parses as a UUID
    Uuid,
    /// Non-empty after trimming
    NoEmptyStrings,
    /// One of the listed values, case-sensitive
    StringInSlice(&'static [&'static str]),
    /// Absolute `http` or `https` URL with a host
    UrlIsHttpOrHttps,
    /// `http`, `https` or `api` URL, or a `urn:` identifier
    UrlIsAppUri,
    /// RFC 3339 timestamp
    Rfc3339,
    /// Character length within the inclusive range
    StringLenBetween(usize, usize),
}

impl Validator {
    /// Check `value` for attribute `key`, returning a message on failure
    pub fn check(&self, key: &str, value: &Value) -> Option<String> {
        let Some(s) = value.as_str() else {
            return Some(format!("expected {key:?} to be a string"));
        };

        match self {
            Validator::Uuid => uuid::Uuid::parse_str(s)
                .err()
                .map(|_| format!("{key:?} is not a valid UUID: {s:?}")),
            Validator::NoEmptyStrings => s
                .trim()
                .is_empty()
                .then(|| format!("{key:?} must not be empty")),
            Validator::StringInSlice(allowed) => (!allowed.contains(&s)).then(|| {
                format!("expected {key:?} to be one of {allowed:?}, got {s:?}")
            }),
            Validator::UrlIsHttpOrHttps => check_url(key, s, &["http", "https"]),
            Validator::UrlIsAppUri => {
                if s.starts_with("urn:") {
                    None
                } else {
                    check_url(key, s, &["http", "https", "api"])
                }
            }
            Validator::Rfc3339 => chrono::DateTime::parse_from_rfc3339(s)
                .err()
                .map(|e| format!("{key:?} is not a valid RFC3339 timestamp: {e}")),
            Validator::StringLenBetween(min, max) => {
                let len = s.chars().count();
                (len < *min || len > *max).then(|| {
                    format!("expected length of {key:?} to be in the range ({min} - {max}), got {len}")
                })
            }
        }
    }
}

fn check_url(key: &str, s: &str, schemes: &[&str]) -> Option<String> {
    match Url::parse(s) {
        Ok(url) if !schemes.contains(&url.scheme()) => Some(format!(
            "expected {key:?} to have a scheme of {schemes:?}, got {:?}",
            url.scheme()
        )),
        Ok(url) if url.host_str().is_none_or(str::is_empty) => {
            Some(format!("{key:?} must have a host: {s:?}"))
        }
        Ok(_) => None,
        Err(e) => Some(format!("{key:?} is not a valid URL ({e}): {s:?}")),
    }
}
