//! The attribute map one handler call works on.
//!
//! Handlers read planned values with the typed getters, write observed
//! values with [`ResourceData::set`], and signal "the object is gone" with
//! [`ResourceData::clear_id`].

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Timeouts;
use crate::provider::Operation;

#[derive(Debug, Clone)]
pub struct ResourceData {
    type_name: String,
    id: String,
    planned: Map<String, Value>,
    prior: Map<String, Value>,
    values: Map<String, Value>,
    set_attributes: HashSet<String>,
    timeouts: Timeouts,
    deadline: Option<Instant>,
}

impl ResourceData {
    /// Data for `type_name` with planned values and the prior state (empty on create)
    pub fn new(
        type_name: impl Into<String>,
        id: impl Into<String>,
        planned: Map<String, Value>,
        prior: Map<String, Value>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            values: planned.clone(),
            planned,
            prior,
            set_attributes: HashSet::new(),
            timeouts: Timeouts::default(),
            deadline: None,
        }
    }

    /// Attributes whose values compare order-insensitively
    pub fn with_set_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_attributes = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Point in time by which the running operation has to finish
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the resource as absent
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_absent(&self) -> bool {
        self.id.is_empty()
    }

    /// Current value, `None` when unset or null
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// Current value when it is set to something other than its zero value
    /// (empty string, `false`, `0`, empty collection).
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !is_zero(v))
    }

    /// String value, empty when unset
    pub fn get_str(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// Non-empty string value
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_ok(key).and_then(Value::as_str).map(str::to_string)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or_default()
    }

    /// Bool value only when explicitly set
    pub fn get_bool_opt(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// String elements of a list or set attribute
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get_list(key)
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    /// Elements of a list or set attribute
    pub fn get_list(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Prior-state value, used by updates that need the old value
    pub fn prior(&self, key: &str) -> Option<&Value> {
        self.prior.get(key).filter(|v| !v.is_null())
    }

    /// Whether the planned value differs from the prior state
    pub fn has_change(&self, key: &str) -> bool {
        let old = self.prior(key);
        let new = self.planned.get(key).filter(|v| !v.is_null());
        if self.set_attributes.contains(key) {
            return !same_set(old, new);
        }
        match (old, new) {
            (None, None) => false,
            (Some(a), Some(b)) => a != b,
            (Some(v), None) | (None, Some(v)) => !is_zero(v),
        }
    }

    /// Whether any of `keys` changed
    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    /// Record an observed value. Values that fail to serialize are stored as null.
    pub fn set(&mut self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.values.insert(key.to_string(), value);
    }

    /// Timeout for `operation`
    pub fn timeout(&self, operation: Operation) -> Duration {
        self.timeouts.for_operation(operation)
    }

    /// Budget left for `operation`.
    ///
    /// Replication waits are bounded by this rather than by [`Self::timeout`]
    /// so they expire before the operation itself does.
    pub fn remaining(&self, operation: Operation) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => self.timeout(operation),
        }
    }

    /// Resulting attribute map including `id`
    pub fn state(&self) -> Map<String, Value> {
        let mut state = self.values.clone();
        state.insert("id".to_string(), Value::String(self.id.clone()));
        state
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn same_set(old: Option<&Value>, new: Option<&Value>) -> bool {
    let items = |v: Option<&Value>| -> Vec<String> {
        let mut items: Vec<String> = v
            .and_then(Value::as_array)
            .map(|a| a.iter().map(canonical).collect())
            .unwrap_or_default();
        items.sort();
        items.dedup();
        items
    };
    items(old) == items(new)
}

fn canonical(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string(),
    }
}
