// # Attribute Schemas
//
// Each resource type declares its attributes with a small builder:
//
// ```rust,ignore
// Schema::new()
//     .attribute("display_name", Attribute::string().required().force_new())
//     .attribute("owners", Attribute::string_set().optional().computed().validate(Validator::Uuid))
// ```
//
// The provider facade uses the schema to validate raw configuration, fill in
// defaults and compute the planned values handed to handlers.

pub mod validators;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::{Error, Result};

pub use validators::Validator;

/// Element type of a list or set attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    String,
    Bool,
    Int,
    /// Nested block with its own attributes
    Block(Schema),
}

/// Attribute value type
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Bool,
    Int,
    /// Ordered collection
    List(Element),
    /// Unordered collection, compared order-insensitively
    Set(Element),
}

/// One attribute of a resource, data source or nested block
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub ty: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    pub deprecated: Option<&'static str>,
    pub default: Option<Value>,
    pub exactly_one_of: Vec<&'static str>,
    pub validators: Vec<Validator>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl Attribute {
    fn of(ty: AttributeType) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            deprecated: None,
            default: None,
            exactly_one_of: Vec::new(),
            validators: Vec::new(),
            min_items: None,
            max_items: None,
        }
    }

    pub fn string() -> Self {
        Self::of(AttributeType::String)
    }

    pub fn bool() -> Self {
        Self::of(AttributeType::Bool)
    }

    pub fn int() -> Self {
        Self::of(AttributeType::Int)
    }

    pub fn list_of(element: Element) -> Self {
        Self::of(AttributeType::List(element))
    }

    pub fn set_of(element: Element) -> Self {
        Self::of(AttributeType::Set(element))
    }

    pub fn string_list() -> Self {
        Self::list_of(Element::String)
    }

    pub fn string_set() -> Self {
        Self::set_of(Element::String)
    }

    pub fn block_list(schema: Schema) -> Self {
        Self::list_of(Element::Block(schema))
    }

    pub fn block_set(schema: Schema) -> Self {
        Self::set_of(Element::Block(schema))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn deprecated(mut self, message: &'static str) -> Self {
        self.deprecated = Some(message);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Exactly one attribute of the group (which always includes this one)
    /// must be configured.
    pub fn exactly_one_of(mut self, keys: &[&'static str]) -> Self {
        self.exactly_one_of = keys.to_vec();
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn is_set(&self) -> bool {
        matches!(self.ty, AttributeType::Set(_))
    }

    /// Computed and never configurable
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    fn nested(&self) -> Option<&Schema> {
        match &self.ty {
            AttributeType::List(Element::Block(s)) | AttributeType::Set(Element::Block(s)) => {
                Some(s)
            }
            _ => None,
        }
    }
}

/// Attributes of a resource, data source or nested block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    attributes: BTreeMap<&'static str, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (*k, v))
    }

    /// Names of top-level set-typed attributes
    pub fn set_attributes(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, a)| a.is_set())
            .map(|(k, _)| k.to_string())
            .collect()
    }

    /// Names of top-level attributes that cannot change in place
    pub fn force_new_attributes(&self) -> Vec<&'static str> {
        self.iter()
            .filter(|(_, a)| a.force_new)
            .map(|(k, _)| k)
            .collect()
    }

    /// Fill defaults for attributes missing from `config`, including inside
    /// nested blocks.
    pub fn apply_defaults(&self, config: &mut Map<String, Value>) {
        for (name, attr) in self.iter() {
            let missing = config.get(name).is_none_or(Value::is_null);
            if missing {
                if let Some(default) = &attr.default {
                    config.insert(name.to_string(), default.clone());
                }
                continue;
            }
            if let (Some(nested), Some(Value::Array(items))) = (attr.nested(), config.get_mut(name)) {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        nested.apply_defaults(obj);
                    }
                }
            }
        }
    }

    /// Planned values: configured values win, computed attributes that were
    /// left unset keep their prior value.
    pub fn plan(
        &self,
        config: &Map<String, Value>,
        prior: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut planned = Map::new();
        for (name, attr) in self.iter() {
            let configured = config.get(name).filter(|v| !v.is_null());
            let value = match configured {
                Some(v) => v.clone(),
                None if attr.computed => prior.get(name).cloned().unwrap_or(Value::Null),
                None => Value::Null,
            };
            planned.insert(name.to_string(), value);
        }
        planned
    }

    /// Validate raw configuration.
    ///
    /// Returns deprecation warnings on success; all errors are collected into
    /// a single [`Error::Validation`].
    pub fn validate(&self, config: &Map<String, Value>) -> Result<Vec<String>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        self.validate_into("", config, &mut errors, &mut warnings);

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(Error::validation(errors.join("; ")))
        }
    }

    fn validate_into(
        &self,
        prefix: &str,
        config: &Map<String, Value>,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        for key in config.keys() {
            if key != "id" && !self.attributes.contains_key(key.as_str()) {
                errors.push(format!("unsupported argument {:?}", path(prefix, key)));
            }
        }

        let mut checked_groups = BTreeSet::new();

        for (name, attr) in self.iter() {
            let full = path(prefix, name);
            let value = config.get(name).filter(|v| !v.is_null());

            if !attr.exactly_one_of.is_empty() {
                let mut group: Vec<&str> = attr.exactly_one_of.clone();
                group.push(name);
                group.sort_unstable();
                group.dedup();
                if checked_groups.insert(group.clone()) {
                    let set: Vec<&str> = group
                        .iter()
                        .copied()
                        .filter(|k| config.get(*k).is_some_and(is_configured))
                        .collect();
                    if set.len() != 1 {
                        errors.push(format!(
                            "exactly one of {:?} must be specified, got {}",
                            group,
                            if set.is_empty() { "none".to_string() } else { format!("{set:?}") }
                        ));
                    }
                }
            }

            let Some(value) = value else {
                if attr.required {
                    errors.push(format!("the argument {full:?} is required"));
                }
                continue;
            };

            if let Some(message) = attr.deprecated {
                warnings.push(format!("{full:?} is deprecated: {message}"));
            }

            match &attr.ty {
                AttributeType::String => {
                    if value.is_string() {
                        check_validators(&full, attr, value, errors);
                    } else {
                        errors.push(format!("expected {full:?} to be a string"));
                    }
                }
                AttributeType::Bool => {
                    if !value.is_boolean() {
                        errors.push(format!("expected {full:?} to be a bool"));
                    }
                }
                AttributeType::Int => {
                    if !value.is_i64() {
                        errors.push(format!("expected {full:?} to be an integer"));
                    }
                }
                AttributeType::List(element) | AttributeType::Set(element) => {
                    let Some(items) = value.as_array() else {
                        errors.push(format!("expected {full:?} to be a list"));
                        continue;
                    };
                    if let Some(min) = attr.min_items {
                        if items.len() < min {
                            errors.push(format!("{full:?} requires at least {min} item(s)"));
                        }
                    }
                    if let Some(max) = attr.max_items {
                        if items.len() > max {
                            errors.push(format!("{full:?} allows at most {max} item(s)"));
                        }
                    }
                    for (i, item) in items.iter().enumerate() {
                        let item_path = format!("{full}.{i}");
                        match element {
                            Element::String if item.is_string() => {
                                check_validators(&item_path, attr, item, errors)
                            }
                            Element::Bool if item.is_boolean() => {}
                            Element::Int if item.is_i64() => {}
                            Element::Block(nested) => match item.as_object() {
                                Some(obj) => nested.validate_into(&item_path, obj, errors, warnings),
                                None => errors.push(format!("expected {item_path:?} to be a block")),
                            },
                            _ => errors.push(format!("unexpected element type at {item_path:?}")),
                        }
                    }
                }
            }
        }
    }
}

fn path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn is_configured(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn check_validators(key: &str, attr: &Attribute, value: &Value, errors: &mut Vec<String>) {
    errors.extend(attr.validators.iter().filter_map(|v| v.check(key, value)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn group_like() -> Schema {
        Schema::new()
            .attribute(
                "display_name",
                Attribute::string()
                    .optional()
                    .computed()
                    .exactly_one_of(&["name"])
                    .validate(Validator::NoEmptyStrings),
            )
            .attribute(
                "name",
                Attribute::string()
                    .optional()
                    .computed()
                    .deprecated("renamed to display_name")
                    .exactly_one_of(&["display_name"]),
            )
            .attribute(
                "owners",
                Attribute::string_set().optional().computed().validate(Validator::Uuid),
            )
            .attribute("object_id", Attribute::string().computed())
            .attribute("prevent_duplicate_names", Attribute::bool().optional().default(false))
    }

    #[test]
    fn exactly_one_of_requires_one() {
        let schema = group_like();
        assert!(schema.validate(&obj(json!({"display_name": "g"}))).is_ok());
        assert!(schema.validate(&obj(json!({}))).is_err());
        assert!(schema.validate(&obj(json!({"display_name": "g", "name": "g"}))).is_err());
    }

    #[test]
    fn deprecated_attribute_warns() {
        let warnings = group_like().validate(&obj(json!({"name": "g"}))).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("deprecated"));
    }

    #[test]
    fn element_validators_run_per_item() {
        let err = group_like()
            .validate(&obj(json!({"display_name": "g", "owners": ["not-a-uuid"]})))
            .unwrap_err();
        assert!(err.to_string().contains("owners.0"));
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        assert!(group_like().validate(&obj(json!({"display_name": "g", "colour": "red"}))).is_err());
    }

    #[test]
    fn nested_blocks_validate_and_default() {
        let schema = Schema::new().attribute(
            "app_role",
            Attribute::block_set(
                Schema::new()
                    .attribute("display_name", Attribute::string().required())
                    .attribute("is_enabled", Attribute::bool().optional().default(true)),
            )
            .optional()
            .max_items(1),
        );

        assert!(schema.validate(&obj(json!({"app_role": [{}]}))).is_err());
        assert!(schema
            .validate(&obj(json!({"app_role": [{"display_name": "a"}, {"display_name": "b"}]})))
            .is_err());

        let mut config = obj(json!({"app_role": [{"display_name": "a"}]}));
        schema.apply_defaults(&mut config);
        assert_eq!(config["app_role"][0]["is_enabled"], json!(true));
    }

    #[test]
    fn plan_keeps_prior_computed_values() {
        let schema = group_like();
        let config = obj(json!({"display_name": "g"}));
        let prior = obj(json!({"display_name": "g", "name": "g", "object_id": "abc", "owners": ["x"]}));
        let planned = schema.plan(&config, &prior);
        assert_eq!(planned["object_id"], json!("abc"));
        assert_eq!(planned["owners"], json!(["x"]));
        assert_eq!(planned["prevent_duplicate_names"], Value::Null);
    }
}
