use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, ValidationWarning};
use crate::ids::{ResourceId, TypeName};
use crate::instance::PropertyMap;

/// The shape a property value must take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Bool,
    /// One of a fixed set of string values.
    Enum(Vec<String>),
    /// A list of strings (e.g. blocklist domains, haproxy server entries).
    StringList,
}

impl FieldType {
    fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Bool => "bool",
            FieldType::Enum(_) => "enum",
            FieldType::StringList => "string_list",
        }
    }
}

/// One typed, constrained field in a resource type's property schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    /// Inclusive numeric range, only meaningful for [`FieldType::Int`].
    pub range: Option<(i64, i64)>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        FieldSpec { name, field_type, required: true, range: None }
    }

    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        FieldSpec { name, field_type, required: false, range: None }
    }

    pub const fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    fn check(&self, id: &ResourceId, props: &PropertyMap) -> Vec<DomainError> {
        let mut errors = Vec::new();
        let Some(value) = props.get(self.name) else {
            if self.required {
                errors.push(DomainError::MissingField {
                    id: id.clone(),
                    field: self.name.to_string(),
                });
            }
            return errors;
        };

        match (&self.field_type, value) {
            (FieldType::String, Value::String(_)) => {}
            (FieldType::Bool, Value::Bool(_)) => {}
            (FieldType::Int, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    if let Some((min, max)) = self.range {
                        if i < min || i > max {
                            errors.push(DomainError::OutOfRange {
                                id: id.clone(),
                                field: self.name.to_string(),
                                value: i,
                                min,
                                max,
                            });
                        }
                    }
                } else {
                    errors.push(DomainError::WrongFieldType {
                        id: id.clone(),
                        field: self.name.to_string(),
                        expected: "int".to_string(),
                    });
                }
            }
            (FieldType::Enum(allowed), Value::String(s)) => {
                if !allowed.iter().any(|a| a == s) {
                    errors.push(DomainError::NotInEnum {
                        id: id.clone(),
                        field: self.name.to_string(),
                        value: s.clone(),
                        allowed: allowed.clone(),
                    });
                }
            }
            (FieldType::StringList, Value::Array(items)) => {
                if !items.iter().all(|v| v.is_string()) {
                    errors.push(DomainError::WrongFieldType {
                        id: id.clone(),
                        field: self.name.to_string(),
                        expected: "string_list".to_string(),
                    });
                }
            }
            _ => errors.push(DomainError::WrongFieldType {
                id: id.clone(),
                field: self.name.to_string(),
                expected: self.field_type.type_name().to_string(),
            }),
        }
        errors
    }
}

/// A cross-field rule evaluated after per-field checks pass structurally.
/// Returns additional errors and/or permissive-configuration warnings.
pub type CrossFieldRule = fn(&ResourceId, &PropertyMap) -> (Vec<DomainError>, Vec<ValidationWarning>);

/// The registered catalog entry for one resource type.
#[derive(Clone)]
pub struct TypeDefinition {
    pub name: TypeName,
    pub fields: Vec<FieldSpec>,
    /// Subset of field names that jointly form the idempotency key
    /// (e.g. VLAN `(device, tag)`).
    pub idempotency_key: Vec<&'static str>,
    /// Field names whose value appearing in `dependencies` templating is
    /// irrelevant here; this lists fields that, when changed, force
    /// delete-then-create instead of in-place update.
    pub replace_on_change: BTreeSet<&'static str>,
    pub cross_field_rules: Vec<CrossFieldRule>,
}

impl TypeDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self, id: &ResourceId, props: &PropertyMap) -> (Vec<DomainError>, Vec<ValidationWarning>) {
        let mut errors = Vec::new();
        for field in &self.fields {
            errors.extend(field.check(id, props));
        }
        let mut warnings = Vec::new();
        if errors.is_empty() {
            for rule in &self.cross_field_rules {
                let (e, w) = rule(id, props);
                errors.extend(e);
                warnings.extend(w);
            }
        }
        (errors, warnings)
    }

    /// Compute the canonical idempotency key value for an instance's properties.
    pub fn idempotency_value(&self, props: &PropertyMap) -> Value {
        let mut map = serde_json::Map::new();
        for key in &self.idempotency_key {
            if let Some(v) = props.get(key) {
                map.insert((*key).to_string(), v.clone());
            }
        }
        Value::Object(map)
    }
}
