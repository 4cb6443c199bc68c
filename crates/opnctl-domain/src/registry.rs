use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::{DomainError, ValidationOutcome};
use crate::ids::{ResourceId, TypeName};
use crate::instance::{PropertyMap, ResourceInstance};
use crate::schema::TypeDefinition;

/// Result of [`Registry::diff_properties`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyDiff {
    pub changed: BTreeSet<String>,
    pub replace_required: bool,
}

/// The authoritative catalog of resource types and factory for instances.
///
/// Frozen after `with_builtin_types()` plus any caller `register()` calls
/// complete: nothing removes an entry once added, and duplicate
/// registration with a differing schema is an error rather than a silent
/// overwrite.
#[derive(Default)]
pub struct Registry {
    types: BTreeMap<TypeName, TypeDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { types: BTreeMap::new() }
    }

    /// Register a type definition. Idempotent: re-registering the exact same
    /// field set and idempotency key for a type name is a no-op; registering
    /// a differing schema under an already-known name is an error.
    pub fn register(&mut self, def: TypeDefinition) -> Result<(), DomainError> {
        if let Some(existing) = self.types.get(&def.name) {
            if !schemas_equivalent(existing, &def) {
                return Err(DomainError::ConflictingRegistration { name: def.name.clone() });
            }
            return Ok(());
        }
        self.types.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn type_def(&self, type_name: &TypeName) -> Result<&TypeDefinition, DomainError> {
        self.types
            .get(type_name)
            .ok_or_else(|| DomainError::UnknownType(type_name.clone()))
    }

    pub fn list_types(&self, category: Option<&str>) -> Vec<TypeName> {
        self.types
            .keys()
            .filter(|t| category.map_or(true, |c| t.category() == c))
            .cloned()
            .collect()
    }

    /// Materialize a typed instance, normalizing stringly-typed values
    /// (e.g. `"120"` -> `120` for an `Int` field) and eagerly validating.
    /// Validation failures here are fatal to the containing plan.
    pub fn create(
        &self,
        type_name: TypeName,
        id: ResourceId,
        name: impl Into<String>,
        raw_properties: PropertyMap,
        dependencies: BTreeSet<ResourceId>,
    ) -> Result<ResourceInstance, DomainError> {
        let def = self.type_def(&type_name)?;
        let normalized = normalize_properties(def, raw_properties);
        let instance = ResourceInstance::new(id, type_name, name, normalized, dependencies);
        self.validate(&instance)?.into_result()?;
        Ok(instance)
    }

    /// Enforce schema: required fields, ranges, enum membership, cross-field
    /// rules. Errors are blocking; warnings are permissive-but-notable
    /// configurations.
    pub fn validate(&self, instance: &ResourceInstance) -> Result<ValidationOutcome, DomainError> {
        let def = self.type_def(&instance.type_name)?;
        let (errors, warnings) = def.validate(&instance.id, &instance.properties);
        Ok(ValidationOutcome { errors, warnings })
    }

    /// Field-level comparison using the type's canonicalization.
    /// `replace_required` is true iff any changed field is in `replaceOnChange`.
    pub fn diff_properties(
        &self,
        type_name: &TypeName,
        before: &PropertyMap,
        after: &PropertyMap,
    ) -> Result<PropertyDiff, DomainError> {
        let def = self.type_def(type_name)?;
        let mut changed = BTreeSet::new();
        let all_keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
        for key in all_keys {
            let b = before.get(key);
            let a = after.get(key);
            if b != a {
                changed.insert(key.clone());
            }
        }
        let replace_required = changed
            .iter()
            .any(|k| def.replace_on_change.contains(k.as_str()));
        Ok(PropertyDiff { changed, replace_required })
    }
}

fn schemas_equivalent(a: &TypeDefinition, b: &TypeDefinition) -> bool {
    a.fields.len() == b.fields.len()
        && a.idempotency_key == b.idempotency_key
        && a.replace_on_change == b.replace_on_change
        && a.fields.iter().zip(b.fields.iter()).all(|(x, y)| {
            x.name == y.name && x.field_type == y.field_type && x.required == y.required
        })
}

/// Coerce stringly-typed API values (e.g. `"120"` for an int field, `"true"`
/// for a bool field) into their canonical JSON representation.
fn normalize_properties(def: &TypeDefinition, raw: PropertyMap) -> PropertyMap {
    let mut out = PropertyMap::new();
    for (key, value) in raw {
        let normalized = match (def.field(&key), &value) {
            (Some(spec), Value::String(s)) => match spec.field_type {
                crate::schema::FieldType::Int => s
                    .parse::<i64>()
                    .map(|i| Value::Number(i.into()))
                    .unwrap_or(value),
                crate::schema::FieldType::Bool => s
                    .parse::<bool>()
                    .map(Value::Bool)
                    .unwrap_or(value),
                _ => value,
            },
            _ => value,
        };
        out.insert(key, normalized);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn create_normalizes_stringly_typed_int() {
        let registry = catalog::with_builtin_types();
        let mut props = PropertyMap::new();
        props.insert("device".into(), Value::String("igc3".into()));
        props.insert("tag".into(), Value::String("120".into()));
        let instance = registry
            .create(
                TypeName::new("network.vlan"),
                ResourceId::new("v"),
                "dmz",
                props,
                BTreeSet::new(),
            )
            .unwrap();
        assert_eq!(instance.properties.get("tag"), Some(&Value::Number(120.into())));
    }

    #[test]
    fn create_rejects_out_of_range_tag() {
        let registry = catalog::with_builtin_types();
        let mut props = PropertyMap::new();
        props.insert("device".into(), Value::String("igc3".into()));
        props.insert("tag".into(), Value::Number(5000.into()));
        let err = registry
            .create(
                TypeName::new("network.vlan"),
                ResourceId::new("v"),
                "dmz",
                props,
                BTreeSet::new(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::OutOfRange { .. }));
    }

    #[test]
    fn diff_properties_flags_replace_on_tag_change() {
        let registry = catalog::with_builtin_types();
        let mut before = PropertyMap::new();
        before.insert("device".into(), Value::String("igc3".into()));
        before.insert("tag".into(), Value::Number(120.into()));
        let mut after = before.clone();
        after.insert("tag".into(), Value::Number(130.into()));

        let diff = registry
            .diff_properties(&TypeName::new("network.vlan"), &before, &after)
            .unwrap();
        assert!(diff.replace_required);
        assert!(diff.changed.contains("tag"));
    }

    #[test]
    fn diff_properties_in_place_on_description_change() {
        let registry = catalog::with_builtin_types();
        let mut before = PropertyMap::new();
        before.insert("device".into(), Value::String("igc3".into()));
        before.insert("tag".into(), Value::Number(120.into()));
        before.insert("description".into(), Value::String("dmz".into()));
        let mut after = before.clone();
        after.insert("description".into(), Value::String("dmz-prod".into()));

        let diff = registry
            .diff_properties(&TypeName::new("network.vlan"), &before, &after)
            .unwrap();
        assert!(!diff.replace_required);
        assert_eq!(diff.changed, BTreeSet::from(["description".to_string()]));
    }
}
