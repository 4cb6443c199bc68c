use std::collections::BTreeMap;

use opnctl_domain::{template::parse_reference, ResourceId, ResourceInstance};
use serde_json::Value;

/// Resolve every `${resourceId.outputName}` reference in `instance`'s
/// properties against the in-memory output table, replacing the whole
/// property value with the predecessor's typed output. Run at task start,
/// against whichever predecessors have already committed by the start of
/// the current wave — never at plan time.
pub fn resolve_instance(
    instance: &ResourceInstance,
    resources: &BTreeMap<ResourceId, ResourceInstance>,
) -> Result<ResourceInstance, String> {
    let mut resolved = instance.clone();
    for (key, value) in resolved.properties.iter_mut() {
        let Value::String(raw) = value else { continue };
        let Some((resource_id, output_name)) = parse_reference(raw) else { continue };

        let predecessor = resources.get(&ResourceId::new(resource_id)).ok_or_else(|| {
            format!("property '{key}' references unknown resource '{resource_id}'")
        })?;
        let output = predecessor.outputs.get(output_name).ok_or_else(|| {
            format!("property '{key}' references undefined output '{resource_id}.{output_name}'")
        })?;
        *value = output.clone();
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opnctl_domain::{PropertyMap, TypeName};
    use std::collections::BTreeSet;

    fn instance_with(id: &str, properties: PropertyMap) -> ResourceInstance {
        ResourceInstance::new(ResourceId::new(id), TypeName::new("network.vlan"), id, properties, BTreeSet::new())
    }

    #[test]
    fn substitutes_a_predecessors_output() {
        let mut predecessor = instance_with("v", PropertyMap::new());
        predecessor.outputs.insert("device_key".to_string(), Value::String("igc3_vlan120".to_string()));
        let mut resources = BTreeMap::new();
        resources.insert(predecessor.id.clone(), predecessor);

        let mut props = PropertyMap::new();
        props.insert("interface".to_string(), Value::String("${v.device_key}".to_string()));
        let rule = instance_with("r", props);

        let resolved = resolve_instance(&rule, &resources).unwrap();
        assert_eq!(resolved.properties.get("interface"), Some(&Value::String("igc3_vlan120".to_string())));
    }

    #[test]
    fn errors_on_a_reference_to_an_undefined_output() {
        let predecessor = instance_with("v", PropertyMap::new());
        let mut resources = BTreeMap::new();
        resources.insert(predecessor.id.clone(), predecessor);

        let mut props = PropertyMap::new();
        props.insert("interface".to_string(), Value::String("${v.device_key}".to_string()));
        let rule = instance_with("r", props);

        assert!(resolve_instance(&rule, &resources).is_err());
    }

    #[test]
    fn leaves_non_reference_strings_untouched() {
        let mut props = PropertyMap::new();
        props.insert("description".to_string(), Value::String("dmz".to_string()));
        let instance = instance_with("v", props);
        let resolved = resolve_instance(&instance, &BTreeMap::new()).unwrap();
        assert_eq!(resolved.properties.get("description"), Some(&Value::String("dmz".to_string())));
    }
}
