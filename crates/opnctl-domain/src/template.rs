use std::collections::BTreeSet;

use serde_json::Value;

use crate::ids::ResourceId;
use crate::instance::PropertyMap;

/// Parse a `${resourceId.outputName}` reference out of a single string
/// value. A property must be *exactly* one reference; partial interpolation
/// inside a larger string is not supported.
pub fn parse_reference(s: &str) -> Option<(&str, &str)> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    inner.split_once('.')
}

/// Resource ids referenced via output templating in any string-valued
/// property. Combined with the caller-declared `dependencies` set, these
/// form the full edge set used for wave ordering and risk analysis — a
/// rule that templates its interface from a VLAN's output depends on that
/// VLAN just as much as one that lists it in `dependencies` explicitly.
pub fn referenced_resource_ids(properties: &PropertyMap) -> BTreeSet<ResourceId> {
    properties
        .values()
        .filter_map(|v| match v {
            Value::String(s) => parse_reference(s),
            _ => None,
        })
        .map(|(id, _)| ResourceId::new(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_reference() {
        assert_eq!(parse_reference("${v.device_key}"), Some(("v", "device_key")));
    }

    #[test]
    fn rejects_strings_that_are_not_a_bare_reference() {
        assert_eq!(parse_reference("plain"), None);
        assert_eq!(parse_reference("prefix ${v.device_key}"), None);
    }

    #[test]
    fn collects_every_referenced_id_in_a_property_map() {
        let mut props = PropertyMap::new();
        props.insert("interface".into(), Value::String("${v.device_key}".into()));
        props.insert("description".into(), Value::String("dmz".into()));
        let ids = referenced_resource_ids(&props);
        assert_eq!(ids, BTreeSet::from([ResourceId::new("v")]));
    }
}
