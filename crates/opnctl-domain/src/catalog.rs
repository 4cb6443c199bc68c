//! The built-in OPNsense resource type catalog: VLANs, firewall rules and
//! NAT, the DNS blocklist, HAProxy backends/frontends, and DHCP static
//! mappings. Resource-specific effector bodies are opaque (§1); this module
//! only declares the schema, idempotency keys and replace-on-change sets
//! the Planner and Engine need.

use std::collections::BTreeSet;

use crate::error::{DomainError, ValidationWarning};
use crate::ids::{ResourceId, TypeName};
use crate::instance::PropertyMap;
use crate::registry::Registry;
use crate::schema::{FieldSpec, FieldType, TypeDefinition};

fn str_field(name: &'static str, props: &PropertyMap) -> Option<&str> {
    props.get(name).and_then(|v| v.as_str())
}

fn vlan_type() -> TypeDefinition {
    TypeDefinition {
        name: TypeName::new("network.vlan"),
        fields: vec![
            FieldSpec::required("device", FieldType::String),
            FieldSpec::required("tag", FieldType::Int).with_range(1, 4094),
            FieldSpec::optional("description", FieldType::String),
        ],
        idempotency_key: vec!["device", "tag"],
        replace_on_change: BTreeSet::from(["device", "tag"]),
        cross_field_rules: vec![],
    }
}

fn firewall_rule_type() -> TypeDefinition {
    fn port_required_for_tcp_udp(
        id: &ResourceId,
        props: &PropertyMap,
    ) -> (Vec<DomainError>, Vec<ValidationWarning>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let protocol = str_field("protocol", props).unwrap_or("any");
        let port_present = props.get("port").is_some();
        if matches!(protocol, "tcp" | "udp") && !port_present {
            errors.push(DomainError::CrossField {
                id: id.clone(),
                message: "field 'port' is required when protocol is tcp or udp".to_string(),
            });
        }

        let action = str_field("action", props).unwrap_or("");
        let source = str_field("source", props).unwrap_or("");
        let destination = str_field("destination", props).unwrap_or("");
        if action == "pass" && source == "any" && destination == "any" {
            warnings.push(ValidationWarning {
                resource_id: id.clone(),
                message: "rule passes any -> any; consider narrowing source/destination"
                    .to_string(),
            });
        }

        (errors, warnings)
    }

    TypeDefinition {
        name: TypeName::new("firewall.rule"),
        fields: vec![
            FieldSpec::required("interface", FieldType::String),
            FieldSpec::required(
                "action",
                FieldType::Enum(vec!["pass".into(), "block".into(), "reject".into()]),
            ),
            FieldSpec::required(
                "protocol",
                FieldType::Enum(vec!["tcp".into(), "udp".into(), "icmp".into(), "any".into()]),
            ),
            FieldSpec::required("source", FieldType::String),
            FieldSpec::required("destination", FieldType::String),
            FieldSpec::optional("port", FieldType::Int).with_range(1, 65535),
        ],
        idempotency_key: vec!["interface", "action", "protocol", "source", "destination", "port"],
        replace_on_change: BTreeSet::new(),
        cross_field_rules: vec![port_required_for_tcp_udp],
    }
}

fn firewall_nat_type() -> TypeDefinition {
    TypeDefinition {
        name: TypeName::new("firewall.nat"),
        fields: vec![
            FieldSpec::required("interface", FieldType::String),
            FieldSpec::required(
                "protocol",
                FieldType::Enum(vec!["tcp".into(), "udp".into(), "any".into()]),
            ),
            FieldSpec::required("external_port", FieldType::Int).with_range(1, 65535),
            FieldSpec::required("internal_ip", FieldType::String),
            FieldSpec::required("internal_port", FieldType::Int).with_range(1, 65535),
        ],
        idempotency_key: vec!["interface", "external_port", "protocol"],
        replace_on_change: BTreeSet::from(["interface"]),
        cross_field_rules: vec![],
    }
}

fn dns_blocklist_type() -> TypeDefinition {
    TypeDefinition {
        name: TypeName::new("services.dns.blocklist"),
        fields: vec![
            FieldSpec::required("name", FieldType::String),
            FieldSpec::required("domains", FieldType::StringList),
        ],
        idempotency_key: vec!["name"],
        replace_on_change: BTreeSet::new(),
        cross_field_rules: vec![],
    }
}

fn haproxy_backend_type() -> TypeDefinition {
    TypeDefinition {
        name: TypeName::new("services.haproxy.backend"),
        fields: vec![
            FieldSpec::required("name", FieldType::String),
            FieldSpec::required("mode", FieldType::Enum(vec!["http".into(), "tcp".into()])),
            FieldSpec::required("servers", FieldType::StringList),
        ],
        idempotency_key: vec!["name"],
        replace_on_change: BTreeSet::from(["name"]),
        cross_field_rules: vec![],
    }
}

fn haproxy_frontend_type() -> TypeDefinition {
    TypeDefinition {
        name: TypeName::new("services.haproxy.frontend"),
        fields: vec![
            FieldSpec::required("name", FieldType::String),
            FieldSpec::required("bind_address", FieldType::String),
            FieldSpec::required("bind_port", FieldType::Int).with_range(1, 65535),
            FieldSpec::required("mode", FieldType::Enum(vec!["http".into(), "tcp".into()])),
            FieldSpec::required("default_backend", FieldType::String),
        ],
        idempotency_key: vec!["name"],
        replace_on_change: BTreeSet::from(["name", "bind_address", "bind_port"]),
        cross_field_rules: vec![],
    }
}

fn dhcp_static_mapping_type() -> TypeDefinition {
    TypeDefinition {
        name: TypeName::new("services.dhcp.static_mapping"),
        fields: vec![
            FieldSpec::required("interface", FieldType::String),
            FieldSpec::required("mac_address", FieldType::String),
            FieldSpec::required("ip_address", FieldType::String),
            FieldSpec::optional("hostname", FieldType::String),
        ],
        idempotency_key: vec!["interface", "mac_address"],
        replace_on_change: BTreeSet::from(["interface", "mac_address"]),
        cross_field_rules: vec![],
    }
}

/// Build a [`Registry`] pre-populated with the built-in OPNsense resource
/// types. Callers may `register()` additional types afterward.
pub fn with_builtin_types() -> Registry {
    let mut registry = Registry::new();
    for def in [
        vlan_type(),
        firewall_rule_type(),
        firewall_nat_type(),
        dns_blocklist_type(),
        haproxy_backend_type(),
        haproxy_frontend_type(),
        dhcp_static_mapping_type(),
    ] {
        registry.register(def).expect("built-in type registration cannot conflict");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::BTreeSet as Set;

    #[test]
    fn firewall_rule_requires_port_for_tcp() {
        let registry = with_builtin_types();
        let mut props = PropertyMap::new();
        props.insert("interface".into(), Value::String("wan".into()));
        props.insert("action".into(), Value::String("pass".into()));
        props.insert("protocol".into(), Value::String("tcp".into()));
        props.insert("source".into(), Value::String("any".into()));
        props.insert("destination".into(), Value::String("10.0.0.5".into()));

        let err = registry
            .create(
                TypeName::new("firewall.rule"),
                ResourceId::new("r"),
                "allow-ssh",
                props,
                Set::new(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::CrossField { .. }));
    }

    #[test]
    fn firewall_rule_any_any_pass_warns_not_errors() {
        let registry = with_builtin_types();
        let mut props = PropertyMap::new();
        props.insert("interface".into(), Value::String("wan".into()));
        props.insert("action".into(), Value::String("pass".into()));
        props.insert("protocol".into(), Value::String("any".into()));
        props.insert("source".into(), Value::String("any".into()));
        props.insert("destination".into(), Value::String("any".into()));

        let instance = registry
            .create(
                TypeName::new("firewall.rule"),
                ResourceId::new("r"),
                "wide-open",
                props,
                Set::new(),
            )
            .unwrap();
        let outcome = registry.validate(&instance).unwrap();
        assert!(outcome.is_ok());
        assert_eq!(outcome.warnings.len(), 1);
    }
}
