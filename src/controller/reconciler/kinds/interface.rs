//! Host interfaces.
//!
//! Located by the owning host's platform id and the interface name. Lower
//! interfaces and networks are resolved to platform ids from the Ready
//! prerequisites, so an interface is only planned once all of them exist.

use super::{put_opt, spec_mismatch, KindReconciler, PlanContext, PlanError};
use crate::crd::{InterfaceSpec, InterfaceType, ResourceKind, ResourceSpec};
use crate::platform::LookupKey;
use serde_json::{Map, Value};

pub(super) struct InterfaceReconciler;

fn spec<'a>(ctx: &PlanContext<'a>) -> Result<&'a InterfaceSpec, PlanError> {
    match ctx.spec() {
        ResourceSpec::Interface(spec) => Ok(spec),
        _ => Err(spec_mismatch(ResourceKind::Interface)),
    }
}

impl KindReconciler for InterfaceReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Interface
    }

    fn validate(&self, spec: &ResourceSpec) -> Result<(), PlanError> {
        let ResourceSpec::Interface(spec) = spec else {
            return Err(spec_mismatch(ResourceKind::Interface));
        };
        match spec.interface_type {
            InterfaceType::Vlan => {
                if spec.vlan_id.is_none() {
                    return Err(PlanError::Invalid(
                        "vlan interfaces require vlanId".to_string(),
                    ));
                }
                if spec.lower_interfaces.len() != 1 {
                    return Err(PlanError::Invalid(format!(
                        "vlan interfaces require exactly one lower interface, got {}",
                        spec.lower_interfaces.len()
                    )));
                }
            }
            InterfaceType::Ae => {
                if spec.lower_interfaces.is_empty() {
                    return Err(PlanError::Invalid(
                        "ae interfaces require at least one lower interface".to_string(),
                    ));
                }
            }
            InterfaceType::Ethernet => {
                if spec.vlan_id.is_some() {
                    return Err(PlanError::Invalid(
                        "vlanId is only valid on vlan interfaces".to_string(),
                    ));
                }
            }
        }
        if let Some(vlan_id) = spec.vlan_id {
            if !(1..=4094).contains(&vlan_id) {
                return Err(PlanError::Invalid(format!(
                    "vlanId {vlan_id} is outside 1-4094"
                )));
            }
        }
        Ok(())
    }

    fn lookup_key(&self, ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError> {
        let spec = spec(ctx)?;
        let host = ctx.required_id(ResourceKind::Host, &spec.host)?;
        Ok(LookupKey::default()
            .with("ihost_uuid", host)
            .with("ifname", spec.interface_name.as_str()))
    }

    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError> {
        let spec = spec(ctx)?;
        let mut attrs = Map::new();
        attrs.insert(
            "ihost_uuid".to_string(),
            ctx.required_id(ResourceKind::Host, &spec.host)?.into(),
        );
        attrs.insert("ifname".to_string(), spec.interface_name.clone().into());
        attrs.insert("ifclass".to_string(), spec.interface_class.as_str().into());
        attrs.insert("iftype".to_string(), spec.interface_type.as_str().into());
        put_opt(&mut attrs, "vlan_id", spec.vlan_id);
        put_opt(&mut attrs, "port", spec.port.clone());
        put_opt(&mut attrs, "imtu", spec.mtu);

        let uses = ctx.required_ids(ResourceKind::Interface, &spec.lower_interfaces)?;
        if !uses.is_empty() {
            attrs.insert("uses".to_string(), uses.into());
        }
        let networks = ctx.required_ids(ResourceKind::PlatformNetwork, &spec.platform_networks)?;
        if !networks.is_empty() {
            attrs.insert("networks".to_string(), networks.into());
        }
        let datanetworks = ctx.required_ids(ResourceKind::DataNetwork, &spec.data_networks)?;
        if !datanetworks.is_empty() {
            attrs.insert("datanetworks".to_string(), datanetworks.into());
        }
        Ok(attrs)
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["iftype"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::dependency::ReadyDependency;
    use crate::controller::reconciler::kinds::Step;
    use crate::crd::{DesiredResource, InterfaceClass, ResourceKey, ResourceRef};
    use serde_json::json;

    fn vlan(lower: Vec<&str>) -> DesiredResource {
        DesiredResource::new(
            ResourceKey::new(ResourceKind::Interface, "deployment", "controller-0-mgmt0"),
            ResourceSpec::Interface(InterfaceSpec {
                host: "controller-0".to_string(),
                interface_name: "mgmt0".to_string(),
                interface_class: InterfaceClass::Platform,
                interface_type: InterfaceType::Vlan,
                port: None,
                vlan_id: Some(166),
                lower_interfaces: lower.into_iter().map(str::to_string).collect(),
                platform_networks: vec!["mgmt".to_string()],
                data_networks: Vec::new(),
                mtu: Some(1500),
            }),
        )
    }

    fn dep(kind: ResourceKind, name: &str, id: &str) -> ReadyDependency {
        ReadyDependency {
            upstream: ResourceRef::new(kind, name),
            platform_id: Some(id.to_string()),
            hard: true,
        }
    }

    #[test]
    fn vlan_needs_exactly_one_lower_interface() {
        let resource = vlan(vec!["enp0s8", "enp0s9"]);
        assert!(InterfaceReconciler.validate(&resource.spec).is_err());
        let resource = vlan(vec!["enp0s8"]);
        assert!(InterfaceReconciler.validate(&resource.spec).is_ok());
    }

    #[test]
    fn create_carries_owner_and_upstream_ids() {
        let resource = vlan(vec!["controller-0-enp0s8"]);
        let deps = vec![
            dep(ResourceKind::Host, "controller-0", "h1"),
            dep(ResourceKind::Interface, "controller-0-enp0s8", "i1"),
            dep(ResourceKind::PlatformNetwork, "mgmt", "n1"),
        ];
        let ctx = PlanContext::new(&resource, &deps);
        let Ok(Step::Create(attrs)) = InterfaceReconciler.plan(&ctx, None) else {
            panic!("expected a create");
        };
        assert_eq!(attrs["ihost_uuid"], json!("h1"));
        assert_eq!(attrs["uses"], json!(["i1"]));
        assert_eq!(attrs["networks"], json!(["n1"]));
        assert_eq!(attrs["vlan_id"], json!(166));
        assert!(!attrs.contains_key("datanetworks"));
    }

    #[test]
    fn unresolved_owner_is_transient() {
        let resource = vlan(vec!["controller-0-enp0s8"]);
        let ctx = PlanContext::new(&resource, &[]);
        let err = InterfaceReconciler.lookup_key(&ctx).unwrap_err();
        assert_eq!(err.class(), crate::controller::retry::ErrorClass::Transient);
    }
}
