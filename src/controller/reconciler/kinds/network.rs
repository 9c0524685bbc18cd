//! Platform and data networks.

use super::{put_opt, spec_mismatch, KindReconciler, PlanContext, PlanError};
use crate::crd::{DataNetworkSpec, PlatformNetworkSpec, ResourceKind, ResourceSpec};
use crate::platform::LookupKey;
use serde_json::{Map, Value};
use std::net::IpAddr;

pub(super) struct PlatformNetworkReconciler;

pub(super) struct DataNetworkReconciler;

fn by_name(ctx: &PlanContext<'_>) -> LookupKey {
    LookupKey::default().with("name", ctx.resource.key.name.as_str())
}

fn platform_spec<'a>(ctx: &PlanContext<'a>) -> Result<&'a PlatformNetworkSpec, PlanError> {
    match ctx.spec() {
        ResourceSpec::PlatformNetwork(spec) => Ok(spec),
        _ => Err(spec_mismatch(ResourceKind::PlatformNetwork)),
    }
}

fn data_spec<'a>(ctx: &PlanContext<'a>) -> Result<&'a DataNetworkSpec, PlanError> {
    match ctx.spec() {
        ResourceSpec::DataNetwork(spec) => Ok(spec),
        _ => Err(spec_mismatch(ResourceKind::DataNetwork)),
    }
}

fn parse_ip(field: &str, value: &str) -> Result<IpAddr, PlanError> {
    value
        .parse()
        .map_err(|_| PlanError::Invalid(format!("{field} '{value}' is not an IP address")))
}

impl KindReconciler for PlatformNetworkReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PlatformNetwork
    }

    fn validate(&self, spec: &ResourceSpec) -> Result<(), PlanError> {
        let ResourceSpec::PlatformNetwork(spec) = spec else {
            return Err(spec_mismatch(ResourceKind::PlatformNetwork));
        };
        let subnet = parse_ip("subnet", &spec.subnet)?;
        let max_prefix = if subnet.is_ipv4() { 32 } else { 128 };
        if spec.prefix > max_prefix {
            return Err(PlanError::Invalid(format!(
                "prefix /{} is out of range for {}",
                spec.prefix, spec.subnet
            )));
        }
        for (field, value) in [
            ("gateway", &spec.gateway),
            ("rangeStart", &spec.range_start),
            ("rangeEnd", &spec.range_end),
        ] {
            if let Some(value) = value {
                if parse_ip(field, value)?.is_ipv4() != subnet.is_ipv4() {
                    return Err(PlanError::Invalid(format!(
                        "{field} '{value}' is not in the address family of {}",
                        spec.subnet
                    )));
                }
            }
        }
        Ok(())
    }

    fn lookup_key(&self, ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError> {
        Ok(by_name(ctx))
    }

    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError> {
        let spec = platform_spec(ctx)?;
        let mut attrs = Map::new();
        attrs.insert("name".to_string(), ctx.resource.key.name.clone().into());
        attrs.insert("type".to_string(), spec.network_type.clone().into());
        attrs.insert("subnet".to_string(), spec.subnet.clone().into());
        attrs.insert("prefix".to_string(), spec.prefix.into());
        attrs.insert("dynamic".to_string(), spec.dynamic.into());
        put_opt(&mut attrs, "gateway", spec.gateway.clone());
        put_opt(&mut attrs, "range_start", spec.range_start.clone());
        put_opt(&mut attrs, "range_end", spec.range_end.clone());
        Ok(attrs)
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["type", "subnet", "prefix"]
    }
}

impl KindReconciler for DataNetworkReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DataNetwork
    }

    fn lookup_key(&self, ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError> {
        Ok(by_name(ctx))
    }

    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError> {
        let spec = data_spec(ctx)?;
        let mut attrs = Map::new();
        attrs.insert("name".to_string(), ctx.resource.key.name.clone().into());
        attrs.insert("network_type".to_string(), spec.network_type.as_str().into());
        put_opt(&mut attrs, "mtu", spec.mtu);
        put_opt(&mut attrs, "description", spec.description.clone());
        Ok(attrs)
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["network_type"]
    }
}
