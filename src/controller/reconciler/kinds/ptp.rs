//! PTP instances and the interfaces bound to them.

use super::{spec_mismatch, KindReconciler, PlanContext, PlanError};
use crate::crd::{PtpInstanceSpec, PtpInterfaceSpec, ResourceKind, ResourceSpec};
use crate::platform::LookupKey;
use serde_json::{Map, Value};

pub(super) struct PtpInstanceReconciler;

pub(super) struct PtpInterfaceReconciler;

fn by_name(ctx: &PlanContext<'_>) -> LookupKey {
    LookupKey::default().with("name", ctx.resource.key.name.as_str())
}

fn sorted(values: &[String]) -> Vec<String> {
    let mut values = values.to_vec();
    values.sort();
    values
}

/// Parameters are `key=value` pairs
fn validate_parameters(parameters: &[String]) -> Result<(), PlanError> {
    match parameters
        .iter()
        .find(|p| !matches!(p.split_once('='), Some((key, _)) if !key.trim().is_empty()))
    {
        Some(bad) => Err(PlanError::Invalid(format!(
            "parameter '{bad}' is not of the form key=value"
        ))),
        None => Ok(()),
    }
}

fn instance_spec<'a>(ctx: &PlanContext<'a>) -> Result<&'a PtpInstanceSpec, PlanError> {
    match ctx.spec() {
        ResourceSpec::PtpInstance(spec) => Ok(spec),
        _ => Err(spec_mismatch(ResourceKind::PtpInstance)),
    }
}

fn interface_spec<'a>(ctx: &PlanContext<'a>) -> Result<&'a PtpInterfaceSpec, PlanError> {
    match ctx.spec() {
        ResourceSpec::PtpInterface(spec) => Ok(spec),
        _ => Err(spec_mismatch(ResourceKind::PtpInterface)),
    }
}

impl KindReconciler for PtpInstanceReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PtpInstance
    }

    fn validate(&self, spec: &ResourceSpec) -> Result<(), PlanError> {
        match spec {
            ResourceSpec::PtpInstance(spec) => validate_parameters(&spec.parameters),
            _ => Err(spec_mismatch(ResourceKind::PtpInstance)),
        }
    }

    fn lookup_key(&self, ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError> {
        Ok(by_name(ctx))
    }

    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError> {
        let spec = instance_spec(ctx)?;
        let mut attrs = Map::new();
        attrs.insert("name".to_string(), ctx.resource.key.name.clone().into());
        attrs.insert("service".to_string(), spec.service.as_str().into());
        attrs.insert("parameters".to_string(), sorted(&spec.parameters).into());
        Ok(attrs)
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["service"]
    }
}

impl KindReconciler for PtpInterfaceReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PtpInterface
    }

    fn validate(&self, spec: &ResourceSpec) -> Result<(), PlanError> {
        match spec {
            ResourceSpec::PtpInterface(spec) => validate_parameters(&spec.parameters),
            _ => Err(spec_mismatch(ResourceKind::PtpInterface)),
        }
    }

    fn lookup_key(&self, ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError> {
        Ok(by_name(ctx))
    }

    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError> {
        let spec = interface_spec(ctx)?;
        let mut attrs = Map::new();
        attrs.insert("name".to_string(), ctx.resource.key.name.clone().into());
        attrs.insert(
            "ptp_instance_uuid".to_string(),
            ctx.required_id(ResourceKind::PtpInstance, &spec.ptp_instance)?
                .into(),
        );
        // Interfaces are a soft prerequisite: attach the ones that are Ready
        attrs.insert(
            "interface_uuids".to_string(),
            ctx.ready_ids(ResourceKind::Interface, &spec.interfaces).into(),
        );
        attrs.insert("parameters".to_string(), sorted(&spec.parameters).into());
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::dependency::ReadyDependency;
    use crate::controller::reconciler::kinds::tests::entity;
    use crate::controller::reconciler::kinds::Step;
    use crate::crd::{DesiredResource, PtpService, ResourceKey, ResourceRef};
    use serde_json::json;

    #[test]
    fn interface_attaches_ready_interfaces_only() {
        let resource = DesiredResource::new(
            ResourceKey::new(ResourceKind::PtpInterface, "deployment", "ptpif1"),
            ResourceSpec::PtpInterface(PtpInterfaceSpec {
                ptp_instance: "ptp1".to_string(),
                interfaces: vec!["if-a".to_string(), "if-b".to_string()],
                parameters: Vec::new(),
            }),
        );
        let deps = vec![
            ReadyDependency {
                upstream: ResourceRef::new(ResourceKind::PtpInstance, "ptp1"),
                platform_id: Some("p1".to_string()),
                hard: true,
            },
            ReadyDependency {
                upstream: ResourceRef::new(ResourceKind::Interface, "if-b"),
                platform_id: Some("i2".to_string()),
                hard: false,
            },
        ];
        let ctx = PlanContext::new(&resource, &deps);
        let attrs = PtpInterfaceReconciler.desired_attributes(&ctx).unwrap();
        assert_eq!(attrs["ptp_instance_uuid"], json!("p1"));
        assert_eq!(attrs["interface_uuids"], json!(["i2"]));
    }

    #[test]
    fn instance_in_sync_is_converged() {
        let resource = DesiredResource::new(
            ResourceKey::new(ResourceKind::PtpInstance, "deployment", "ptp1"),
            ResourceSpec::PtpInstance(PtpInstanceSpec {
                service: PtpService::Ptp4l,
                parameters: vec!["priority2=100".to_string(), "domainNumber=24".to_string()],
            }),
        );
        let ctx = PlanContext::new(&resource, &[]);
        let current = entity(
            "p1",
            json!({
                "uuid": "p1",
                "name": "ptp1",
                "service": "ptp4l",
                "parameters": ["domainNumber=24", "priority2=100"],
            }),
        );
        assert_eq!(
            PtpInstanceReconciler.plan(&ctx, Some(&current)).unwrap(),
            Step::Converged
        );
    }

    #[test]
    fn malformed_parameter_is_invalid() {
        let spec = ResourceSpec::PtpInstance(PtpInstanceSpec {
            service: PtpService::Phc2sys,
            parameters: vec!["=1".to_string()],
        });
        assert!(PtpInstanceReconciler.validate(&spec).is_err());
    }
}
