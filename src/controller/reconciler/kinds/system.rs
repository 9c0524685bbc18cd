//! The system record. The platform creates it during installation; the
//! controller only ever updates it.

use super::{put_list, put_opt, spec_mismatch, KindReconciler, PlanContext, PlanError};
use crate::crd::{ResourceKind, ResourceSpec, SystemSpec};
use crate::platform::LookupKey;
use serde_json::{Map, Value};

pub(super) struct SystemReconciler;

fn spec<'a>(ctx: &PlanContext<'a>) -> Result<&'a SystemSpec, PlanError> {
    match ctx.spec() {
        ResourceSpec::System(spec) => Ok(spec),
        _ => Err(spec_mismatch(ResourceKind::System)),
    }
}

impl KindReconciler for SystemReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::System
    }

    fn lookup_key(&self, _ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError> {
        Ok(LookupKey::singleton())
    }

    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError> {
        let spec = spec(ctx)?;
        let mut attrs = Map::new();
        put_opt(&mut attrs, "description", spec.description.clone());
        put_opt(&mut attrs, "location", spec.location.clone());
        put_opt(&mut attrs, "contact", spec.contact.clone());
        put_opt(&mut attrs, "timezone", spec.timezone.clone());
        put_list(&mut attrs, "dns_servers", &spec.dns_servers);
        put_list(&mut attrs, "ntp_servers", &spec.ntp_servers);
        Ok(attrs)
    }

    fn allows_create(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::kinds::tests::entity;
    use crate::controller::reconciler::kinds::Step;
    use crate::crd::{DesiredResource, ResourceKey};
    use serde_json::json;

    fn resource() -> DesiredResource {
        DesiredResource::new(
            ResourceKey::new(ResourceKind::System, "deployment", "default"),
            ResourceSpec::System(SystemSpec {
                timezone: Some("UTC".to_string()),
                dns_servers: vec!["8.8.8.8".to_string()],
                ..SystemSpec::default()
            }),
        )
    }

    #[test]
    fn missing_record_is_waited_for() {
        let resource = resource();
        let ctx = PlanContext::new(&resource, &[]);
        assert!(matches!(SystemReconciler.plan(&ctx, None), Ok(Step::Wait(_))));
    }

    #[test]
    fn differing_timezone_updates() {
        let resource = resource();
        let ctx = PlanContext::new(&resource, &[]);
        let current = entity(
            "s1",
            json!({"uuid": "s1", "timezone": "EST", "dns_servers": ["8.8.8.8"]}),
        );
        let Ok(Step::Update { id, changes }) = SystemReconciler.plan(&ctx, Some(&current)) else {
            panic!("expected an update");
        };
        assert_eq!(id, "s1");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["timezone"], json!("UTC"));
    }
}
