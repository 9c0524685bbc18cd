//! Storage backends, one per backend type.

use super::{put_opt, spec_mismatch, KindReconciler, PlanContext, PlanError};
use crate::crd::{BackendType, ResourceKind, ResourceSpec, StorageBackendSpec};
use crate::platform::LookupKey;
use serde_json::{Map, Value};

pub(super) struct StorageBackendReconciler;

fn spec<'a>(ctx: &PlanContext<'a>) -> Result<&'a StorageBackendSpec, PlanError> {
    match ctx.spec() {
        ResourceSpec::StorageBackend(spec) => Ok(spec),
        _ => Err(spec_mismatch(ResourceKind::StorageBackend)),
    }
}

impl KindReconciler for StorageBackendReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::StorageBackend
    }

    fn validate(&self, spec: &ResourceSpec) -> Result<(), PlanError> {
        let ResourceSpec::StorageBackend(spec) = spec else {
            return Err(spec_mismatch(ResourceKind::StorageBackend));
        };
        match (spec.backend, spec.replication) {
            (BackendType::Ceph, Some(0)) => Err(PlanError::Invalid(
                "ceph replication must be at least 1".to_string(),
            )),
            (BackendType::Lvm | BackendType::External, Some(_)) => Err(PlanError::Invalid(
                format!("replication is only supported by the ceph backend, not {}", spec.backend.as_str()),
            )),
            _ => Ok(()),
        }
    }

    fn lookup_key(&self, ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError> {
        Ok(LookupKey::default().with("backend", spec(ctx)?.backend.as_str()))
    }

    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError> {
        let spec = spec(ctx)?;
        let mut attrs = Map::new();
        attrs.insert("name".to_string(), ctx.resource.key.name.clone().into());
        attrs.insert("backend".to_string(), spec.backend.as_str().into());
        if !spec.services.is_empty() {
            let mut services = spec.services.clone();
            services.sort();
            attrs.insert("services".to_string(), services.join(",").into());
        }
        put_opt(&mut attrs, "replication", spec.replication);
        Ok(attrs)
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["backend"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DesiredResource, ResourceKey};
    use serde_json::json;

    #[test]
    fn services_are_sent_as_a_sorted_list() {
        let resource = DesiredResource::new(
            ResourceKey::new(ResourceKind::StorageBackend, "deployment", "ceph-store"),
            ResourceSpec::StorageBackend(StorageBackendSpec {
                backend: BackendType::Ceph,
                services: vec!["glance".to_string(), "cinder".to_string()],
                replication: Some(2),
            }),
        );
        let ctx = PlanContext::new(&resource, &[]);
        let attrs = StorageBackendReconciler.desired_attributes(&ctx).unwrap();
        assert_eq!(attrs["services"], json!("cinder,glance"));
        assert_eq!(attrs["replication"], json!(2));
    }

    #[test]
    fn replication_requires_ceph() {
        let spec = ResourceSpec::StorageBackend(StorageBackendSpec {
            backend: BackendType::Lvm,
            services: Vec::new(),
            replication: Some(2),
        });
        assert!(StorageBackendReconciler.validate(&spec).is_err());
    }
}
