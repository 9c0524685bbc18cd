//! Hosts.
//!
//! Provisioning attributes can only change while the host is locked, so a
//! change walks through: lock via strategy, update, unlock via strategy. Each
//! step is recognisable from the entity's `administrative` attribute, which
//! keeps the sequence restartable at any point.

use super::{
    diff, put_opt, spec_mismatch, KindReconciler, PlanContext, PlanError, Step,
};
use crate::crd::{AdministrativeState, HostSpec, ResourceKind, ResourceSpec};
use crate::platform::{LookupKey, PlatformEntity, StrategyAction};
use serde_json::{Map, Value};

pub(super) struct HostReconciler;

pub(crate) const ADMINISTRATIVE: &str = "administrative";

fn spec<'a>(ctx: &PlanContext<'a>) -> Result<&'a HostSpec, PlanError> {
    match ctx.spec() {
        ResourceSpec::Host(spec) => Ok(spec),
        _ => Err(spec_mismatch(ResourceKind::Host)),
    }
}

fn boot_mac(spec: &HostSpec) -> String {
    spec.boot_mac.to_ascii_lowercase()
}

impl KindReconciler for HostReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Host
    }

    fn validate(&self, spec: &ResourceSpec) -> Result<(), PlanError> {
        let ResourceSpec::Host(spec) = spec else {
            return Err(spec_mismatch(ResourceKind::Host));
        };
        let octets: Vec<&str> = spec.boot_mac.split(':').collect();
        let valid = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
        if valid {
            Ok(())
        } else {
            Err(PlanError::Invalid(format!(
                "bootMac '{}' is not a MAC address",
                spec.boot_mac
            )))
        }
    }

    fn lookup_key(&self, ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError> {
        Ok(LookupKey::default().with("mgmt_mac", boot_mac(spec(ctx)?)))
    }

    /// Provisioning attributes; the administrative state is handled separately
    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError> {
        let spec = spec(ctx)?;
        let mut attrs = Map::new();
        attrs.insert("mgmt_mac".to_string(), boot_mac(spec).into());
        attrs.insert("personality".to_string(), spec.personality.as_str().into());
        put_opt(&mut attrs, "hostname", spec.hostname.clone());
        put_opt(&mut attrs, "location", spec.location.clone());
        put_opt(&mut attrs, "install_device", spec.install_device.clone());
        put_opt(&mut attrs, "console", spec.console.clone());
        let ptp = ctx.ready_ids(ResourceKind::PtpInstance, &spec.ptp_instances);
        if !ptp.is_empty() {
            attrs.insert("ptp_instance_uuids".to_string(), ptp.into());
        }
        Ok(attrs)
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        &["personality"]
    }

    fn plan(
        &self,
        ctx: &PlanContext<'_>,
        entity: Option<&PlatformEntity>,
    ) -> Result<Step, PlanError> {
        let desired = self.desired_attributes(ctx)?;
        let Some(entity) = entity else {
            return Ok(Step::Create(desired));
        };
        if let Some(task) = &entity.task {
            return Ok(Step::Wait(task.clone()));
        }
        super::check_immutable(self.immutable_fields(), &desired, entity)?;

        let locked =
            entity.attribute_str(ADMINISTRATIVE) == Some(AdministrativeState::Locked.as_str());
        let changes = diff(&desired, entity);
        if !changes.is_empty() {
            return Ok(if locked {
                Step::Update {
                    id: entity.id.clone(),
                    changes,
                }
            } else {
                Step::Strategy {
                    action: StrategyAction::Lock,
                    target: entity.id.clone(),
                }
            });
        }

        let want = spec(ctx)?.administrative_state;
        let have_matches = entity.attribute_str(ADMINISTRATIVE) == Some(want.as_str());
        if have_matches {
            return Ok(Step::Converged);
        }
        let action = match want {
            AdministrativeState::Locked => StrategyAction::Lock,
            AdministrativeState::Unlocked => StrategyAction::Unlock,
        };
        Ok(Step::Strategy {
            action,
            target: entity.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::dependency::ReadyDependency;
    use crate::controller::reconciler::kinds::tests::entity;
    use crate::crd::{DesiredResource, Personality, ResourceKey, ResourceRef};
    use serde_json::json;

    fn resource(state: AdministrativeState) -> DesiredResource {
        DesiredResource::new(
            ResourceKey::new(ResourceKind::Host, "deployment", "controller-0"),
            ResourceSpec::Host(HostSpec {
                hostname: Some("controller-0".to_string()),
                personality: Personality::Controller,
                boot_mac: "08:00:27:AA:BB:CC".to_string(),
                location: Some("rack-1".to_string()),
                install_device: None,
                console: None,
                administrative_state: state,
                ptp_instances: vec!["ptp1".to_string(), "ptp2".to_string()],
            }),
        )
    }

    fn current(administrative: &str, location: &str) -> PlatformEntity {
        entity(
            "h1",
            json!({
                "uuid": "h1",
                "mgmt_mac": "08:00:27:aa:bb:cc",
                "personality": "controller",
                "hostname": "controller-0",
                "location": location,
                "administrative": administrative,
            }),
        )
    }

    #[test]
    fn provisioning_change_on_unlocked_host_locks_first() {
        let resource = resource(AdministrativeState::Unlocked);
        let ctx = PlanContext::new(&resource, &[]);
        let step = HostReconciler.plan(&ctx, Some(&current("unlocked", "rack-2"))).unwrap();
        assert_eq!(
            step,
            Step::Strategy {
                action: StrategyAction::Lock,
                target: "h1".to_string()
            }
        );
    }

    #[test]
    fn locked_host_is_updated_then_unlocked() {
        let resource = resource(AdministrativeState::Unlocked);
        let ctx = PlanContext::new(&resource, &[]);

        let step = HostReconciler.plan(&ctx, Some(&current("locked", "rack-2"))).unwrap();
        assert!(matches!(step, Step::Update { ref changes, .. } if changes.contains_key("location")));

        let step = HostReconciler.plan(&ctx, Some(&current("locked", "rack-1"))).unwrap();
        assert_eq!(
            step,
            Step::Strategy {
                action: StrategyAction::Unlock,
                target: "h1".to_string()
            }
        );

        let step = HostReconciler.plan(&ctx, Some(&current("unlocked", "rack-1"))).unwrap();
        assert_eq!(step, Step::Converged);
    }

    #[test]
    fn only_ready_ptp_instances_are_attached() {
        let resource = resource(AdministrativeState::Unlocked);
        let deps = vec![ReadyDependency {
            upstream: ResourceRef::new(ResourceKind::PtpInstance, "ptp2"),
            platform_id: Some("p2".to_string()),
            hard: false,
        }];
        let ctx = PlanContext::new(&resource, &deps);
        let attrs = HostReconciler.desired_attributes(&ctx).unwrap();
        assert_eq!(attrs["ptp_instance_uuids"], json!(["p2"]));
    }

    #[test]
    fn malformed_mac_is_rejected() {
        let mut resource = resource(AdministrativeState::Locked);
        if let ResourceSpec::Host(spec) = &mut resource.spec {
            spec.boot_mac = "not-a-mac".to_string();
        }
        assert!(matches!(
            HostReconciler.validate(&resource.spec),
            Err(PlanError::Invalid(_))
        ));
    }
}
