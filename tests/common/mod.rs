//! Shared fixtures for the engine and platform client tests.
//!
//! [`FakePlatform`] keeps platform entities in memory and records every call,
//! so tests can assert on exactly which remote operations an attempt issued.
#![allow(dead_code)]

use async_trait::async_trait;
use deployment_manager_controller::config::ControllerConfig;
use deployment_manager_controller::crd::{
    AdministrativeState, DataNetworkSpec, DataNetworkType, DesiredResource, HostSpec,
    InterfaceSpec, Personality, ResourceKey, ResourceKind, ResourceSpec, SystemSpec,
};
use deployment_manager_controller::platform::{
    CreateRequest, LookupKey, PlatformApi, PlatformEntity, PlatformError, StrategyBatch,
    StrategyResult, StrategyState, UpdateRequest,
};
use deployment_manager_controller::controller::reconciler::Reconciler;
use deployment_manager_controller::store::MemoryStore;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use std::time::Duration;

pub const NAMESPACE: &str = "deployment";

static RUSTLS_INIT: Once = Once::new();

/// Install the ring crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// A platform call as the engine issued it
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find(ResourceKind),
    Get(ResourceKind, String),
    Create(ResourceKind, String),
    Update(ResourceKind, String, Vec<String>),
    Delete(ResourceKind, String),
    Strategy(ResourceKind, String),
}

impl Call {
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Call::Find(_) | Call::Get(..))
    }
}

/// Operation a queued failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Find,
    Get,
    Create,
    Update,
    Delete,
    Strategy,
}

#[derive(Debug, Default)]
struct FakeState {
    entities: BTreeMap<ResourceKind, Vec<PlatformEntity>>,
    calls: Vec<Call>,
    failures: VecDeque<(Operation, PlatformError)>,
    stalls: Vec<Operation>,
    next_id: u64,
}

impl FakeState {
    fn take_failure(&mut self, operation: Operation) -> Result<(), PlatformError> {
        match self.failures.iter().position(|(op, _)| *op == operation) {
            Some(index) => match self.failures.remove(index) {
                Some((_, err)) => Err(err),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn entity_mut(&mut self, kind: ResourceKind, id: &str) -> Option<&mut PlatformEntity> {
        self.entities
            .get_mut(&kind)
            .and_then(|list| list.iter_mut().find(|e| e.id == id))
    }
}

/// In-memory inventory with call recording and failure injection
#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an entity as if the platform already had it
    pub fn seed(&self, kind: ResourceKind, id: &str, attributes: Value) {
        let Value::Object(mut attributes) = attributes else {
            panic!("attributes must be an object");
        };
        attributes.insert("uuid".to_string(), Value::from(id));
        self.state()
            .entities
            .entry(kind)
            .or_default()
            .push(PlatformEntity {
                id: id.to_string(),
                attributes,
                task: None,
            });
    }

    /// Mark an entity busy with a long-running task
    pub fn set_task(&self, kind: ResourceKind, id: &str, task: Option<&str>) {
        if let Some(entity) = self.state().entity_mut(kind, id) {
            entity.task = task.map(str::to_string);
        }
    }

    /// The next call of `operation` fails with `err`
    pub fn fail_next(&self, operation: Operation, err: PlatformError) {
        self.state().failures.push_back((operation, err));
    }

    /// The next call of `operation` never answers
    pub fn stall_next(&self, operation: Operation) {
        self.state().stalls.push(operation);
    }

    async fn stall(&self, operation: Operation) {
        let stalled = {
            let mut state = self.state();
            match state.stalls.iter().position(|op| *op == operation) {
                Some(index) => {
                    state.stalls.remove(index);
                    true
                }
                None => false,
            }
        };
        if stalled {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    #[must_use]
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    #[must_use]
    pub fn entities(&self, kind: ResourceKind) -> Vec<PlatformEntity> {
        self.state().entities.get(&kind).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn find(
        &self,
        kind: ResourceKind,
        key: &LookupKey,
    ) -> Result<Option<PlatformEntity>, PlatformError> {
        self.stall(Operation::Find).await;
        let mut state = self.state();
        state.calls.push(Call::Find(kind));
        state.take_failure(Operation::Find)?;
        Ok(state
            .entities
            .get(&kind)
            .and_then(|list| list.iter().find(|e| e.matches(key)).cloned()))
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<PlatformEntity, PlatformError> {
        self.stall(Operation::Get).await;
        let mut state = self.state();
        state.calls.push(Call::Get(kind, id.to_string()));
        state.take_failure(Operation::Get)?;
        state
            .entity_mut(kind, id)
            .map(|e| e.clone())
            .ok_or_else(|| PlatformError::NotFound(format!("{kind} {id}")))
    }

    async fn create(
        &self,
        kind: ResourceKind,
        request: CreateRequest,
    ) -> Result<PlatformEntity, PlatformError> {
        self.stall(Operation::Create).await;
        let mut state = self.state();
        state
            .calls
            .push(Call::Create(kind, request.client_request_id.clone()));
        state.take_failure(Operation::Create)?;
        state.next_id += 1;
        let id = format!("{}-{}", kind.label(), state.next_id);
        let mut attributes: Map<String, Value> = request.attributes;
        attributes.insert("uuid".to_string(), Value::from(id.as_str()));
        let entity = PlatformEntity {
            id,
            attributes,
            task: None,
        };
        state.entities.entry(kind).or_default().push(entity.clone());
        Ok(entity)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        request: UpdateRequest,
    ) -> Result<PlatformEntity, PlatformError> {
        self.stall(Operation::Update).await;
        let mut state = self.state();
        state.calls.push(Call::Update(
            kind,
            id.to_string(),
            request.changes.keys().cloned().collect(),
        ));
        state.take_failure(Operation::Update)?;
        let entity = state
            .entity_mut(kind, id)
            .ok_or_else(|| PlatformError::NotFound(format!("{kind} {id}")))?;
        for (field, value) in request.changes {
            entity.attributes.insert(field, value);
        }
        Ok(entity.clone())
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        _client_request_id: &str,
    ) -> Result<(), PlatformError> {
        self.stall(Operation::Delete).await;
        let mut state = self.state();
        state.calls.push(Call::Delete(kind, id.to_string()));
        state.take_failure(Operation::Delete)?;
        let list = state.entities.entry(kind).or_default();
        let before = list.len();
        list.retain(|e| e.id != id);
        if list.len() == before {
            return Err(PlatformError::NotFound(format!("{kind} {id}")));
        }
        Ok(())
    }

    async fn apply_strategy(&self, batch: StrategyBatch) -> Result<StrategyResult, PlatformError> {
        self.stall(Operation::Strategy).await;
        let mut state = self.state();
        state
            .calls
            .push(Call::Strategy(batch.kind, batch.action.as_str().to_string()));
        state.take_failure(Operation::Strategy)?;
        let administrative = match batch.action.as_str() {
            "lock" => "locked",
            _ => "unlocked",
        };
        for target in &batch.targets {
            if let Some(entity) = state.entity_mut(batch.kind, target) {
                entity
                    .attributes
                    .insert("administrative".to_string(), Value::from(administrative));
            }
        }
        state.next_id += 1;
        Ok(StrategyResult {
            id: format!("strategy-{}", state.next_id),
            state: StrategyState::Applied,
            items: Vec::new(),
        })
    }
}

/// Engine over an in-memory store and a fake platform with default settings
#[must_use]
pub fn reconciler(store: &Arc<MemoryStore>, platform: &Arc<FakePlatform>) -> Reconciler {
    Reconciler::new(store.clone(), platform.clone(), ControllerConfig::default())
}

#[must_use]
pub fn key(kind: ResourceKind, name: &str) -> ResourceKey {
    ResourceKey::new(kind, NAMESPACE, name)
}

#[must_use]
pub fn system() -> DesiredResource {
    DesiredResource::new(
        key(ResourceKind::System, "default"),
        ResourceSpec::System(SystemSpec {
            timezone: Some("UTC".to_string()),
            ..SystemSpec::default()
        }),
    )
}

#[must_use]
pub fn data_network(name: &str, mtu: u32) -> DesiredResource {
    DesiredResource::new(
        key(ResourceKind::DataNetwork, name),
        ResourceSpec::DataNetwork(DataNetworkSpec {
            network_type: DataNetworkType::Vlan,
            mtu: Some(mtu),
            description: None,
        }),
    )
}

/// An unlocked controller host
#[must_use]
pub fn host(name: &str, boot_mac: &str, location: &str) -> DesiredResource {
    DesiredResource::new(
        key(ResourceKind::Host, name),
        ResourceSpec::Host(HostSpec {
            hostname: Some(name.to_string()),
            personality: Personality::Controller,
            boot_mac: boot_mac.to_string(),
            location: Some(location.to_string()),
            install_device: None,
            console: None,
            administrative_state: AdministrativeState::Unlocked,
            ptp_instances: Vec::new(),
        }),
    )
}

/// A VLAN interface stacked on `lower`
#[must_use]
pub fn interface(name: &str, host: &str, lower: &[&str]) -> DesiredResource {
    DesiredResource::new(
        key(ResourceKind::Interface, name),
        ResourceSpec::Interface(InterfaceSpec {
            host: host.to_string(),
            interface_name: name.to_string(),
            interface_class: Default::default(),
            interface_type: Default::default(),
            port: None,
            vlan_id: None,
            lower_interfaces: lower.iter().map(|s| (*s).to_string()).collect(),
            platform_networks: Vec::new(),
            data_networks: Vec::new(),
            mtu: None,
        }),
    )
}

/// Seed the system record and converge the System resource
pub async fn converged_system(store: &Arc<MemoryStore>, platform: &Arc<FakePlatform>) {
    platform.seed(
        ResourceKind::System,
        "system-uuid",
        serde_json::json!({"name": "default", "timezone": "UTC"}),
    );
    store.insert(system());
    let ctx = reconciler(store, platform);
    deployment_manager_controller::controller::reconciler::reconcile(
        &ctx,
        &key(ResourceKind::System, "default"),
    )
    .await
    .expect("system reconcile");
    platform.clear_calls();
}
