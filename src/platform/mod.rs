//! # Platform API
//!
//! Boundary to the remote system-inventory API.
//!
//! The engine only sees the [`PlatformApi`] trait; [`client::SysinvClient`] is
//! the REST implementation. Entities are free-form attribute maps keyed by the
//! platform-assigned `uuid`, with an optional `task` the platform reports while
//! a long-running operation is in progress.

pub mod client;
pub mod error;

pub use client::SysinvClient;
pub use error::PlatformError;

use crate::crd::ResourceKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Remote representation of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformEntity {
    pub id: String,
    pub attributes: Map<String, Value>,
    /// In-progress operation reported by the platform
    pub task: Option<String>,
}

impl PlatformEntity {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Whether every field of `key` matches
    #[must_use]
    pub fn matches(&self, key: &LookupKey) -> bool {
        key.fields
            .iter()
            .all(|(field, value)| self.attributes.get(field) == Some(value))
    }
}

/// Attributes locating the entity of a resource
///
/// An empty key matches the first entity of the collection, which is how the
/// singleton system record is found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupKey {
    pub fields: Vec<(String, Value)>,
}

impl LookupKey {
    #[must_use]
    pub fn singleton() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.push((field.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub attributes: Map<String, Value>,
    /// Identical across retries of the same logical step
    pub client_request_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub changes: Map<String, Value>,
    pub client_request_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyAction {
    Lock,
    Unlock,
}

impl StrategyAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyAction::Lock => "lock",
            StrategyAction::Unlock => "unlock",
        }
    }
}

/// Bulk operation executed by the platform's orchestration service
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyBatch {
    pub kind: ResourceKind,
    pub action: StrategyAction,
    /// Platform ids of the entities the strategy applies to
    pub targets: Vec<String>,
    pub client_request_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyState {
    Applied,
    Applying,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub id: String,
    pub state: StrategyState,
    /// Per-target detail, if the platform reports any
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Operations of the remote inventory API
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Locate the entity of `kind` matching `key`
    async fn find(
        &self,
        kind: ResourceKind,
        key: &LookupKey,
    ) -> Result<Option<PlatformEntity>, PlatformError>;

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<PlatformEntity, PlatformError>;

    async fn create(
        &self,
        kind: ResourceKind,
        request: CreateRequest,
    ) -> Result<PlatformEntity, PlatformError>;

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        request: UpdateRequest,
    ) -> Result<PlatformEntity, PlatformError>;

    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        client_request_id: &str,
    ) -> Result<(), PlatformError>;

    async fn apply_strategy(&self, batch: StrategyBatch) -> Result<StrategyResult, PlatformError>;
}
