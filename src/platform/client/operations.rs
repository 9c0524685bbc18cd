//! [`PlatformApi`] operations over REST.

use super::requests::{replace_ops, StrategyRequest};
use super::responses::{entities_from_list, entity_from_value, StrategyResponse};
use super::{Call, SysinvClient};
use crate::crd::ResourceKind;
use crate::platform::{
    CreateRequest, LookupKey, PlatformApi, PlatformEntity, PlatformError, StrategyBatch,
    StrategyResult, UpdateRequest,
};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

#[async_trait]
impl PlatformApi for SysinvClient {
    async fn find(
        &self,
        kind: ResourceKind,
        key: &LookupKey,
    ) -> Result<Option<PlatformEntity>, PlatformError> {
        let collection = kind.collection();
        let response = self
            .execute(Call {
                kind,
                operation: "find",
                method: Method::GET,
                path: collection.to_string(),
                client_request_id: None,
                body: None,
            })
            .await?;
        let body: Value = response.json().await?;
        Ok(entities_from_list(body, collection)?
            .into_iter()
            .find(|entity| entity.matches(key)))
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<PlatformEntity, PlatformError> {
        let response = self
            .execute(Call {
                kind,
                operation: "get",
                method: Method::GET,
                path: format!("{}/{id}", kind.collection()),
                client_request_id: None,
                body: None,
            })
            .await?;
        entity_from_value(response.json().await?)
    }

    async fn create(
        &self,
        kind: ResourceKind,
        request: CreateRequest,
    ) -> Result<PlatformEntity, PlatformError> {
        let response = self
            .execute(Call {
                kind,
                operation: "create",
                method: Method::POST,
                path: kind.collection().to_string(),
                client_request_id: Some(&request.client_request_id),
                body: Some(Value::Object(request.attributes)),
            })
            .await?;
        entity_from_value(response.json().await?)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        request: UpdateRequest,
    ) -> Result<PlatformEntity, PlatformError> {
        let ops = serde_json::to_value(replace_ops(&request.changes))
            .map_err(|e| PlatformError::Fatal(format!("unencodable patch: {e}")))?;
        let response = self
            .execute(Call {
                kind,
                operation: "update",
                method: Method::PATCH,
                path: format!("{}/{id}", kind.collection()),
                client_request_id: Some(&request.client_request_id),
                body: Some(ops),
            })
            .await?;
        entity_from_value(response.json().await?)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        client_request_id: &str,
    ) -> Result<(), PlatformError> {
        self.execute(Call {
            kind,
            operation: "delete",
            method: Method::DELETE,
            path: format!("{}/{id}", kind.collection()),
            client_request_id: Some(client_request_id),
            body: None,
        })
        .await?;
        Ok(())
    }

    async fn apply_strategy(&self, batch: StrategyBatch) -> Result<StrategyResult, PlatformError> {
        let body = serde_json::to_value(StrategyRequest {
            resource: batch.kind.collection(),
            action: batch.action.as_str(),
            targets: &batch.targets,
        })
        .map_err(|e| PlatformError::Fatal(format!("unencodable strategy: {e}")))?;
        let response = self
            .execute(Call {
                kind: batch.kind,
                operation: "strategy",
                method: Method::POST,
                path: "strategies".to_string(),
                client_request_id: Some(&batch.client_request_id),
                body: Some(body),
            })
            .await?;
        let strategy: StrategyResponse = response.json().await?;
        Ok(strategy.into())
    }
}
