//! Response bodies returned by the identity and inventory services.

use crate::platform::{PlatformEntity, PlatformError, StrategyResult, StrategyState};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: TokenBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenBody {
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StrategyResponse {
    pub uuid: String,
    pub state: StrategyState,
    #[serde(default)]
    pub items: Vec<Value>,
}

impl From<StrategyResponse> for StrategyResult {
    fn from(response: StrategyResponse) -> Self {
        Self {
            id: response.uuid,
            state: response.state,
            items: response.items,
        }
    }
}

/// Parse one entity object
pub(crate) fn entity_from_value(value: Value) -> Result<PlatformEntity, PlatformError> {
    let Value::Object(attributes) = value else {
        return Err(PlatformError::Transient(
            "platform returned a non-object entity".to_string(),
        ));
    };
    let id = attributes
        .get("uuid")
        .and_then(Value::as_str)
        .ok_or_else(|| PlatformError::Transient("platform entity has no uuid".to_string()))?
        .to_string();
    let task = attributes
        .get("task")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    Ok(PlatformEntity {
        id,
        attributes,
        task,
    })
}

/// Unwrap a list response `{"<collection>": [...]}`
pub(crate) fn entities_from_list(
    mut body: Value,
    collection: &str,
) -> Result<Vec<PlatformEntity>, PlatformError> {
    match body.get_mut(collection).map(Value::take) {
        Some(Value::Array(items)) => items.into_iter().map(entity_from_value).collect(),
        _ => Err(PlatformError::Transient(format!(
            "list response is missing the '{collection}' array"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_task_is_no_task() {
        let entity = entity_from_value(json!({"uuid": "a1", "task": ""})).unwrap();
        assert_eq!(entity.task, None);

        let entity = entity_from_value(json!({"uuid": "a1", "task": "Locking"})).unwrap();
        assert_eq!(entity.task.as_deref(), Some("Locking"));
    }

    #[test]
    fn list_requires_collection_key() {
        let body = json!({"ihosts": [{"uuid": "h1"}, {"uuid": "h2"}]});
        assert_eq!(entities_from_list(body, "ihosts").unwrap().len(), 2);
        assert!(entities_from_list(json!({"other": []}), "ihosts").is_err());
    }
}
