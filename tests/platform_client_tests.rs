//! REST client behaviour against a mock inventory and identity service.

mod common;

use deployment_manager_controller::config::PlatformConfig;
use deployment_manager_controller::crd::ResourceKind;
use deployment_manager_controller::platform::{
    CreateRequest, LookupKey, PlatformApi, PlatformError, StrategyAction, StrategyBatch,
    StrategyState, SysinvClient, UpdateRequest,
};
use serde_json::{json, Map, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeroize::Zeroizing;

const TOKEN: &str = "gAAAAABtoken1";

fn config(server: &MockServer) -> PlatformConfig {
    PlatformConfig {
        api_url: server.uri(),
        auth_url: format!("{}/v3", server.uri()),
        username: "admin".to_string(),
        password: Zeroizing::new("St8rlingX*".to_string()),
        project_name: "admin".to_string(),
        user_domain: "Default".to_string(),
        project_domain: "Default".to_string(),
        request_timeout_secs: 5,
        token_refresh_margin_secs: 60,
        credentials_secret: None,
    }
}

fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(201)
        .insert_header("X-Subject-Token", token)
        .set_body_json(json!({"token": {"expires_at": "2099-01-01T00:00:00.000000Z"}}))
}

async fn client_with_token(server: &MockServer) -> SysinvClient {
    common::init_rustls();
    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(token_response(TOKEN))
        .mount(server)
        .await;
    SysinvClient::new(config(server)).unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[tokio::test]
async fn find_returns_the_entity_matching_the_key() {
    let server = MockServer::start().await;
    let client = client_with_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/datanetworks"))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "datanetworks": [
                {"uuid": "dn-1", "name": "physnet0", "network_type": "vlan"},
                {"uuid": "dn-2", "name": "physnet1", "network_type": "flat"},
            ]
        })))
        .mount(&server)
        .await;

    let key = LookupKey::default().with("name", "physnet1");
    let entity = client
        .find(ResourceKind::DataNetwork, &key)
        .await
        .unwrap()
        .expect("entity found");
    assert_eq!(entity.id, "dn-2");
    assert_eq!(entity.attribute_str("network_type"), Some("flat"));

    let missing = LookupKey::default().with("name", "physnet9");
    assert!(client
        .find(ResourceKind::DataNetwork, &missing)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn session_token_is_reused_across_calls() {
    let server = MockServer::start().await;
    common::init_rustls();
    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(token_response(TOKEN))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/isystems/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": "s-1"})))
        .expect(2)
        .mount(&server)
        .await;

    let client = SysinvClient::new(config(&server)).unwrap();
    client.get(ResourceKind::System, "s-1").await.unwrap();
    client.get(ResourceKind::System, "s-1").await.unwrap();
}

#[tokio::test]
async fn create_carries_the_client_request_id() {
    let server = MockServer::start().await;
    let client = client_with_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/datanetworks"))
        .and(header("X-Client-Request-Id", "3f0b7c2e-0000-4000-8000-000000000001"))
        .and(body_json(json!({"name": "physnet0", "network_type": "vlan", "mtu": 1500})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "dn-1", "name": "physnet0", "network_type": "vlan", "mtu": 1500
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entity = client
        .create(
            ResourceKind::DataNetwork,
            CreateRequest {
                attributes: object(json!({"name": "physnet0", "network_type": "vlan", "mtu": 1500})),
                client_request_id: "3f0b7c2e-0000-4000-8000-000000000001".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(entity.id, "dn-1");
}

#[tokio::test]
async fn update_sends_json_patch_replace_operations() {
    let server = MockServer::start().await;
    let client = client_with_token(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/v1/iinterfaces/if-1"))
        .and(body_json(json!([
            {"op": "replace", "path": "/ifclass", "value": "data"},
            {"op": "replace", "path": "/imtu", "value": 9000},
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "if-1", "ifclass": "data", "imtu": 9000, "task": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entity = client
        .update(
            ResourceKind::Interface,
            "if-1",
            UpdateRequest {
                changes: object(json!({"imtu": 9000, "ifclass": "data"})),
                client_request_id: "req-1".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(entity.task, None);
}

#[tokio::test]
async fn rejected_session_is_renewed_once() {
    let server = MockServer::start().await;
    common::init_rustls();
    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(token_response("stale-token"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(token_response("fresh-token"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/ihosts/h-1"))
        .and(header("X-Auth-Token", "stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/ihosts/h-1"))
        .and(header("X-Auth-Token", "fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "h-1", "hostname": "controller-0", "task": "Locking"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SysinvClient::new(config(&server)).unwrap();
    let host = client.get(ResourceKind::Host, "h-1").await.unwrap();
    assert_eq!(host.task.as_deref(), Some("Locking"));
}

#[tokio::test]
async fn rejected_credentials_are_transient() {
    let server = MockServer::start().await;
    common::init_rustls();
    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = SysinvClient::new(config(&server)).unwrap();
    let err = client.get(ResourceKind::Host, "h-1").await.unwrap_err();
    assert!(matches!(err, PlatformError::Transient(_)));
}

#[tokio::test]
async fn http_status_is_classified() {
    let server = MockServer::start().await;
    let client = client_with_token(&server).await;
    for (id, status) in [("gone", 404), ("busy", 409), ("down", 503), ("bad", 400)] {
        Mock::given(method("DELETE"))
            .and(path(format!("/v1/ptp_instances/{id}")))
            .respond_with(ResponseTemplate::new(status).set_body_string("error detail"))
            .mount(&server)
            .await;
    }

    let delete = |id: &'static str| {
        let client = &client;
        async move {
            client
                .delete(ResourceKind::PtpInstance, id, "req")
                .await
                .unwrap_err()
        }
    };
    assert!(matches!(delete("gone").await, PlatformError::NotFound(_)));
    assert!(matches!(delete("busy").await, PlatformError::Conflict(_)));
    assert!(matches!(delete("down").await, PlatformError::Transient(_)));
    assert!(matches!(delete("bad").await, PlatformError::Fatal(_)));
}

#[tokio::test]
async fn strategy_reports_its_state() {
    let server = MockServer::start().await;
    let client = client_with_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/strategies"))
        .and(body_json(json!({"resource": "ihosts", "action": "unlock", "targets": ["h-1"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "st-1", "state": "applying"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .apply_strategy(StrategyBatch {
            kind: ResourceKind::Host,
            action: StrategyAction::Unlock,
            targets: vec!["h-1".to_string()],
            client_request_id: "req-2".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(result.id, "st-1");
    assert_eq!(result.state, StrategyState::Applying);
}
