//! Helper functions for integration tests

use fleetwatch::acquire::MetricAcquirer;
use fleetwatch::backend::BackendClient;
use fleetwatch::config::{AgentConfig, BackendConfig, Config, SnmpConfig, Thresholds};
use fleetwatch::providers::MetricProvider;
use fleetwatch::providers::agent::AgentProvider;
use fleetwatch::targets::MonitoredTarget;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config whose timer never fires during a test; walks are driven through
/// the handle instead.
pub fn test_config(backend_url: &str) -> Config {
    Config {
        interval: 3600,
        cooldown: 300,
        post_resolution_checks: 3,
        thresholds: Thresholds::default(),
        backend: BackendConfig {
            url: backend_url.to_string(),
            email: String::from("agent@example.com"),
            password: Some(String::from("hunter2")),
        },
        influx: None,
        agent: None,
        snmp: SnmpConfig::default(),
    }
}

pub fn web_target() -> MonitoredTarget {
    MonitoredTarget {
        id: String::from("eq-1"),
        name: String::from("web-1"),
        address: String::from("127.0.0.1"),
    }
}

pub async fn mount_login(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "test-token" })),
        )
        .mount(mock_server)
        .await;
}

pub async fn mount_targets(mock_server: &MockServer, records: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/equipment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": records,
        })))
        .mount(mock_server)
        .await;
}

pub async fn mount_recent(mock_server: &MockServer, incidents: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/incidents/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": incidents,
        })))
        .mount(mock_server)
        .await;
}

/// Accepts any incident creation; tests that care about the payload mount
/// their own matcher with an expectation instead.
pub async fn mount_incident_create(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .respond_with(ResponseTemplate::new(201))
        .mount(mock_server)
        .await;
}

pub async fn mount_metrics(mock_server: &MockServer, cpu: f32, ram: f32, disk: Option<f32>) {
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cpu": cpu,
            "ram": ram,
            "disk": disk,
        })))
        .mount(mock_server)
        .await;
}

pub fn resolved_incident_json(target_id: &str, resource: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "title": format!("⚠️ High {resource} usage - {name}"),
        "status": "Resolved",
        "resolvedAt": "2025-06-01T12:00:00Z",
        "equipment": { "_id": target_id, "nom": name },
        "createdAt": "2025-06-01T11:00:00Z",
    })
}

/// Acquirer that only speaks the agent protocol, pointed at the mock port.
pub fn agent_acquirer(mock_server: &MockServer) -> MetricAcquirer {
    let mock_url = url::Url::parse(&mock_server.uri()).unwrap();
    let provider = AgentProvider::new(&AgentConfig {
        port: mock_url.port().unwrap(),
        token: None,
        timeout: 5,
    });
    MetricAcquirer::new(vec![Box::new(provider) as Box<dyn MetricProvider>])
}

pub async fn authenticated_backend(mock_server: &MockServer) -> BackendClient {
    let mut backend = BackendClient::new(&test_config(&mock_server.uri()).backend);
    backend.authenticate().await.unwrap();
    backend
}
