//! End-to-end alerting: breached thresholds become backend incidents
//!
//! Every test drives the orchestrator through its handle. The configured
//! interval still fires once immediately after spawn, so each test sleeps
//! briefly to let that first walk drain before counting.

use std::time::Duration;

use fleetwatch::orchestrator::OrchestratorHandle;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_breach_creates_an_incident_once_per_cooldown() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_recent(&mock_server, serde_json::json!([])).await;
    mount_metrics(&mock_server, 92.5, 50.0, None).await;

    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .and(body_json(serde_json::json!({
            "title": "⚠️ High CPU usage - web-1",
            "description": "CPU=92.5% (threshold 80%) on web-1 (127.0.0.1)",
            "priority": "Elevated",
            "status": "New",
            "equipment": "eq-1",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let backend = authenticated_backend(&mock_server).await;

    let (handle, join) = OrchestratorHandle::spawn(
        &config,
        vec![web_target()],
        backend,
        agent_acquirer(&mock_server),
        None,
    );

    // first walk files the incident
    tokio::time::sleep(Duration::from_millis(100)).await;

    // further walks inside the cooldown must not file again
    handle.tick_now().await.unwrap();
    handle.tick_now().await.unwrap();

    handle.shutdown().await.unwrap();
    join.await.unwrap();
}

#[tokio::test]
async fn test_zero_cooldown_files_on_every_walk() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_recent(&mock_server, serde_json::json!([])).await;
    mount_metrics(&mock_server, 92.5, 50.0, None).await;

    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.cooldown = 0;
    let backend = authenticated_backend(&mock_server).await;

    let (handle, join) = OrchestratorHandle::spawn(
        &config,
        vec![web_target()],
        backend,
        agent_acquirer(&mock_server),
        None,
    );

    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.tick_now().await.unwrap();
    handle.tick_now().await.unwrap();

    handle.shutdown().await.unwrap();
    join.await.unwrap();
}

#[tokio::test]
async fn test_each_breaching_resource_files_its_own_incident() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_recent(&mock_server, serde_json::json!([])).await;
    // cpu far over its threshold, ram over by more than ten points
    mount_metrics(&mock_server, 99.9, 99.0, None).await;

    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .and(body_json(serde_json::json!({
            "title": "⚠️ High CPU usage - web-1",
            "description": "CPU=99.9% (threshold 80%) on web-1 (127.0.0.1)",
            "priority": "Critical",
            "status": "New",
            "equipment": "eq-1",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .and(body_json(serde_json::json!({
            "title": "⚠️ High RAM usage - web-1",
            "description": "RAM=99.0% (threshold 85%) on web-1 (127.0.0.1)",
            "priority": "Elevated",
            "status": "New",
            "equipment": "eq-1",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let backend = authenticated_backend(&mock_server).await;

    let (handle, join) = OrchestratorHandle::spawn(
        &config,
        vec![web_target()],
        backend,
        agent_acquirer(&mock_server),
        None,
    );

    tokio::time::sleep(Duration::from_millis(100)).await;

    // a second walk is suppressed by the cooldown for both resources
    handle.tick_now().await.unwrap();

    handle.shutdown().await.unwrap();
    join.await.unwrap();
}

#[tokio::test]
async fn test_values_at_the_threshold_file_nothing() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_recent(&mock_server, serde_json::json!([])).await;
    // both values sit exactly on their thresholds
    mount_metrics(&mock_server, 80.0, 85.0, Some(90.0)).await;

    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let backend = authenticated_backend(&mock_server).await;

    let (handle, join) = OrchestratorHandle::spawn(
        &config,
        vec![web_target()],
        backend,
        agent_acquirer(&mock_server),
        None,
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.tick_now().await.unwrap();

    handle.shutdown().await.unwrap();
    join.await.unwrap();
}

#[tokio::test]
async fn test_overshoot_of_exactly_ten_points_is_moderate() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_recent(&mock_server, serde_json::json!([])).await;
    mount_metrics(&mock_server, 70.0, 95.0, None).await;

    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .and(body_json(serde_json::json!({
            "title": "⚠️ High RAM usage - web-1",
            "description": "RAM=95.0% (threshold 85%) on web-1 (127.0.0.1)",
            "priority": "Moderate",
            "status": "New",
            "equipment": "eq-1",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let backend = authenticated_backend(&mock_server).await;

    let (handle, join) = OrchestratorHandle::spawn(
        &config,
        vec![web_target()],
        backend,
        agent_acquirer(&mock_server),
        None,
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.tick_now().await.unwrap();

    handle.shutdown().await.unwrap();
    join.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_target_files_nothing() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_recent(&mock_server, serde_json::json!([])).await;
    // no /metrics mock mounted: the agent probe sees a 404

    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let backend = authenticated_backend(&mock_server).await;

    let (handle, join) = OrchestratorHandle::spawn(
        &config,
        vec![web_target()],
        backend,
        agent_acquirer(&mock_server),
        None,
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.tick_now().await.unwrap();

    handle.shutdown().await.unwrap();
    join.await.unwrap();
}

#[tokio::test]
async fn test_alerting_survives_incident_rejections() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_recent(&mock_server, serde_json::json!([])).await;
    mount_metrics(&mock_server, 92.5, 50.0, None).await;

    // the backend refuses the incident; the walk must carry on regardless
    Mock::given(method("POST"))
        .and(path("/api/incidents"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let backend = authenticated_backend(&mock_server).await;

    let (handle, join) = OrchestratorHandle::spawn(
        &config,
        vec![web_target()],
        backend,
        agent_acquirer(&mock_server),
        None,
    );

    tokio::time::sleep(Duration::from_millis(100)).await;

    // the failed attempt still started the cooldown, so no retry here
    handle.tick_now().await.unwrap();

    handle.shutdown().await.unwrap();
    join.await.unwrap();
}
