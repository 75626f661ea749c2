//! Discovery: fetching the equipment list and filtering it down to
//! monitorable targets.

use fleetwatch::targets::filter_targets;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_discovery_filters_unusable_records() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    mount_targets(
        &mock_server,
        serde_json::json!([
            { "_id": "eq-1", "name": "web-1", "ipAddress": "10.0.0.8" },
            // no identifier: cannot be tied to incidents
            { "name": "no-id", "ipAddress": "10.0.0.9" },
            // octet out of range
            { "_id": "eq-3", "name": "bad-addr", "ipAddress": "999.1.1.1" },
            // no ip, but the serial field carries a usable address
            { "_id": "eq-4", "name": "switch-1", "numeroSerie": "localhost" },
            { "_id": "eq-5", "ipAddress": "10.0.0.12" },
        ]),
    )
    .await;

    let backend = authenticated_backend(&mock_server).await;
    let records = backend.fetch_targets().await.unwrap();
    let targets = filter_targets(records);

    assert_eq!(targets.len(), 3);
    assert_eq!(targets[0].name, "web-1");
    assert_eq!(targets[1].name, "switch-1");
    assert_eq!(targets[1].address, "localhost");
    // records without a name get a placeholder
    assert_eq!(targets[2].name, "unknown");
    assert_eq!(targets[2].address, "10.0.0.12");
}

#[tokio::test]
async fn test_discovery_handles_the_legacy_route_and_field_names() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/api/equipment"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/equipements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "equipements": [
                { "_id": "eq-1", "nom": "serveur-web", "ipAddress": "10.0.0.8" },
            ],
        })))
        .mount(&mock_server)
        .await;

    let backend = authenticated_backend(&mock_server).await;
    let targets = filter_targets(backend.fetch_targets().await.unwrap());

    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].id, "eq-1");
    assert_eq!(targets[0].name, "serveur-web");
}

#[tokio::test]
async fn test_discovery_accepts_a_bare_array() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/api/equipment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "eq-1", "name": "web-1", "ipAddress": "10.0.0.8" },
            { "id": "eq-2", "name": "db-1", "ipAddress": "10.0.0.9" },
        ])))
        .mount(&mock_server)
        .await;

    let backend = authenticated_backend(&mock_server).await;
    let targets = filter_targets(backend.fetch_targets().await.unwrap());

    assert_eq!(targets.len(), 2);
    assert_eq!(targets[1].id, "eq-2");
}
