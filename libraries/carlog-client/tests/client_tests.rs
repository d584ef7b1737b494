//! Integration tests for the telemetry client against a mocked backend

use carlog_client::{ClientError, ServerConfig, TelemetryClient};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> TelemetryClient {
    TelemetryClient::new(ServerConfig::new(server.uri())).expect("valid url")
}

#[tokio::test]
async fn list_drives_unwraps_the_data_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cars/1/drives"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": 101,
                    "start_date": "2023-05-01T08:00:00Z",
                    "end_date": "2023-05-01T08:30:00Z",
                    "duration_min": 30,
                    "start_address": "Home",
                    "end_address": "Work",
                    "distance": 18.4,
                    "speed_max": 95,
                    "speed_avg": 44,
                    "power_max": 180,
                    "power_min": -60,
                    "start_battery_level": 80,
                    "end_battery_level": 74,
                    "outside_temp_avg": 14.5,
                    "energy_consumed": 3.1
                },
                {
                    "id": 102,
                    "start_date": "2023-05-01T18:00:00Z",
                    "end_date": "2023-05-01T18:20:00Z"
                }
            ]
        })))
        .mount(&server)
        .await;

    let drives = client_for(&server)
        .list_drives(1, None, 50)
        .await
        .expect("list drives");

    assert_eq!(drives.len(), 2);
    assert_eq!(drives[0].id, 101);
    assert_eq!(drives[0].distance, Some(18.4));
    // sparse records parse with absent optionals
    assert_eq!(drives[1].distance, None);
    assert_eq!(drives[1].speed_max, None);
}

#[tokio::test]
async fn since_id_is_forwarded_as_a_query_param() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cars/3/charges"))
        .and(query_param("since_id", "250"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let charges = client_for(&server)
        .list_charges(3, Some(250), 10)
        .await
        .expect("list charges");

    assert!(charges.is_empty());
}

#[tokio::test]
async fn bearer_token_is_sent_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cars/1/status"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "display_name": "Blue", "state": "online" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TelemetryClient::new(ServerConfig::new(server.uri()).with_token("secret"))
        .expect("valid url");
    let status = client.vehicle_status(1).await.expect("status");

    assert_eq!(status.state.as_deref(), Some("online"));
}

#[tokio::test]
async fn http_404_maps_to_unsupported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cars/1/charges"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_charges(1, None, 50)
        .await
        .expect_err("should fail");

    assert!(matches!(err, ClientError::Unsupported(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn http_401_maps_to_auth_failed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cars/1/drives"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_drives(1, None, 50)
        .await
        .expect_err("should fail");

    assert!(matches!(err, ClientError::AuthFailed(_)));
}

#[tokio::test]
async fn http_500_maps_to_server_error_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cars/1/drives/9"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .drive_detail(1, 9)
        .await
        .expect_err("should fail");

    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_maps_to_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cars/1/charges/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .charge_detail(1, 7)
        .await
        .expect_err("should fail");

    assert!(matches!(err, ClientError::Parse(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn detail_series_defaults_to_empty_when_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cars/1/drives/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 11 }
        })))
        .mount(&server)
        .await;

    let detail = client_for(&server).drive_detail(1, 11).await.expect("detail");
    assert_eq!(detail.id, 11);
    assert!(detail.positions.is_empty());
}
