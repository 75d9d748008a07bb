//! Tests for the application context.

use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tierup_firestore::{log_level, LogLevel, TransportMode};
use tierup_models::{Category, XpScores};

use super::*;

// =============================================================================
// Test Helpers
// =============================================================================

const DOC_PATH: &str = "/v1/projects/demo/databases/(default)/documents/users/u1";
const SIGN_UP: &str = "/identitytoolkit.googleapis.com/v1/accounts:signUp";

fn options() -> FirebaseOptions {
    FirebaseOptions {
        api_key: "api-key".to_string(),
        project_id: "demo".to_string(),
        ..Default::default()
    }
}

fn settings(server: &MockServer, cache: &TempDir) -> AppSettings {
    let mut settings = AppSettings::for_project("demo");
    settings.cache_dir = cache.path().join("demo");
    settings.transport = TransportMode::Default;
    settings.timeout = Duration::from_secs(5);
    settings.firestore_host = Some(server.uri());
    settings.auth_emulator_host = Some(server.uri());
    settings.functions_origin = Some(server.uri());
    settings
}

async fn mount_anonymous_sign_up(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SIGN_UP))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "localId": "u1",
            "idToken": "user-id-token",
            "refreshToken": "refresh-1",
            "expiresIn": "3600"
        })))
        .mount(server)
        .await;
}

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
#[serial]
async fn test_initialize_wires_clients() {
    let server = MockServer::start().await;
    let cache = TempDir::new().unwrap();

    let app = FirebaseApp::initialize(options(), settings(&server, &cache))
        .await
        .unwrap();

    assert_eq!(log_level(), LogLevel::Warn);
    assert_eq!(app.options().project_id, "demo");
    assert_eq!(app.google_provider().provider_id(), "google.com");
    assert_eq!(app.functions().origin(), server.uri());
    assert_eq!(app.firestore().config().api_key.as_deref(), Some("api-key"));
    assert!(app.firestore().cache().is_some());
    assert!(cache.path().join("demo").is_dir());
    assert!(app.auth().current_user().await.is_none());
}

#[tokio::test]
#[serial]
async fn test_initialize_does_not_validate_options() {
    let server = MockServer::start().await;
    let cache = TempDir::new().unwrap();

    let app = FirebaseApp::initialize(FirebaseOptions::default(), settings(&server, &cache))
        .await
        .unwrap();
    assert!(app.firestore().config().api_key.is_none());
    assert_eq!(app.options(), &FirebaseOptions::default());
}

// =============================================================================
// Shared session
// =============================================================================

#[tokio::test]
#[serial]
async fn test_requests_carry_signed_in_user_token() {
    let server = MockServer::start().await;
    let cache = TempDir::new().unwrap();
    mount_anonymous_sign_up(&server).await;

    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .and(query_param("key", "api-key"))
        .and(header("authorization", "Bearer user-id-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/users/u1",
            "fields": {}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/whoami"))
        .and(header("authorization", "Bearer user-id-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "u1"})))
        .expect(1)
        .mount(&server)
        .await;

    let app = FirebaseApp::initialize(options(), settings(&server, &cache))
        .await
        .unwrap();
    app.auth().sign_in_anonymously().await.unwrap();

    let doc = app.firestore().get_document("users", "u1").await.unwrap();
    assert!(doc.is_some());

    let uid: String = app.functions().call("whoami", &json!(null)).await.unwrap();
    assert_eq!(uid, "u1");
}

#[tokio::test]
#[serial]
async fn test_sign_out_stops_sending_token() {
    let server = MockServer::start().await;
    let cache = TempDir::new().unwrap();
    mount_anonymous_sign_up(&server).await;

    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .expect(1)
        .mount(&server)
        .await;

    let app = FirebaseApp::initialize(options(), settings(&server, &cache))
        .await
        .unwrap();
    app.auth().sign_in_anonymously().await.unwrap();
    assert!(app.firestore().get_document("users", "u1").await.unwrap().is_none());

    app.auth().sign_out().await;
    assert!(app.firestore().get_document("users", "u1").await.is_err());
}

// =============================================================================
// XP through the app
// =============================================================================

#[tokio::test]
#[serial]
async fn test_xp_service_creates_missing_profile() {
    let server = MockServer::start().await;
    let cache = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .and(query_param("updateMask.fieldPaths", "xp"))
        .and(body_json(json!({"fields": {"xp": {"mapValue": {"fields": {
            "trader": {"integerValue": "0"},
            "web3": {"integerValue": "10"}
        }}}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/users/u1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = FirebaseApp::initialize(options(), settings(&server, &cache))
        .await
        .unwrap();

    let written = app
        .xp_service()
        .add_xp("u1", Category::Web3, 10)
        .await
        .unwrap();
    assert_eq!(written, XpScores::new(0, 10));
}

#[tokio::test]
#[serial]
async fn test_xp_service_surfaces_rejected_write() {
    let server = MockServer::start().await;
    let cache = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(DOC_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let app = FirebaseApp::initialize(options(), settings(&server, &cache))
        .await
        .unwrap();

    let err = app
        .xp_service()
        .add_xp("u1", Category::Trader, 5)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        tierup_xp::XpError::Firestore(tierup_firestore::FirestoreError::PermissionDenied(_))
    ));
}
