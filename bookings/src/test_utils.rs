//! Test utilities for HTTP-level tests.

use std::{sync::Arc, time::Duration};

use axum_test::{TestResponse, TestServer};

use crate::{
    Application, BackgroundServices,
    config::{Config, DatabaseConfig, EmailConfig, EmailTransportConfig, SessionConfig},
    store::{InMemoryStore, IntervalStore},
};

pub const TEST_ROOMS: [&str; 3] = ["General's Quarters", "Major's Suite", "Colonel's Cabin"];

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("bookings-test-emails-{}", std::process::id()));

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        database: DatabaseConfig::Memory {
            operation_timeout: Duration::from_secs(2),
        },
        seed_rooms: TEST_ROOMS.iter().map(|name| name.to_string()).collect(),
        session: SessionConfig {
            cookie_secure: false,
            ..Default::default()
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: temp_dir.to_string_lossy().into_owned(),
            },
            ..Default::default()
        },
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    }
}

/// In-memory store holding [`TEST_ROOMS`] as rooms 1 to 3
pub fn create_test_store() -> InMemoryStore {
    InMemoryStore::with_rooms(Duration::from_secs(2), TEST_ROOMS)
}

pub async fn create_test_app() -> (TestServer, BackgroundServices) {
    create_test_app_with_store(create_test_store()).await
}

/// Test server over `store`; keep a clone of the store to seed or inspect it.
pub async fn create_test_app_with_store(store: InMemoryStore) -> (TestServer, BackgroundServices) {
    let store: Arc<dyn IntervalStore> = Arc::new(store);
    let app = Application::with_store(create_test_config(), store).expect("Failed to create application");
    app.into_test_server()
}

/// The `name=value` pair from a response's `Set-Cookie`, ready to send back as `Cookie`
pub fn session_cookie(response: &TestResponse) -> String {
    let header = response.header("set-cookie");
    let value = header.to_str().expect("Set-Cookie is not ASCII");
    value.split(';').next().unwrap_or_default().to_string()
}

/// Start a session and return its cookie
pub async fn start_session(server: &TestServer) -> String {
    let response = server.get("/").await;
    response.assert_status_ok();
    session_cookie(&response)
}

/// `Location` of a redirect
pub fn location(response: &TestResponse) -> String {
    response
        .header("location")
        .to_str()
        .expect("Location is not ASCII")
        .to_string()
}
