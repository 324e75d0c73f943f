//! Test utilities: wiremock profile endpoint, seeded storage, context builders.

#![allow(dead_code)]

use serde_json::json;
use session_guard::GuardContext;
use session_guard::config::Config;
use session_guard::guard::navigation::HistoryNavigator;
use session_guard::session::{IDENTITY_KEY, KeyValueStore, TOKEN_KEY};
use session_guard::session::file::FileStore;
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointing at `server` with file storage at `storage_path`.
pub fn config_for(server: &MockServer, storage_path: &Path) -> Config {
    let mut config = Config::test_default();
    config.api_base_url = server.uri();
    config.storage_backend = "file".into();
    config.storage_path = storage_path.display().to_string();
    config
}

/// Build a context whose router currently shows `location`.
pub fn build_context(config: Config, location: &str) -> (GuardContext, Arc<HistoryNavigator>) {
    let navigator = Arc::new(HistoryNavigator::at(location));
    let ctx = GuardContext::build(config, navigator.clone());
    (ctx, navigator)
}

/// Write a persisted session as a previous run would have left it.
pub async fn seed_storage(path: &Path, token: Option<&str>, identity: Option<serde_json::Value>) {
    let store = FileStore::new(path);
    if let Some(token) = token {
        store.set(TOKEN_KEY, token).await.unwrap();
    }
    if let Some(identity) = identity {
        store.set(IDENTITY_KEY, &identity.to_string()).await.unwrap();
    }
}

/// Write one raw value, bypassing serialization.
pub async fn seed_raw(path: &Path, key: &str, value: &str) {
    FileStore::new(path).set(key, value).await.unwrap();
}

/// Read back what is persisted.
pub async fn stored(path: &Path) -> (Option<String>, Option<String>) {
    let store = FileStore::new(path);
    (
        store.get(TOKEN_KEY).await.unwrap(),
        store.get(IDENTITY_KEY).await.unwrap(),
    )
}

/// Profile endpoint answering `token` with a user of `role`.
pub async fn mount_profile(server: &MockServer, token: &str, id: &str, role: &str) {
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "fullName": "Test User",
            "email": format!("{id}@example.com"),
            "role": role
        })))
        .mount(server)
        .await;
}

pub fn identity_json(id: &str, role: &str) -> serde_json::Value {
    json!({ "id": id, "email": format!("{id}@example.com"), "role": role })
}
