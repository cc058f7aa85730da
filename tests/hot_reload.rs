// tests/hot_reload.rs
// Exercises the watcher's initial-load path: valid config connects the
// named providers, invalid config leaves the running set untouched.

use std::sync::Arc;
use toolbroker::router::Router;
use toolbroker::supervisor::Supervisor;
use toolbroker::watcher::Watcher;

#[tokio::test]
async fn initial_load_connects_providers_from_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("providers.json");
    std::fs::write(
        &config_path,
        r#"{"providers":[{"name":"demo","kind":"http","base_url":"http://127.0.0.1:1","timeout_ms":50}]}"#,
    )
    .unwrap();

    let supervisor = Arc::new(Supervisor::new());
    let router = Arc::new(Router::new(supervisor.clone()));
    let watcher = Watcher::new(config_path, supervisor.clone(), router.clone());

    watcher.load_initial().await.unwrap();

    assert_eq!(supervisor.list_names().await, vec!["demo".to_string()]);
}

#[tokio::test]
async fn missing_config_file_starts_with_no_providers() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("does-not-exist.json");

    let supervisor = Arc::new(Supervisor::new());
    let router = Arc::new(Router::new(supervisor.clone()));
    let watcher = Watcher::new(config_path, supervisor.clone(), router.clone());

    watcher.load_initial().await.unwrap();

    assert!(supervisor.list_names().await.is_empty());
}
