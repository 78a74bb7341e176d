//! End-to-end wiring checks: config loads and validates, and
//! `initialize_app` produces a handler that can actually drive a work item
//! through the orchestrator against a real (temp-file) SQLite database.

use orchestrator_core::models::{Kind, NewWorkItem};
use orchestrator_server::config::{Config, DatabaseConfig, LogFormat, LoggingConfig, ServerConfig};
use orchestrator_server::setup::{ensure_database_directory, initialize_app};
use tempfile::TempDir;

fn config_with_db(url: String) -> Config {
    Config {
        database: DatabaseConfig {
            url: Some(url),
            max_connections: 5,
            connection_timeout: 30,
        },
        server: ServerConfig {
            listen_addr: "127.0.0.1".to_string(),
            port: 3000,
            workers: 4,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        },
    }
}

#[test]
fn default_config_is_valid_and_matches_documented_defaults() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.server.listen_addr, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
}

#[test]
fn config_validation_catches_every_bad_field() {
    let mut config = Config::default();

    config.logging.level = "invalid".to_string();
    assert!(config.validate().is_err());
    config.logging.level = "info".to_string();

    config.database.url = Some("postgres://invalid".to_string());
    assert!(config.validate().is_err());
    config.database.url = None;

    config.server.port = 0;
    assert!(config.validate().is_err());
    config.server.port = 3000;

    config.server.workers = 0;
    assert!(config.validate().is_err());
    config.server.workers = 4;

    config.database.max_connections = 0;
    assert!(config.validate().is_err());
}

#[test]
fn ensure_database_directory_creates_missing_parents() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("subdir").join("orchestrator.sqlite");
    let database_url = format!("sqlite://{}", db_path.display());

    ensure_database_directory(&database_url).unwrap();
    assert!(db_path.parent().unwrap().exists());
}

#[tokio::test]
async fn initialized_handler_creates_and_reads_back_a_work_item() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("orchestrator.sqlite");
    let config = config_with_db(format!("sqlite://{}", db_path.display()));

    let handler = initialize_app(&config, temp_dir.path())
        .await
        .expect("app should initialize against a fresh sqlite file");

    let created = handler
        .orchestrator()
        .create_item(NewWorkItem {
            parent_id: None,
            kind: Kind::Project,
            title: "Integration smoke test".to_string(),
            summary: None,
            description: None,
            status: "pending".to_string(),
            priority: Default::default(),
            complexity: None,
            tags: vec![],
            requires_verification: false,
        })
        .await
        .expect("create should succeed");

    let fetched = handler
        .orchestrator()
        .get_item(created.id)
        .await
        .expect("get should succeed");

    assert_eq!(fetched.title, "Integration smoke test");
}
