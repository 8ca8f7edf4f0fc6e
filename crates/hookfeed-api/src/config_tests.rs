//! Tests for [`ServiceConfig`] defaults, deserialization and validation.

use super::*;

mod defaults {
    use super::*;

    /// Verify that the default configuration passes validation.
    #[test]
    fn test_default_config_is_valid() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    /// Verify that the server defaults match the documented values.
    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
        assert_eq!(server.timeout(), Duration::from_secs(30));
        assert_eq!(server.max_body_size, 10 * 1024 * 1024);
        assert!(server.enable_cors);
        assert!(server.enable_compression);
    }

    /// Verify that storage defaults to memory and retention runs hourly.
    #[test]
    fn test_storage_and_retention_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.retention.enabled);
        assert_eq!(config.retention.interval(), Duration::from_secs(3600));
        assert_eq!(config.feeds.path, PathBuf::from("feeds.yaml"));
    }
}

mod deserialization {
    use super::*;

    /// Verify that a partial document keeps defaults for missing fields.
    #[test]
    fn test_partial_document_fills_defaults() {
        let json = serde_json::json!({
            "server": { "port": 9090 },
            "storage": { "backend": "filesystem", "path": "/var/lib/hookfeed" },
            "transform": { "scripts_dir": "scripts" }
        });

        let config: ServiceConfig = serde_json::from_value(json).expect("config should parse");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/hookfeed"));
        assert_eq!(config.transform.scripts_dir, PathBuf::from("scripts"));
        assert_eq!(
            config.transform.max_operations,
            TransformConfig::default().max_operations
        );
    }

    /// Verify that an unknown storage backend is rejected.
    #[test]
    fn test_unknown_backend_is_rejected() {
        let json = serde_json::json!({ "storage": { "backend": "postgres" } });
        assert!(serde_json::from_value::<ServiceConfig>(json).is_err());
    }

    /// Verify that backend names serialize in lowercase.
    #[test]
    fn test_backend_names() {
        assert_eq!(
            serde_json::to_value(StorageBackend::Filesystem).unwrap(),
            serde_json::json!("filesystem")
        );
        assert_eq!(StorageBackend::Memory.as_str(), "memory");
    }
}

mod validation {
    use super::*;

    fn errors_of(config: &ServiceConfig) -> Vec<String> {
        match config.validate() {
            Err(ConfigError::ValidationFailed { errors }) => errors,
            other => panic!("expected ValidationFailed, got: {:?}", other),
        }
    }

    /// Verify that every problem is reported, not only the first.
    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.server.port = 0;
        config.server.host = " ".to_string();
        config.transform.max_operations = 0;

        let errors = errors_of(&config);

        assert_eq!(errors.len(), 3, "got: {:?}", errors);
        assert!(errors.iter().any(|e| e.contains("server.port")));
        assert!(errors.iter().any(|e| e.contains("server.host")));
        assert!(errors.iter().any(|e| e.contains("transform.max_operations")));
    }

    /// Verify that the filesystem backend requires a path.
    #[test]
    fn test_filesystem_backend_requires_path() {
        let mut config = ServiceConfig::default();
        config.storage.backend = StorageBackend::Filesystem;
        config.storage.path = PathBuf::new();

        let errors = errors_of(&config);
        assert!(errors.iter().any(|e| e.contains("storage.path")));
    }

    /// Verify that an empty storage path is fine for the memory backend.
    #[test]
    fn test_memory_backend_ignores_path() {
        let mut config = ServiceConfig::default();
        config.storage.path = PathBuf::new();
        assert!(config.validate().is_ok());
    }

    /// Verify that a zero retention interval only matters when retention is on.
    #[test]
    fn test_retention_interval_checked_when_enabled() {
        let mut config = ServiceConfig::default();
        config.retention.interval_seconds = 0;
        assert!(config.validate().is_err());

        config.retention.enabled = false;
        assert!(config.validate().is_ok());
    }

    /// Verify that log levels are checked case-insensitively.
    #[test]
    fn test_log_level() {
        let mut config = ServiceConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());

        config.logging.level = "verbose".to_string();
        let errors = errors_of(&config);
        assert!(errors[0].contains("verbose"));
    }

    /// Verify that the error message lists each problem.
    #[test]
    fn test_error_display_joins_problems() {
        let mut config = ServiceConfig::default();
        config.server.port = 0;
        config.server.timeout_seconds = 0;

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("server.port"));
        assert!(message.contains("server.timeout_seconds"));
    }
}
