//! Integration tests for codedoc-core infrastructure

use codedoc_core::{
    config_error, git_error, init_logging, input_error, not_found_error, CodedocConfig,
    CodedocError, ErrorContext, ErrorKind, LogFormat, LoggingConfig,
};

#[test]
fn test_error_handling() {
    // Test error creation with context
    let error = git_error!("Failed to open repository", "test_component");

    match &error {
        CodedocError::Git {
            message, context, ..
        } => {
            assert_eq!(message, "Failed to open repository");
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Git error"),
    }
    assert_eq!(error.kind(), ErrorKind::Unknown);

    // Test error logging (should not panic)
    error.log();

    // Test error recoverability
    let network_error = CodedocError::Network {
        message: "Connection failed".to_string(),
        source: None,
        context: ErrorContext::new("test"),
    };
    assert!(network_error.is_recoverable());
    assert_eq!(network_error.kind(), ErrorKind::Network);

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());
    assert_eq!(config_error.kind(), ErrorKind::Input);

    let cause = std::io::Error::other("index locked");
    let fetch_error = git_error!("fetch failed", "git_backend", "fetch", cause);
    let context = fetch_error.context().unwrap();
    assert_eq!(context.operation.as_deref(), Some("fetch"));
    assert!(std::error::Error::source(&fetch_error).is_some());
}

#[test]
fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        include_location: false,
        include_thread: false,
        log_to_file: false,
        log_file_path: None,
        enable_performance_monitoring: false,
        filter_directives: vec!["codedoc_core=debug".to_string()],
    };

    // The first install succeeds, a second one reports an error instead of panicking
    assert!(init_logging(&config).is_ok());
    assert!(init_logging(&config).is_err());
}

#[test]
fn test_config_validation() {
    let mut config = CodedocConfig::default();

    // Valid config should pass validation
    assert!(config.validate().is_ok());

    config.analysis.hotspot_scan_limit = 0;
    let result = config.validate();

    match result.unwrap_err() {
        CodedocError::Config { message, .. } => {
            assert!(message.contains("hotspot_scan_limit"));
        }
        _ => panic!("Expected Config error"),
    }
}

#[test]
fn test_error_macros() {
    let input_err = input_error!("Invalid identifier", "identifier", "resolver");
    match input_err {
        CodedocError::Input {
            message,
            field,
            context,
        } => {
            assert_eq!(message, "Invalid identifier");
            assert_eq!(field, Some("identifier".to_string()));
            assert_eq!(context.component, "resolver");
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected Input error"),
    }

    let not_found_err = not_found_error!("/srv/missing", "cache");
    match not_found_err {
        CodedocError::NotFound {
            resource, context, ..
        } => {
            assert_eq!(resource, "/srv/missing");
            assert_eq!(context.component, "cache");
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected NotFound error"),
    }
}
