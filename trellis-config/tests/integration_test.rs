//! Integration tests for trellis-config

use std::env;
use std::fs;
use std::path::PathBuf;
use trellis_config::*;
use trellis_core::logging::LogLevel;
use trellis_core::prelude::*;

fn temp_file(name: &str, content: &str) -> PathBuf {
    let path = env::temp_dir().join(format!("trellis-config-{}-{}", std::process::id(), name));
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_env_prefix_and_nesting() {
    unsafe {
        env::set_var("TRELLISIT_LOGGING__LEVEL", "debug");
        env::set_var("TRELLISIT_DISPATCHER__LOG_REQUESTS", "true");
        env::set_var("TRELLISIT_WORKERS", "4");
    }

    let manager = ConfigManager::with_prefix("TRELLISIT");
    manager.load_env().unwrap();

    assert_eq!(manager.get_string("logging.level").unwrap(), "debug");
    assert!(manager.get_bool("dispatcher.log_requests").unwrap());
    assert_eq!(manager.get_int("workers").unwrap(), 4);

    unsafe {
        env::remove_var("TRELLISIT_LOGGING__LEVEL");
        env::remove_var("TRELLISIT_DISPATCHER__LOG_REQUESTS");
        env::remove_var("TRELLISIT_WORKERS");
    }
}

#[test]
fn test_env_loader_var_lookup() {
    unsafe {
        env::set_var("LOADERIT_LOGGING__FORMAT", "pretty");
    }

    let loader = EnvLoader::with_prefix("LOADERIT");
    assert_eq!(loader.load_var("logging.format").unwrap(), "pretty");
    assert_eq!(loader.load_var_or("logging.level", "info"), "info");

    unsafe {
        env::remove_var("LOADERIT_LOGGING__FORMAT");
    }
}

#[test]
fn test_file_then_env_precedence() {
    let path = temp_file(
        "precedence.toml",
        r#"
        [logging]
        level = "info"
        format = "plain"

        [dispatcher]
        log_requests = false
        "#,
    );
    unsafe {
        env::set_var("PRECEDENCEIT_DISPATCHER__LOG_REQUESTS", "true");
    }

    let manager = ConfigManager::with_prefix("PRECEDENCEIT");
    manager.load_file_auto(&path).unwrap();
    manager.load_env().unwrap();

    let settings = TrellisSettings::from_manager(&manager).unwrap();
    assert_eq!(settings.logging.format, "plain");
    assert!(settings.dispatcher.log_requests);

    unsafe {
        env::remove_var("PRECEDENCEIT_DISPATCHER__LOG_REQUESTS");
    }
    fs::remove_file(path).ok();
}

#[test]
fn test_json_file_and_missing_file() {
    let path = temp_file("settings.json", r#"{"logging": {"level": "error"}}"#);

    let manager = ConfigManager::new();
    manager.load_file(&path, FileFormat::Json).unwrap();
    assert_eq!(manager.get_string("logging.level").unwrap(), "error");
    fs::remove_file(path).ok();

    let err = manager
        .load_file("/nonexistent/trellis.json", FileFormat::Json)
        .unwrap_err();
    assert!(matches!(err, ConfigError::LoadError { .. }));
}

#[test]
fn test_dotenv_file_sets_flat_overrides() {
    let path = temp_file(
        "dotenv.env",
        "DOTENVIT_LOG_LEVEL=trace\nDOTENVIT_LOG_REQUESTS=yes\n",
    );

    let manager = ConfigManager::with_prefix("DOTENVIT");
    manager.load_dotenv(path.to_str()).unwrap();

    let settings = TrellisSettings::from_manager(&manager).unwrap();
    assert_eq!(settings.logging.to_log_config().unwrap().level, LogLevel::Trace);
    assert!(settings.dispatcher.log_requests);

    unsafe {
        env::remove_var("DOTENVIT_LOG_LEVEL");
        env::remove_var("DOTENVIT_LOG_REQUESTS");
    }
    fs::remove_file(path).ok();
}

#[test]
fn test_load_validated_section() {
    let manager = ConfigManager::new();
    manager.set("logging.output", "rolling").unwrap();

    let err = manager.load_validated::<LoggingSettings>("logging").unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));

    manager.set("logging.path", "logs").unwrap();
    let logging: LoggingSettings = manager.load_validated("logging").unwrap();
    assert_eq!(logging.path.as_deref(), Some("logs"));
}

#[test]
fn test_settings_build_router() {
    let mut router = Router::new();
    let ctrl = router.controller(Controller::new("HealthController"));
    router.get(
        "/health",
        &ctrl,
        "health",
        handler(|_args: Arguments| async { Ok(HandlerResult::from("ok")) }),
    );

    let settings = TrellisSettings::default();
    let request_router = settings.build_router(router).unwrap();
    assert!(request_router.config().warn_on_replace);
    assert!(request_router.routes().has_route("/health"));
}

#[test]
fn test_config_error_converts_into_core_error() {
    fn load(manager: &ConfigManager) -> trellis_core::Result<i64> {
        Ok(manager.get_int("missing")?)
    }

    let err = load(&ConfigManager::new()).unwrap_err();
    assert_eq!(err.status_code(), 500);
}
