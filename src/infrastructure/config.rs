use crate::domain::models::PomodoroPolicy;
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const POMODORO_JSON: &str = "pomodoro.json";

pub const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 5;

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Taskstrip",
                "timezone": "UTC"
            }),
        ),
        (
            POMODORO_JSON,
            serde_json::json!({
                "schema": 1,
                "workSeconds": 25 * 60,
                "breakSeconds": 5 * 60,
                "checkIntervalSeconds": DEFAULT_CHECK_INTERVAL_SECONDS
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_pomodoro_policy(config_dir: &Path) -> Result<PomodoroPolicy, InfraError> {
    let path = config_dir.join(POMODORO_JSON);
    let parsed = read_config(&path)?;
    let defaults = PomodoroPolicy::default();

    let policy = PomodoroPolicy {
        work_seconds: parsed
            .get("workSeconds")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(defaults.work_seconds),
        break_seconds: parsed
            .get("breakSeconds")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(defaults.break_seconds),
    };
    policy.validate().map_err(InfraError::InvalidConfig)?;
    Ok(policy)
}

pub fn read_check_interval_seconds(config_dir: &Path) -> Result<u64, InfraError> {
    let path = config_dir.join(POMODORO_JSON);
    let parsed = read_config(&path)?;
    let interval = parsed
        .get("checkIntervalSeconds")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(DEFAULT_CHECK_INTERVAL_SECONDS);
    if interval == 0 {
        return Err(InfraError::InvalidConfig(
            "checkIntervalSeconds must be > 0".to_string(),
        ));
    }
    Ok(interval)
}

pub fn read_app_name(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let name = app
        .get("appName")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("Taskstrip");
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_written_once_and_readable() {
        let dir = tempfile::tempdir().expect("create temp dir");
        ensure_default_configs(dir.path()).expect("write defaults");
        ensure_default_configs(dir.path()).expect("second call leaves files alone");

        let policy = read_pomodoro_policy(dir.path()).expect("read policy");
        assert_eq!(policy, PomodoroPolicy::default());
        assert_eq!(
            read_check_interval_seconds(dir.path()).expect("read interval"),
            DEFAULT_CHECK_INTERVAL_SECONDS
        );
        assert_eq!(read_app_name(dir.path()).expect("read name"), "Taskstrip");
    }

    #[test]
    fn custom_policy_values_are_honored() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join(POMODORO_JSON),
            r#"{"schema":1,"workSeconds":3000,"breakSeconds":600,"checkIntervalSeconds":10}"#,
        )
        .expect("write config");

        let policy = read_pomodoro_policy(dir.path()).expect("read policy");
        assert_eq!(policy.work_seconds, 3000);
        assert_eq!(policy.break_seconds, 600);
        assert_eq!(
            read_check_interval_seconds(dir.path()).expect("read interval"),
            10
        );
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join(POMODORO_JSON),
            r#"{"schema":2,"workSeconds":3000}"#,
        )
        .expect("write config");

        assert!(read_pomodoro_policy(dir.path()).is_err());
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join(POMODORO_JSON),
            r#"{"schema":1,"workSeconds":0,"breakSeconds":600}"#,
        )
        .expect("write config");

        assert!(read_pomodoro_policy(dir.path()).is_err());
    }
}
