//! Environment configuration.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const SESSION_DB_ENV_VAR: &str = "SESSION_DB";
pub const MESSAGE_DB_ENV_VAR: &str = "MESSAGE_DB";
pub const CACHE_ROOT_ENV_VAR: &str = "CACHE_ROOT";
pub const PYTHON_ENV_VAR: &str = "DATAFRAME_CHAT_PYTHON";
pub const SCRIPT_TIMEOUT_ENV_VAR: &str = "DATAFRAME_CHAT_SCRIPT_TIMEOUT_SEC";
pub const PROVIDER_ENV_VAR: &str = "DATAFRAME_CHAT_PROVIDER";
pub const LOG_ENV_VAR: &str = "DATAFRAME_CHAT_LOG";
pub const SYSTEM_INSTRUCTIONS_ENV_VAR: &str = "DATAFRAME_CHAT_SYSTEM_INSTRUCTIONS";

const DEFAULT_SESSION_DB: &str = "data/sessions.db";
const DEFAULT_MESSAGE_DB: &str = "data/messages";
const DEFAULT_CACHE_ROOT: &str = "data/cache";
const DEFAULT_PYTHON: &str = "python3";
const DEFAULT_SCRIPT_TIMEOUT_SEC: u64 = tool_bridge::DEFAULT_SCRIPT_TIMEOUT_SEC;
const DEFAULT_PROVIDER: &str = "mock";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer number of seconds, got '{value}'")]
    InvalidTimeout { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// SQLite file holding the session catalog.
    pub session_db: PathBuf,
    /// Directory of per-session conversation logs.
    pub message_db: PathBuf,
    /// Parent of every session working directory.
    pub cache_root: PathBuf,
    pub python: String,
    pub script_timeout_sec: u64,
    pub provider_id: String,
    pub log_filter: String,
    pub system_instructions: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            session_db: env_path(SESSION_DB_ENV_VAR, DEFAULT_SESSION_DB),
            message_db: env_path(MESSAGE_DB_ENV_VAR, DEFAULT_MESSAGE_DB),
            cache_root: env_path(CACHE_ROOT_ENV_VAR, DEFAULT_CACHE_ROOT),
            python: env_string_opt(PYTHON_ENV_VAR).unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
            script_timeout_sec: env_timeout_sec(SCRIPT_TIMEOUT_ENV_VAR)?,
            provider_id: env_string_opt(PROVIDER_ENV_VAR)
                .map(|value| value.trim().to_string())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            log_filter: env_string_opt(LOG_ENV_VAR)
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            system_instructions: env_string_opt(SYSTEM_INSTRUCTIONS_ENV_VAR)
                .map(|value| value.trim().to_string()),
        })
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env_string_opt(key).map_or_else(|| PathBuf::from(default), PathBuf::from)
}

fn env_timeout_sec(key: &'static str) -> Result<u64, ConfigError> {
    let Some(raw) = env_string_opt(key) else {
        return Ok(DEFAULT_SCRIPT_TIMEOUT_SEC);
    };

    match raw.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(ConfigError::InvalidTimeout { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    const ALL_KEYS: [&str; 8] = [
        SESSION_DB_ENV_VAR,
        MESSAGE_DB_ENV_VAR,
        CACHE_ROOT_ENV_VAR,
        PYTHON_ENV_VAR,
        SCRIPT_TIMEOUT_ENV_VAR,
        PROVIDER_ENV_VAR,
        LOG_ENV_VAR,
        SYSTEM_INSTRUCTIONS_ENV_VAR,
    ];

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    fn clear_all() -> Vec<EnvGuard> {
        ALL_KEYS
            .iter()
            .map(|key| set_env_guard(key, None))
            .collect()
    }

    #[test]
    fn env_defaults_apply_when_unset() {
        let _lock = env_lock();
        let _guards = clear_all();

        let config = EnvConfig::from_env().expect("defaults are valid");
        assert_eq!(config.session_db, PathBuf::from("data/sessions.db"));
        assert_eq!(config.message_db, PathBuf::from("data/messages"));
        assert_eq!(config.cache_root, PathBuf::from("data/cache"));
        assert_eq!(config.python, "python3");
        assert_eq!(config.script_timeout_sec, 300);
        assert_eq!(config.provider_id, "mock");
        assert_eq!(config.log_filter, "info");
        assert!(config.system_instructions.is_none());
    }

    #[test]
    fn env_overrides_are_read() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g1 = set_env_guard(SESSION_DB_ENV_VAR, Some("/srv/chat/sessions.db"));
        let _g2 = set_env_guard(CACHE_ROOT_ENV_VAR, Some("/srv/chat/cache"));
        let _g3 = set_env_guard(SCRIPT_TIMEOUT_ENV_VAR, Some(" 45 "));
        let _g4 = set_env_guard(SYSTEM_INSTRUCTIONS_ENV_VAR, Some("  be brief  "));
        let _g5 = set_env_guard(PYTHON_ENV_VAR, Some("/opt/py/bin/python"));

        let config = EnvConfig::from_env().expect("overrides are valid");
        assert_eq!(config.session_db, PathBuf::from("/srv/chat/sessions.db"));
        assert_eq!(config.cache_root, PathBuf::from("/srv/chat/cache"));
        assert_eq!(config.script_timeout_sec, 45);
        assert_eq!(config.system_instructions.as_deref(), Some("be brief"));
        assert_eq!(config.python, "/opt/py/bin/python");
    }

    #[test]
    fn blank_values_are_ignored() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g1 = set_env_guard(MESSAGE_DB_ENV_VAR, Some("   "));
        let _g2 = set_env_guard(SYSTEM_INSTRUCTIONS_ENV_VAR, Some("\n\t"));

        let config = EnvConfig::from_env().expect("blank values fall back");
        assert_eq!(config.message_db, PathBuf::from("data/messages"));
        assert!(config.system_instructions.is_none());
    }

    #[test]
    fn zero_or_garbage_timeout_is_rejected() {
        let _lock = env_lock();
        let _guards = clear_all();

        for raw in ["0", "soon", "-5"] {
            let _g = set_env_guard(SCRIPT_TIMEOUT_ENV_VAR, Some(raw));
            let error = EnvConfig::from_env().expect_err("invalid timeout must fail");
            assert_eq!(
                error,
                ConfigError::InvalidTimeout {
                    key: SCRIPT_TIMEOUT_ENV_VAR,
                    value: raw.to_string(),
                }
            );
        }
    }
}
