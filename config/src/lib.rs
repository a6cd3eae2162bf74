//! Configuration loading, parsing, and validation for Pact.
//!
//! Two layers: [`PactConfig`] is the raw optional-everything shape of
//! `~/.pact/config.toml`; [`Settings`] is the validated form the rest of
//! the application consumes. A missing or unreadable file degrades to
//! defaults with a warning; a missing backend endpoint is the one fatal
//! configuration error, surfaced once at startup and never retried.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use pact_types::{
    CreditPolicy, IdentityId, InvalidIdError, LedgerId, LedgerIdError, LedgerPolicy,
};

/// Raw configuration file shape. Every section and field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct PactConfig {
    pub backend: Option<BackendConfig>,
    pub app: Option<AppConfig>,
    pub policy: Option<PolicyConfig>,
    pub retry: Option<RetryTuning>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub app_id: Option<String>,
    /// Default room code to open when none is given on the command line.
    pub ledger: Option<String>,
    pub identity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PolicyConfig {
    pub credit: Option<String>,
    pub history_cap: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryTuning {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Expand `${VAR}` references against the process environment.
///
/// Unknown variables expand to the empty string; everything else passes
/// through untouched.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    let replacement = std::env::var(var).unwrap_or_default();
                    out.push_str(&replacement);
                }
                i = end + 1;
                continue;
            }
        }

        let ch = value[i..].chars().next().unwrap_or('\0');
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

impl PactConfig {
    /// Load from the default path. Missing, unreadable, or unparsable
    /// files all yield `None` (the latter two with a warning).
    #[must_use]
    pub fn load() -> Option<Self> {
        Self::load_from(&config_path()?)
    }

    #[must_use]
    pub fn load_from(path: &std::path::Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return None;
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                None
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Validate into [`Settings`].
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let backend = self.backend.unwrap_or_default();
        let app = self.app.unwrap_or_default();
        let policy = self.policy.unwrap_or_default();
        let retry = self.retry.unwrap_or_default();

        let base_url = backend
            .base_url
            .as_deref()
            .map(expand_env_vars)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;

        let token = backend
            .token
            .as_deref()
            .map(expand_env_vars)
            .filter(|token| !token.trim().is_empty());

        let default_ledger = app
            .ledger
            .as_deref()
            .map(LedgerId::new)
            .transpose()?;

        let identity = app
            .identity
            .as_deref()
            .map(IdentityId::new)
            .transpose()?;

        let credit = match policy.credit.as_deref() {
            None => CreditPolicy::default(),
            Some(raw) => CreditPolicy::parse(raw)
                .ok_or_else(|| ConfigError::InvalidCredit(raw.to_owned()))?,
        };

        let ledger_policy = LedgerPolicy {
            credit,
            history_cap: policy.history_cap.unwrap_or(LedgerPolicy::default().history_cap),
        };

        Ok(Settings {
            base_url,
            token,
            app_id: app.app_id.unwrap_or_else(|| "pact".to_owned()),
            default_ledger,
            identity,
            policy: ledger_policy,
            retry: RetrySettings {
                max_retries: retry.max_retries.unwrap_or(3),
                initial_delay: Duration::from_millis(retry.initial_delay_ms.unwrap_or(1_000)),
                max_delay: Duration::from_millis(retry.max_delay_ms.unwrap_or(8_000)),
            },
        })
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub token: Option<String>,
    pub app_id: String,
    pub default_ledger: Option<LedgerId>,
    pub identity: Option<IdentityId>,
    pub policy: LedgerPolicy,
    pub retry: RetrySettings,
}

/// Write retry tuning, decoupled from the store's own config type.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "backend.base_url is not configured; add it to ~/.pact/config.toml under [backend]"
    )]
    MissingBaseUrl,

    #[error("app.ledger is not a valid ledger code: {0}")]
    InvalidLedger(#[from] LedgerIdError),

    #[error("app.identity is invalid: {0}")]
    InvalidIdentity(#[from] InvalidIdError),

    #[error("policy.credit must be \"assignee\" or \"opposite\" (got {0:?})")]
    InvalidCredit(String),
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pact").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        file.write_all(content.as_bytes()).expect("write config");
        (dir, path)
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(PactConfig::load_from(&dir.path().join("absent.toml")).is_none());
    }

    #[test]
    fn load_from_unparsable_file_is_none() {
        let (_dir, path) = write_config("backend = not toml");
        assert!(PactConfig::load_from(&path).is_none());
    }

    #[test]
    fn resolve_requires_a_base_url() {
        let err = PactConfig::default().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingBaseUrl));
    }

    #[test]
    fn full_config_resolves() {
        let (_dir, path) = write_config(
            r#"
            [backend]
            base_url = "https://ledger.example/v1"
            token = "secret"

            [app]
            app_id = "pact-demo"
            ledger = "ab3x9k"

            [policy]
            credit = "assignee"
            history_cap = 50

            [retry]
            max_retries = 5
            initial_delay_ms = 250
            "#,
        );

        let settings = PactConfig::load_from(&path)
            .expect("config should parse")
            .resolve()
            .expect("config should resolve");

        assert_eq!(settings.base_url, "https://ledger.example/v1");
        assert_eq!(settings.token.as_deref(), Some("secret"));
        assert_eq!(settings.app_id, "pact-demo");
        assert_eq!(
            settings.default_ledger.as_ref().map(LedgerId::as_str),
            Some("AB3X9K")
        );
        assert_eq!(settings.policy.credit, CreditPolicy::Assignee);
        assert_eq!(settings.policy.history_cap, 50);
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(settings.retry.max_delay, Duration::from_millis(8_000));
    }

    #[test]
    fn bad_credit_policy_is_rejected() {
        let config = PactConfig {
            backend: Some(BackendConfig {
                base_url: Some("https://ledger.example".to_owned()),
                token: None,
            }),
            policy: Some(PolicyConfig {
                credit: Some("both".to_owned()),
                history_cap: None,
            }),
            ..PactConfig::default()
        };

        let err = config.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCredit(_)));
    }

    #[test]
    fn env_vars_expand_in_backend_fields() {
        // Unique name so parallel tests cannot collide.
        unsafe { std::env::set_var("PACT_TEST_TOKEN_93", "tok-93") };
        let config = PactConfig {
            backend: Some(BackendConfig {
                base_url: Some("https://ledger.example".to_owned()),
                token: Some("${PACT_TEST_TOKEN_93}".to_owned()),
            }),
            ..PactConfig::default()
        };

        let settings = config.resolve().expect("config should resolve");
        assert_eq!(settings.token.as_deref(), Some("tok-93"));
    }

    #[test]
    fn expand_env_vars_passes_plain_text_through() {
        assert_eq!(expand_env_vars("plain"), "plain");
        assert_eq!(expand_env_vars("${"), "${");
        assert_eq!(expand_env_vars("a${}b"), "ab");
    }
}
