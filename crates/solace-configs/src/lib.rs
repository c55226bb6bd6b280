//! # solace-configs
//!
//! Layered runtime settings: built-in defaults, then an optional
//! `solace.toml`, then `SOLACE__SECTION__KEY` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Secret used when none is configured. Fine for local runs only.
pub const DEV_AUTH_SECRET: &str = "solace-dev-secret";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
    pub locale: LocaleSettings,
    /// The `.env` file applied to the process environment, if one was found.
    /// Reported by the caller once logging is up.
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    /// Directory uploaded objects are written to
    pub root: String,
    /// URL path the directory is served under
    pub url_prefix: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub secret: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocaleSettings {
    /// Offset from UTC used for calendar-day logic such as check-in streaks
    pub utc_offset_minutes: i32,
}

impl Settings {
    /// Loads `.env`, then `solace.toml` from the working directory, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = dotenvy::dotenv().ok();
        Self::load_with_env_file(env_file, Path::new("solace"), None)
    }

    fn load_with_env_file(
        env_file: Option<PathBuf>,
        file: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut settings = Self::load_from(file, env)?;
        settings.env_file = env_file;
        Ok(settings)
    }

    /// `file` is passed without extension; `env` replaces the process environment when given.
    pub fn load_from(
        file: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite:solace.db")?
            .set_default("database.max_connections", 5)?
            .set_default("media.root", "./data/media")?
            .set_default("media.url_prefix", "/media")?
            .set_default("media.max_upload_bytes", 5 * 1024 * 1024)?
            .set_default("auth.secret", DEV_AUTH_SECRET)?
            .set_default("log.filter", "info,sqlx=warn")?
            .set_default("log.json", false)?
            .set_default("locale.utc_offset_minutes", 0)?
            .add_source(File::from(file).required(false))
            .add_source(
                Environment::with_prefix("SOLACE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("auth.secret must not be empty".into()));
        }
        if self.media.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("media.max_upload_bytes must be positive".into()));
        }
        if self.locale.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(
                "locale.utc_offset_minutes must be within one day".into(),
            ));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.auth.secret.expose_secret() == DEV_AUTH_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_file() -> &'static Path {
        Path::new("does-not-exist/solace")
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_from(no_file(), Some(HashMap::new())).unwrap();
        assert_eq!(settings.server_address(), "127.0.0.1:8080");
        assert_eq!(settings.media.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(settings.media.url_prefix, "/media");
        assert!(!settings.log.json);
        assert!(settings.uses_dev_secret());
    }

    #[test]
    fn test_environment_overrides() {
        let env = HashMap::from([
            ("SOLACE__SERVER__PORT".to_string(), "9090".to_string()),
            ("SOLACE__AUTH__SECRET".to_string(), "hunter2".to_string()),
            ("SOLACE__LOG__JSON".to_string(), "true".to_string()),
            ("SOLACE__LOCALE__UTC_OFFSET_MINUTES".to_string(), "-300".to_string()),
        ]);
        let settings = Settings::load_from(no_file(), Some(env)).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.auth.secret.expose_secret(), "hunter2");
        assert!(settings.log.json);
        assert_eq!(settings.locale.utc_offset_minutes, -300);
        assert!(!settings.uses_dev_secret());
    }

    #[test]
    fn test_env_file_is_handed_back_to_caller() {
        let settings = Settings::load_from(no_file(), Some(HashMap::new())).unwrap();
        assert_eq!(settings.env_file, None);

        let found = PathBuf::from("/srv/solace/.env");
        let settings =
            Settings::load_with_env_file(Some(found.clone()), no_file(), Some(HashMap::new()))
                .unwrap();
        assert_eq!(settings.env_file, Some(found));
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let settings = Settings::load_from(no_file(), Some(HashMap::new())).unwrap();
        assert!(!format!("{settings:?}").contains(DEV_AUTH_SECRET));
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        let env = HashMap::from([(
            "SOLACE__LOCALE__UTC_OFFSET_MINUTES".to_string(),
            "1440".to_string(),
        )]);
        assert!(matches!(
            Settings::load_from(no_file(), Some(env)),
            Err(ConfigError::Invalid(_))
        ));
    }
}
