use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub database: DatabaseConfig,
    pub numbering: NumberingConfig,
    pub ai: AiConfig,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NumberingConfig {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl NumberingConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Read `INVOICE_NUMBER_MAX_ATTEMPTS` and `INVOICE_NUMBER_RETRY_BACKOFF_MS`,
    /// falling back to [`NumberingConfig::default`].
    fn from_env(is_prod: bool) -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            max_attempts: parse_env(
                "INVOICE_NUMBER_MAX_ATTEMPTS",
                &defaults.max_attempts.to_string(),
                is_prod,
            )?,
            retry_backoff_ms: parse_env(
                "INVOICE_NUMBER_RETRY_BACKOFF_MS",
                &defaults.retry_backoff_ms.to_string(),
                is_prod,
            )?,
        })
    }
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_backoff_ms: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Gemini,
    Mock,
    Disabled,
}

impl InvoiceConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend: DatabaseBackend = get_env("DATABASE_BACKEND", Some("mongo"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let uri = match backend {
            DatabaseBackend::Mongo => get_env("MONGODB_URI", None, is_prod)?,
            DatabaseBackend::Memory => env::var("MONGODB_URI").unwrap_or_default(),
        };

        let api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let default_provider = if api_key.is_some() { "gemini" } else { "disabled" };
        let provider: AiProvider = get_env("AI_PROVIDER", Some(default_provider), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        if provider == AiProvider::Gemini && api_key.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GEMINI_API_KEY is required when AI_PROVIDER=gemini"
            )));
        }

        Ok(InvoiceConfig {
            common: common_config,
            database: DatabaseConfig {
                backend,
                uri,
                database: get_env("MONGODB_DATABASE", Some("invoice_db"), is_prod)?,
            },
            numbering: NumberingConfig::from_env(is_prod)?,
            ai: AiConfig {
                provider,
                api_key,
                model: get_env("GEMINI_MODEL", Some("gemini-1.5-flash"), is_prod)?,
            },
            frontend_url: get_env("FRONTEND_URL", Some("http://localhost:5173"), is_prod)?,
        })
    }
}

impl std::str::FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(DatabaseBackend::Mongo),
            "memory" => Ok(DatabaseBackend::Memory),
            _ => Err(format!("Invalid database backend: {}", s)),
        }
    }
}

impl std::str::FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(AiProvider::Gemini),
            "mock" => Ok(AiProvider::Mock),
            "disabled" | "none" => Ok(AiProvider::Disabled),
            _ => Err(format!("Invalid AI provider: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backends_case_insensitively() {
        assert_eq!("Mongo".parse::<DatabaseBackend>(), Ok(DatabaseBackend::Mongo));
        assert_eq!("mongodb".parse::<DatabaseBackend>(), Ok(DatabaseBackend::Mongo));
        assert_eq!("MEMORY".parse::<DatabaseBackend>(), Ok(DatabaseBackend::Memory));
        assert!("postgres".parse::<DatabaseBackend>().is_err());
    }

    #[test]
    fn parses_ai_providers() {
        assert_eq!("gemini".parse::<AiProvider>(), Ok(AiProvider::Gemini));
        assert_eq!("Mock".parse::<AiProvider>(), Ok(AiProvider::Mock));
        assert_eq!("none".parse::<AiProvider>(), Ok(AiProvider::Disabled));
        assert!("openai".parse::<AiProvider>().is_err());
    }

    #[test]
    fn missing_keys_use_defaults_outside_production() {
        let key = "INVOICE_SERVICE_TEST_UNSET_KEY";
        assert_eq!(get_env(key, Some("fallback"), false).unwrap(), "fallback");
        assert!(get_env(key, None, false).is_err());
        assert!(get_env(key, Some("fallback"), true).is_err());
    }

    #[test]
    fn numeric_defaults_parse() {
        let attempts: u32 = parse_env("INVOICE_SERVICE_TEST_UNSET_ATTEMPTS", "5", false).unwrap();
        assert_eq!(attempts, 5);
    }

    #[test]
    fn numbering_defaults() {
        let numbering = NumberingConfig::default();
        assert_eq!(numbering.max_attempts, 5);
        assert_eq!(numbering.retry_backoff(), Duration::from_millis(25));
    }

    #[test]
    fn numbering_falls_back_to_defaults_when_unset() {
        if env::var_os("INVOICE_NUMBER_MAX_ATTEMPTS").is_some()
            || env::var_os("INVOICE_NUMBER_RETRY_BACKOFF_MS").is_some()
        {
            return;
        }
        let loaded = NumberingConfig::from_env(false).unwrap();
        let defaults = NumberingConfig::default();
        assert_eq!(loaded.max_attempts, defaults.max_attempts);
        assert_eq!(loaded.retry_backoff_ms, defaults.retry_backoff_ms);
    }
}
