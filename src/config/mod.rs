pub mod prompt;
pub mod source;

use log::info;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use self::source::{ EnvSource, ResolverChain, SecretsSource, StaticSource };

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const VECTOR_STORE_IDS: &str = "VECTOR_STORE_IDS";
pub const DEFAULT_SQL_SYSTEM: &str = "DEFAULT_SQL_SYSTEM";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {key}. Set it in the environment or the secrets file.")]
    MissingCredential {
        key: String,
    },

    #[error("Failed to read secrets file '{path}': {source}")]
    SecretsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse secrets file '{path}': {source}")]
    SecretsParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings for one UI session, resolved once and never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    pub api_key: String,
    pub model: String,
    pub vector_store_ids: Vec<String>,
    pub system_prompt: String,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("vector_store_ids", &self.vector_store_ids)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

impl Configuration {
    /// Environment first, then the secrets file at `secrets_path`, then built-in defaults.
    pub fn load<P: AsRef<Path>>(secrets_path: P) -> Result<Self, ConfigError> {
        Self::load_with(EnvSource::capture(), secrets_path)
    }

    pub fn load_with<P: AsRef<Path>>(env: EnvSource, secrets_path: P) -> Result<Self, ConfigError> {
        let secrets = SecretsSource::load(secrets_path)?;
        let chain = ResolverChain::new()
            .with_source(env)
            .with_source(secrets)
            .with_source(default_values());
        Self::resolve(&chain)
    }

    pub fn resolve(chain: &ResolverChain) -> Result<Self, ConfigError> {
        let api_key = chain
            .resolve(OPENAI_API_KEY)
            .map(|v| v.into_text())
            .ok_or_else(|| ConfigError::MissingCredential { key: OPENAI_API_KEY.to_string() })?;

        let model = chain
            .resolve(OPENAI_MODEL)
            .map(|v| v.into_text())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let system_prompt = chain
            .resolve(DEFAULT_SQL_SYSTEM)
            .map(|v| v.into_text())
            .unwrap_or_else(|| prompt::DEFAULT_SQL_SYSTEM_PROMPT.to_string());

        let vector_store_ids = chain
            .resolve(VECTOR_STORE_IDS)
            .map(|v| v.into_list())
            .unwrap_or_default();

        let config = Self { api_key, model, vector_store_ids, system_prompt };
        info!(
            "Resolved configuration: model={}, vector stores={:?}",
            config.model,
            config.vector_store_ids
        );
        Ok(config)
    }

    pub fn retrieval_enabled(&self) -> bool {
        !self.vector_store_ids.is_empty()
    }
}

pub fn default_values() -> StaticSource {
    StaticSource::new("defaults")
        .with(OPENAI_MODEL, DEFAULT_MODEL)
        .with(DEFAULT_SQL_SYSTEM, prompt::DEFAULT_SQL_SYSTEM_PROMPT)
}
