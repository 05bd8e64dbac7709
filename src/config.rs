//! Configuration and builder for the mock harness

use std::time::Duration;
use url::Url;

use crate::{error::Error, streaming::ChunkStrategy, Result};

/// Thirty days, the default lifetime of an issued API key
pub const THIRTY_DAYS: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Configuration for a [`MockApi`](crate::MockApi)
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Prefix every emulated route lives under, e.g. `/openai/v1`
    pub base_path: String,
    /// Real server that pass-through requests are forwarded to
    pub upstream_url: Option<Url>,
    /// Timeout for pass-through requests
    pub timeout: Duration,
    /// Answer store-backed routes with 401 when no bearer token is sent
    pub require_auth: bool,
    /// Prefix of issued API key secrets
    pub api_key_prefix: String,
    /// Expiry used when a key is created without `expires_at`
    pub api_key_lifetime: Duration,
    /// Model name reported by completions and new assistants
    pub default_model: String,
    /// Reply used by runs and completions when no scenario scripted one
    pub default_completion: String,
    /// How default completions are split into chunks
    pub chunking: ChunkStrategy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_path: "/".to_string(),
            upstream_url: None,
            timeout: Duration::from_secs(30),
            require_auth: false,
            api_key_prefix: "lfai_".to_string(),
            api_key_lifetime: THIRTY_DAYS,
            default_model: "vllm".to_string(),
            default_completion: "This is a mocked response.".to_string(),
            chunking: ChunkStrategy::Words,
        }
    }
}

impl HarnessConfig {
    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.base_path.starts_with('/') {
            return Err(Error::Config(format!(
                "Base path must start with '/', got: {}",
                self.base_path
            )));
        }

        if self.api_key_prefix.is_empty() {
            return Err(Error::Config("API key prefix cannot be empty".to_string()));
        }

        if self.api_key_lifetime.is_zero() {
            return Err(Error::Config(
                "API key lifetime must be greater than zero".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::Config("Timeout must be greater than zero".to_string()));
        }

        if let ChunkStrategy::Chars(0) = self.chunking {
            return Err(Error::Config("Chunk size must be greater than zero".to_string()));
        }

        if let Some(url) = &self.upstream_url {
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(Error::Config(format!(
                    "Upstream URL must use http or https scheme, got: {}",
                    url.scheme()
                )));
            }
        }

        Ok(())
    }

    /// Strip `base_path` from a request path.
    ///
    /// Returns `None` when the path lies outside the emulated API.
    pub fn relative_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let base = self.base_path.trim_end_matches('/');
        if base.is_empty() {
            return Some(path);
        }
        match path.strip_prefix(base) {
            Some("") => Some("/"),
            Some(rest) if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

/// Builder for [`HarnessConfig`]
#[derive(Debug, Default)]
pub struct HarnessConfigBuilder {
    base_path: Option<String>,
    upstream_url: Option<Url>,
    timeout: Option<Duration>,
    require_auth: Option<bool>,
    api_key_prefix: Option<String>,
    api_key_lifetime: Option<Duration>,
    default_model: Option<String>,
    default_completion: Option<String>,
    chunking: Option<ChunkStrategy>,
}

impl HarnessConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base path of the emulated API
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Set the upstream that pass-through requests go to
    pub fn upstream_url(mut self, url: impl TryInto<Url>) -> Result<Self> {
        self.upstream_url = Some(
            url.try_into()
                .map_err(|_| Error::Config("Invalid upstream URL".to_string()))?,
        );
        Ok(self)
    }

    /// Set the pass-through timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Require a bearer token on store-backed routes
    pub fn require_auth(mut self, require: bool) -> Self {
        self.require_auth = Some(require);
        self
    }

    /// Set the API key secret prefix
    pub fn api_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_key_prefix = Some(prefix.into());
        self
    }

    /// Set the default API key lifetime
    pub fn api_key_lifetime(mut self, lifetime: Duration) -> Self {
        self.api_key_lifetime = Some(lifetime);
        self
    }

    /// Set the model name reported by the mock
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Set the reply used when no completion is scripted
    pub fn default_completion(mut self, text: impl Into<String>) -> Self {
        self.default_completion = Some(text.into());
        self
    }

    /// Set the chunking of default completions
    pub fn chunking(mut self, chunking: ChunkStrategy) -> Self {
        self.chunking = Some(chunking);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<HarnessConfig> {
        let mut config = HarnessConfig::default();

        if let Some(base_path) = self.base_path {
            config.base_path = base_path;
        } else if let Ok(env_path) = std::env::var("LFAI_MOCK_BASE_PATH") {
            config.base_path = env_path;
        }

        if let Some(url) = self.upstream_url {
            config.upstream_url = Some(url);
        } else if let Ok(env_url) = std::env::var("LFAI_MOCK_UPSTREAM_URL") {
            config.upstream_url = Some(env_url.parse().map_err(|_| {
                Error::Config(format!(
                    "Invalid upstream URL in LFAI_MOCK_UPSTREAM_URL: {}",
                    env_url
                ))
            })?);
        }

        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(require_auth) = self.require_auth {
            config.require_auth = require_auth;
        }
        if let Some(prefix) = self.api_key_prefix {
            config.api_key_prefix = prefix;
        }
        if let Some(lifetime) = self.api_key_lifetime {
            config.api_key_lifetime = lifetime;
        }
        if let Some(model) = self.default_model {
            config.default_model = model;
        }
        if let Some(text) = self.default_completion {
            config.default_completion = text;
        }
        if let Some(chunking) = self.chunking {
            config.chunking = chunking;
        }

        config.validate()?;
        Ok(config)
    }
}
