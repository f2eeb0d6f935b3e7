use std::fmt;
use std::sync::OnceLock;

use crate::error::ConfigError;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Where chat requests go and who they're billed to. Any server exposing an
/// OpenAI-compatible `/chat/completions` endpoint works.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Used when a request doesn't name a model.
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::openrouter("")
    }
}

impl ProviderConfig {
    pub fn custom(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::custom(OPENROUTER_BASE_URL, api_key, DEFAULT_MODEL)
    }

    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::custom(GROQ_BASE_URL, api_key, "llama-3.3-70b-versatile")
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::custom(OPENAI_BASE_URL, api_key, "gpt-4o-mini")
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Read `LLM_BASE_URL`, `LLM_MODEL` and `LLM_API_KEY` (or
    /// `OPEN_ROUTER_API`), defaulting to OpenRouter.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            config.model = model;
        }
        if let Some(key) = lookup("LLM_API_KEY").or_else(|| lookup("OPEN_ROUTER_API")) {
            config.api_key = key;
        }
        config
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("model", &self.model)
            .finish()
    }
}

static GLOBAL: OnceLock<ProviderConfig> = OnceLock::new();

/// Install the process-wide provider config. Only the first call succeeds;
/// do it before any transport is built from it.
pub fn set_global(config: ProviderConfig) -> Result<(), ConfigError> {
    GLOBAL
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

pub fn global() -> Result<&'static ProviderConfig, ConfigError> {
    GLOBAL.get().ok_or(ConfigError::NotInitialized)
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Log full request and response bodies.
    pub diagnostics: bool,
    /// Reserved for ranking of multiple choices. Not read by the engine yet.
    pub top: Option<u32>,
}

impl Options {
    pub fn with_diagnostics(mut self) -> Self {
        self.diagnostics = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_to_openrouter() {
        let cfg = ProviderConfig::default();
        assert_eq!(cfg.base_url, OPENROUTER_BASE_URL);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert!(cfg.api_key.is_empty());
        assert_eq!(cfg.endpoint(), "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let cfg = ProviderConfig::groq("k").with_base_url("http://localhost:9000/v1/");
        assert_eq!(cfg.endpoint(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("LLM_BASE_URL", "http://test:9000/v1"),
            ("LLM_MODEL", "test-model"),
            ("OPEN_ROUTER_API", "or-key"),
        ]
        .into_iter()
        .collect();
        let cfg = ProviderConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.base_url, "http://test:9000/v1");
        assert_eq!(cfg.model, "test-model");
        assert_eq!(cfg.api_key, "or-key");
    }

    #[test]
    fn explicit_key_wins_over_openrouter_key() {
        let cfg = ProviderConfig::from_lookup(|k| match k {
            "LLM_API_KEY" => Some("primary".into()),
            "OPEN_ROUTER_API" => Some("fallback".into()),
            _ => None,
        });
        assert_eq!(cfg.api_key, "primary");
        assert_eq!(cfg.base_url, OPENROUTER_BASE_URL);
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", ProviderConfig::openai("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn global_is_set_once() {
        set_global(ProviderConfig::openrouter("first")).unwrap();
        assert!(matches!(
            set_global(ProviderConfig::openrouter("second")),
            Err(ConfigError::AlreadyInitialized)
        ));
        assert_eq!(global().unwrap().api_key, "first");
    }
}
