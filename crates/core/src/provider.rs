use std::{fmt, time::Duration};

/// Request/response shape spoken by an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// Native `models/{model}:generateContent` with `responseSchema`.
    Gemini,
    /// `/chat/completions` with a `json_schema` response format.
    OpenaiCompatible,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    #[default]
    Gemini,
    Openai,
    Grok,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_vars: &'static [&'static str],
    pub dialect: Dialect,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta",
                model: "gemini-3-flash-preview",
                env_vars: &["GEMINI_API_KEY", "API_KEY"],
                dialect: Dialect::Gemini,
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-5.1",
                env_vars: &["OPENAI_API_KEY"],
                dialect: Dialect::OpenaiCompatible,
            },
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_vars: &["XAI_API_KEY"],
                dialect: Dialect::OpenaiCompatible,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
        }
    }

    /// First non-empty key found in this provider's environment variables.
    pub fn api_key_from_env(&self) -> Option<String> {
        self.config()
            .env_vars
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|key| !key.trim().is_empty())
    }
}

/// Everything needed to reach a generative model endpoint.
#[derive(Clone)]
pub struct EndpointConfig {
    pub provider: Provider,
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

impl EndpointConfig {
    pub fn new(provider: Provider, api_key: Option<String>) -> Self {
        let config = provider.config();
        Self {
            provider,
            api_url: config.api_url.to_string(),
            model: config.model.to_string(),
            api_key,
            timeout: None,
        }
    }

    pub fn from_env(provider: Provider) -> Self {
        Self::new(provider, provider.api_key_from_env())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.provider.config().dialect
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
