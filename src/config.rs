use std::{env, net::SocketAddr};

/// Anthropic-style messages API settings. The endpoint is configurable so
/// tests can point the client at a stub server.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub endpoint: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_version: "2023-06-01".to_owned(),
            model: "claude-3-sonnet-20240229".to_owned(),
            max_tokens: 4096,
            temperature: 0.7,
            endpoint: "https://api.anthropic.com/v1/messages".to_owned(),
        }
    }
}

impl AnthropicConfig {
    pub fn is_valid(&self) -> bool {
        !self.api_key.is_empty() && !self.model.is_empty()
    }
}

/// OpenAI-style chat completions settings. A distinct model identifier
/// selects the vision-capable variant for image extraction.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub vision_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub endpoint: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4".to_owned(),
            vision_model: "gpt-4-vision-preview".to_owned(),
            max_tokens: 2000,
            temperature: 0.7,
            endpoint: "https://api.openai.com/v1/chat/completions".to_owned(),
        }
    }
}

impl OpenAiConfig {
    pub fn is_valid(&self) -> bool {
        !self.api_key.is_empty() && !self.model.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SupabaseConfig {
    pub api_url: String,
    pub api_key: String,
}

impl SupabaseConfig {
    pub fn is_valid(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_bind: SocketAddr,
    pub ai_provider: String,
    pub anthropic: AnthropicConfig,
    pub openai: OpenAiConfig,
    pub supabase: SupabaseConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT").unwrap_or_else(|_| "8080".to_owned());
        let http_bind = env::var("HTTP_BIND").unwrap_or_else(|_| format!("0.0.0.0:{port}"));
        let http_bind = http_bind.parse()?;

        let anthropic = AnthropicConfig {
            api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| AnthropicConfig::default().model),
            ..AnthropicConfig::default()
        };

        let openai = OpenAiConfig {
            api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| OpenAiConfig::default().model),
            vision_model: env::var("OPENAI_VISION_MODEL")
                .unwrap_or_else(|_| OpenAiConfig::default().vision_model),
            ..OpenAiConfig::default()
        };

        Ok(Self {
            http_bind,
            ai_provider: env::var("AI_PROVIDER").unwrap_or_else(|_| "auto".to_owned()),
            anthropic,
            openai,
            supabase: SupabaseConfig {
                api_url: env::var("SUPABASE_URL").unwrap_or_default(),
                api_key: env::var("SUPABASE_KEY").unwrap_or_default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configs_need_credentials_to_be_valid() {
        assert!(!AnthropicConfig::default().is_valid());
        assert!(!OpenAiConfig::default().is_valid());
        assert!(!SupabaseConfig::default().is_valid());

        let anthropic = AnthropicConfig {
            api_key: "sk-ant".to_owned(),
            ..AnthropicConfig::default()
        };
        assert!(anthropic.is_valid());

        let supabase = SupabaseConfig {
            api_url: "https://project.supabase.co".to_owned(),
            api_key: "anon".to_owned(),
        };
        assert!(supabase.is_valid());
    }
}
