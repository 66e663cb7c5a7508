//! Runtime configuration: plain structs with defaults, overlaid from the
//! environment. Consumed only by the facade/registry wiring layer — the
//! `EventStore`, `TurnService`, and reducer traits stay configuration-agnostic.

use std::path::PathBuf;

use crate::event::LlmApiFormat;

/// Default base directory for persistence, relative to the process cwd.
pub const DEFAULT_DATA_ROOT: &str = ".mini-agent";
/// Default debounce quiet-period, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 10;
/// Default inactivity timeout for `add_and_stream_until_idle`, in milliseconds.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 50;
/// Safety cap for `add_and_stream_until_idle`, regardless of inactivity.
pub const DEFAULT_IDLE_SAFETY_CAP_MS: u64 = 30_000;

/// Runtime configuration consumed by the facade and registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Base directory for persistence.
    pub data_root: PathBuf,
    /// Debounce quiet-period before starting a turn.
    pub debounce_ms: u64,
    /// Inactivity timeout used by `add_and_stream_until_idle`.
    pub idle_timeout_ms: u64,
    /// Overall safety cap for `add_and_stream_until_idle`.
    pub idle_safety_cap_ms: u64,
    /// Default wire dialect for the turn service, if configured.
    pub llm_api_format: Option<LlmApiFormat>,
    /// Default model identifier.
    pub llm_model: Option<String>,
    /// Default base URL override.
    pub llm_base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub llm_api_key_env: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            idle_safety_cap_ms: DEFAULT_IDLE_SAFETY_CAP_MS,
            llm_api_format: None,
            llm_model: None,
            llm_base_url: None,
            llm_api_key_env: None,
        }
    }
}

impl RuntimeConfig {
    /// Overlay `MINI_AGENT_*` environment variables on top of the defaults.
    ///
    /// Malformed numeric overrides are ignored (the default is kept) rather
    /// than failing startup.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = std::env::var("MINI_AGENT_DATA_ROOT") {
            config.data_root = PathBuf::from(root);
        }
        if let Ok(ms) = std::env::var("MINI_AGENT_DEBOUNCE_MS") {
            if let Ok(parsed) = ms.parse() {
                config.debounce_ms = parsed;
            }
        }
        if let Ok(ms) = std::env::var("MINI_AGENT_IDLE_TIMEOUT_MS") {
            if let Ok(parsed) = ms.parse() {
                config.idle_timeout_ms = parsed;
            }
        }
        if let Ok(format) = std::env::var("MINI_AGENT_LLM_API_FORMAT") {
            config.llm_api_format = parse_api_format(&format);
        }
        if let Ok(model) = std::env::var("MINI_AGENT_LLM_MODEL") {
            config.llm_model = Some(model);
        }
        if let Ok(url) = std::env::var("MINI_AGENT_LLM_BASE_URL") {
            config.llm_base_url = Some(url);
        }
        if let Ok(key_env) = std::env::var("MINI_AGENT_LLM_API_KEY_ENV") {
            config.llm_api_key_env = Some(key_env);
        }

        config
    }

    /// Path to the conversation file for `name` under this config's data root.
    #[must_use]
    pub fn conversation_path(&self, name: &str) -> PathBuf {
        self.data_root.join("conversations").join(format!("{name}.json"))
    }
}

fn parse_api_format(raw: &str) -> Option<LlmApiFormat> {
    match raw {
        "openai-responses" => Some(LlmApiFormat::OpenAiResponses),
        "openai-chat-completions" => Some(LlmApiFormat::OpenAiChatCompletions),
        "anthropic" => Some(LlmApiFormat::Anthropic),
        "gemini" => Some(LlmApiFormat::Gemini),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RuntimeConfig::default();
        assert_eq!(config.data_root, PathBuf::from(".mini-agent"));
        assert_eq!(config.debounce_ms, 10);
        assert_eq!(config.idle_timeout_ms, 50);
    }

    #[test]
    fn conversation_path_layout() {
        let config = RuntimeConfig { data_root: PathBuf::from("/tmp/root"), ..Default::default() };
        assert_eq!(
            config.conversation_path("alpha"),
            PathBuf::from("/tmp/root/conversations/alpha.json")
        );
    }

    #[test]
    fn unknown_api_format_is_ignored() {
        assert_eq!(parse_api_format("not-a-format"), None);
        assert_eq!(parse_api_format("anthropic"), Some(LlmApiFormat::Anthropic));
    }
}
