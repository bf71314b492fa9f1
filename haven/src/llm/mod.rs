// ABOUTME: chat types, the provider trait, and the picker that wires the configured client.
// ABOUTME: also hosts the bilingual system prompt and the arabic-ratio language detector.

pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use haven_consent::Language;

use crate::config::{ProviderKind, Settings};
use crate::error::HavenError;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
}

/// A hosted language-model backend. The app treats providers as black boxes
/// behind this seam; tests substitute a mock HTTP server.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, HavenError>;
}

/// Build the configured provider, or `None` when its API key is absent so
/// chat degrades gracefully instead of aborting startup.
pub fn provider_from_settings(settings: &Settings) -> Option<Box<dyn LlmProvider>> {
    match settings.provider {
        ProviderKind::Anthropic => settings.anthropic_api_key.as_ref().map(|key| {
            Box::new(AnthropicProvider::new(
                key.clone(),
                settings.anthropic_model.clone(),
            )) as Box<dyn LlmProvider>
        }),
        ProviderKind::OpenAi => settings.openai_api_key.as_ref().map(|key| {
            Box::new(OpenAiProvider::new(
                key.clone(),
                settings.openai_model.clone(),
            )) as Box<dyn LlmProvider>
        }),
    }
}

/// More than 30% Arabic-block codepoints reads as Arabic.
pub fn detect_language(text: &str) -> Language {
    let total = text.chars().count();
    if total == 0 {
        return Language::En;
    }
    let arabic = text
        .chars()
        .filter(|c| ('\u{0600}'..='\u{06FF}').contains(c))
        .count();
    if arabic * 10 > total * 3 {
        Language::Ar
    } else {
        Language::En
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
أنت Haven، مساعد ذكي ودود يخدم المستخدم.

You are Haven, a friendly and helpful AI assistant serving the user.

Philosophy: \"The human commands, the AI serves\"

Core principles:
- Always be respectful and serve the human's needs
- Support both Arabic and English naturally
- Ask for consent before any dangerous actions
- Provide calm, helpful warnings (not panic-inducing)
- Be transparent about capabilities and limitations
- Remember user preferences and context

You have access to:
- GitHub integration for repository management
- Azure integration for cloud resources
- Workspace for notes and tasks
- Memory system to remember user preferences

Always respond in the same language the user uses, or in Arabic by default.
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_arabic_text() {
        assert_eq!(detect_language("مرحباً كيف حالك"), Language::Ar);
    }

    #[test]
    fn detects_english_text() {
        assert_eq!(detect_language("hello, how are you?"), Language::En);
    }

    #[test]
    fn mostly_latin_with_a_few_arabic_words_reads_as_english() {
        assert_eq!(
            detect_language("please delete the repo called مستودع right now"),
            Language::En
        );
    }

    #[test]
    fn empty_input_defaults_to_english() {
        assert_eq!(detect_language(""), Language::En);
    }

    #[test]
    fn picker_returns_none_without_api_key() {
        let settings = Settings {
            provider: ProviderKind::Anthropic,
            anthropic_api_key: None,
            openai_api_key: Some("unused".to_string()),
            anthropic_model: "m".to_string(),
            openai_model: "m".to_string(),
            github_token: None,
            azure: None,
            db_path: ":memory:".to_string(),
            default_language: Language::Ar,
            audit_path: "./audit.jsonl".to_string(),
        };
        assert!(provider_from_settings(&settings).is_none());
    }

    #[test]
    fn picker_builds_configured_provider() {
        let settings = Settings {
            provider: ProviderKind::OpenAi,
            anthropic_api_key: None,
            openai_api_key: Some("key".to_string()),
            anthropic_model: "m".to_string(),
            openai_model: "gpt-4-turbo-preview".to_string(),
            github_token: None,
            azure: None,
            db_path: ":memory:".to_string(),
            default_language: Language::En,
            audit_path: "./audit.jsonl".to_string(),
        };
        let provider = provider_from_settings(&settings).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
