// ABOUTME: loads application settings from the environment into one typed struct.
// ABOUTME: missing provider credentials disable the feature instead of aborting startup.

use haven_consent::Language;

use crate::error::HavenError;

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    fn parse(value: &str) -> Result<Self, HavenError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(HavenError::Config(format!(
                "unknown AI_PROVIDER '{other}', expected 'anthropic' or 'openai'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderKind,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_model: String,
    pub openai_model: String,
    pub github_token: Option<String>,
    pub azure: Option<AzureCredentials>,
    pub db_path: String,
    pub default_language: Language,
    pub audit_path: String,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> Result<Self, HavenError> {
        let provider = match env_opt("AI_PROVIDER") {
            Some(value) => ProviderKind::parse(&value)?,
            None => ProviderKind::OpenAi,
        };

        let default_language = match env_opt("HAVEN_LANGUAGE") {
            Some(code) => Language::parse(&code).map_err(|e| HavenError::Config(e.to_string()))?,
            None => Language::Ar,
        };

        // Azure needs the full credential set; a partial one counts as absent.
        let azure = match (
            env_opt("AZURE_TENANT_ID"),
            env_opt("AZURE_CLIENT_ID"),
            env_opt("AZURE_CLIENT_SECRET"),
            env_opt("AZURE_SUBSCRIPTION_ID"),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret), Some(subscription_id)) => {
                Some(AzureCredentials {
                    tenant_id,
                    client_id,
                    client_secret,
                    subscription_id,
                })
            }
            _ => None,
        };

        Ok(Settings {
            provider,
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            anthropic_model: env_opt("ANTHROPIC_MODEL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            openai_model: env_opt("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            github_token: env_opt("GITHUB_TOKEN"),
            azure,
            db_path: env_opt("HAVEN_DB_PATH").unwrap_or_else(|| "./haven.db".to_string()),
            default_language,
            audit_path: env_opt("HAVEN_AUDIT_PATH")
                .unwrap_or_else(|| "./haven-audit.jsonl".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers() {
        assert_eq!(
            ProviderKind::parse("Anthropic").unwrap(),
            ProviderKind::Anthropic
        );
        assert_eq!(ProviderKind::parse("openai").unwrap(), ProviderKind::OpenAi);
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = ProviderKind::parse("mistral").unwrap_err();
        assert!(matches!(err, HavenError::Config(_)));
    }
}
