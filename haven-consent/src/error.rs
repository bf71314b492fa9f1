// ABOUTME: defines the typed errors the consent workflow can surface to callers.
// ABOUTME: configuration errors are fatal at startup; request errors resolve into denials.

use crate::tier::RiskTier;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsentError {
    #[error(
        "action '{action_id}' already registered at tier {existing}, \
         refusing re-registration at tier {requested}"
    )]
    DuplicateRegistration {
        action_id: String,
        existing: RiskTier,
        requested: RiskTier,
    },

    #[error("unsupported language code '{0}', expected 'ar' or 'en'")]
    UnsupportedLanguage(String),

    #[error("malformed consent request: {0}")]
    MalformedRequest(String),
}
