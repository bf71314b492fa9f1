// ABOUTME: models the two supported interface languages and bilingual message templates.
// ABOUTME: templates render with {param} substitution so warnings can name their target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConsentError;

/// The two languages the product speaks. Anything else is rejected at the
/// boundary with a typed error rather than silently falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Ar,
    En,
}

impl Language {
    pub fn parse(code: &str) -> Result<Language, ConsentError> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ar" => Ok(Language::Ar),
            "en" => Ok(Language::En),
            other => Err(ConsentError::UnsupportedLanguage(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ar => "ar",
            Language::En => "en",
        }
    }

    /// Affirmative answers accepted at yes/no stages. Arabic sessions also
    /// accept the Latin tokens since mixed-script input is common.
    pub fn yes_tokens(&self) -> &'static [&'static str] {
        match self {
            Language::Ar => &["نعم", "y", "yes"],
            Language::En => &["y", "yes"],
        }
    }

    /// Inputs that abort the whole flow, treated as the strictest denial.
    pub fn cancel_tokens(&self) -> &'static [&'static str] {
        match self {
            Language::Ar => &["إلغاء", "cancel", "q"],
            Language::En => &["cancel", "q"],
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message carried in both languages; the flow picks one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bilingual {
    pub ar: String,
    pub en: String,
}

impl Bilingual {
    pub fn new(ar: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            ar: ar.into(),
            en: en.into(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Ar => &self.ar,
            Language::En => &self.en,
        }
    }

    /// Render the template for one language, substituting `{key}` markers
    /// with context parameters. Unknown markers are left verbatim.
    pub fn render(&self, language: Language, params: &BTreeMap<String, String>) -> String {
        let mut out = self.get(language).to_string();
        for (key, value) in params {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_codes_case_insensitively() {
        assert_eq!(Language::parse("ar").unwrap(), Language::Ar);
        assert_eq!(Language::parse(" EN ").unwrap(), Language::En);
    }

    #[test]
    fn rejects_unknown_codes_with_typed_error() {
        let err = Language::parse("fr").unwrap_err();
        assert_eq!(err, ConsentError::UnsupportedLanguage("fr".to_string()));
    }

    #[test]
    fn renders_params_into_template() {
        let text = Bilingual::new("حذف {repo}", "delete {repo}");
        let mut params = BTreeMap::new();
        params.insert("repo".to_string(), "haven/demo".to_string());
        assert_eq!(text.render(Language::En, &params), "delete haven/demo");
        assert_eq!(text.render(Language::Ar, &params), "حذف haven/demo");
    }

    #[test]
    fn leaves_unknown_markers_verbatim() {
        let text = Bilingual::new("x", "delete {repo}");
        assert_eq!(
            text.render(Language::En, &BTreeMap::new()),
            "delete {repo}"
        );
    }
}
