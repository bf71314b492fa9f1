// ABOUTME: the single consent gate callers consult before any side-effecting operation.
// ABOUTME: serializes prompt sessions so two pending requests can never interleave.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::classify::{classify, EscalationRule};
use crate::flow::{run_flow, ConsentDecision, ConsentRequest, DenyReason, PromptSession};
use crate::language::Language;
use crate::registry::ActionRegistry;
use crate::tier::RiskTier;

/// The consent workflow engine: an immutable registry, an optional escalation
/// rule set, and a gate ensuring one active prompt session at a time.
#[derive(Debug)]
pub struct ConsentEngine {
    registry: ActionRegistry,
    rules: Vec<EscalationRule>,
    session_gate: Mutex<()>,
}

impl ConsentEngine {
    pub fn new(registry: ActionRegistry) -> Self {
        Self::with_rules(registry, Vec::new())
    }

    pub fn with_rules(registry: ActionRegistry, rules: Vec<EscalationRule>) -> Self {
        Self {
            registry,
            rules,
            session_gate: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Resolve the effective tier for an action. Unknown ids resolve to
    /// `Critical`; escalation rules may only raise the result.
    pub fn classify(&self, action_id: &str, params: &BTreeMap<String, String>) -> RiskTier {
        classify(&self.registry, &self.rules, action_id, params)
    }

    /// Run the full classify-then-confirm sequence for one action. The
    /// decision is always a value: malformed requests and every kind of user
    /// refusal come back as a denial with a stated reason, never an error.
    pub fn request_consent(
        &self,
        action_id: &str,
        params: &BTreeMap<String, String>,
        language: Language,
        session: &mut dyn PromptSession,
    ) -> ConsentDecision {
        // One prompt session at a time; a second request queues here until
        // the first finishes rather than interleaving its prompts.
        let _active = self
            .session_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let action_id = action_id.trim();
        if action_id.is_empty() {
            tracing::warn!("consent requested with empty action id, denying without prompting");
            return ConsentDecision::denied("", RiskTier::Critical, DenyReason::MalformedRequest);
        }

        let tier = self.classify(action_id, params);
        let (rendered_description, reversible) = match self.registry.lookup(action_id) {
            Some(descriptor) => (descriptor.description.render(language, params), descriptor.reversible),
            None => {
                let text = match language {
                    Language::En => {
                        format!("The action '{action_id}' is not registered and is treated as critical.")
                    }
                    Language::Ar => {
                        format!("الإجراء '{action_id}' غير مسجل ويعامل كإجراء حرج.")
                    }
                };
                (text, false)
            }
        };

        let request = ConsentRequest {
            action_id: action_id.to_string(),
            tier,
            rendered_description,
            reversible,
            language,
            context_params: params.clone(),
        };

        let decision = run_flow(&request, session);
        tracing::info!(
            action_id,
            tier = %decision.tier,
            granted = decision.granted,
            "consent decision"
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{ScriptedSession, StageKind};
    use crate::language::Bilingual;
    use crate::registry::RegistryBuilder;

    fn engine() -> ConsentEngine {
        let mut builder = RegistryBuilder::new();
        builder
            .register(
                "github.delete_repo",
                RiskTier::High,
                Bilingual::new(
                    "سيحذف هذا الإجراء المستودع {repository} بشكل دائم.",
                    "This will permanently delete the repository {repository}.",
                ),
                false,
            )
            .unwrap();
        builder
            .register(
                "notes.create",
                RiskTier::Safe,
                Bilingual::new("سيتم إنشاء ملاحظة.", "A note will be created."),
                true,
            )
            .unwrap();
        ConsentEngine::new(builder.build())
    }

    #[test]
    fn safe_action_grants_with_zero_interaction_in_any_language() {
        let engine = engine();
        for language in [Language::Ar, Language::En] {
            let mut session = ScriptedSession::answering(&[]);
            let decision =
                engine.request_consent("notes.create", &BTreeMap::new(), language, &mut session);
            assert!(decision.granted);
            assert_eq!(session.prompts_shown(), 0);
        }
    }

    #[test]
    fn high_tier_mismatch_scenario_denies_with_reason() {
        let engine = engine();
        let mut params = BTreeMap::new();
        params.insert("repository".to_string(), "acme/demo".to_string());

        let mut session = ScriptedSession::answering(&["yes", "wrong", "wrong", "wrong"]);
        let decision =
            engine.request_consent("github.delete_repo", &params, Language::En, &mut session);

        assert!(!decision.granted);
        assert_eq!(
            decision.reason,
            Some(DenyReason::ConfirmationMismatch { stage: 2 })
        );
        assert!(session.prompts[0].text.contains("acme/demo"));
    }

    #[test]
    fn unregistered_action_runs_three_stage_flow() {
        let engine = engine();
        assert_eq!(
            engine.classify("azure.delete_resource_group", &BTreeMap::new()),
            RiskTier::Critical
        );

        let mut session =
            ScriptedSession::answering(&["yes", "yes", "azure.delete_resource_group"]);
        let decision = engine.request_consent(
            "azure.delete_resource_group",
            &BTreeMap::new(),
            Language::En,
            &mut session,
        );
        assert!(decision.granted);
        assert_eq!(decision.tier, RiskTier::Critical);
        assert_eq!(session.prompts_shown(), 3);
        assert_eq!(session.prompts[2].kind, StageKind::TypedConfirmation);
    }

    #[test]
    fn empty_action_id_denies_without_prompting() {
        let engine = engine();
        let mut session = ScriptedSession::answering(&["yes", "yes", "yes"]);
        let decision =
            engine.request_consent("   ", &BTreeMap::new(), Language::En, &mut session);
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenyReason::MalformedRequest));
        assert_eq!(session.prompts_shown(), 0);
    }

    #[test]
    fn escalation_rules_raise_the_effective_tier() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(
                "github.delete_repo",
                RiskTier::High,
                Bilingual::new("حذف {repository}", "delete {repository}"),
                false,
            )
            .unwrap();
        let engine = ConsentEngine::with_rules(
            builder.build(),
            vec![EscalationRule {
                action_fragment: "delete".to_string(),
                param_key: "repository".to_string(),
                value_fragment: "prod".to_string(),
            }],
        );

        let mut params = BTreeMap::new();
        params.insert("repository".to_string(), "acme/prod".to_string());
        assert_eq!(
            engine.classify("github.delete_repo", &params),
            RiskTier::Critical
        );

        // The escalated tier drives the flow: three stages instead of two.
        let mut session = ScriptedSession::answering(&["yes", "yes", "github.delete_repo"]);
        let decision =
            engine.request_consent("github.delete_repo", &params, Language::En, &mut session);
        assert!(decision.granted);
        assert_eq!(session.prompts_shown(), 3);
    }

    #[test]
    fn sessions_queue_rather_than_interleave() {
        use std::sync::Arc;

        let engine = Arc::new(engine());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            handles.push(std::thread::spawn(move || {
                let mut session = ScriptedSession::answering(&["yes", "github.delete_repo"]);
                let decision = engine.request_consent(
                    "github.delete_repo",
                    &BTreeMap::new(),
                    Language::En,
                    &mut session,
                );
                assert!(decision.granted);
                assert_eq!(session.prompts_shown(), 2);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
