// ABOUTME: runs the per-tier confirmation state machine and produces a typed decision.
// ABOUTME: prompt io goes through an injected session so the machine is testable without a terminal.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::language::Language;
use crate::tier::RiskTier;

/// Attempts allowed at the high-tier typed confirmation before denying.
const TYPED_STAGE_ATTEMPTS: usize = 3;

/// What kind of input a stage expects. The session can use this to shape its
/// rendering, but the flow alone decides whether an answer passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Plain yes/no question.
    YesNo,
    /// Full warning text followed by a yes/no acknowledgment.
    Warning,
    /// The user must type a specific token back.
    TypedConfirmation,
}

/// One blocking prompt shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagePrompt {
    /// 1-based position in the sequence.
    pub stage: usize,
    pub total_stages: usize,
    pub kind: StageKind,
    /// Prompt text already rendered in the request language.
    pub text: String,
    /// For typed stages, the token the user must reproduce.
    pub expected_token: Option<String>,
}

/// The session's answer to one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAnswer {
    Text(String),
    /// Dedicated abort input; denies terminally at any stage.
    Cancel,
}

/// Injected capability that supplies one answer per stage. Implemented by the
/// terminal ui in the application and by a scripted double in tests.
pub trait PromptSession {
    fn ask(&mut self, prompt: &StagePrompt) -> PromptAnswer;
}

/// Ephemeral per-invocation value handed from the classifier to the flow.
/// Never persisted; the decision is the only thing that outlives the call.
#[derive(Debug, Clone)]
pub struct ConsentRequest {
    pub action_id: String,
    pub tier: RiskTier,
    pub rendered_description: String,
    pub reversible: bool,
    pub language: Language,
    pub context_params: BTreeMap<String, String>,
}

/// Why a flow ended in denial. Always present on denied decisions so the
/// caller can state the reason instead of a bare rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    MalformedRequest,
    Declined { stage: usize },
    EmptyInput { stage: usize },
    ConfirmationMismatch { stage: usize },
    Cancelled { stage: usize },
}

impl DenyReason {
    pub fn describe(&self, language: Language) -> String {
        match (self, language) {
            (DenyReason::MalformedRequest, Language::En) => {
                "malformed request, no action id given".to_string()
            }
            (DenyReason::MalformedRequest, Language::Ar) => {
                "طلب غير صالح، لم يتم تحديد الإجراء".to_string()
            }
            (DenyReason::Declined { stage }, Language::En) => {
                format!("declined at confirmation step {stage}")
            }
            (DenyReason::Declined { stage }, Language::Ar) => {
                format!("تم الرفض في خطوة التأكيد {stage}")
            }
            (DenyReason::EmptyInput { stage }, Language::En) => {
                format!("empty input at confirmation step {stage}")
            }
            (DenyReason::EmptyInput { stage }, Language::Ar) => {
                format!("إدخال فارغ في خطوة التأكيد {stage}")
            }
            (DenyReason::ConfirmationMismatch { stage }, Language::En) => {
                format!("mismatched confirmation input at step {stage}")
            }
            (DenyReason::ConfirmationMismatch { stage }, Language::Ar) => {
                format!("نص التأكيد غير مطابق في الخطوة {stage}")
            }
            (DenyReason::Cancelled { stage }, Language::En) => {
                format!("cancelled at confirmation step {stage}")
            }
            (DenyReason::Cancelled { stage }, Language::Ar) => {
                format!("تم الإلغاء في خطوة التأكيد {stage}")
            }
        }
    }
}

/// The binary outcome returned to the caller. Denial is a normal value, not a
/// fault; the caller decides whether to log it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentDecision {
    pub granted: bool,
    pub tier: RiskTier,
    pub action_id: String,
    pub reason: Option<DenyReason>,
    pub decided_at_ms: u64,
}

impl ConsentDecision {
    pub fn granted(action_id: &str, tier: RiskTier) -> Self {
        Self {
            granted: true,
            tier,
            action_id: action_id.to_string(),
            reason: None,
            decided_at_ms: now_unix_ms(),
        }
    }

    pub fn denied(action_id: &str, tier: RiskTier, reason: DenyReason) -> Self {
        Self {
            granted: false,
            tier,
            action_id: action_id.to_string(),
            reason: Some(reason),
            decided_at_ms: now_unix_ms(),
        }
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn reversibility_line(reversible: bool, language: Language) -> &'static str {
    match (reversible, language) {
        (true, Language::En) => "This action is reversible.",
        (true, Language::Ar) => "يمكن التراجع عن هذا الإجراء.",
        (false, Language::En) => "This action cannot be undone.",
        (false, Language::Ar) => "لا يمكن التراجع عن هذا الإجراء.",
    }
}

fn continue_question(language: Language) -> &'static str {
    match language {
        Language::En => "Do you want to continue?",
        Language::Ar => "هل تريد المتابعة؟",
    }
}

fn full_warning(request: &ConsentRequest) -> String {
    format!(
        "{} {} {}",
        request.rendered_description,
        reversibility_line(request.reversible, request.language),
        continue_question(request.language),
    )
}

/// Outcome of one yes/no exchange, before it is mapped to a decision.
enum StageOutcome {
    Yes,
    No,
    Empty,
    Cancel,
}

fn ask_yes_no(
    session: &mut dyn PromptSession,
    prompt: &StagePrompt,
    language: Language,
) -> StageOutcome {
    match session.ask(prompt) {
        PromptAnswer::Cancel => StageOutcome::Cancel,
        PromptAnswer::Text(raw) => {
            let answer = raw.trim().to_lowercase();
            if answer.is_empty() {
                StageOutcome::Empty
            } else if language.cancel_tokens().contains(&answer.as_str()) {
                StageOutcome::Cancel
            } else if language.yes_tokens().contains(&answer.as_str()) {
                StageOutcome::Yes
            } else {
                StageOutcome::No
            }
        }
    }
}

/// Run the confirmation sequence for the request's tier. Strictly sequential:
/// every stage blocks on the session, failure at any stage short-circuits the
/// rest, and no stage is ever skipped within a tier.
pub fn run_flow(request: &ConsentRequest, session: &mut dyn PromptSession) -> ConsentDecision {
    let action_id = request.action_id.as_str();
    let tier = request.tier;
    let total = tier.prompt_stages();

    match tier {
        RiskTier::Safe => ConsentDecision::granted(action_id, tier),

        RiskTier::Low => {
            let prompt = StagePrompt {
                stage: 1,
                total_stages: total,
                kind: StageKind::YesNo,
                text: format!(
                    "{} {}",
                    request.rendered_description,
                    continue_question(request.language)
                ),
                expected_token: None,
            };
            match ask_yes_no(session, &prompt, request.language) {
                StageOutcome::Yes => ConsentDecision::granted(action_id, tier),
                StageOutcome::No => {
                    ConsentDecision::denied(action_id, tier, DenyReason::Declined { stage: 1 })
                }
                StageOutcome::Empty => {
                    ConsentDecision::denied(action_id, tier, DenyReason::EmptyInput { stage: 1 })
                }
                StageOutcome::Cancel => {
                    ConsentDecision::denied(action_id, tier, DenyReason::Cancelled { stage: 1 })
                }
            }
        }

        RiskTier::Medium => {
            let prompt = StagePrompt {
                stage: 1,
                total_stages: total,
                kind: StageKind::Warning,
                text: full_warning(request),
                expected_token: None,
            };
            match ask_yes_no(session, &prompt, request.language) {
                StageOutcome::Yes => ConsentDecision::granted(action_id, tier),
                StageOutcome::No => {
                    ConsentDecision::denied(action_id, tier, DenyReason::Declined { stage: 1 })
                }
                StageOutcome::Empty => {
                    ConsentDecision::denied(action_id, tier, DenyReason::EmptyInput { stage: 1 })
                }
                StageOutcome::Cancel => {
                    ConsentDecision::denied(action_id, tier, DenyReason::Cancelled { stage: 1 })
                }
            }
        }

        RiskTier::High => {
            let ack = StagePrompt {
                stage: 1,
                total_stages: total,
                kind: StageKind::Warning,
                text: full_warning(request),
                expected_token: None,
            };
            match ask_yes_no(session, &ack, request.language) {
                StageOutcome::Yes => {}
                StageOutcome::No => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::Declined { stage: 1 },
                    );
                }
                StageOutcome::Empty => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::EmptyInput { stage: 1 },
                    );
                }
                StageOutcome::Cancel => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::Cancelled { stage: 1 },
                    );
                }
            }

            let typed_text = match request.language {
                Language::En => format!("Type '{action_id}' or 'yes' to confirm."),
                Language::Ar => format!("اكتب '{action_id}' أو 'yes' للتأكيد."),
            };
            let typed = StagePrompt {
                stage: 2,
                total_stages: total,
                kind: StageKind::TypedConfirmation,
                text: typed_text,
                expected_token: Some(action_id.to_string()),
            };

            for _ in 0..TYPED_STAGE_ATTEMPTS {
                match session.ask(&typed) {
                    PromptAnswer::Cancel => {
                        return ConsentDecision::denied(
                            action_id,
                            tier,
                            DenyReason::Cancelled { stage: 2 },
                        );
                    }
                    PromptAnswer::Text(raw) => {
                        let answer = raw.trim();
                        if request
                            .language
                            .cancel_tokens()
                            .contains(&answer.to_lowercase().as_str())
                        {
                            return ConsentDecision::denied(
                                action_id,
                                tier,
                                DenyReason::Cancelled { stage: 2 },
                            );
                        }
                        if answer == action_id || answer.eq_ignore_ascii_case("yes") {
                            return ConsentDecision::granted(action_id, tier);
                        }
                    }
                }
            }

            ConsentDecision::denied(
                action_id,
                tier,
                DenyReason::ConfirmationMismatch { stage: 2 },
            )
        }

        RiskTier::Critical => {
            let ack = StagePrompt {
                stage: 1,
                total_stages: total,
                kind: StageKind::Warning,
                text: full_warning(request),
                expected_token: None,
            };
            match ask_yes_no(session, &ack, request.language) {
                StageOutcome::Yes => {}
                StageOutcome::No => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::Declined { stage: 1 },
                    );
                }
                StageOutcome::Empty => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::EmptyInput { stage: 1 },
                    );
                }
                StageOutcome::Cancel => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::Cancelled { stage: 1 },
                    );
                }
            }

            let sure_text = match request.language {
                Language::En => "This is a critical action. Are you absolutely sure?",
                Language::Ar => "هذا إجراء حرج. هل أنت متأكد تماماً؟",
            };
            let sure = StagePrompt {
                stage: 2,
                total_stages: total,
                kind: StageKind::YesNo,
                text: sure_text.to_string(),
                expected_token: None,
            };
            match ask_yes_no(session, &sure, request.language) {
                StageOutcome::Yes => {}
                StageOutcome::No => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::Declined { stage: 2 },
                    );
                }
                StageOutcome::Empty => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::EmptyInput { stage: 2 },
                    );
                }
                StageOutcome::Cancel => {
                    return ConsentDecision::denied(
                        action_id,
                        tier,
                        DenyReason::Cancelled { stage: 2 },
                    );
                }
            }

            let typed_text = match request.language {
                Language::En => format!("Re-type the action id '{action_id}' verbatim to confirm."),
                Language::Ar => format!("أعد كتابة معرف الإجراء '{action_id}' حرفياً للتأكيد."),
            };
            let typed = StagePrompt {
                stage: 3,
                total_stages: total,
                kind: StageKind::TypedConfirmation,
                text: typed_text,
                expected_token: Some(action_id.to_string()),
            };
            match session.ask(&typed) {
                PromptAnswer::Cancel => {
                    ConsentDecision::denied(action_id, tier, DenyReason::Cancelled { stage: 3 })
                }
                PromptAnswer::Text(raw) => {
                    let answer = raw.trim();
                    if request
                        .language
                        .cancel_tokens()
                        .contains(&answer.to_lowercase().as_str())
                    {
                        ConsentDecision::denied(action_id, tier, DenyReason::Cancelled { stage: 3 })
                    } else if answer == action_id {
                        ConsentDecision::granted(action_id, tier)
                    } else {
                        ConsentDecision::denied(
                            action_id,
                            tier,
                            DenyReason::ConfirmationMismatch { stage: 3 },
                        )
                    }
                }
            }
        }
    }
}

/// Test double feeding canned answers to the flow and recording every prompt
/// it was shown. Also used by downstream crates to test their consent wiring.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    answers: std::collections::VecDeque<PromptAnswer>,
    pub prompts: Vec<StagePrompt>,
}

impl ScriptedSession {
    pub fn new(answers: Vec<PromptAnswer>) -> Self {
        Self {
            answers: answers.into(),
            prompts: Vec::new(),
        }
    }

    pub fn answering(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| PromptAnswer::Text(t.to_string()))
                .collect(),
        )
    }

    pub fn prompts_shown(&self) -> usize {
        self.prompts.len()
    }
}

impl PromptSession for ScriptedSession {
    fn ask(&mut self, prompt: &StagePrompt) -> PromptAnswer {
        self.prompts.push(prompt.clone());
        // Running out of scripted answers reads as the user walking away.
        self.answers.pop_front().unwrap_or(PromptAnswer::Cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tier: RiskTier, language: Language) -> ConsentRequest {
        ConsentRequest {
            action_id: "github.delete_repo".to_string(),
            tier,
            rendered_description: "This will permanently delete the repository acme/demo."
                .to_string(),
            reversible: false,
            language,
            context_params: BTreeMap::new(),
        }
    }

    #[test]
    fn safe_grants_without_any_prompt() {
        for language in [Language::Ar, Language::En] {
            let mut session = ScriptedSession::answering(&[]);
            let decision = run_flow(&request(RiskTier::Safe, language), &mut session);
            assert!(decision.granted);
            assert_eq!(session.prompts_shown(), 0);
        }
    }

    #[test]
    fn low_grants_on_yes() {
        let mut session = ScriptedSession::answering(&["y"]);
        let decision = run_flow(&request(RiskTier::Low, Language::En), &mut session);
        assert!(decision.granted);
        assert_eq!(session.prompts_shown(), 1);
        assert_eq!(session.prompts[0].kind, StageKind::YesNo);
    }

    #[test]
    fn low_denies_on_empty_input() {
        let mut session = ScriptedSession::answering(&[""]);
        let decision = run_flow(&request(RiskTier::Low, Language::En), &mut session);
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenyReason::EmptyInput { stage: 1 }));
    }

    #[test]
    fn low_accepts_arabic_yes_token() {
        let mut session = ScriptedSession::answering(&["نعم"]);
        let decision = run_flow(&request(RiskTier::Low, Language::Ar), &mut session);
        assert!(decision.granted);
    }

    #[test]
    fn medium_warning_states_reversibility() {
        let mut session = ScriptedSession::answering(&["yes"]);
        let decision = run_flow(&request(RiskTier::Medium, Language::En), &mut session);
        assert!(decision.granted);
        assert_eq!(session.prompts[0].kind, StageKind::Warning);
        assert!(session.prompts[0].text.contains("cannot be undone"));
    }

    #[test]
    fn medium_denies_on_no() {
        let mut session = ScriptedSession::answering(&["n"]);
        let decision = run_flow(&request(RiskTier::Medium, Language::En), &mut session);
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenyReason::Declined { stage: 1 }));
    }

    #[test]
    fn high_grants_on_ack_then_action_name() {
        let mut session = ScriptedSession::answering(&["yes", "github.delete_repo"]);
        let decision = run_flow(&request(RiskTier::High, Language::En), &mut session);
        assert!(decision.granted);
        assert_eq!(session.prompts_shown(), 2);
        assert_eq!(session.prompts[1].kind, StageKind::TypedConfirmation);
    }

    #[test]
    fn high_grants_on_literal_yes_token_at_typed_stage() {
        let mut session = ScriptedSession::answering(&["yes", "yes"]);
        let decision = run_flow(&request(RiskTier::High, Language::En), &mut session);
        assert!(decision.granted);
    }

    #[test]
    fn high_denies_after_exhausting_typed_attempts() {
        let mut session = ScriptedSession::answering(&["yes", "wrong", "nope", "still wrong"]);
        let decision = run_flow(&request(RiskTier::High, Language::En), &mut session);
        assert!(!decision.granted);
        assert_eq!(
            decision.reason,
            Some(DenyReason::ConfirmationMismatch { stage: 2 })
        );
        // ack + three typed attempts
        assert_eq!(session.prompts_shown(), 4);
    }

    #[test]
    fn high_mismatch_then_correct_retry_grants() {
        let mut session = ScriptedSession::answering(&["yes", "typo", "github.delete_repo"]);
        let decision = run_flow(&request(RiskTier::High, Language::En), &mut session);
        assert!(decision.granted);
    }

    #[test]
    fn high_denial_at_ack_skips_typed_stage() {
        let mut session = ScriptedSession::answering(&["no", "github.delete_repo"]);
        let decision = run_flow(&request(RiskTier::High, Language::En), &mut session);
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenyReason::Declined { stage: 1 }));
        assert_eq!(session.prompts_shown(), 1);
    }

    #[test]
    fn critical_requires_exactly_three_confirmations() {
        let mut session = ScriptedSession::answering(&["yes", "yes", "github.delete_repo"]);
        let decision = run_flow(&request(RiskTier::Critical, Language::En), &mut session);
        assert!(decision.granted);
        assert_eq!(session.prompts_shown(), 3);
    }

    #[test]
    fn critical_final_stage_rejects_literal_yes() {
        let mut session = ScriptedSession::answering(&["yes", "yes", "yes"]);
        let decision = run_flow(&request(RiskTier::Critical, Language::En), &mut session);
        assert!(!decision.granted);
        assert_eq!(
            decision.reason,
            Some(DenyReason::ConfirmationMismatch { stage: 3 })
        );
    }

    #[test]
    fn critical_failure_short_circuits_remaining_stages() {
        let mut session = ScriptedSession::answering(&["yes", "no", "github.delete_repo"]);
        let decision = run_flow(&request(RiskTier::Critical, Language::En), &mut session);
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenyReason::Declined { stage: 2 }));
        assert_eq!(session.prompts_shown(), 2);
    }

    #[test]
    fn critical_short_circuit_is_idempotent() {
        for _ in 0..2 {
            let mut session = ScriptedSession::answering(&["no"]);
            let decision = run_flow(&request(RiskTier::Critical, Language::En), &mut session);
            assert!(!decision.granted);
            assert_eq!(decision.reason, Some(DenyReason::Declined { stage: 1 }));
            assert_eq!(session.prompts_shown(), 1);
        }
    }

    #[test]
    fn cancel_denies_terminally_at_any_stage() {
        let mut session = ScriptedSession::new(vec![
            PromptAnswer::Text("yes".to_string()),
            PromptAnswer::Cancel,
        ]);
        let decision = run_flow(&request(RiskTier::Critical, Language::En), &mut session);
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenyReason::Cancelled { stage: 2 }));
        assert_eq!(session.prompts_shown(), 2);
    }

    #[test]
    fn cancel_token_text_counts_as_cancel() {
        let mut session = ScriptedSession::answering(&["إلغاء"]);
        let decision = run_flow(&request(RiskTier::Low, Language::Ar), &mut session);
        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenyReason::Cancelled { stage: 1 }));
    }

    #[test]
    fn deny_reasons_describe_in_both_languages() {
        let reason = DenyReason::ConfirmationMismatch { stage: 2 };
        assert!(reason.describe(Language::En).contains("mismatched"));
        assert!(!reason.describe(Language::Ar).is_empty());
    }

    #[test]
    fn arabic_warning_renders_in_arabic() {
        let mut req = request(RiskTier::Medium, Language::Ar);
        req.rendered_description = "سيحذف هذا الإجراء المستودع بشكل دائم.".to_string();
        let mut session = ScriptedSession::answering(&["نعم"]);
        let decision = run_flow(&req, &mut session);
        assert!(decision.granted);
        assert!(session.prompts[0].text.contains("لا يمكن التراجع"));
    }
}
