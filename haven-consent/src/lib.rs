// ABOUTME: implements the risk-tiered consent workflow that gates dangerous actions.
// ABOUTME: exposes an action registry, a fail-closed classifier, and a staged confirmation flow.

pub mod classify;
pub mod engine;
pub mod error;
pub mod flow;
pub mod language;
pub mod registry;
pub mod tier;

pub use classify::EscalationRule;
pub use engine::ConsentEngine;
pub use error::ConsentError;
pub use flow::{
    ConsentDecision, ConsentRequest, DenyReason, PromptAnswer, PromptSession, ScriptedSession,
    StageKind, StagePrompt,
};
pub use language::{Bilingual, Language};
pub use registry::{builtin_catalog, ActionDescriptor, ActionRegistry, RegistryBuilder};
pub use tier::RiskTier;
