// ABOUTME: resolves an action id to its effective risk tier before any prompt is shown.
// ABOUTME: unknown ids fail closed to critical; escalation rules may only raise the tier.

use std::collections::BTreeMap;

use crate::registry::ActionRegistry;
use crate::tier::RiskTier;

/// An optional context rule that raises the resolved tier by one step when it
/// matches. Rules can never lower a tier, so the registered tier is a floor.
#[derive(Debug, Clone)]
pub struct EscalationRule {
    /// Substring the action id must contain for the rule to apply.
    pub action_fragment: String,
    /// Context parameter inspected by the rule.
    pub param_key: String,
    /// Substring the parameter value must contain.
    pub value_fragment: String,
}

impl EscalationRule {
    pub fn matches(&self, action_id: &str, params: &BTreeMap<String, String>) -> bool {
        if !action_id.contains(&self.action_fragment) {
            return false;
        }
        params
            .get(&self.param_key)
            .is_some_and(|value| value.contains(&self.value_fragment))
    }
}

/// Resolve the effective tier for an action. Absent registry entries resolve
/// to `Critical` so an unregistered caller can never slip past the strictest
/// confirmation sequence.
pub fn classify(
    registry: &ActionRegistry,
    rules: &[EscalationRule],
    action_id: &str,
    params: &BTreeMap<String, String>,
) -> RiskTier {
    let base = match registry.lookup(action_id) {
        Some(descriptor) => descriptor.tier,
        None => {
            tracing::warn!(action_id, "unknown action id, failing closed to critical");
            return RiskTier::Critical;
        }
    };

    rules
        .iter()
        .filter(|rule| rule.matches(action_id, params))
        .fold(base, |tier, _| tier.escalated())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Bilingual;
    use crate::registry::RegistryBuilder;

    fn registry() -> ActionRegistry {
        let mut builder = RegistryBuilder::new();
        builder
            .register(
                "github.delete_repo",
                RiskTier::High,
                Bilingual::new("حذف", "delete"),
                false,
            )
            .unwrap();
        builder
            .register(
                "notes.create",
                RiskTier::Safe,
                Bilingual::new("إنشاء", "create"),
                true,
            )
            .unwrap();
        builder.build()
    }

    fn protected_branch_rule() -> EscalationRule {
        EscalationRule {
            action_fragment: "delete".to_string(),
            param_key: "repository".to_string(),
            value_fragment: "prod".to_string(),
        }
    }

    #[test]
    fn registered_actions_resolve_to_registered_tier() {
        let tier = classify(&registry(), &[], "github.delete_repo", &BTreeMap::new());
        assert_eq!(tier, RiskTier::High);
    }

    #[test]
    fn unregistered_actions_fail_closed_to_critical() {
        let tier = classify(
            &registry(),
            &[],
            "azure.delete_resource_group",
            &BTreeMap::new(),
        );
        assert_eq!(tier, RiskTier::Critical);
    }

    #[test]
    fn matching_rule_raises_tier_by_one_step() {
        let mut params = BTreeMap::new();
        params.insert("repository".to_string(), "acme/prod-api".to_string());
        let tier = classify(
            &registry(),
            &[protected_branch_rule()],
            "github.delete_repo",
            &params,
        );
        assert_eq!(tier, RiskTier::Critical);
    }

    #[test]
    fn non_matching_rule_leaves_tier_unchanged() {
        let mut params = BTreeMap::new();
        params.insert("repository".to_string(), "acme/scratch".to_string());
        let tier = classify(
            &registry(),
            &[protected_branch_rule()],
            "github.delete_repo",
            &params,
        );
        assert_eq!(tier, RiskTier::High);
    }

    #[test]
    fn escalation_is_monotonic_and_saturating() {
        let rules = vec![protected_branch_rule(), protected_branch_rule()];
        let mut params = BTreeMap::new();
        params.insert("repository".to_string(), "prod".to_string());

        let tier = classify(&registry(), &rules, "github.delete_repo", &params);
        assert_eq!(tier, RiskTier::Critical);
        assert!(tier >= RiskTier::High);
    }

    #[test]
    fn rules_never_lower_safe_actions_below_registered_tier() {
        let tier = classify(
            &registry(),
            &[protected_branch_rule()],
            "notes.create",
            &BTreeMap::new(),
        );
        assert_eq!(tier, RiskTier::Safe);
    }
}
