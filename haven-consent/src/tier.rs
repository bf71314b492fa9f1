// ABOUTME: defines the closed, totally ordered risk scale behind every consent decision.
// ABOUTME: the derived ordering is what lets escalation move strictly toward caution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Safe => "safe",
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }

    /// Number of confirmation prompts this tier puts in front of the user.
    pub fn prompt_stages(&self) -> usize {
        match self {
            RiskTier::Safe => 0,
            RiskTier::Low => 1,
            RiskTier::Medium => 1,
            RiskTier::High => 2,
            RiskTier::Critical => 3,
        }
    }

    pub fn requires_prompt(&self) -> bool {
        *self != RiskTier::Safe
    }

    /// One step up the scale, saturating at the strictest tier.
    pub fn escalated(&self) -> RiskTier {
        match self {
            RiskTier::Safe => RiskTier::Low,
            RiskTier::Low => RiskTier::Medium,
            RiskTier::Medium => RiskTier::High,
            RiskTier::High | RiskTier::Critical => RiskTier::Critical,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_totally_ordered() {
        assert!(RiskTier::Safe < RiskTier::Low);
        assert!(RiskTier::Low < RiskTier::Medium);
        assert!(RiskTier::Medium < RiskTier::High);
        assert!(RiskTier::High < RiskTier::Critical);
    }

    #[test]
    fn stage_counts_match_tier() {
        assert_eq!(RiskTier::Safe.prompt_stages(), 0);
        assert_eq!(RiskTier::Low.prompt_stages(), 1);
        assert_eq!(RiskTier::Medium.prompt_stages(), 1);
        assert_eq!(RiskTier::High.prompt_stages(), 2);
        assert_eq!(RiskTier::Critical.prompt_stages(), 3);
    }

    #[test]
    fn only_safe_skips_prompting() {
        assert!(!RiskTier::Safe.requires_prompt());
        assert!(RiskTier::Low.requires_prompt());
        assert!(RiskTier::Critical.requires_prompt());
    }

    #[test]
    fn escalation_saturates_at_critical() {
        assert_eq!(RiskTier::Safe.escalated(), RiskTier::Low);
        assert_eq!(RiskTier::High.escalated(), RiskTier::Critical);
        assert_eq!(RiskTier::Critical.escalated(), RiskTier::Critical);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&RiskTier::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: RiskTier = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, RiskTier::Medium);
    }
}
