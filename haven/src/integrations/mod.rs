// ABOUTME: narrow rest clients for the external services haven can act on.
// ABOUTME: destructive calls go through the consent engine before any http leaves the process.

pub mod azure;
pub mod github;

pub use azure::AzureClient;
pub use github::GitHubClient;

use haven_consent::ConsentDecision;

/// Outcome of a consent-gated destructive call. Both arms carry the decision
/// so the caller can audit it; on denial no HTTP happened at all.
#[derive(Debug)]
pub enum GatedOutcome {
    Executed(ConsentDecision),
    Denied(ConsentDecision),
}

impl GatedOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, GatedOutcome::Executed(_))
    }

    pub fn decision(&self) -> &ConsentDecision {
        match self {
            GatedOutcome::Executed(decision) | GatedOutcome::Denied(decision) => decision,
        }
    }
}
