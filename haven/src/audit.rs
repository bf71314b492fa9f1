// ABOUTME: appends one json line per consent decision taken by the application.
// ABOUTME: secret-bearing context values are redacted before anything touches disk.

use std::collections::BTreeMap;

use anyhow::Context;
use haven_consent::ConsentDecision;

#[derive(Debug, serde::Serialize)]
#[serde(deny_unknown_fields)]
struct AuditRecord<'a> {
    ts_unix_ms: u64,
    action_id: &'a str,
    tier: haven_consent::RiskTier,
    granted: bool,
    reason: Option<String>,
    context: BTreeMap<String, String>,
}

const SECRET_KEY_FRAGMENTS: &[&str] = &["token", "secret", "password", "key", "credential"];

fn redact_context(params: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    params
        .iter()
        .map(|(k, v)| {
            let lowered = k.to_lowercase();
            let value = if SECRET_KEY_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
                "[redacted]".to_string()
            } else {
                v.clone()
            };
            (k.clone(), value)
        })
        .collect()
}

pub async fn append_decision(
    audit_path: &str,
    decision: &ConsentDecision,
    context: &BTreeMap<String, String>,
) -> anyhow::Result<()> {
    let record = AuditRecord {
        ts_unix_ms: decision.decided_at_ms,
        action_id: &decision.action_id,
        tier: decision.tier,
        granted: decision.granted,
        reason: decision
            .reason
            .as_ref()
            .map(|r| serde_json::to_string(r))
            .transpose()?,
        context: redact_context(context),
    };

    let mut line = serde_json::to_vec(&record)?;
    line.push(b'\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_path)
        .await
        .with_context(|| format!("open audit log at {audit_path}"))?;

    use tokio::io::AsyncWriteExt;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}
