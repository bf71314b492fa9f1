// ABOUTME: narrow azure resource manager client over client-credentials oauth.
// ABOUTME: resource-group deletion is consent-gated and makes no http call on denial.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use haven_consent::{ConsentEngine, Language, PromptSession};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::AzureCredentials;
use crate::error::HavenError;
use crate::integrations::GatedOutcome;

const DEFAULT_MANAGEMENT_BASE: &str = "https://management.azure.com";
const DEFAULT_LOGIN_BASE: &str = "https://login.microsoftonline.com";
const RESOURCE_API_VERSION: &str = "2021-04-01";
const SUBSCRIPTION_API_VERSION: &str = "2020-01-01";

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureResource {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    pub display_name: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct AzureClient {
    http: Client,
    creds: AzureCredentials,
    management_base: String,
    login_base: String,
    consent: Arc<ConsentEngine>,
    token: Mutex<Option<CachedToken>>,
}

impl AzureClient {
    pub fn new(creds: AzureCredentials, consent: Arc<ConsentEngine>) -> Self {
        Self::with_base_urls(
            creds,
            consent,
            DEFAULT_MANAGEMENT_BASE.to_string(),
            DEFAULT_LOGIN_BASE.to_string(),
        )
    }

    pub fn with_base_urls(
        creds: AzureCredentials,
        consent: Arc<ConsentEngine>,
        management_base: String,
        login_base: String,
    ) -> Self {
        Self {
            http: Client::new(),
            creds,
            management_base,
            login_base,
            consent,
            token: Mutex::new(None),
        }
    }

    /// Client-credentials token, cached until shortly before expiry.
    async fn bearer_token(&self) -> Result<String, HavenError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base, self.creds.tenant_id
        );
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.creds.client_id.as_str()),
                ("client_secret", self.creds.client_secret.as_str()),
                ("scope", "https://management.azure.com/.default"),
            ])
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("Azure token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HavenError::Integration(format!(
                "Azure token error (HTTP {status}): {body}"
            )));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse Azure token response: {e}"))
        })?;
        let token = parsed.access_token.clone();
        *cached = Some(CachedToken {
            access_token: parsed.access_token,
            expires_at: Instant::now()
                + Duration::from_secs(parsed.expires_in.saturating_sub(60)),
        });
        Ok(token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<T, HavenError> {
        let token = self.bearer_token().await?;
        let url = format!("{}{path}", self.management_base);
        let response = self
            .http
            .get(&url)
            .query(&[("api-version", api_version)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("Azure request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HavenError::Integration(format!(
                "Azure API error (HTTP {status}): {body}"
            )));
        }
        response.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse Azure response: {e}"))
        })
    }

    pub async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>, HavenError> {
        let path = format!(
            "/subscriptions/{}/resourcegroups",
            self.creds.subscription_id
        );
        let parsed: ListResponse<ResourceGroup> =
            self.get_json(&path, RESOURCE_API_VERSION).await?;
        Ok(parsed.value)
    }

    pub async fn list_resources(
        &self,
        resource_group: Option<&str>,
    ) -> Result<Vec<AzureResource>, HavenError> {
        let path = match resource_group {
            Some(group) => format!(
                "/subscriptions/{}/resourceGroups/{group}/resources",
                self.creds.subscription_id
            ),
            None => format!("/subscriptions/{}/resources", self.creds.subscription_id),
        };
        let parsed: ListResponse<AzureResource> =
            self.get_json(&path, RESOURCE_API_VERSION).await?;
        Ok(parsed.value)
    }

    pub async fn create_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup, HavenError> {
        let token = self.bearer_token().await?;
        let url = format!(
            "{}/subscriptions/{}/resourcegroups/{name}",
            self.management_base, self.creds.subscription_id
        );
        let response = self
            .http
            .put(&url)
            .query(&[("api-version", RESOURCE_API_VERSION)])
            .bearer_auth(token)
            .json(&serde_json::json!({"location": location}))
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("Azure request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HavenError::Integration(format!(
                "Azure API error (HTTP {status}): {body}"
            )));
        }
        response.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse Azure response: {e}"))
        })
    }

    pub async fn subscription_info(&self) -> Result<Subscription, HavenError> {
        let path = format!("/subscriptions/{}", self.creds.subscription_id);
        self.get_json(&path, SUBSCRIPTION_API_VERSION).await
    }

    /// Delete a resource group. Consent runs first, before even the token
    /// request; on denial nothing leaves the process.
    pub async fn delete_resource_group(
        &self,
        name: &str,
        language: Language,
        session: &mut dyn PromptSession,
    ) -> Result<GatedOutcome, HavenError> {
        let mut params = BTreeMap::new();
        params.insert("resource".to_string(), name.to_string());

        let decision =
            self.consent
                .request_consent("azure.delete_resource", &params, language, session);
        if !decision.granted {
            return Ok(GatedOutcome::Denied(decision));
        }

        let token = self.bearer_token().await?;
        let url = format!(
            "{}/subscriptions/{}/resourcegroups/{name}",
            self.management_base, self.creds.subscription_id
        );
        let response = self
            .http
            .delete(&url)
            .query(&[("api-version", RESOURCE_API_VERSION)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("Azure request failed: {e}")))?;

        let status = response.status();
        // Deletion is async on the ARM side: 202 means accepted.
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HavenError::Integration(format!(
                "Azure API error (HTTP {status}): {body}"
            )));
        }
        Ok(GatedOutcome::Executed(decision))
    }
}
