// ABOUTME: narrow github rest v3 client for repository and issue management.
// ABOUTME: repository deletion is consent-gated and makes no http call on denial.

use std::collections::BTreeMap;
use std::sync::Arc;

use haven_consent::{ConsentEngine, Language, PromptSession};
use reqwest::Client;
use serde::Deserialize;

use crate::error::HavenError;
use crate::integrations::GatedOutcome;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "haven";

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub private: bool,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
}

pub struct GitHubClient {
    http: Client,
    token: String,
    api_base: String,
    consent: Arc<ConsentEngine>,
}

impl GitHubClient {
    pub fn new(token: String, consent: Arc<ConsentEngine>) -> Self {
        Self::with_base_url(token, consent, DEFAULT_API_BASE.to_string())
    }

    pub fn with_base_url(token: String, consent: Arc<ConsentEngine>, api_base: String) -> Self {
        Self {
            http: Client::new(),
            token,
            api_base,
            consent,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_base))
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .header("user-agent", USER_AGENT)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, HavenError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(HavenError::Integration(format!(
            "GitHub API error (HTTP {status}): {body}"
        )))
    }

    pub async fn user_info(&self) -> Result<GitHubUser, HavenError> {
        let response = self
            .request(reqwest::Method::GET, "/user")
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("GitHub request failed: {e}")))?;
        Ok(Self::check(response).await?.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse GitHub response: {e}"))
        })?)
    }

    pub async fn list_repositories(&self, limit: usize) -> Result<Vec<GitHubRepo>, HavenError> {
        let response = self
            .request(reqwest::Method::GET, "/user/repos")
            .query(&[("per_page", limit.to_string())])
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("GitHub request failed: {e}")))?;
        Ok(Self::check(response).await?.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse GitHub response: {e}"))
        })?)
    }

    pub async fn get_repository(&self, full_name: &str) -> Result<GitHubRepo, HavenError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/repos/{full_name}"))
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("GitHub request failed: {e}")))?;
        Ok(Self::check(response).await?.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse GitHub response: {e}"))
        })?)
    }

    pub async fn create_repository(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> Result<GitHubRepo, HavenError> {
        let response = self
            .request(reqwest::Method::POST, "/user/repos")
            .json(&serde_json::json!({
                "name": name,
                "description": description,
                "private": private,
            }))
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("GitHub request failed: {e}")))?;
        Ok(Self::check(response).await?.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse GitHub response: {e}"))
        })?)
    }

    pub async fn create_issue(
        &self,
        full_name: &str,
        title: &str,
        body: &str,
    ) -> Result<GitHubIssue, HavenError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/repos/{full_name}/issues"))
            .json(&serde_json::json!({"title": title, "body": body}))
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("GitHub request failed: {e}")))?;
        Ok(Self::check(response).await?.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse GitHub response: {e}"))
        })?)
    }

    pub async fn list_issues(
        &self,
        full_name: &str,
        state: &str,
    ) -> Result<Vec<GitHubIssue>, HavenError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/repos/{full_name}/issues"))
            .query(&[("state", state), ("per_page", "20")])
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("GitHub request failed: {e}")))?;
        Ok(Self::check(response).await?.json().await.map_err(|e| {
            HavenError::Integration(format!("failed to parse GitHub response: {e}"))
        })?)
    }

    /// Delete a repository. Consent runs first; on denial the request never
    /// reaches the network and the decision is returned to the caller.
    pub async fn delete_repository(
        &self,
        full_name: &str,
        language: Language,
        session: &mut dyn PromptSession,
    ) -> Result<GatedOutcome, HavenError> {
        let mut params = BTreeMap::new();
        params.insert("repository".to_string(), full_name.to_string());

        let decision =
            self.consent
                .request_consent("github.delete_repo", &params, language, session);
        if !decision.granted {
            return Ok(GatedOutcome::Denied(decision));
        }

        let response = self
            .request(reqwest::Method::DELETE, &format!("/repos/{full_name}"))
            .send()
            .await
            .map_err(|e| HavenError::Integration(format!("GitHub request failed: {e}")))?;
        Self::check(response).await?;
        Ok(GatedOutcome::Executed(decision))
    }
}
