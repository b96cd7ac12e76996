//! Microsoft Graph implementation of the directory client.
//!
//! Authenticates with a client-credential grant against the tenant's
//! token endpoint and talks to the Graph REST API with a bearer token.
//! The token is cached until shortly before expiry.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{DirectoryClient, DirectoryError};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Refresh the token this long before the server-reported expiry.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct GraphDirectory {
    http: reqwest::Client,
    config: GraphConfig,
    token: Mutex<Option<CachedToken>>,
}

impl GraphDirectory {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token: Mutex::new(None),
        }
    }

    async fn token(&self) -> Result<String, DirectoryError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        tracing::info!("acquiring graph access token");
        let url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.config.tenant_id
        );
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(DirectoryError::Rejected(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }
        let body: TokenResponse = resp.json().await?;

        let expires_at = Instant::now()
            + Duration::from_secs(body.expires_in).saturating_sub(TOKEN_SLACK);
        *guard = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at,
        });
        Ok(body.access_token)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, DirectoryError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(DirectoryError::Rejected(format!(
            "{what} returned {status}: {body}"
        )))
    }

    /// Graph object id for a user, addressed by principal name.
    async fn user_object_id(&self, username: &str) -> Result<String, DirectoryError> {
        let token = self.token().await?;
        let resp = self
            .http
            .get(format!("{GRAPH_BASE}/users/{username}?$select=id"))
            .bearer_auth(&token)
            .send()
            .await?;
        let resp = Self::check(resp, "user lookup").await?;

        #[derive(Deserialize)]
        struct UserResponse {
            id: String,
        }
        Ok(resp.json::<UserResponse>().await?.id)
    }

    /// Graph object id for a group, addressed by display name.
    async fn group_object_id(&self, group: &str) -> Result<String, DirectoryError> {
        let token = self.token().await?;
        let filter = format!("displayName eq '{}'", group.replace('\'', "''"));
        let resp = self
            .http
            .get(format!("{GRAPH_BASE}/groups"))
            .query(&[("$filter", filter.as_str()), ("$select", "id")])
            .bearer_auth(&token)
            .send()
            .await?;
        let resp = Self::check(resp, "group lookup").await?;

        #[derive(Deserialize)]
        struct GroupList {
            value: Vec<GroupEntry>,
        }
        #[derive(Deserialize)]
        struct GroupEntry {
            id: String,
        }
        let list: GroupList = resp.json().await?;
        list.value
            .into_iter()
            .next()
            .map(|g| g.id)
            .ok_or_else(|| DirectoryError::Rejected(format!("no such group '{group}'")))
    }
}

#[async_trait]
impl DirectoryClient for GraphDirectory {
    async fn set_enabled(&self, username: &str, enabled: bool) -> Result<(), DirectoryError> {
        let token = self.token().await?;
        let resp = self
            .http
            .patch(format!("{GRAPH_BASE}/users/{username}"))
            .bearer_auth(&token)
            .json(&serde_json::json!({"accountEnabled": enabled}))
            .send()
            .await?;
        Self::check(resp, "account update").await?;
        Ok(())
    }

    async fn groups(&self, username: &str) -> Result<Vec<String>, DirectoryError> {
        let token = self.token().await?;
        let resp = self
            .http
            .get(format!("{GRAPH_BASE}/users/{username}/memberOf"))
            .query(&[("$select", "displayName")])
            .bearer_auth(&token)
            .send()
            .await?;
        let resp = Self::check(resp, "membership listing").await?;

        #[derive(Deserialize)]
        struct MemberOf {
            value: Vec<MemberEntry>,
        }
        #[derive(Deserialize)]
        struct MemberEntry {
            #[serde(rename = "displayName")]
            display_name: Option<String>,
        }
        let list: MemberOf = resp.json().await?;
        Ok(list
            .value
            .into_iter()
            .filter_map(|entry| entry.display_name)
            .collect())
    }

    async fn add_group(&self, username: &str, group: &str) -> Result<(), DirectoryError> {
        let user_id = self.user_object_id(username).await?;
        let group_id = self.group_object_id(group).await?;
        let token = self.token().await?;

        let resp = self
            .http
            .post(format!("{GRAPH_BASE}/groups/{group_id}/members/$ref"))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "@odata.id": format!("{GRAPH_BASE}/directoryObjects/{user_id}"),
            }))
            .send()
            .await?;
        Self::check(resp, "group add").await?;
        Ok(())
    }

    async fn remove_group(&self, username: &str, group: &str) -> Result<(), DirectoryError> {
        let user_id = self.user_object_id(username).await?;
        let group_id = self.group_object_id(group).await?;
        let token = self.token().await?;

        let resp = self
            .http
            .delete(format!(
                "{GRAPH_BASE}/groups/{group_id}/members/{user_id}/$ref"
            ))
            .bearer_auth(&token)
            .send()
            .await?;
        Self::check(resp, "group remove").await?;
        Ok(())
    }
}
