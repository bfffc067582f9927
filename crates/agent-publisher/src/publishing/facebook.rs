//! Graph API integration: page posting and the OAuth page-connection flow.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::domain::{ExternalPostId, FacebookPageId};
use crate::config::FacebookConfig;

const PAGE_SCOPES: &str = "pages_show_list,pages_manage_posts,pages_read_engagement";

/// One post to a single Facebook page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePost {
    pub page_id: FacebookPageId,
    pub access_token: String,
    pub message: String,
    pub image_url: Option<String>,
}

/// Page returned by `/me/accounts` after the OAuth exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManagedPage {
    pub id: String,
    pub name: String,
    pub access_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FacebookError {
    #[error("facebook integration is not configured: {0} missing")]
    NotConfigured(&'static str),
    #[error("graph api request failed: {0}")]
    Transport(String),
    #[error("graph api returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("graph api response did not include {0}")]
    MissingField(&'static str),
}

impl From<reqwest::Error> for FacebookError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Outbound boundary to Facebook so the publishing service can be exercised
/// without network access.
#[async_trait]
pub trait FacebookGateway: Send + Sync {
    /// Single best-effort post; callers do not retry.
    async fn publish_post(&self, post: &PagePost) -> Result<ExternalPostId, FacebookError>;

    /// Login dialog URL the agent is redirected to; `state` round-trips to the callback.
    fn authorization_url(&self, state: &str) -> Result<String, FacebookError>;

    /// Trades an authorization code for the pages the user manages.
    async fn exchange_code(&self, code: &str) -> Result<Vec<ManagedPage>, FacebookError>;
}

/// `reqwest`-backed Graph API client.
#[derive(Debug, Clone)]
pub struct GraphApiClient {
    http: Client,
    config: FacebookConfig,
}

impl GraphApiClient {
    pub fn new(config: FacebookConfig) -> Result<Self, FacebookError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.graph_base_url.trim_end_matches('/'),
            self.config.graph_api_version,
            path.trim_start_matches('/')
        )
    }

    fn oauth_credentials(&self) -> Result<(&str, &str, &str), FacebookError> {
        let app_id = self
            .config
            .app_id
            .as_deref()
            .ok_or(FacebookError::NotConfigured("FB_APP_ID"))?;
        let app_secret = self
            .config
            .app_secret
            .as_deref()
            .ok_or(FacebookError::NotConfigured("FB_APP_SECRET"))?;
        let redirect_uri = self
            .config
            .redirect_uri
            .as_deref()
            .ok_or(FacebookError::NotConfigured("FACEBOOK_REDIRECT_URI"))?;
        Ok((app_id, app_secret, redirect_uri))
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, FacebookError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FacebookError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl FacebookGateway for GraphApiClient {
    async fn publish_post(&self, post: &PagePost) -> Result<ExternalPostId, FacebookError> {
        let url = self.endpoint(&format!("{}/feed", post.page_id.0));
        let mut form = vec![
            ("message", post.message.as_str()),
            ("access_token", post.access_token.as_str()),
        ];
        if let Some(image) = post.image_url.as_deref() {
            form.push(("link", image));
        }

        debug!(page_id = %post.page_id.0, "posting listing to facebook page");
        let response = self.http.post(url).form(&form).send().await?;
        let body = Self::read_json(response).await.map_err(|err| {
            warn!(page_id = %post.page_id.0, error = %err, "facebook post rejected");
            err
        })?;

        body.get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(|id| ExternalPostId(id.to_string()))
            .ok_or(FacebookError::MissingField("id"))
    }

    fn authorization_url(&self, state: &str) -> Result<String, FacebookError> {
        let (app_id, _, redirect_uri) = self.oauth_credentials()?;
        let dialog = format!(
            "https://www.facebook.com/{}/dialog/oauth",
            self.config.graph_api_version
        );
        let url = Url::parse_with_params(
            &dialog,
            &[
                ("client_id", app_id),
                ("redirect_uri", redirect_uri),
                ("state", state),
                ("scope", PAGE_SCOPES),
                ("response_type", "code"),
            ],
        )
        .map_err(|err| FacebookError::Transport(err.to_string()))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<Vec<ManagedPage>, FacebookError> {
        let (app_id, app_secret, redirect_uri) = self.oauth_credentials()?;

        let response = self
            .http
            .get(self.endpoint("oauth/access_token"))
            .query(&[
                ("client_id", app_id),
                ("client_secret", app_secret),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await?;
        let token_body = Self::read_json(response).await?;
        let user_token = token_body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(FacebookError::MissingField("access_token"))?
            .to_string();

        let response = self
            .http
            .get(self.endpoint("me/accounts"))
            .query(&[
                ("access_token", user_token.as_str()),
                ("fields", "id,name,access_token"),
            ])
            .send()
            .await?;
        let accounts = Self::read_json(response).await?;
        let pages = accounts
            .get("data")
            .cloned()
            .ok_or(FacebookError::MissingField("data"))?;

        serde_json::from_value::<Vec<ManagedPage>>(pages)
            .map_err(|err| FacebookError::Transport(format!("malformed page list: {err}")))
    }
}
