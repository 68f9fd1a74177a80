//! Microsoft Graph gateway
//!
//! App-only access via the client-credentials grant. The token is reused
//! until shortly before it expires; there is no refresh token and nothing is
//! persisted.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::{validate_folder_name, Gateway, DEFAULT_AUTHORITY, DEFAULT_GRAPH_BASE};
use crate::error::{Result, SharePointError};
use crate::types::{
    ContainerReference, DriveItem, DriveItemReference, ListMeta, Site, SiteReference,
    TenantContext,
};

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens are renewed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Graph endpoint configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub base_url: String,
    pub authority: String,
    pub timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE.to_string(),
            authority: DEFAULT_AUTHORITY.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Gateway speaking to Microsoft Graph over HTTPS
pub struct GraphGateway {
    client: reqwest::Client,
    config: GraphConfig,
    context: TenantContext,
    token: RwLock<Option<CachedToken>>,
    /// Serializes token requests; never taken while a valid token is cached
    refresh: Mutex<()>,
}

impl GraphGateway {
    pub fn new(context: TenantContext, config: GraphConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SharePointError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            context,
            token: RwLock::new(None),
            refresh: Mutex::new(()),
        })
    }

    fn cached_token(&self) -> Option<String> {
        self.token
            .read()
            .as_ref()
            .filter(|token| token.expires_at > Instant::now() + EXPIRY_MARGIN)
            .map(|token| token.access_token.clone())
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;
        // Another caller may have refreshed while we waited
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let url = endpoint(
            &self.config.authority,
            &[self.context.tenant_id().as_str(), "oauth2", "v2.0", "token"],
        )?;
        let response = self
            .client
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.context.client_id().as_str()),
                ("client_secret", self.context.client_secret()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(SharePointError::Unauthorized(format!(
                "token request rejected: {}",
                body
            )));
        }
        if !status.is_success() {
            return Err(SharePointError::Unavailable(format!(
                "token endpoint returned HTTP {}",
                status
            )));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = token.expires_in, "acquired Graph access token");
        *self.token.write() = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    /// `drives/{drive}/root` or `drives/{drive}/items/{item}`, followed by `tail`
    fn drive_url(&self, container: &ContainerReference, tail: &[&str]) -> Result<Url> {
        let mut segments = vec!["drives", container.drive().drive_id().as_str()];
        match container.folder_id() {
            None => segments.push("root"),
            Some(item_id) => segments.extend(["items", item_id.as_str()]),
        }
        segments.extend_from_slice(tail);
        endpoint(&self.config.base_url, &segments)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Follow `@odata.nextLink` until the collection is exhausted
    async fn get_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let page: Page<T> = self.get_json(url).await?;
            results.extend(page.value);
            next = page
                .next_link
                .map(|link| {
                    Url::parse(&link).map_err(|e| {
                        SharePointError::Internal(format!("bad nextLink '{}': {}", link, e))
                    })
                })
                .transpose()?;
        }
        Ok(results)
    }

    /// Every item below the container, used for unfiltered searches
    async fn walk(&self, container: &ContainerReference) -> Result<Vec<DriveItem>> {
        let mut results = Vec::new();
        let mut pending = VecDeque::from([container.clone()]);
        while let Some(next) = pending.pop_front() {
            for item in self.list_children(&next).await? {
                if item.is_folder() {
                    pending.push_back(next.drive().item(item.id.clone())?.into());
                }
                results.push(item);
            }
        }
        Ok(results)
    }
}

/// Append percent-encoded path segments to a base URL
fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| SharePointError::Config(format!("invalid URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| SharePointError::Config(format!("URL '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%status, "Graph request failed");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SharePointError::Unauthorized(body),
        StatusCode::NOT_FOUND => SharePointError::NotFound(body),
        StatusCode::CONFLICT => SharePointError::AlreadyExists(body),
        StatusCode::BAD_REQUEST => SharePointError::BadRequest(body),
        StatusCode::TOO_MANY_REQUESTS => SharePointError::Unavailable(format!("throttled: {}", body)),
        s if s.is_server_error() => SharePointError::Unavailable(format!("HTTP {}: {}", s, body)),
        s => SharePointError::Internal(format!("HTTP {}: {}", s, body)),
    })
}

/// Quote a search term for the `search(q='...')` function
fn escape_query(query: &str) -> String {
    query.trim().replace('\'', "''")
}

#[async_trait]
impl Gateway for GraphGateway {
    async fn list_children(&self, container: &ContainerReference) -> Result<Vec<DriveItem>> {
        self.get_all(self.drive_url(container, &["children"])?)
            .await
    }

    async fn get_item(&self, item: &DriveItemReference) -> Result<DriveItem> {
        let url = endpoint(
            &self.config.base_url,
            &[
                "drives",
                item.drive().drive_id().as_str(),
                "items",
                item.item_id().as_str(),
            ],
        )?;
        self.get_json(url).await
    }

    async fn list_sites(&self, _context: &TenantContext) -> Result<Vec<Site>> {
        let mut url = endpoint(&self.config.base_url, &["sites"])?;
        url.query_pairs_mut().append_pair("search", "*");
        self.get_all(url).await
    }

    async fn list_lists(&self, site: &SiteReference) -> Result<Vec<ListMeta>> {
        let url = endpoint(
            &self.config.base_url,
            &["sites", site.site_id().as_str(), "lists"],
        )?;
        self.get_all(url).await
    }

    async fn search(
        &self,
        container: &ContainerReference,
        query: &str,
    ) -> Result<Vec<DriveItem>> {
        if super::is_unfiltered(query) {
            return self.walk(container).await;
        }
        let function = format!("search(q='{}')", escape_query(query));
        self.get_all(self.drive_url(container, &[function.as_str()])?)
            .await
    }

    async fn create_folder(
        &self,
        container: &ContainerReference,
        name: &str,
    ) -> Result<DriveItem> {
        let name = validate_folder_name(name)?;
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.drive_url(container, &["children"])?)
            .bearer_auth(token)
            .json(&json!({
                "name": name,
                "folder": {},
                "@microsoft.graph.conflictBehavior": "fail"
            }))
            .send()
            .await?;

        match check_status(response).await {
            Ok(response) => Ok(response.json().await?),
            Err(SharePointError::BadRequest(body)) => Err(SharePointError::InvalidName(
                format!("'{}' rejected by Graph: {}", name, body),
            )),
            Err(SharePointError::AlreadyExists(_)) => Err(SharePointError::AlreadyExists(
                format!("an item named '{}' already exists in this folder", name),
            )),
            Err(e) => Err(e),
        }
    }
}
