//! Reddit moderation queue source.
//!
//! Authentication is the installed-app OAuth code flow with a permanent
//! refresh token. The refresh token comes from the store's credential slot;
//! short-lived bearer tokens are derived from it on demand and cached in
//! memory only.

use std::collections::HashSet;

use chrono::{DateTime, Duration as CDur, Utc};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::auth::Authorizer;
use crate::config::RedditConfig;
use crate::error::{RelayError, Result};
use crate::source::{CommentItem, ItemContent, ItemDescriptor, PostItem, QueueSource, Report};

const PAGE_LIMIT: &str = "100";
/// Refresh the bearer token this long before Reddit says it expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// OAuth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Client credentials and token endpoint calls.
pub struct RedditOAuth {
    http: Client,
    config: RedditConfig,
}

impl RedditOAuth {
    pub fn new(config: RedditConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RelayError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RedditConfig {
        &self.config
    }

    fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = format!("{}/api/v1/access_token", self.config.auth_base);
        let response = self
            .http
            .post(url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .map_err(|e| RelayError::QueueSource(format!("token request failed: {e}")))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RelayError::QueueSource(format!(
                "token endpoint returned HTTP {status}"
            )));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(RelayError::Auth(
                "client id/secret rejected by the token endpoint".into(),
            ));
        }
        let body: TokenResponse = response
            .json()
            .map_err(|e| RelayError::QueueSource(format!("bad token response: {e}")))?;
        if let Some(err) = body.error {
            return Err(RelayError::Auth(format!("token endpoint refused grant: {err}")));
        }
        Ok(body)
    }

    fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessToken> {
        let body = self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])?;
        let token = body
            .access_token
            .ok_or_else(|| RelayError::Auth("token response without access_token".into()))?;
        Ok(AccessToken {
            token,
            expires_at: expiry_after(body.expires_in),
        })
    }
}

/// Expiry instant for a token valid `expires_in` seconds, minus the safety
/// margin. Out-of-range values count as already expired.
fn expiry_after(expires_in: i64) -> DateTime<Utc> {
    let now = Utc::now();
    CDur::try_seconds(expires_in.saturating_sub(EXPIRY_MARGIN_SECS))
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}

impl Authorizer for RedditOAuth {
    fn authorize_url(&self, state: &str) -> Result<String> {
        let base = format!("{}/api/v1/authorize", self.config.auth_base);
        let scope = self.config.scopes.join(" ");
        let url = Url::parse_with_params(
            &base,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("state", state),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("duration", "permanent"),
                ("scope", scope.as_str()),
            ],
        )
        .map_err(|e| RelayError::Config(format!("invalid reddit.auth_base: {e}")))?;
        Ok(url.to_string())
    }

    fn exchange_code(&self, code: &str) -> Result<String> {
        let body = self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])?;
        body.refresh_token.ok_or_else(|| {
            RelayError::Auth("no refresh token returned; was duration=permanent granted?".into())
        })
    }
}

// ---------------------------------------------------------------------------
// Listing model
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    after: Option<String>,
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Deserialize)]
struct Thing {
    kind: String,
    data: ThingData,
}

#[derive(Deserialize)]
struct ThingData {
    name: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    is_self: bool,
    preview: Option<Preview>,
    #[serde(default)]
    mod_reports: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    user_reports: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct Preview {
    #[serde(default)]
    images: Vec<PreviewImage>,
}

#[derive(Deserialize)]
struct PreviewImage {
    #[serde(default)]
    resolutions: Vec<PreviewSource>,
}

#[derive(Deserialize)]
struct PreviewSource {
    url: String,
}

/// Report tuples are `[reason, moderator]` or `[reason, count, ...]`.
fn parse_reports(data: &ThingData) -> Vec<Report> {
    fn text(v: Option<&serde_json::Value>) -> String {
        match v {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
    data.mod_reports
        .iter()
        .chain(data.user_reports.iter())
        .map(|r| Report {
            source: text(r.get(1)),
            reason: text(r.first()),
        })
        .collect()
}

fn to_descriptor(thing: Thing) -> Option<ItemDescriptor> {
    let reports = parse_reports(&thing.data);
    let d = thing.data;
    let content = match thing.kind.as_str() {
        "t1" => ItemContent::Comment(CommentItem {
            author: d.author,
            body: d.body,
            permalink: d.permalink,
            reports,
        }),
        "t3" => {
            let thumbnail = d
                .preview
                .and_then(|p| p.images.into_iter().next())
                .and_then(|img| img.resolutions.into_iter().next())
                .map(|src| src.url);
            ItemContent::Post(PostItem {
                id: d.id,
                author: d.author,
                title: d.title,
                domain: d.domain,
                is_self: d.is_self,
                thumbnail,
                reports,
            })
        }
        other => {
            debug!(kind = other, name = %d.name, "skipping unsupported queue entry");
            return None;
        }
    };
    Some(ItemDescriptor::new(d.name, content))
}

// ---------------------------------------------------------------------------
// RedditModQueue
// ---------------------------------------------------------------------------

pub struct RedditModQueue {
    oauth: RedditOAuth,
    refresh_token: String,
    access: Option<AccessToken>,
}

impl RedditModQueue {
    pub fn new(oauth: RedditOAuth, refresh_token: impl Into<String>) -> Self {
        Self {
            oauth,
            refresh_token: refresh_token.into(),
            access: None,
        }
    }

    fn bearer(&mut self) -> Result<String> {
        if let Some(access) = self.access.as_ref().filter(|a| a.expires_at > Utc::now()) {
            return Ok(access.token.clone());
        }
        debug!("refreshing reddit access token");
        let access = self.oauth.refresh_access_token(&self.refresh_token)?;
        let token = access.token.clone();
        self.access = Some(access);
        Ok(token)
    }

    fn fetch_page(&mut self, after: Option<&str>) -> Result<ListingData> {
        let token = self.bearer()?;
        let config = self.oauth.config();
        let url = format!(
            "{}/r/{}/about/modqueue",
            config.api_base, config.subreddit
        );
        let mut query = vec![("limit", PAGE_LIMIT), ("raw_json", "1")];
        if let Some(after) = after {
            query.push(("after", after));
        }

        let response = self
            .oauth
            .http
            .get(url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .map_err(|e| RelayError::QueueSource(format!("modqueue request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // Token revoked or expired early; refresh on the next attempt.
            self.access = None;
        }
        if !status.is_success() {
            return Err(RelayError::QueueSource(format!(
                "modqueue returned HTTP {status}"
            )));
        }
        let listing: Listing = response
            .json()
            .map_err(|e| RelayError::QueueSource(format!("bad modqueue listing: {e}")))?;
        Ok(listing.data)
    }
}

impl QueueSource for RedditModQueue {
    /// Fetch every page of the modqueue; a partial snapshot would make the
    /// engine retract items that are still queued.
    fn list_queue_items(&mut self) -> Result<Vec<ItemDescriptor>> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut after: Option<String> = None;
        loop {
            let page = self.fetch_page(after.as_deref())?;
            items.extend(page.children.into_iter().filter_map(to_descriptor));
            match page.after {
                Some(next) if !next.is_empty() => {
                    if !seen.insert(next.clone()) {
                        return Err(RelayError::QueueSource(format!(
                            "modqueue pagination repeated cursor {next}"
                        )));
                    }
                    after = Some(next);
                }
                _ => break,
            }
        }
        debug!(count = items.len(), "fetched modqueue snapshot");
        Ok(items)
    }
}
