//! Discord webhook notification channel.
//!
//! Messages are posted with `?wait=true` so Discord returns the created
//! message, whose id becomes the notification handle. Deletion goes through
//! `DELETE {webhook}/messages/{id}`.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::channel::{ChannelError, NotificationChannel, NotificationHandle};
use crate::format::Embed;

#[derive(Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u64,
}

/// JSON error code for "Unknown Message".
const UNKNOWN_MESSAGE: u64 = 10008;

#[derive(Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    retry_after: f64,
}

pub struct DiscordWebhook {
    client: Client,
    url: String,
}

impl DiscordWebhook {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), webhook_url)
    }

    pub fn with_client(client: Client, webhook_url: impl Into<String>) -> Self {
        let url = webhook_url.into().trim_end_matches('/').to_string();
        Self { client, url }
    }
}

impl NotificationChannel for DiscordWebhook {
    fn send(&self, payload: &Embed) -> Result<NotificationHandle, ChannelError> {
        let body = serde_json::json!({ "embeds": [payload] });
        let response = self
            .client
            .post(&self.url)
            .query(&[("wait", "true")])
            .json(&body)
            .send()?;

        let response = check_status(response)?;
        let created: CreatedMessage = response
            .json()
            .map_err(|e| ChannelError::Response(e.to_string()))?;
        Ok(NotificationHandle::new(created.id))
    }

    fn delete(&self, handle: &NotificationHandle) -> Result<(), ChannelError> {
        let response = self
            .client
            .delete(format!("{}/messages/{}", self.url, handle))
            .send()?;

        // Only an unknown *message* means the retraction is done. An unknown
        // webhook (deleted, token rotated) leaves the message in place.
        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().unwrap_or_default();
            let code = serde_json::from_str::<ErrorBody>(&body).map_or(0, |b| b.code);
            if code == UNKNOWN_MESSAGE {
                debug!(handle = %handle, "message already gone");
                return Ok(());
            }
            return Err(ChannelError::Status { status: 404, body });
        }
        check_status(response)?;
        Ok(())
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .json::<RateLimitBody>()
            .map(|b| b.retry_after)
            .unwrap_or_default();
        return Err(ChannelError::RateLimited { retry_after });
    }
    let body = response.text().unwrap_or_default();
    Err(ChannelError::Status {
        status: status.as_u16(),
        body,
    })
}
