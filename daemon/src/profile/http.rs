//! Profile updater that forwards text to a chat-client bridge over HTTP
//!
//! The bridge owns the chat session and accepts `POST {"about": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{ProfileError, ProfileUpdater};

#[derive(Debug, Serialize)]
struct AboutRequest<'a> {
    about: &'a str,
}

/// HTTP-backed [`ProfileUpdater`]
#[derive(Debug, Clone)]
pub struct HttpProfileUpdater {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpProfileUpdater {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProfileError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProfileUpdater for HttpProfileUpdater {
    async fn set_about(&self, text: &str) -> Result<(), ProfileError> {
        debug!(endpoint = %self.endpoint, len = text.chars().count(), "sending profile text");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AboutRequest { about: text })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProfileError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
