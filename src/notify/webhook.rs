//! HTTP push-gateway notifier

use async_trait::async_trait;
use std::time::Duration;

use super::{redact, Notifier, NotifierError, NotifyPayload};

/// Posts each message as JSON to a push gateway, which forwards it to the
/// device owner's destination token
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifierError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, token: &str, payload: &NotifyPayload) -> Result<(), NotifierError> {
        let body = serde_json::json!({
            "token": token,
            "title": payload.title,
            "body": payload.body,
            "data": payload.data,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifierError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifierError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, token: &str, payload: &NotifyPayload) -> bool {
        if token.is_empty() {
            tracing::warn!("No push token, skipping notification");
            return false;
        }

        match self.post(token, payload).await {
            Ok(()) => {
                tracing::debug!(
                    token = %redact(token),
                    kind = payload.data.kind.as_str(),
                    "Push notification sent"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    token = %redact(token),
                    device_id = payload.data.device_id,
                    error = %e,
                    "Push notification failed"
                );
                false
            }
        }
    }
}
