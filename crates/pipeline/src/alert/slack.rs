//! Slack incoming webhook 알림 채널
//!
//! webhook URL이 없으면 아무것도 하지 않습니다.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use netsentry_core::config::AlertsConfig;
use netsentry_core::error::AlertError;
use netsentry_core::event::display_ip;
use netsentry_core::pipeline::{AlertChannel, BoxFuture};
use netsentry_core::types::Alert;

const CHANNEL: &str = "slack";

/// JSON을 POST하는 HTTP capability
pub trait WebhookClient: Send + Sync {
    /// `body`를 `url`로 POST합니다. 2xx가 아니면 에러입니다.
    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> BoxFuture<'a, Result<(), AlertError>>;
}

/// Slack 메시지 본문을 만듭니다.
pub fn slack_payload(alert: &Alert) -> Value {
    let event = &alert.event;
    let text = format!(
        "*{}*\nSeverity: `{}`\nSource: `{}` → `{}`\nProtocol: `{}`\n",
        alert.title,
        alert.severity,
        display_ip(event.source_ip),
        display_ip(event.destination_ip),
        event.protocol.as_deref().unwrap_or("unknown"),
    );
    json!({
        "text": alert.subject(),
        "blocks": [
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": text }
            }
        ]
    })
}

/// Slack 알림 채널
#[derive(Clone)]
pub struct SlackChannel {
    webhook_url: Option<String>,
    client: Arc<dyn WebhookClient>,
}

impl SlackChannel {
    /// 설정과 HTTP capability로 채널을 생성합니다.
    pub fn new(config: &AlertsConfig, client: Arc<dyn WebhookClient>) -> Self {
        Self {
            webhook_url: config.slack_webhook_url().map(str::to_owned),
            client,
        }
    }

    /// 설정으로 reqwest 클라이언트를 만들어 채널을 생성합니다.
    #[cfg(feature = "slack")]
    pub fn from_config(config: &AlertsConfig) -> Result<Self, AlertError> {
        Ok(Self::new(config, Arc::new(ReqwestWebhookClient::new()?)))
    }
}

impl AlertChannel for SlackChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let Some(url) = &self.webhook_url else {
            debug!(channel = CHANNEL, "webhook url not configured, skipping");
            return Ok(());
        };
        let payload = slack_payload(alert);
        self.client.post_json(url, &payload).await
    }
}

// ─── reqwest ─────────────────────────────────────────────────────────

#[cfg(feature = "slack")]
pub use reqwest_client::ReqwestWebhookClient;

#[cfg(feature = "slack")]
mod reqwest_client {
    use std::time::Duration;

    use serde_json::Value;

    use netsentry_core::error::AlertError;
    use netsentry_core::pipeline::BoxFuture;

    use super::{CHANNEL, WebhookClient};

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// reqwest 기반 webhook 클라이언트 (요청 타임아웃 5초)
    #[derive(Debug, Clone)]
    pub struct ReqwestWebhookClient {
        client: reqwest::Client,
    }

    impl ReqwestWebhookClient {
        /// 클라이언트를 생성합니다.
        pub fn new() -> Result<Self, AlertError> {
            let client = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| AlertError::InvalidMessage {
                    channel: CHANNEL.to_owned(),
                    reason: e.to_string(),
                })?;
            Ok(Self { client })
        }
    }

    fn delivery(e: reqwest::Error) -> AlertError {
        AlertError::Delivery {
            channel: CHANNEL.to_owned(),
            reason: e.to_string(),
        }
    }

    impl WebhookClient for ReqwestWebhookClient {
        fn post_json<'a>(
            &'a self,
            url: &'a str,
            body: &'a Value,
        ) -> BoxFuture<'a, Result<(), AlertError>> {
            Box::pin(async move {
                self.client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(delivery)?
                    .error_for_status()
                    .map_err(delivery)?;
                Ok(())
            })
        }
    }
}
