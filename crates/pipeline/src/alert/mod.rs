//! 알림 모듈 -- 채널 팬아웃
//!
//! [`AlertDispatcher`]는 등록된 채널을 순서대로 호출합니다. 한 채널의 실패는
//! 로그와 메트릭으로만 드러나며 다른 채널의 전송이나 호출자를 막지 않습니다.
//!
//! 채널은 전송 클라이언트를 주입받습니다. 실제 클라이언트는 cargo feature
//! `smtp`(lettre), `slack`(reqwest)로 활성화합니다.

pub mod email;
pub mod slack;

pub use email::{EmailChannel, EmailMessage, MailTransport};
pub use slack::{SlackChannel, WebhookClient};

#[cfg(feature = "smtp")]
pub use email::LettreMailTransport;
#[cfg(feature = "slack")]
pub use slack::ReqwestWebhookClient;

use std::time::Instant;

use tracing::{debug, info, warn};

use netsentry_core::config::AlertsConfig;
use netsentry_core::error::AlertError;
use netsentry_core::metrics::{ALERTS_DISPATCHED_TOTAL, LABEL_CHANNEL, LABEL_RESULT};
use netsentry_core::pipeline::DynAlertChannel;
use netsentry_core::types::Alert;

/// 채널 하나의 전송 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// 채널 이름
    pub channel: String,
    /// 성공 여부
    pub success: bool,
    /// 실패 사유
    pub error: Option<String>,
    /// 소요 시간 (ms)
    pub duration_ms: u64,
}

/// 알림 디스패처
#[derive(Default)]
pub struct AlertDispatcher {
    channels: Vec<Box<dyn DynAlertChannel>>,
}

impl AlertDispatcher {
    /// 채널 목록으로 디스패처를 생성합니다.
    pub fn new(channels: Vec<Box<dyn DynAlertChannel>>) -> Self {
        Self { channels }
    }

    /// 채널을 추가합니다.
    pub fn add_channel(&mut self, channel: Box<dyn DynAlertChannel>) {
        self.channels.push(channel);
    }

    /// 등록된 채널 수
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// 등록된 채널 이름
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// 모든 채널로 알림을 보냅니다. 실패한 채널이 있어도 나머지를 계속 시도합니다.
    pub async fn dispatch(&self, alert: &Alert) -> Vec<DispatchOutcome> {
        if self.channels.is_empty() {
            debug!(alert_id = %alert.id, "no alert channels configured");
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let start = Instant::now();
            let result = channel.send(alert).await;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (success, error) = match result {
                Ok(()) => {
                    info!(
                        alert_id = %alert.id,
                        channel = channel.name(),
                        duration_ms,
                        "alert delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    warn!(
                        alert_id = %alert.id,
                        channel = channel.name(),
                        error = %e,
                        duration_ms,
                        "alert delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            metrics::counter!(
                ALERTS_DISPATCHED_TOTAL,
                LABEL_CHANNEL => channel.name().to_owned(),
                LABEL_RESULT => if success { "success" } else { "failure" }
            )
            .increment(1);

            outcomes.push(DispatchOutcome {
                channel: channel.name().to_owned(),
                success,
                error,
                duration_ms,
            });
        }
        outcomes
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("channels", &self.channel_names())
            .finish()
    }
}

/// 설정과 활성화된 feature로 채널을 조립합니다.
///
/// 설정이 없는 채널은 건너뜁니다. 설정은 있지만 feature가 꺼져 있으면 경고만 남깁니다.
pub fn channels_from_config(
    config: &AlertsConfig,
) -> Result<Vec<Box<dyn DynAlertChannel>>, AlertError> {
    #[allow(unused_mut)]
    let mut channels: Vec<Box<dyn DynAlertChannel>> = Vec::new();

    if config.smtp_host().is_some() && config.smtp_from().is_some() {
        #[cfg(feature = "smtp")]
        channels.push(Box::new(EmailChannel::from_config(config)?));
        #[cfg(not(feature = "smtp"))]
        warn!("smtp alerts configured but the 'smtp' feature is disabled");
    }

    if config.slack_webhook_url().is_some() {
        #[cfg(feature = "slack")]
        channels.push(Box::new(SlackChannel::from_config(config)?));
        #[cfg(not(feature = "slack"))]
        warn!("slack alerts configured but the 'slack' feature is disabled");
    }

    Ok(channels)
}
