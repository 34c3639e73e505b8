//! SMTP 이메일 알림 채널
//!
//! 호스트나 발신 주소가 없으면 아무것도 하지 않습니다. 수신 주소는 발신 주소와 같습니다.
//! 실제 SMTP 전송은 [`MailTransport`]로 주입하며, feature `smtp`에서
//! lettre 기반 [`LettreMailTransport`]를 제공합니다.

use std::sync::Arc;

use tracing::debug;

use netsentry_core::config::AlertsConfig;
use netsentry_core::error::AlertError;
use netsentry_core::event::display_ip;
use netsentry_core::pipeline::{AlertChannel, BoxFuture};
use netsentry_core::types::Alert;

const CHANNEL: &str = "email";

/// 전송할 이메일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 발신 주소
    pub from: String,
    /// 수신 주소
    pub to: String,
    /// 제목
    pub subject: String,
    /// 본문 (plain text)
    pub body: String,
}

impl EmailMessage {
    /// 알림에서 메시지를 만듭니다.
    pub fn from_alert(alert: &Alert, sender: &str) -> Self {
        let event = &alert.event;
        let body = format!(
            "Alert: {}\nSeverity: {}\nSource: {} -> {}\nProtocol: {}\n",
            alert.title,
            alert.severity,
            display_ip(event.source_ip),
            display_ip(event.destination_ip),
            event.protocol.as_deref().unwrap_or("unknown"),
        );
        Self {
            from: sender.to_owned(),
            to: sender.to_owned(),
            subject: alert.subject(),
            body,
        }
    }
}

/// SMTP 전송 capability
pub trait MailTransport: Send + Sync {
    /// 메시지를 전송합니다.
    fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, Result<(), AlertError>>;
}

/// 이메일 알림 채널
#[derive(Clone)]
pub struct EmailChannel {
    host: Option<String>,
    sender: Option<String>,
    transport: Arc<dyn MailTransport>,
}

impl EmailChannel {
    /// 설정과 전송 capability로 채널을 생성합니다.
    pub fn new(config: &AlertsConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            host: config.smtp_host().map(str::to_owned),
            sender: config.smtp_from().map(str::to_owned),
            transport,
        }
    }

    /// 설정으로 lettre 전송 클라이언트를 만들어 채널을 생성합니다.
    #[cfg(feature = "smtp")]
    pub fn from_config(config: &AlertsConfig) -> Result<Self, AlertError> {
        let transport = LettreMailTransport::from_config(config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// 호스트와 발신 주소가 모두 설정되었는지 여부
    pub fn is_configured(&self) -> bool {
        self.host.is_some() && self.sender.is_some()
    }
}

impl AlertChannel for EmailChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let (Some(host), Some(sender)) = (&self.host, &self.sender) else {
            debug!(channel = CHANNEL, "smtp host or sender not configured, skipping");
            return Ok(());
        };

        let message = EmailMessage::from_alert(alert, sender);
        self.transport.send(&message).await?;
        debug!(channel = CHANNEL, host = %host, subject = %message.subject, "email sent");
        Ok(())
    }
}

// ─── lettre ──────────────────────────────────────────────────────────

#[cfg(feature = "smtp")]
pub use lettre_transport::LettreMailTransport;

#[cfg(feature = "smtp")]
mod lettre_transport {
    use lettre::message::Mailbox;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    use netsentry_core::config::AlertsConfig;
    use netsentry_core::error::AlertError;
    use netsentry_core::pipeline::BoxFuture;

    use super::{CHANNEL, EmailMessage, MailTransport};

    /// lettre 비동기 SMTP 전송
    ///
    /// 자격 증명이 있으면 STARTTLS + 인증, 없으면 평문 연결을 사용합니다.
    #[derive(Clone)]
    pub struct LettreMailTransport {
        transport: AsyncSmtpTransport<Tokio1Executor>,
    }

    impl LettreMailTransport {
        /// 설정으로 전송 클라이언트를 생성합니다.
        pub fn from_config(config: &AlertsConfig) -> Result<Self, AlertError> {
            let host = config.smtp_host().ok_or_else(|| invalid("smtp_host is not set"))?;
            let port = config.effective_smtp_port();

            let transport = match config.smtp_credentials() {
                Some((username, password)) => {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                        .map_err(|e| invalid(&e.to_string()))?
                        .port(port)
                        .credentials(Credentials::new(username.to_owned(), password.to_owned()))
                        .build()
                }
                None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                    .port(port)
                    .build(),
            };
            Ok(Self { transport })
        }
    }

    fn invalid(reason: &str) -> AlertError {
        AlertError::InvalidMessage {
            channel: CHANNEL.to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn mailbox(address: &str) -> Result<Mailbox, AlertError> {
        address
            .parse()
            .map_err(|e: lettre::address::AddressError| invalid(&e.to_string()))
    }

    impl MailTransport for LettreMailTransport {
        fn send<'a>(
            &'a self,
            message: &'a EmailMessage,
        ) -> BoxFuture<'a, Result<(), AlertError>> {
            Box::pin(async move {
                let email = Message::builder()
                    .from(mailbox(&message.from)?)
                    .to(mailbox(&message.to)?)
                    .subject(message.subject.clone())
                    .body(message.body.clone())
                    .map_err(|e| invalid(&e.to_string()))?;

                self.transport
                    .send(email)
                    .await
                    .map_err(|e| AlertError::Delivery {
                        channel: CHANNEL.to_owned(),
                        reason: e.to_string(),
                    })?;
                Ok(())
            })
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use netsentry_core::event::{DetectionResult, Event};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct CapturingTransport {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl MailTransport for CapturingTransport {
        fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, Result<(), AlertError>> {
            Box::pin(async move {
                self.sent.lock().await.push(message.clone());
                Ok(())
            })
        }
    }

    fn alert() -> Alert {
        let event = Event::new(Utc::now())
            .with_source(Some("203.0.113.5".parse().unwrap()), Some(40000))
            .with_destination(Some("10.0.0.1".parse().unwrap()), Some(22))
            .with_protocol("tcp");
        Alert::from_detection(&DetectionResult::new(
            Arc::new(event),
            0.8,
            "Sensitive service targeted",
            "port-scan-heuristic",
        ))
    }

    fn configured() -> AlertsConfig {
        AlertsConfig {
            smtp_host: "mail.example.com".to_owned(),
            smtp_from: "alerts@example.com".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn message_layout() {
        let message = EmailMessage::from_alert(&alert(), "alerts@example.com");
        assert_eq!(message.subject, "[HIGH] Anomaly detected by port-scan-heuristic");
        assert_eq!(message.to, "alerts@example.com");
        assert_eq!(
            message.body,
            "Alert: Anomaly detected by port-scan-heuristic\n\
             Severity: high\n\
             Source: 203.0.113.5 -> 10.0.0.1\n\
             Protocol: tcp\n"
        );
    }

    #[test]
    fn message_with_missing_fields_uses_unknown() {
        let event = Arc::new(Event::new(Utc::now()));
        let alert = Alert::from_detection(&DetectionResult::new(event, 0.9, "x", "d"));
        let message = EmailMessage::from_alert(&alert, "a@example.com");
        assert!(message.body.contains("Source: unknown -> unknown"));
        assert!(message.body.contains("Protocol: unknown"));
    }

    #[tokio::test]
    async fn sends_through_transport() {
        let transport = Arc::new(CapturingTransport::default());
        let channel = EmailChannel::new(&configured(), transport.clone());
        assert!(channel.is_configured());

        AlertChannel::send(&channel, &alert()).await.unwrap();
        assert_eq!(transport.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_host_is_a_no_op() {
        let transport = Arc::new(CapturingTransport::default());
        let config = AlertsConfig {
            smtp_from: "alerts@example.com".to_owned(),
            ..Default::default()
        };
        let channel = EmailChannel::new(&config, transport.clone());

        AlertChannel::send(&channel, &alert()).await.unwrap();
        assert!(transport.sent.lock().await.is_empty());
    }
}
