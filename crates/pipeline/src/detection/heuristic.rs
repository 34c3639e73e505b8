//! 포트 기반 휴리스틱 탐지기
//!
//! 독립적인 가중 신호를 더해 점수를 만듭니다.
//!
//! | 신호 | 가중치 | 설명 |
//! |------|--------|------|
//! | 민감 포트 + tcp/udp/ssh | 0.6 | `Sensitive service targeted` |
//! | 출발지 == 목적지 | 0.2 | `Loopback access to sensitive port` (덮어씀) |
//! | message에 "failed" 포함 | 0.2 | 앞선 신호가 없을 때만 `Repeated failure on sensitive port` |

use std::collections::BTreeSet;
use std::sync::Arc;

use netsentry_core::event::{DetectionResult, Event};
use netsentry_core::pipeline::Detector;

/// 기본 민감 포트 (ssh, telnet, rdp, vnc)
pub const DEFAULT_SENSITIVE_PORTS: [u16; 4] = [22, 23, 3389, 5900];

const SENSITIVE_PROTOCOLS: [&str; 3] = ["tcp", "udp", "ssh"];

const SENSITIVE_PORT_WEIGHT: f64 = 0.6;
const LOOPBACK_WEIGHT: f64 = 0.2;
const FAILURE_WEIGHT: f64 = 0.2;

/// 민감 서비스 접근 패턴을 탐지하는 휴리스틱
#[derive(Debug, Clone)]
pub struct PortScanHeuristicDetector {
    sensitive_ports: BTreeSet<u16>,
}

impl PortScanHeuristicDetector {
    /// 탐지기 이름
    pub const NAME: &'static str = "port-scan-heuristic";

    /// 민감 포트 목록으로 탐지기를 생성합니다. 빈 목록이면 기본값을 사용합니다.
    pub fn new(sensitive_ports: impl IntoIterator<Item = u16>) -> Self {
        let mut ports: BTreeSet<u16> = sensitive_ports.into_iter().collect();
        if ports.is_empty() {
            ports.extend(DEFAULT_SENSITIVE_PORTS);
        }
        Self {
            sensitive_ports: ports,
        }
    }

    /// 민감 포트 집합
    pub fn sensitive_ports(&self) -> &BTreeSet<u16> {
        &self.sensitive_ports
    }

    fn targets_sensitive_service(&self, event: &Event) -> bool {
        let port_hit = event
            .destination_port
            .is_some_and(|port| self.sensitive_ports.contains(&port));
        let proto_hit = event
            .protocol
            .as_deref()
            .is_some_and(|proto| SENSITIVE_PROTOCOLS.contains(&proto));
        port_hit && proto_hit
    }
}

impl Default for PortScanHeuristicDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_PORTS)
    }
}

impl Detector for PortScanHeuristicDetector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&self, event: &Arc<Event>) -> DetectionResult {
        let mut score = 0.0;
        let mut description: Option<&str> = None;

        if self.targets_sensitive_service(event) {
            score += SENSITIVE_PORT_WEIGHT;
            description = Some("Sensitive service targeted");
        }

        if event.is_loopback_flow() {
            score += LOOPBACK_WEIGHT;
            description = Some("Loopback access to sensitive port");
        }

        let failed = event
            .message()
            .is_some_and(|msg| msg.to_lowercase().contains("failed"));
        if failed {
            score += FAILURE_WEIGHT;
            description.get_or_insert("Repeated failure on sensitive port");
        }

        DetectionResult::new(
            Arc::clone(event),
            f64::min(score, 1.0),
            description.unwrap_or("benign"),
            Self::NAME,
        )
    }
}
