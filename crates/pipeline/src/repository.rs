//! 이상 레코드 저장소 (프로세스 수명 동안만 유지)
//!
//! ID 할당과 추가는 하나의 잠금 안에서 일어나므로 동시에 `add`를 호출해도
//! ID가 중복되지 않습니다. 저장 순서는 제출 순서가 아니라 완료 순서입니다.

use chrono::Utc;
use tokio::sync::Mutex;

use netsentry_core::event::Event;
use netsentry_core::types::AnomalyRecord;

#[derive(Debug, Default)]
struct RepositoryState {
    records: Vec<AnomalyRecord>,
    last_id: u64,
}

/// 이상 레코드 저장소
#[derive(Debug, Default)]
pub struct AnomalyRepository {
    state: Mutex<RepositoryState>,
}

impl AnomalyRepository {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드를 추가하고 반환합니다. ID는 1부터 증가합니다.
    pub async fn add(
        &self,
        score: f64,
        description: impl Into<String>,
        event: Event,
    ) -> AnomalyRecord {
        let mut state = self.state.lock().await;
        state.last_id += 1;
        let record = AnomalyRecord {
            id: state.last_id,
            detected_at: Utc::now(),
            score,
            description: description.into(),
            event,
        };
        state.records.push(record.clone());
        record
    }

    /// 최근 레코드를 최신순으로 최대 `limit`개 반환합니다.
    pub async fn list_recent(&self, limit: usize) -> Vec<AnomalyRecord> {
        let state = self.state.lock().await;
        state.records.iter().rev().take(limit).cloned().collect()
    }

    /// 모든 레코드를 지우고 ID를 초기화합니다.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.records.clear();
        state.last_id = 0;
    }

    /// 저장된 레코드 수
    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    /// 비어 있는지 여부
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn event() -> Event {
        Event::new(Utc::now())
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let repo = AnomalyRepository::new();
        let ids: Vec<u64> = [
            repo.add(0.6, "a", event()).await.id,
            repo.add(0.7, "b", event()).await.id,
            repo.add(0.8, "c", event()).await.id,
        ]
        .into();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn list_recent_is_newest_first() {
        let repo = AnomalyRepository::new();
        for desc in ["a", "b", "c"] {
            repo.add(0.9, desc, event()).await;
        }
        let recent = repo.list_recent(2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 3);
        assert_eq!(recent[1].id, 2);
        assert_eq!(recent[0].description, "c");
    }

    #[tokio::test]
    async fn list_recent_with_large_limit_returns_all() {
        let repo = AnomalyRepository::new();
        repo.add(0.9, "only", event()).await;
        assert_eq!(repo.list_recent(100).await.len(), 1);
        assert!(repo.list_recent(0).await.is_empty());
    }

    #[tokio::test]
    async fn clear_resets_ids() {
        let repo = AnomalyRepository::new();
        repo.add(0.9, "a", event()).await;
        repo.add(0.9, "b", event()).await;
        repo.clear().await;
        assert!(repo.is_empty().await);

        let record = repo.add(0.9, "c", event()).await;
        assert_eq!(record.id, 1);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_adds_get_unique_ids() {
        let repo = Arc::new(AnomalyRepository::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.add(0.9, "x", event()).await.id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=32).collect::<Vec<u64>>());
    }
}
