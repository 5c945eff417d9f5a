//! Result cache — latest result per check name.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use pulse_core::HealthResult;

/// Last-known result per check. Writes are last-write-wins per name;
/// readers always get clones.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    results: Arc<RwLock<HashMap<String, HealthResult>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, result: HealthResult) {
        self.results
            .write()
            .await
            .insert(result.check_name.clone(), result);
    }

    pub async fn get(&self, name: &str) -> Option<HealthResult> {
        self.results.read().await.get(name).cloned()
    }

    pub async fn remove(&self, name: &str) -> Option<HealthResult> {
        self.results.write().await.remove(name)
    }

    /// Copy of every cached result.
    pub async fn snapshot(&self) -> HashMap<String, HealthResult> {
        self.results.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::CheckStatus;

    #[tokio::test]
    async fn newer_result_overwrites() {
        let cache = ResultCache::new();
        cache.insert(HealthResult::unhealthy("api", "HTTP 503")).await;
        cache.insert(HealthResult::healthy("api", "HTTP 200")).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("api").await.unwrap().status, CheckStatus::Healthy);
    }

    #[tokio::test]
    async fn snapshot_is_detached() {
        let cache = ResultCache::new();
        cache.insert(HealthResult::healthy("api", "ok")).await;

        let mut snapshot = cache.snapshot().await;
        snapshot.clear();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_writers_to_different_keys() {
        let cache = ResultCache::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .insert(HealthResult::healthy(format!("check-{i}"), "ok"))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len().await, 16);

        cache.remove("check-0").await;
        assert!(cache.get("check-0").await.is_none());
        assert!(!cache.is_empty().await);
    }
}
