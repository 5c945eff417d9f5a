//! Check registry — the set of configured check definitions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use pulse_core::CheckDefinition;

/// Holds check definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: Arc<RwLock<HashMap<String, CheckDefinition>>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check, replacing any definition with the same name.
    ///
    /// Returns the replaced definition, if any.
    pub async fn register(&self, def: CheckDefinition) -> Option<CheckDefinition> {
        let name = def.name.clone();
        let check_type = def.check_type;
        let previous = self.checks.write().await.insert(name.clone(), def);
        if previous.is_some() {
            debug!(check = %name, "check definition replaced");
        } else {
            info!(check = %name, %check_type, "check registered");
        }
        previous
    }

    pub async fn unregister(&self, name: &str) -> Option<CheckDefinition> {
        let removed = self.checks.write().await.remove(name);
        if removed.is_some() {
            info!(check = %name, "check unregistered");
        }
        removed
    }

    pub async fn get(&self, name: &str) -> Option<CheckDefinition> {
        self.checks.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.checks.read().await.contains_key(name)
    }

    /// All definitions, sorted by name.
    pub async fn list(&self) -> Vec<CheckDefinition> {
        let mut defs: Vec<_> = self.checks.read().await.values().cloned().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub async fn snapshot(&self) -> HashMap<String, CheckDefinition> {
        self.checks.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.checks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::CheckType;

    #[tokio::test]
    async fn register_and_list_sorted() {
        let registry = CheckRegistry::new();
        registry
            .register(CheckDefinition::new("web", CheckType::Http, "http://web/health"))
            .await;
        registry
            .register(CheckDefinition::new("db", CheckType::Tcp, "db:5432"))
            .await;

        let names: Vec<_> = registry.list().await.into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["db", "web"]);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn register_same_name_replaces() {
        let registry = CheckRegistry::new();
        assert!(
            registry
                .register(CheckDefinition::new("db", CheckType::Tcp, "db:5432"))
                .await
                .is_none()
        );

        let previous = registry
            .register(CheckDefinition::new("db", CheckType::Tcp, "db:6432"))
            .await;
        assert_eq!(previous.unwrap().target, "db:5432");
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get("db").await.unwrap().target, "db:6432");
    }

    #[tokio::test]
    async fn unregister_removes() {
        let registry = CheckRegistry::new();
        registry
            .register(CheckDefinition::new("db", CheckType::Tcp, "db:5432"))
            .await;

        assert!(registry.unregister("db").await.is_some());
        assert!(registry.unregister("db").await.is_none());
        assert!(!registry.contains("db").await);
        assert!(registry.is_empty().await);
    }
}
