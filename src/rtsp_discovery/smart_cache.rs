//! SmartCache - cross-device path learning
//!
//! MAC prefix (OUI) -> paths that worked for earlier devices with the same
//! prefix during this run. Append-only, never evicted, process lifetime only.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct SmartCache {
    inner: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl SmartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a working path for a prefix. Every call appends.
    pub async fn record(&self, prefix: &str, path: &str) {
        let mut map = self.inner.write().await;
        map.entry(prefix.to_string())
            .or_insert_with(Vec::new)
            .push(path.to_string());
    }

    /// Known paths for a prefix in first-success order, duplicates removed
    pub async fn paths_for(&self, prefix: &str) -> Vec<String> {
        let map = self.inner.read().await;
        let mut out: Vec<String> = Vec::new();
        if let Some(paths) = map.get(prefix) {
            for p in paths {
                if !out.contains(p) {
                    out.push(p.clone());
                }
            }
        }
        out
    }

    /// Total recorded entries (duplicates included)
    pub async fn len(&self) -> usize {
        self.inner.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
