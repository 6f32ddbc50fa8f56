//! In-memory result store for tests and dry runs.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::ResultQuery;
use crate::domain::ports::ResultStore;

#[derive(Debug, Clone, Default)]
pub struct InMemoryResultStore {
    results: Arc<RwLock<HashMap<ResultQuery, Option<bool>>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, query: ResultQuery, outcome: Option<bool>) {
        self.results.write().await.insert(query, outcome);
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn has_result(&self, query: &ResultQuery) -> Result<bool> {
        Ok(self.results.read().await.contains_key(query))
    }

    async fn get_result(&self, query: &ResultQuery) -> Result<Option<bool>> {
        Ok(self.results.read().await.get(query).copied().flatten())
    }
}
