use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::llm::VisionModel;

/// Raw model answers keyed by a digest of model, prompt and image bytes.
#[derive(Clone)]
pub struct ResponseCache {
    responses: Arc<DashMap<String, String>>,
    max_entries: usize,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            responses: Arc::new(DashMap::new()),
            max_entries,
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let found = self.responses.get(key).map(|r| r.value().clone());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn set(&self, key: String, response: String) {
        if self.max_entries == 0 {
            return;
        }
        if self.responses.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses.insert(key, response);
    }

    pub fn key(model_id: &str, prompt: &str, image: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(prompt.as_bytes());
        hasher.update([0u8]);
        hasher.update(image);
        hex::encode(hasher.finalize())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.responses.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

/// Wraps a model so identical images are only sent once.
pub struct CachedVision<M> {
    inner: M,
    cache: ResponseCache,
}

impl<M: VisionModel> CachedVision<M> {
    pub fn new(inner: M, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

#[async_trait]
impl<M: VisionModel> VisionModel for CachedVision<M> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn describe(&self, prompt: &str, image: &[u8]) -> Result<String> {
        let key = ResponseCache::key(self.inner.model_id(), prompt, image);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(model = self.inner.model_id(), "Vision cache hit");
            return Ok(cached);
        }

        // Failed calls are not cached
        let response = self.inner.describe(prompt, image).await?;
        self.cache.set(key, response.clone());
        Ok(response)
    }
}
