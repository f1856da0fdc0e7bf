//! Response cache and in-flight request coalescing.
//!
//! Grounded on the teacher's `futures` workspace dependency used for the
//! `Shared` future coalescing role its own docs advertise: concurrent
//! callers for the same key await one clone of the same in-flight future
//! rather than each re-running the pipeline.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use askline_common::AskError;
use futures::future::{BoxFuture, FutureExt, Shared};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::types::{AskCacheEntry, AskResponse};

const TTL_MS: u64 = 30_000;
const CAPACITY: usize = 500;
const PRUNE_EVERY_OPS: u64 = 50;
const PRUNE_SIZE_THRESHOLD: usize = 200;

type CacheResult = Result<AskResponse, Arc<AskError>>;
type InFlight = Shared<BoxFuture<'static, CacheResult>>;

/// Compute the cache key for a partition (client IP or anon ID) + request
/// body JSON value.
pub fn cache_key(partition: &str, body_json: &str) -> String {
    let payload = format!("{{\"partition\":{partition:?},\"body\":{body_json}}}");
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct AskCache {
    entries: Mutex<HashMap<String, AskCacheEntry>>,
    /// Insertion order of `entries`, oldest first, for FIFO eviction above
    /// `CAPACITY`. `entries.retain` (TTL pruning) can leave stale keys in
    /// here; eviction skips any key no longer present in `entries`.
    insertion_order: Mutex<VecDeque<String>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    ops: Mutex<u64>,
}

impl Default for AskCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AskCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            insertion_order: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashMap::new()),
            ops: Mutex::new(0),
        }
    }

    async fn maybe_prune(&self, now_ms: u64) {
        let mut ops = self.ops.lock().await;
        *ops += 1;
        let mut entries = self.entries.lock().await;
        let should_prune = *ops % PRUNE_EVERY_OPS == 0 || entries.len() >= PRUNE_SIZE_THRESHOLD;
        if !should_prune {
            return;
        }
        entries.retain(|_, entry| entry.expires_at_ms > now_ms);
        if entries.len() > CAPACITY {
            let overflow = entries.len() - CAPACITY;
            let mut order = self.insertion_order.lock().await;
            let mut evicted = 0;
            while evicted < overflow {
                let Some(key) = order.pop_front() else {
                    break;
                };
                if entries.remove(&key).is_some() {
                    evicted += 1;
                }
            }
        }
    }

    pub async fn get(&self, key: &str, now_ms: u64) -> Option<AskResponse> {
        self.maybe_prune(now_ms).await;
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at_ms > now_ms)
            .map(|entry| entry.value.clone())
    }

    async fn store(&self, key: String, value: AskResponse, now_ms: u64) {
        {
            let mut entries = self.entries.lock().await;
            entries.insert(
                key.clone(),
                AskCacheEntry {
                    value,
                    expires_at_ms: now_ms + TTL_MS,
                },
            );
        }
        self.insertion_order.lock().await.push_back(key);
    }

    /// Run `produce` for `key`, coalescing concurrent callers onto the same
    /// in-flight future and caching the result for `TTL_MS` on success. The
    /// in-flight entry is always deregistered on completion, success or
    /// failure.
    pub async fn get_or_run<F>(&self, key: &str, now_ms: u64, produce: F) -> Result<AskResponse, AskError>
    where
        F: std::future::Future<Output = Result<AskResponse, AskError>> + Send + 'static,
    {
        if let Some(cached) = self.get(key, now_ms).await {
            return Ok(cached);
        }

        let key_owned = key.to_string();

        // Check-and-insert under one lock acquisition: `entry().or_insert_with`
        // only runs the closure (and so only counts as "we own this run") when
        // no in-flight future is already registered for this key, closing the
        // window where two concurrent callers could both observe an empty slot.
        let mut we_produce = false;
        let shared: InFlight = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key_owned.clone())
                .or_insert_with(|| {
                    we_produce = true;
                    let fut: BoxFuture<'static, CacheResult> =
                        async move { produce.await.map_err(Arc::new) }.boxed();
                    fut.shared()
                })
                .clone()
        };

        if !we_produce {
            return shared.await.map_err(|arc_err| AskError::from_arc(&arc_err));
        }

        let result = shared.await;

        {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.remove(&key_owned);
        }

        match result {
            Ok(value) => {
                self.store(key_owned, value.clone(), now_ms).await;
                Ok(value)
            }
            Err(arc_err) => Err(AskError::from_arc(&arc_err)),
        }
    }
}

/// `AskError` does not derive `Clone` (its variants carry plain `String`s,
/// cloning is trivial but `thiserror`'s `Display`/`Error` derives don't
/// imply it); this helper reconstructs an equivalent owned error from a
/// shared one for each coalesced follower.
trait FromArc {
    fn from_arc(err: &Arc<AskError>) -> AskError;
}

impl FromArc for AskError {
    fn from_arc(err: &Arc<AskError>) -> AskError {
        match err.as_ref() {
            AskError::Validation(m) => AskError::Validation(m.clone()),
            AskError::RateLimited { retry_after_secs } => AskError::RateLimited {
                retry_after_secs: *retry_after_secs,
            },
            AskError::UpstreamAuth(m) => AskError::UpstreamAuth(m.clone()),
            AskError::UpstreamSearch(m) => AskError::UpstreamSearch(m.clone()),
            AskError::UpstreamLlm(m) => AskError::UpstreamLlm(m.clone()),
            AskError::UpstreamFetch(m) => AskError::UpstreamFetch(m.clone()),
            AskError::UnsupportedMediaType(m) => AskError::UnsupportedMediaType(m.clone()),
            AskError::PayloadTooLarge => AskError::PayloadTooLarge,
            AskError::InvalidUrl(m) => AskError::InvalidUrl(m.clone()),
            AskError::Misconfigured(m) => AskError::Misconfigured(m.clone()),
            AskError::NoModelAvailable => AskError::NoModelAvailable,
            AskError::Internal(m) => AskError::Internal(m.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn stub_response(answer: &str) -> AskResponse {
        AskResponse {
            provider: "openrouter",
            model: "test-model".to_string(),
            answer: answer.to_string(),
            citations: Vec::new(),
            follow_ups: vec!["a".into(), "b".into(), "c".into()],
            latency_ms: 1,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn coalesces_concurrent_calls_for_same_key() {
        let cache = Arc::new(AskCache::new());
        let calls = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_run("k", 0, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(stub_response("hello"))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.answer, "hello");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_value_served_without_rerunning() {
        let cache = AskCache::new();
        let calls = Arc::new(AtomicU64::new(0));

        let calls_clone = calls.clone();
        cache
            .get_or_run("k", 0, async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(stub_response("v1"))
            })
            .await
            .unwrap();

        let calls_clone = calls.clone();
        let result = cache
            .get_or_run("k", 1_000, async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(stub_response("v2"))
            })
            .await
            .unwrap();

        assert_eq!(result.answer, "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evicts_oldest_entries_first_above_capacity() {
        let cache = AskCache::new();
        for i in 0..(CAPACITY + 5) {
            cache
                .get_or_run(&format!("k{i}"), 0, async move { Ok(stub_response("v")) })
                .await
                .unwrap();
        }

        // maybe_prune only runs on every PRUNE_EVERY_OPS-th op or once the
        // live set crosses PRUNE_SIZE_THRESHOLD, so force one more pass.
        cache.get("k0", 0).await;

        assert!(cache.get("k0", 0).await.is_none());
        assert!(cache.get("k4", 0).await.is_none());
        assert!(cache.get(&format!("k{}", CAPACITY + 4), 0).await.is_some());
    }

    #[test]
    fn cache_key_is_stable_for_same_inputs() {
        let a = cache_key("1.2.3.4", r#"{"question":"hi"}"#);
        let b = cache_key("1.2.3.4", r#"{"question":"hi"}"#);
        assert_eq!(a, b);
    }
}
