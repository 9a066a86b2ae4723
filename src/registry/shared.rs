//! Thread-safe registry handle and periodic eviction.
//!
//! [`SharedRegistry`] puts the whole registry behind one mutex so accept,
//! merge, evict and delete never interleave. The consumer runs while the lock
//! is held.
//!
//! [`spawn_evictor`] is the scheduler the core leaves out: a tokio task that
//! calls [`Registry::evict`] on a fixed interval until cancelled.

use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::consumer::Consumer;
use super::reassembly::{AcceptOutcome, ReassemblyError, Registry};
use super::stats::RegistryStats;
use crate::codec::{Codec, JsonCodec};
use crate::segment::Chunk;

/// Cloneable handle to a registry shared between threads or tasks.
pub struct SharedRegistry<C: Codec = JsonCodec> {
    inner: Arc<Mutex<Registry<C>>>,
}

impl<C: Codec> Clone for SharedRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> SharedRegistry<C> {
    /// Wrap a registry.
    pub fn new(registry: Registry<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<C>> {
        // A panicking consumer poisons the lock; the map itself is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the registry.
    pub fn with<R>(&self, f: impl FnOnce(&mut Registry<C>) -> R) -> R {
        f(&mut self.lock())
    }

    /// See [`Registry::set_consumer`].
    pub fn set_consumer(&self, consumer: impl Consumer<C::Document> + 'static) {
        self.lock().set_consumer(consumer);
    }

    /// See [`Registry::accept`].
    pub fn accept(&self, chunk: Chunk) -> Result<AcceptOutcome, ReassemblyError> {
        self.lock().accept(chunk)
    }

    /// See [`Registry::accept_json`].
    pub fn accept_json(&self, envelope: &str) -> Result<AcceptOutcome, ReassemblyError> {
        self.lock().accept_json(envelope)
    }

    /// See [`Registry::merge`].
    pub fn merge(&self, group_id: &str) -> Result<bool, ReassemblyError> {
        self.lock().merge(group_id)
    }

    /// See [`Registry::evict`].
    pub fn evict(&self, timeout: Duration) -> usize {
        self.lock().evict(timeout)
    }

    /// See [`Registry::delete`].
    pub fn delete(&self, group_id: &str) -> bool {
        self.lock().delete(group_id)
    }

    /// See [`Registry::pending_count`].
    pub fn pending_count(&self) -> usize {
        self.lock().pending_count()
    }

    /// See [`Registry::stats`].
    pub fn stats(&self) -> RegistryStats {
        self.lock().stats()
    }
}

/// Spawn a task that evicts groups idle longer than `timeout` every `interval`.
///
/// The task stops when `token` is cancelled and resolves to the total number
/// of groups it evicted. Must be called from within a tokio runtime.
pub fn spawn_evictor<C>(
    registry: SharedRegistry<C>,
    interval: Duration,
    timeout: Duration,
    token: CancellationToken,
) -> JoinHandle<usize>
where
    C: Codec + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut total_evicted = 0;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Evictor stopped after evicting {} groups", total_evicted);
                    break total_evicted;
                }
                _ = ticker.tick() => {
                    let evicted = registry.evict(timeout);
                    if evicted > 0 {
                        info!("Evicted {} stale groups", evicted);
                    }
                    total_evicted += evicted;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::thread;

    fn init_logging() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .is_test(true)
            .try_init()
            .ok();
    }

    #[test]
    fn test_shared_accept_across_threads() {
        let shared = SharedRegistry::new(Registry::new(JsonCodec));
        let (tx, rx) = std::sync::mpsc::channel::<Value>();
        shared.set_consumer(move |doc: Value| {
            let _ = tx.send(doc);
        });

        let pieces = ["[\"a\",", "\"b\",", "\"c\",", "\"d\"]"];
        let handles: Vec<_> = pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| {
                let shared = shared.clone();
                let chunk = Chunk::new("t", i as u32 + 1, 4, *piece).unwrap();
                thread::spawn(move || shared.accept(chunk))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        assert_eq!(rx.try_recv().unwrap(), json!(["a", "b", "c", "d"]));
        assert!(rx.try_recv().is_err());
        assert_eq!(shared.pending_count(), 0);
        assert_eq!(shared.stats().delivered, 1);
    }

    #[test]
    fn test_shared_delete_and_merge() {
        let shared = SharedRegistry::new(Registry::new(JsonCodec));
        shared.accept_json(r#"{"uid":"x","seq":1,"abs":2,"seg":"[1,"}"#).unwrap();

        assert_eq!(shared.merge("x"), Ok(false));
        assert_eq!(shared.with(|r| r.received_count("x")), Some(1));
        assert!(shared.delete("x"));
        assert_eq!(shared.pending_count(), 0);
    }

    #[test]
    fn test_poisoned_lock_still_usable() {
        let shared = SharedRegistry::new(Registry::new(JsonCodec));
        shared.set_consumer(|_doc: Value| {
            panic!("consumer failure");
        });

        let clone = shared.clone();
        let result = thread::spawn(move || clone.accept(Chunk::new("p", 1, 1, "1").unwrap())).join();
        assert!(result.is_err());

        // Group was removed before the consumer ran
        assert_eq!(shared.pending_count(), 0);
        assert_eq!(shared.evict(Duration::ZERO), 0);
    }

    #[tokio::test]
    async fn test_evictor_removes_stale_groups() {
        init_logging();

        let shared = SharedRegistry::new(Registry::new(JsonCodec));
        shared.accept(Chunk::new("stale", 1, 2, "[").unwrap()).unwrap();

        let token = CancellationToken::new();
        let handle = spawn_evictor(
            shared.clone(),
            Duration::from_millis(5),
            Duration::ZERO,
            token.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(shared.pending_count(), 0);

        token.cancel();
        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(shared.stats().evicted, 1);
    }

    #[tokio::test]
    async fn test_evictor_keeps_fresh_groups() {
        let shared = SharedRegistry::new(Registry::new(JsonCodec));
        shared.accept(Chunk::new("fresh", 1, 2, "[").unwrap()).unwrap();

        let token = CancellationToken::new();
        let handle = spawn_evictor(
            shared.clone(),
            Duration::from_millis(5),
            Duration::from_secs(3600),
            token.clone(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();

        assert_eq!(handle.await.unwrap(), 0);
        assert_eq!(shared.pending_count(), 1);
    }
}
