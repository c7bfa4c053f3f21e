//! Page cache and revalidation.
//!
//! Public page view models are cached per `(path, language)` for a fixed TTL.
//! Writes call [`Revalidator::revalidate`] with the paths they affect; the next
//! render of a stale path rebuilds it.

use std::{
    cell::Cell,
    collections::HashMap,
    future::Future,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::i18n::Language;

/// Marks cached pages stale. Fire-and-forget: never fails the write that
/// triggered it.
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, path: &str);
}

tokio::task_local! {
    static DEGRADED_READ: Cell<bool>;
}

/// Flags the page build running on this task as degraded: a read fell back to
/// an empty value after a backend error. No-op outside [`track_degraded`].
pub(crate) fn mark_degraded() {
    let _ = DEGRADED_READ.try_with(|flag| flag.set(true));
}

/// Runs `build`, also reporting whether any read inside it was degraded.
/// Reads joined with `tokio::join!` or `join_all` run on the same task and
/// are covered.
pub async fn track_degraded<F: Future>(build: F) -> (F::Output, bool) {
    DEGRADED_READ
        .scope(Cell::new(false), async move {
            let output = build.await;
            let degraded = DEGRADED_READ.with(Cell::get);
            (output, degraded)
        })
        .await
}

struct CachedPage {
    value: Value,
    stored_at: Instant,
}

pub struct PageCache {
    ttl: Duration,
    pages: RwLock<HashMap<(String, Language), CachedPage>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pages: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, path: &str, language: Language) -> Option<Value> {
        let pages = self.pages.read().await;
        pages
            .get(&(path.to_string(), language))
            .filter(|page| page.stored_at.elapsed() < self.ttl)
            .map(|page| page.value.clone())
    }

    pub async fn put(&self, path: &str, language: Language, value: Value) {
        if self.ttl.is_zero() {
            return;
        }
        let mut pages = self.pages.write().await;
        pages.retain(|_, page| page.stored_at.elapsed() < self.ttl);
        pages.insert(
            (path.to_string(), language),
            CachedPage {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pages.read().await.is_empty()
    }
}

/// `path` itself and everything beneath it, except that `/` only matches the
/// home page.
fn is_affected(cached: &str, path: &str) -> bool {
    if cached == path {
        return true;
    }
    let prefix = path.trim_end_matches('/');
    !prefix.is_empty()
        && cached
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl Revalidator for PageCache {
    async fn revalidate(&self, path: &str) {
        let mut pages = self.pages.write().await;
        let before = pages.len();
        pages.retain(|(cached, _), _| !is_affected(cached, path));
        tracing::debug!(path, evicted = before - pages.len(), "revalidated");
    }
}
