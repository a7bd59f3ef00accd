use std::{collections::HashMap, future::Future, sync::Arc};

use log::debug;
use parking_lot::Mutex;

use crate::index::CacheKey;

/// Deduplicates completed loads of one resource class.
///
/// A hit never re-issues the load and hands back the stored handle. Concurrent
/// misses for the same key are not merged: each runs its own load and the last
/// one to finish owns the stored entry. The map lock is never held across an
/// await point, so the cache can be shared between tasks and threads.
#[derive(Debug)]
pub struct ResourceCache<T> {
    entries: Mutex<HashMap<CacheKey, Arc<T>>>,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub async fn acquire<F, Fut, E>(&self, key: CacheKey, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(entry) = self.get(&key) {
            debug!("Cache hit for {}", key);
            return Ok(entry);
        }

        let entry = Arc::new(load().await?);
        let replaced = self.entries.lock().insert(key.clone(), entry.clone());
        if replaced.is_some() {
            debug!("Replaced concurrently loaded entry for {}", key);
        }
        Ok(entry)
    }

    pub fn release(&self, key: &CacheKey) -> Option<Arc<T>> {
        let released = self.entries.lock().remove(key);
        if released.is_some() {
            debug!("Released {}", key);
        }
        released
    }

    /// Removes every entry matching `predicate` and returns how many went.
    pub fn release_where(&self, mut predicate: impl FnMut(&CacheKey, &T) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, entry| !predicate(key, entry));
        before - entries.len()
    }

    pub fn release_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        debug!("Released all {} cache entries", count);
        count
    }
}
