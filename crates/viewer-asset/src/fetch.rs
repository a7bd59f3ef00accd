use std::{
    collections::HashMap,
    io,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;

use crate::error::FetchError;

/// Asynchronous "fetch bytes at path" capability.
///
/// No retry, no timeout and no partial content: a fetch either yields the
/// whole file or an error.
pub trait ByteFetcher: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> BoxFuture<'static, Result<Bytes, FetchError>>;
}

/// Joins a model home directory and a descriptor-relative file name.
pub fn resolve_path(home: &str, file: &str) -> String {
    if home.is_empty() {
        file.to_owned()
    } else if home.ends_with('/') {
        format!("{}{}", home, file)
    } else {
        format!("{}/{}", home, file)
    }
}

#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ByteFetcher for FsFetcher {
    fn fetch(&self, path: &str) -> BoxFuture<'static, Result<Bytes, FetchError>> {
        let full_path = self.root.join(path);
        let path = path.to_owned();
        async move {
            match tokio::fs::read(&full_path).await {
                Ok(buffer) => Ok(Bytes::from(buffer)),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    Err(FetchError::NotFound(path))
                }
                Err(error) => Err(FetchError::Io {
                    path,
                    error: Arc::new(error),
                }),
            }
        }
        .boxed()
    }
}

/// Serves files from memory and counts every fetch it receives.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Bytes>,
    fetches: Mutex<Vec<String>>,
    fetch_count: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.files.insert(path.into(), data.into());
    }

    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn fetches_of(&self, path: &str) -> usize {
        self.fetches.lock().iter().filter(|item| *item == path).count()
    }
}

impl ByteFetcher for MemoryFetcher {
    fn fetch(&self, path: &str) -> BoxFuture<'static, Result<Bytes, FetchError>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.fetches.lock().push(path.to_owned());
        let result = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_owned()));
        futures::future::ready(result).boxed()
    }
}
