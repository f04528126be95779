//! An on-disk cache of fetched pages.

use std::{
    fs,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info};

use crate::Result;

/// Pages stored as files below a directory.
///
/// A cache created with `refresh` never answers from disk but still stores what was fetched.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    refresh: bool,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, refresh: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(ResponseCache { dir, refresh })
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Read the cached page for `key` if it is younger than `max_age`, otherwise fetch and store it.
    ///
    /// Without a `max_age` a cached page never expires.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        max_age: Option<Duration>,
        fetch: F,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let path = self.path(key);
        if !self.refresh && is_fresh(&path, max_age) {
            debug!(key, "using cached page");
            return Ok(fs::read_to_string(&path)?);
        }
        let body = fetch().await?;
        fs::write(&path, &body)?;
        info!(key, path = %path.display(), "cached page");
        Ok(body)
    }
}

fn is_fresh(path: &Path, max_age: Option<Duration>) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    let Some(max_age) = max_age else {
        return true;
    };
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age < max_age)
}
