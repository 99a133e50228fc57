//! Path-scoped write locks
//!
//! Two runs writing the same file serialize; writes to different files do
//! not contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

static SHARED: LazyLock<Arc<PathLocks>> = LazyLock::new(|| Arc::new(PathLocks::new()));

#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Weak<AsyncMutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide lock table shared by every writer
    pub fn shared() -> Arc<Self> {
        SHARED.clone()
    }

    /// Wait for exclusive access to `path`
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        debug!(?path, "PathLocks::lock: called");
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);
            match locks.get(path).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let fresh = Arc::new(AsyncMutex::new(()));
                    locks.insert(path.to_path_buf(), Arc::downgrade(&fresh));
                    fresh
                }
            }
        };
        mutex.lock_owned().await
    }

    /// Paths with a live lock
    pub fn held(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|w| w.strong_count() > 0).count()
    }
}
