//! Exclusive access around mutating sequences.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{JamError, Result};

/// Holds an exclusive advisory lock on a base's header file until dropped.
///
/// The lock lives on a duplicated handle, so it excludes other processes and
/// other `Base` instances opened on the same prefix. Guards taken from one
/// base nest: the OS lock is requested by the first guard and released by
/// whichever guard drops last.
#[derive(Debug)]
pub struct BaseLock {
    file: Option<File>,
    depth: Arc<AtomicU32>,
    outermost: bool,
    path: PathBuf,
}

impl BaseLock {
    /// Block until the lock is granted. With `enabled = false` nothing is locked.
    ///
    /// `depth` counts the live guards of one base.
    pub(crate) fn acquire(
        file: &File,
        path: &Path,
        enabled: bool,
        depth: &Arc<AtomicU32>,
    ) -> Result<Self> {
        let dup = if enabled {
            Some(file.try_clone().map_err(|e| JamError::io(path, e))?)
        } else {
            None
        };

        let outermost = depth.load(Ordering::Acquire) == 0;
        if let (Some(dup), true) = (&dup, outermost) {
            dup.lock_exclusive().map_err(|e| JamError::io(path, e))?;
            debug!(path = %path.display(), "Base locked");
        }
        depth.fetch_add(1, Ordering::AcqRel);

        Ok(Self {
            file: dup,
            depth: Arc::clone(depth),
            outermost,
            path: path.to_path_buf(),
        })
    }

    /// `true` when an OS lock is actually held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// `true` for the guard that requested the OS lock.
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }
}

impl Drop for BaseLock {
    fn drop(&mut self) {
        let last = self.depth.fetch_sub(1, Ordering::AcqRel) == 1;
        if !last {
            return;
        }
        if let Some(file) = self.file.take() {
            match FileExt::unlock(&file) {
                Ok(()) => debug!(path = %self.path.display(), "Base unlocked"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to unlock base"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn other_handle_can_lock(path: &Path) -> bool {
        let other = File::open(path).unwrap();
        let locked = other.try_lock_exclusive().is_ok();
        if locked {
            FileExt::unlock(&other).unwrap();
        }
        locked
    }

    #[test]
    fn test_nested_guards_release_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nest.jhr");
        let file = File::create(&path).unwrap();
        let depth = Arc::new(AtomicU32::new(0));

        let outer = BaseLock::acquire(&file, &path, true, &depth).unwrap();
        let inner = BaseLock::acquire(&file, &path, true, &depth).unwrap();
        assert!(outer.is_outermost());
        assert!(!inner.is_outermost());

        drop(inner);
        assert!(!other_handle_can_lock(&path));

        drop(outer);
        assert!(other_handle_can_lock(&path));
        assert_eq!(depth.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_outer_dropped_first() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("order.jhr");
        let file = File::create(&path).unwrap();
        let depth = Arc::new(AtomicU32::new(0));

        let outer = BaseLock::acquire(&file, &path, true, &depth).unwrap();
        let inner = BaseLock::acquire(&file, &path, true, &depth).unwrap();

        drop(outer);
        assert!(!other_handle_can_lock(&path));
        drop(inner);
        assert!(other_handle_can_lock(&path));
    }

    #[test]
    fn test_disabled_guard_holds_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("off.jhr");
        let file = File::create(&path).unwrap();
        let depth = Arc::new(AtomicU32::new(0));

        let guard = BaseLock::acquire(&file, &path, false, &depth).unwrap();
        assert!(!guard.is_held());
        assert!(other_handle_can_lock(&path));
    }
}
