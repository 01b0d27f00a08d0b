use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fieldwork_core::CollectId;
use tracing::{debug, warn};

use crate::Result;
use crate::error::OperationError;

/// Lets at most one transition run per collect.
///
/// Permits are tracked in memory. With a lock directory each permit also
/// holds `{id}.lock` there, so processes sharing a store exclude each other.
#[derive(Debug, Default)]
pub struct TransitionGuard {
    running: Mutex<HashSet<CollectId>>,
    lock_dir: Option<PathBuf>,
}

impl TransitionGuard {
    /// A guard for transitions run by this process only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard that also takes a lock file per collect in `lock_dir`.
    #[must_use]
    pub fn with_lock_dir(lock_dir: &Path) -> Self {
        Self {
            running: Mutex::default(),
            lock_dir: Some(lock_dir.to_path_buf()),
        }
    }

    #[must_use]
    pub fn lock_dir(&self) -> Option<&Path> {
        self.lock_dir.as_deref()
    }

    /// Claim `collect` until the returned permit is dropped.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::TransitionInProgress` if another permit for
    /// the same collect is alive, in this process or, with a lock
    /// directory, in another one. Returns `OperationError::LockFile` if the
    /// lock file cannot be created.
    pub fn acquire(&self, collect: CollectId) -> Result<TransitionPermit<'_>> {
        if !self.running().insert(collect) {
            return Err(OperationError::TransitionInProgress(collect));
        }
        let lock_file = match self.lock_dir.as_deref().map(|dir| create_lock_file(dir, collect)) {
            Some(Ok(path)) => Some(path),
            Some(Err(err)) => {
                self.running().remove(&collect);
                return Err(err);
            }
            None => None,
        };
        Ok(TransitionPermit {
            guard: self,
            collect,
            lock_file,
        })
    }

    #[must_use]
    pub fn is_running(&self, collect: CollectId) -> bool {
        self.running().contains(&collect)
    }

    fn running(&self) -> std::sync::MutexGuard<'_, HashSet<CollectId>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn create_lock_file(dir: &Path, collect: CollectId) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|source| OperationError::LockFile {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{collect}.lock"));
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            warn!(
                path = %path.display(),
                "lock file exists; remove it if no transition is running"
            );
            return Err(OperationError::TransitionInProgress(collect));
        }
        Err(source) => return Err(OperationError::LockFile { path, source }),
    };
    // the holder's pid, for whoever finds a stale lock
    if let Err(source) = writeln!(file, "{}", std::process::id()) {
        let _ = fs::remove_file(&path);
        return Err(OperationError::LockFile { path, source });
    }
    debug!(collect = %collect, path = %path.display(), "lock file created");
    Ok(path)
}

#[derive(Debug)]
pub struct TransitionPermit<'a> {
    guard: &'a TransitionGuard,
    collect: CollectId,
    lock_file: Option<PathBuf>,
}

impl Drop for TransitionPermit<'_> {
    fn drop(&mut self) {
        if let Some(path) = &self.lock_file {
            if let Err(err) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %err, "could not remove lock file");
            }
        }
        self.guard.running().remove(&self.collect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_permit_for_same_collect_is_refused() {
        let guard = TransitionGuard::new();

        let _permit = guard.acquire(CollectId(1)).expect("first permit");
        let second = guard.acquire(CollectId(1));

        assert!(matches!(
            second,
            Err(OperationError::TransitionInProgress(CollectId(1)))
        ));
    }

    #[test]
    fn other_collects_are_independent() {
        let guard = TransitionGuard::new();

        let _first = guard.acquire(CollectId(1)).expect("first permit");

        assert!(guard.acquire(CollectId(2)).is_ok());
    }

    #[test]
    fn dropping_the_permit_releases_the_collect() {
        let guard = TransitionGuard::new();

        drop(guard.acquire(CollectId(1)).expect("first permit"));

        assert!(!guard.is_running(CollectId(1)));
        assert!(guard.acquire(CollectId(1)).is_ok());
    }

    #[test]
    fn guards_sharing_a_lock_dir_exclude_each_other() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = TransitionGuard::with_lock_dir(dir.path());
        let second = TransitionGuard::with_lock_dir(dir.path());

        let permit = first.acquire(CollectId(3))?;
        assert!(dir.path().join("3.lock").exists());
        assert!(matches!(
            second.acquire(CollectId(3)),
            Err(OperationError::TransitionInProgress(CollectId(3)))
        ));
        assert!(!second.is_running(CollectId(3)));
        assert!(second.acquire(CollectId(4)).is_ok());

        drop(permit);
        assert!(!dir.path().join("3.lock").exists());
        assert!(second.acquire(CollectId(3)).is_ok());
        Ok(())
    }

    #[test]
    fn stale_lock_file_blocks_the_collect() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("5.lock"), "4242\n")?;
        let guard = TransitionGuard::with_lock_dir(dir.path());

        assert!(matches!(
            guard.acquire(CollectId(5)),
            Err(OperationError::TransitionInProgress(CollectId(5)))
        ));
        assert!(!guard.is_running(CollectId(5)));
        Ok(())
    }
}
