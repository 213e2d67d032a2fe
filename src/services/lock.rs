use super::BundleError;
use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Lock file created inside the settings directory
pub const LOCK_FILE_NAME: &str = ".bundle.lock";

static DIRECTORY_GATES: Lazy<Mutex<HashMap<Utf8PathBuf, Arc<DirectoryGate>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[cfg(unix)]
type FileLock = nix::fcntl::Flock<std::fs::File>;

#[cfg(not(unix))]
type FileLock = ();

/// In-process exclusion for one directory. Waiting blocks the calling thread only.
#[derive(Debug, Default)]
struct DirectoryGate {
    held: Mutex<bool>,
    released: Condvar,
}

impl DirectoryGate {
    fn enter(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    fn leave(&self) {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.released.notify_one();
    }
}

/// Exclusive hold on a settings directory.
///
/// Taken for the whole of a bundle operation and for every ordinary settings write
/// (`JsonSettingsStore::update`, `PinnedItemsController::pin`/`unpin`), so the two never
/// interleave. Within the process holders queue on a per-directory gate; on unix an
/// advisory `flock` on [`LOCK_FILE_NAME`] also keeps other processes out. Released on
/// drop. Not reentrant: code holding the lock must not call a locking store write.
pub struct SettingsLock {
    settings_dir: Utf8PathBuf,
    file: Option<FileLock>,
    gate: Arc<DirectoryGate>,
}

impl std::fmt::Debug for SettingsLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsLock")
            .field("settings_dir", &self.settings_dir)
            .finish()
    }
}

impl SettingsLock {
    /// Wait until the directory is free, then take it. The wait happens on the blocking
    /// pool, so runtime workers are never parked.
    pub async fn acquire(settings_dir: &Utf8Path) -> Result<Self, BundleError> {
        let dir = settings_dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&dir)).await?
    }

    /// Blocking variant of [`acquire`](Self::acquire). Blocks the current thread until
    /// the directory is free.
    pub fn acquire_blocking(settings_dir: &Utf8Path) -> Result<Self, BundleError> {
        let gate = directory_gate(settings_dir)?;
        gate.enter();

        // Dropping `lock` on the error path reopens the gate
        let mut lock = Self {
            settings_dir: settings_dir.to_path_buf(),
            file: None,
            gate,
        };
        lock.file = Some(lock_file(settings_dir)?);

        tracing::debug!("Acquired settings lock on {}", settings_dir);
        Ok(lock)
    }

    pub fn settings_dir(&self) -> &Utf8Path {
        &self.settings_dir
    }
}

impl Drop for SettingsLock {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!("Released settings lock on {}", self.settings_dir);
        }
        self.gate.leave();
    }
}

/// Creates the directory first so the key is canonical from the first call on.
fn directory_gate(settings_dir: &Utf8Path) -> Result<Arc<DirectoryGate>, BundleError> {
    std::fs::create_dir_all(settings_dir).map_err(|e| {
        BundleError::io(format!("Failed to create settings directory {}", settings_dir), e)
    })?;
    let key = settings_dir
        .canonicalize_utf8()
        .unwrap_or_else(|_| settings_dir.to_path_buf());

    let mut gates = DIRECTORY_GATES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Ok(gates.entry(key).or_default().clone())
}

#[cfg(unix)]
fn lock_file(settings_dir: &Utf8Path) -> Result<FileLock, BundleError> {
    use nix::fcntl::{Flock, FlockArg};
    use std::fs::OpenOptions;

    let path = settings_dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|e| BundleError::io(format!("Failed to open lock file {}", path), e))?;

    Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| BundleError::Lock {
        path: settings_dir.to_path_buf(),
        reason: errno.desc().to_string(),
    })
}

#[cfg(not(unix))]
fn lock_file(_settings_dir: &Utf8Path) -> Result<FileLock, BundleError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_dir() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("settings")).unwrap();
        (temp_dir, path)
    }

    #[tokio::test]
    async fn test_second_operation_waits() {
        let (_temp_dir, dir) = create_test_dir();
        let first = SettingsLock::acquire(&dir).await.unwrap();

        let dir_clone = dir.clone();
        let second = tokio::spawn(async move { SettingsLock::acquire(&dir_clone).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!second.is_finished());

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(5), second)
            .await
            .expect("Timeout waiting for lock")
            .unwrap();
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_directories_do_not_block() {
        let (_temp_a, dir_a) = create_test_dir();
        let (_temp_b, dir_b) = create_test_dir();

        let _a = SettingsLock::acquire(&dir_a).await.unwrap();
        let b = tokio::time::timeout(Duration::from_secs(5), SettingsLock::acquire(&dir_b))
            .await
            .expect("Independent directory should not wait");
        assert!(b.is_ok());
    }

    #[test]
    fn test_acquire_blocking_creates_directory() {
        let (_temp_dir, dir) = create_test_dir();
        let lock = SettingsLock::acquire_blocking(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(lock.settings_dir(), dir);
    }

    #[test]
    fn test_blocking_holder_waits_for_async_holder() {
        let (_temp_dir, dir) = create_test_dir();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let held = runtime.block_on(SettingsLock::acquire(&dir)).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let dir_clone = dir.clone();
        let waiter = std::thread::spawn(move || {
            let lock = SettingsLock::acquire_blocking(&dir_clone);
            tx.send(lock.is_ok()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(held);
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        waiter.join().unwrap();
    }
}
