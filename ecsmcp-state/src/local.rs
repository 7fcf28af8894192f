//! State on the local filesystem
//!
//! `<name>.json` holds the state, `<name>.lock` the lock of the running apply
//! or destroy. State writes go through a temporary sibling and a rename. The
//! lock file is created exclusively, so of two racing operations only one
//! gets it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub fn open(state_path: impl Into<PathBuf>) -> BackendResult<Self> {
        let state_path = state_path.into();
        if state_path.as_os_str().is_empty() {
            return Err(BackendError::EmptyPath);
        }
        let lock_path = state_path.with_extension("lock");
        Ok(Self {
            state_path,
            lock_path,
        })
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn held_lock(&self) -> BackendResult<Option<LockInfo>> {
        let Some(content) = read_if_present(&self.lock_path).await? else {
            return Ok(None);
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| BackendError::InvalidState(format!("lock file: {}", e)))
    }

    async fn write_atomically(&self, target: &Path, content: String) -> BackendResult<()> {
        create_parent(target).await?;
        let mut staging = target.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, content)
            .await
            .map_err(BackendError::io(format!("Failed to write {}", staging.display())))?;
        fs::rename(&staging, target)
            .await
            .map_err(BackendError::io(format!("Failed to replace {}", target.display())))
    }

    /// Create the lock file; `Ok(false)` when it already exists
    async fn create_lock_file(&self, lock: &LockInfo) -> BackendResult<bool> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(BackendError::io("Failed to create lock file")(e)),
        };
        let content = serde_json::to_vec_pretty(lock)?;
        let written = async {
            file.write_all(&content).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&self.lock_path).await;
            return Err(BackendError::io("Failed to write lock file")(e));
        }
        Ok(true)
    }

    async fn unlock(&self) -> BackendResult<()> {
        fs::remove_file(&self.lock_path)
            .await
            .map_err(BackendError::io("Failed to remove lock file"))
    }
}

async fn create_parent(path: &Path) -> BackendResult<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .await
            .map_err(BackendError::io(format!("Failed to create {}", dir.display())))?;
    }
    Ok(())
}

async fn read_if_present(path: &Path) -> BackendResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BackendError::io(format!("Failed to read {}", path.display()))(e)),
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let Some(content) = read_if_present(&self.state_path).await? else {
            return Ok(None);
        };
        let state: StateFile = serde_json::from_str(&content)
            .map_err(|e| BackendError::InvalidState(format!("{}: {}", self.state_path.display(), e)))?;
        if state.version > StateFile::CURRENT_VERSION {
            return Err(BackendError::InvalidState(format!(
                "state version {} is newer than supported version {}",
                state.version,
                StateFile::CURRENT_VERSION
            )));
        }
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        let content = serde_json::to_string_pretty(state)?;
        self.write_atomically(&self.state_path, content).await?;
        debug!("State serial {} written to {}", state.serial, self.state_path.display());
        Ok(())
    }

    async fn acquire_lock(&self, stack: &str, operation: &str) -> BackendResult<LockInfo> {
        create_parent(&self.lock_path).await?;
        let lock = LockInfo::new(stack, operation);
        // One retry after an expired lock was cleared or the holder let go
        for _ in 0..2 {
            if self.create_lock_file(&lock).await? {
                debug!("Locked: {}", lock);
                return Ok(lock);
            }
            match self.held_lock().await {
                Ok(Some(held)) if !held.is_expired() => return Err(BackendError::Locked(Box::new(held))),
                Ok(Some(held)) => {
                    warn!("Taking over expired lock: {}", held);
                    // Someone else may have replaced it in the meantime
                    if let Ok(Some(current)) = self.held_lock().await
                        && current.id == held.id
                    {
                        self.unlock().await?;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    return Err(BackendError::InvalidState(format!(
                        "{} ({}); clear it with force-unlock",
                        e,
                        self.lock_path.display()
                    )));
                }
            }
        }
        match self.held_lock().await {
            Ok(Some(held)) => Err(BackendError::Locked(Box::new(held))),
            _ => Err(BackendError::InvalidState(format!(
                "could not take {}",
                self.lock_path.display()
            ))),
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        match self.held_lock().await? {
            None => Err(BackendError::LockNotFound(lock.id.clone())),
            Some(held) if held.id != lock.id => Err(BackendError::LockMismatch {
                requested: lock.id.clone(),
                held: held.id,
            }),
            Some(_) => self.unlock().await,
        }
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        match self.held_lock().await {
            Ok(None) => Err(BackendError::LockNotFound(lock_id.to_string())),
            Ok(Some(held)) if held.id != lock_id => Err(BackendError::LockMismatch {
                requested: lock_id.to_string(),
                held: held.id,
            }),
            // A corrupt lock file can only be cleared by force
            Ok(Some(_)) | Err(_) => self.unlock().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    const STACK: &str = "EcsMcpServerSampleStack";

    #[test]
    fn lock_sits_next_to_state() {
        let backend = LocalBackend::open("out/custom.state.json").unwrap();
        assert_eq!(backend.lock_path(), Path::new("out/custom.state.lock"));
        assert!(matches!(LocalBackend::open(""), Err(BackendError::EmptyPath)));
    }

    #[tokio::test]
    async fn state_survives_a_write_into_a_new_directory() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("nested/ecsmcp.state.json")).unwrap();
        assert!(backend.read_state().await.unwrap().is_none());

        let mut state = StateFile::new().for_stack(STACK);
        state.outputs.insert("LoadBalancerDNS".into(), "alb.elb.amazonaws.com".into());
        state.increment_serial();
        backend.write_state(&state).await.unwrap();

        let stored = backend.read_state().await.unwrap().unwrap();
        assert_eq!(stored.serial, 1);
        assert_eq!(stored.outputs["LoadBalancerDNS"], "alb.elb.amazonaws.com");
        assert!(!dir.path().join("nested/ecsmcp.state.json.tmp").exists());
    }

    #[tokio::test]
    async fn garbage_state_is_invalid() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("ecsmcp.state.json")).unwrap();
        std::fs::write(backend.state_path(), "{not json").unwrap();
        assert!(matches!(
            backend.read_state().await,
            Err(BackendError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn other_stacks_state_is_refused() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("ecsmcp.state.json")).unwrap();
        backend
            .write_state(&StateFile::new().for_stack("SomeOtherStack"))
            .await
            .unwrap();

        match backend.read_stack_state(STACK).await {
            Err(BackendError::StackMismatch { expected, actual }) => {
                assert_eq!(expected, STACK);
                assert_eq!(actual, "SomeOtherStack");
            }
            other => panic!("expected a stack mismatch, got {:?}", other.map(|s| s.serial)),
        }
    }

    #[tokio::test]
    async fn missing_state_starts_empty_for_the_stack() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("ecsmcp.state.json")).unwrap();
        let state = backend.read_stack_state(STACK).await.unwrap();
        assert_eq!(state.stack_name, STACK);
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn one_operation_at_a_time() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("ecsmcp.state.json")).unwrap();

        let apply = backend.acquire_lock(STACK, "apply").await.unwrap();
        match backend.acquire_lock(STACK, "destroy").await {
            Err(BackendError::Locked(held)) => assert_eq!(held.id, apply.id),
            other => panic!("expected Locked, got {:?}", other),
        }
        backend.release_lock(&apply).await.unwrap();

        let destroy = backend.acquire_lock(STACK, "destroy").await.unwrap();
        assert!(matches!(
            backend.release_lock(&apply).await,
            Err(BackendError::LockMismatch { .. })
        ));
        backend.release_lock(&destroy).await.unwrap();
        assert!(matches!(
            backend.release_lock(&destroy).await,
            Err(BackendError::LockNotFound(_))
        ));
    }

    #[tokio::test]
    async fn expired_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("ecsmcp.state.json")).unwrap();
        let stale = LockInfo::lasting(STACK, "apply", Duration::seconds(-1));
        std::fs::write(backend.lock_path(), serde_json::to_string(&stale).unwrap()).unwrap();

        let lock = backend.acquire_lock(STACK, "apply").await.unwrap();
        assert_ne!(lock.id, stale.id);
    }

    #[tokio::test]
    async fn unreadable_lock_is_not_taken_over() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("ecsmcp.state.json")).unwrap();
        std::fs::write(backend.lock_path(), "garbage").unwrap();

        assert!(matches!(
            backend.acquire_lock(STACK, "apply").await,
            Err(BackendError::InvalidState(_))
        ));
        assert_eq!(std::fs::read_to_string(backend.lock_path()).unwrap(), "garbage");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_operations_get_one_lock() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("nested/ecsmcp.state.json");

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let backend = LocalBackend::open(&state_path).unwrap();
                tokio::spawn(async move { backend.acquire_lock(STACK, "apply").await })
            })
            .collect();
        let mut acquired = Vec::new();
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(lock) => acquired.push(lock),
                Err(BackendError::Locked(_)) | Err(BackendError::InvalidState(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(acquired.len(), 1);

        let backend = LocalBackend::open(&state_path).unwrap();
        backend.release_lock(&acquired[0]).await.unwrap();
    }

    #[tokio::test]
    async fn force_unlock_needs_the_right_id() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("ecsmcp.state.json")).unwrap();
        assert!(matches!(
            backend.force_unlock("missing").await,
            Err(BackendError::LockNotFound(_))
        ));

        let lock = backend.acquire_lock(STACK, "apply").await.unwrap();
        assert!(backend.force_unlock("other-id").await.is_err());
        backend.force_unlock(&lock.id).await.unwrap();
        assert!(!backend.lock_path().exists());
    }

    #[tokio::test]
    async fn corrupt_lock_can_be_forced() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::open(dir.path().join("ecsmcp.state.json")).unwrap();
        std::fs::write(backend.lock_path(), "garbage").unwrap();
        backend.force_unlock("anything").await.unwrap();
        assert!(!backend.lock_path().exists());
    }
}
