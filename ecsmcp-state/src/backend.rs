//! Where state lives, and what can go wrong there

use async_trait::async_trait;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("State is locked: {0}")]
    Locked(Box<LockInfo>),

    #[error("No lock with ID {0} is held")]
    LockNotFound(String),

    #[error("Lock {requested} is not the held lock {held}")]
    LockMismatch { requested: String, held: String },

    #[error("State path must not be empty")]
    EmptyPath,

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    #[error("State belongs to stack '{actual}', not '{expected}'")]
    StackMismatch { expected: String, actual: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for a stack's state file and its lock
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// `None` until the first apply
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Callers bump the serial first
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Fails while another live lock is held; an expired one is taken over
    async fn acquire_lock(&self, stack: &str, operation: &str) -> BackendResult<LockInfo>;

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Drop the lock with `lock_id` whoever holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;

    /// State of `stack`, refusing state recorded for another stack
    async fn read_stack_state(&self, stack: &str) -> BackendResult<StateFile> {
        match self.read_state().await? {
            Some(state) if !state.stack_name.is_empty() && state.stack_name != stack => {
                Err(BackendError::StackMismatch {
                    expected: stack.to_string(),
                    actual: state.stack_name,
                })
            }
            Some(state) => Ok(state),
            None => Ok(StateFile::new().for_stack(stack)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_error_describes_holder() {
        let lock = LockInfo::new("Stack", "apply");
        let message = BackendError::Locked(Box::new(lock.clone())).to_string();
        assert!(message.starts_with("State is locked: apply of Stack"));
        assert!(message.contains(&lock.id));
    }

    #[test]
    fn io_errors_keep_context() {
        let error = BackendError::io("Failed to read state file")(std::io::Error::other("denied"));
        assert_eq!(error.to_string(), "Failed to read state file: denied");
    }
}
