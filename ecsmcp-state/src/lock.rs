//! State locks
//!
//! A lock names the stack and the operation holding it. It lapses on its own
//! after [`LOCK_TTL_MINUTES`] so a crashed apply cannot wedge the stack.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const LOCK_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    pub stack: String,
    /// `apply`, `destroy`
    pub operation: String,
    /// user@host
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(stack: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::lasting(stack, operation, Duration::minutes(LOCK_TTL_MINUTES))
    }

    pub fn lasting(stack: impl Into<String>, operation: impl Into<String>, ttl: Duration) -> Self {
        let acquired_at = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stack: stack.into(),
            operation: operation.into(),
            holder: holder(),
            acquired_at,
            expires_at: acquired_at + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} by {} (lock ID: {}, expires {})",
            self.operation,
            self.stack,
            self.holder,
            self.id,
            self.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

fn holder() -> String {
    let user = ["USER", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .unwrap_or_else(|| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_lock_is_live_for_fifteen_minutes() {
        let lock = LockInfo::new("EcsMcpServerSampleStack", "apply");
        assert!(!lock.is_expired());
        assert_eq!(lock.expires_at - lock.acquired_at, Duration::minutes(15));
        assert!(lock.holder.contains('@'));
    }

    #[test]
    fn lapsed_lock_is_expired() {
        let lock = LockInfo::lasting("Stack", "destroy", Duration::seconds(-1));
        assert!(lock.is_expired());
    }

    #[test]
    fn display_names_stack_and_operation() {
        let lock = LockInfo::new("Stack", "destroy");
        let text = lock.to_string();
        assert!(text.starts_with("destroy of Stack by "));
        assert!(text.contains(&lock.id));
    }
}
