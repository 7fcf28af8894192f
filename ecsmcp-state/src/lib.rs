//! Persisted state of a deployed stack
//!
//! An apply records every resource it touched, keyed by type and logical id,
//! together with the stack outputs it resolved. `plan` diffs against that
//! record and `destroy` walks it in reverse dependency order.
//!
//! ```ignore
//! use ecsmcp_state::{LocalBackend, StateBackend};
//!
//! let backend = LocalBackend::open("ecsmcp.state.json")?;
//! let lock = backend.acquire_lock("EcsMcpServerSampleStack", "apply").await?;
//! let mut state = backend.read_stack_state("EcsMcpServerSampleStack").await?;
//! // ... apply, then state.record(..) each outcome ...
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod local;
pub mod lock;
pub mod state;

pub use backend::{BackendError, BackendResult, StateBackend};
pub use local::LocalBackend;
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
