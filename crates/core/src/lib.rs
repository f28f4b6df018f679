//! Core types, sanitization, and session folding for the analytics pipeline.

pub mod error;
pub mod events;
pub mod job;
pub mod limits;
pub mod queue;
pub mod retention;
pub mod sanitize;
pub mod session;
pub mod store;
pub mod tenant;

pub use error::{Error, Result, StoreErrorCode, TenantErrorCode, ValidationErrorCode};
pub use events::*;
pub use job::{Job, Priority};
pub use queue::{Checkpoint, JobBatch, JobQueue, JobSource, LaneOffset, MemoryQueue};
pub use retention::*;
pub use sanitize::{sanitize, Rejection};
pub use session::*;
pub use store::{EventStore, MemoryEventStore, MemorySessionStore, SessionStore};
pub use tenant::*;
