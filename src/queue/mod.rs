//! The matchmaking queue
//!
//! Enrollment, FIFO pairing of the two earliest live entries, and
//! self-healing removal of stale entries.

pub mod clock;
pub mod coordinator;
pub mod records;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CoordinatorStats, QueueCoordinator, QueueSettings, DEFAULT_ENTRY_TTL};
pub use records::{PlayerRecord, QueueKeys};
