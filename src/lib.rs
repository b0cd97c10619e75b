//! Single-threaded packet relay queue.
//!
//! A [`DeliveryQueue`] sits between a sending endpoint and a [`Deliver`] capability that
//! moves packets toward their destination. When the destination pushes back, packets
//! are buffered in strict FIFO order and replayed by [`DeliveryQueue::flush`].
//!
//! ```text
//!  sender ──send──▶ ┌───────────────┐ ──deliver──▶ capability
//!                   │ DeliveryQueue │
//!                   │   backlog     │ ◀──flush──── capability (ready again)
//!                   └───────────────┘
//! ```

pub mod capability;
pub mod config;
mod guard;
pub mod monitor;
pub mod outcome;
pub mod packet;
pub mod queue;
pub mod stats;

pub use capability::{
    AlwaysReady, Completion, Deliver, DeliverFn, Readiness, ReadyFn, deliver_fn, ready_fn,
};
pub use config::{ConfigError, DEFAULT_CAPACITY, MonitorConfig, QueueConfig};
pub use monitor::{Monitor, RateReport};
pub use outcome::Outcome;
pub use packet::{PacketFlags, iov_len};
pub use queue::{DeliveryQueue, EnqueuePolicy};
pub use stats::QueueStats;
