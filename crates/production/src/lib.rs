//! Machine queue scheduler.
//!
//! Machines, their ordered job queues and maintenance counters, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod fleet;
pub mod machine;
pub mod queue;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use fleet::Fleet;
pub use machine::{Machine, MachinePatch, MachineStatus, NewMachine, normalize_materials};
pub use queue::{Direction, Job, JobQueue, NewJob};

/// Length of the "next 24 hours" capacity window, in minutes.
pub const WINDOW_24H_MINUTES: f64 = 24.0 * 60.0;

/// Length of the "next 72 hours" capacity window, in minutes.
pub const WINDOW_72H_MINUTES: f64 = 72.0 * 60.0;
