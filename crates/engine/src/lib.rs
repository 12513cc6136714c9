//! The turn pipeline controller: owns the resolution lifecycle, runs
//! the round loop on a dedicated worker task, executes each turn inside
//! a transaction, interleaves legendary actions and reactions, and
//! fans events out to the observer without ever blocking on it.

pub mod control;
mod dispatch;
pub mod observer;
pub mod pipeline;
pub mod transaction;
mod worker;

pub use control::ResolutionStatus;
pub use observer::Observer;
pub use pipeline::{ResolutionEngine, ResolutionHandle, ResolutionMode};
pub use transaction::Transaction;
