//! Round lifecycle: the state machine governing round progression.

pub mod lifecycle;

pub use lifecycle::{RoundLifecycle, RoundSummary};
