//! Data integrity scanning and ledger repair.

pub mod checker;

pub use checker::{BackfillReport, IntegrityChecker, IntegrityReport};
