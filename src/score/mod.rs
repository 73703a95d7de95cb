//! Score ledger: pure aggregate computation over append-only score events.

pub mod ledger;

pub use ledger::{MultiplierMap, ScoreLedger, multiplier_map, round_score, tournament_score};
