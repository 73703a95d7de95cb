//! Deterministic standings computation.

pub mod engine;

pub use engine::{RankingEngine, Standing, compute_standings, sort_players_by_rank};
