//! Engine error and integrity warning types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::StoreError;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Tournament document absent
    #[error("Tournament not found: {0}")]
    TournamentNotFound(String),

    /// Player document absent
    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    /// The in-progress round document the tournament flags point at is missing
    #[error("No in-progress round document for round {0}")]
    RoundDocMissing(u32),

    /// A round is already running
    #[error("Round {0} is already in progress")]
    RoundInProgress(u32),

    /// No round is running
    #[error("No round is in progress")]
    NoRoundInProgress,

    /// Round start with zero active players
    #[error("No active players")]
    NoActivePlayers,

    /// Round start with a partial table
    #[error("Active player count {0} is not divisible by 4")]
    UnevenPlayerCount(usize),

    /// Table assignment needs at least one full table
    #[error("Need at least 4 eligible players, have {0}")]
    NotEnoughPlayers(usize),

    /// Player name uniqueness violation (case-insensitive)
    #[error("Player name already taken: {0}")]
    DuplicateName(String),

    /// Player already eliminated; elimination is set once and never reverted
    #[error("Player already eliminated: {0}")]
    AlreadyEliminated(String),

    /// Could not generate an unused tournament code
    #[error("Could not allocate a unique tournament code")]
    CodeExhausted,

    /// Cutline tournaments need a fixed round count
    #[error("Cutline tournaments require totalRounds > 0")]
    MissingTotalRounds,

    /// Player cap reached
    #[error("Tournament is at maximum capacity ({0})")]
    TournamentFull(u32),

    /// Score event write without a valid round number
    #[error("Score events must carry a round number of 1 or greater")]
    MissingRoundNumber,

    /// Export document from an unknown format version
    #[error("Unsupported export version: {0}")]
    UnsupportedExportVersion(String),

    /// Storage error
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Non-fatal data integrity finding.
///
/// Surfaced to the caller but never blocks an operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityWarning {
    /// Player points at a table document that no longer exists
    #[error("Player '{player_name}' ({player_id}) assigned to non-existent table {table_id}")]
    OrphanTableRef {
        player_id: String,
        player_name: String,
        table_id: String,
    },

    /// Table references a player document that no longer exists
    #[error("Table {table_number} references non-existent player {player_id}")]
    OrphanPlayerRef { table_number: u32, player_id: String },

    /// Ledger entry with no round number; zeroes round-level aggregates
    #[error("Player '{player_name}' ({player_id}): score event #{index} has no round number")]
    EventMissingRound {
        player_id: String,
        player_name: String,
        index: usize,
    },

    /// Ledger entry tagged with a round that does not exist
    #[error("Player '{player_name}' ({player_id}): score event #{index} references unknown round {round_number}")]
    EventUnknownRound {
        player_id: String,
        player_name: String,
        index: usize,
        round_number: u32,
    },

    /// Denormalized win counter disagrees with the ledger sum
    #[error("Player '{player_name}' ({player_id}): wins is {wins} but ledger total is {ledger_total}")]
    WinsMismatch {
        player_id: String,
        player_name: String,
        wins: i64,
        ledger_total: f64,
    },

    /// Eliminated player still holds a table assignment
    #[error("Eliminated player '{player_name}' ({player_id}) still holds table {table_id}")]
    EliminatedAtTable {
        player_id: String,
        player_name: String,
        table_id: String,
    },

    /// Ledger entry timestamped outside every round window
    #[error("Player '{player_name}' ({player_id}): event at {timestamp} matches no round window")]
    EventOutsideRounds {
        player_id: String,
        player_name: String,
        timestamp: DateTime<Utc>,
    },
}
