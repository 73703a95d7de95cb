//! Tournament entity models.
//!
//! Every stored document is a typed record here; status fields are tagged
//! enums rather than free-form strings, and field names serialize to the
//! camelCase document schema (`roundNumber`, `tableId`, ...).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tournament document ID
pub type TournamentId = String;
/// Player document ID
pub type PlayerId = String;
/// Table document ID
pub type TableId = String;
/// Round document ID
pub type RoundId = String;

/// Number of seats at every table
pub const TABLE_SIZE: usize = 4;

/// Tournament format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentType {
    /// Open-ended league play
    Standard,
    /// Fixed round count with elimination cutoffs
    Cutline,
}

impl std::fmt::Display for TournamentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentType::Standard => write!(f, "standard"),
            TournamentType::Cutline => write!(f, "cutline"),
        }
    }
}

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    /// Being set up, players importing
    Staging,
    /// Rounds running
    Active,
    /// Finished
    Completed,
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentStatus::Staging => write!(f, "staging"),
            TournamentStatus::Active => write!(f, "active"),
            TournamentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Round lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Staging,
    InProgress,
    Completed,
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundStatus::Staging => write!(f, "staging"),
            RoundStatus::InProgress => write!(f, "in_progress"),
            RoundStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Compass seat at a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Seat {
    East,
    South,
    West,
    North,
}

impl Seat {
    /// Seating order for a freshly created table
    pub const ORDER: [Seat; TABLE_SIZE] = [Seat::East, Seat::South, Seat::West, Seat::North];
}

impl std::fmt::Display for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Seat::East => write!(f, "East"),
            Seat::South => write!(f, "South"),
            Seat::West => write!(f, "West"),
            Seat::North => write!(f, "North"),
        }
    }
}

/// Tournament document
///
/// `current_round` and `round_in_progress` are mutated only by the round
/// lifecycle; `last_table_number` only by the table assigner. Invariant:
/// `round_in_progress` implies `current_round >= 1` and exactly one round
/// document with that number has status `in_progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    /// Display name
    pub name: String,
    /// Format
    #[serde(rename = "type")]
    pub tournament_type: TournamentType,
    /// Per-game timer in seconds
    pub timer_duration: u32,
    /// Player cap, 0 = unlimited
    pub max_players: u32,
    /// Total rounds; required > 0 for cutline tournaments
    pub total_rounds: u32,
    /// Lifecycle status
    pub status: TournamentStatus,
    /// Last started round number, 0 before the first round
    pub current_round: u32,
    /// Whether a round is currently in progress
    pub round_in_progress: bool,
    /// 4-character join code, case-insensitive unique across tournaments
    pub tournament_code: String,
    /// High-water mark for issued table numbers; numbers are never recycled
    #[serde(default)]
    pub last_table_number: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// One append-only ledger entry on a player
///
/// `round_number` is optional only because legacy imports may lack it; every
/// write path in this crate requires it. Events without a round number
/// silently zero round-level aggregates, which is what the repair module
/// flags and backfills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    /// Signed score delta
    pub delta: f64,
    /// Round the event was recorded in
    #[serde(default)]
    pub round_number: Option<u32>,
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,
}

/// Player document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Display name, unique per tournament (case-insensitive)
    pub name: String,
    /// Cumulative wins, floored at zero
    pub wins: i64,
    /// Cumulative points
    pub points: f64,
    /// Append-only score ledger
    #[serde(default)]
    pub score_events: Vec<ScoreEvent>,
    /// Timestamp of the most recent positive-delta game
    #[serde(default)]
    pub last_win_at: Option<DateTime<Utc>>,
    /// Current table, `None` while unassigned
    #[serde(default)]
    pub table_id: Option<TableId>,
    /// Seat at the current table, valid only while `table_id` is set
    #[serde(default)]
    pub position: Option<Seat>,
    /// Set once, never reverted
    #[serde(default)]
    pub eliminated: bool,
    /// Round in which the player was eliminated
    #[serde(default)]
    pub eliminated_in_round: Option<u32>,
    /// Registration timestamp
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
}

impl Player {
    /// A freshly imported player: no table, no scores, not eliminated
    pub fn new(name: impl Into<String>, registered_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            wins: 0,
            points: 0.0,
            score_events: Vec::new(),
            last_win_at: None,
            table_id: None,
            position: None,
            eliminated: false,
            eliminated_in_round: None,
            registered_at: Some(registered_at),
        }
    }

    /// Still in the running
    pub fn is_active(&self) -> bool {
        !self.eliminated
    }
}

/// Table document
///
/// Tables are replaced, never edited: reassignment deletes the old record and
/// creates a new one with a fresh, never-recycled table number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Strictly increasing per tournament
    pub table_number: u32,
    /// Exactly four distinct player IDs
    pub players: Vec<PlayerId>,
    /// Player ID to compass seat, bijective over `players`
    pub positions: BTreeMap<PlayerId, Seat>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Table {
    /// Build a table from an ordered group, seating players East first.
    pub fn seated(table_number: u32, players: Vec<PlayerId>, created_at: DateTime<Utc>) -> Self {
        let positions = players
            .iter()
            .zip(Seat::ORDER)
            .map(|(id, seat)| (id.clone(), seat))
            .collect();
        Self {
            table_number,
            players,
            positions,
            created_at,
        }
    }
}

/// Round document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    /// Unique per tournament, assigned as `current_round + 1` at creation
    pub round_number: u32,
    /// When the round started
    pub started_at: DateTime<Utc>,
    /// When the round ended; `None` while in progress
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: RoundStatus,
    /// Applied to all score deltas recorded in this round
    #[serde(default = "default_multiplier")]
    pub score_multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

/// Immutable snapshot of a player at round start, scoped to one round.
///
/// Baseline for "wins gained this round" and the authoritative record of
/// table membership for historical rounds, surviving later table deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Player this snapshot was taken from
    pub player_id: PlayerId,
    /// Name at snapshot time
    pub name: String,
    /// Wins at snapshot time
    pub wins: i64,
    /// Points at snapshot time
    pub points: f64,
    /// Table the player sat at when the round started
    #[serde(default)]
    pub table_id: Option<TableId>,
    /// Seat when the round started
    #[serde(default)]
    pub position: Option<Seat>,
    /// Last win at snapshot time
    #[serde(default)]
    pub last_win_at: Option<DateTime<Utc>>,
    /// When the snapshot was taken
    pub snapshot_at: DateTime<Utc>,
}

impl Participant {
    /// Snapshot a player's current state
    pub fn snapshot(player_id: &str, player: &Player, at: DateTime<Utc>) -> Self {
        Self {
            player_id: player_id.to_string(),
            name: player.name.clone(),
            wins: player.wins,
            points: player.points,
            table_id: player.table_id.clone(),
            position: player.position,
            last_win_at: player.last_win_at,
            snapshot_at: at,
        }
    }

    /// Wins gained since the snapshot was taken
    pub fn wins_gained(&self, current_wins: i64) -> i64 {
        current_wins - self.wins
    }
}
