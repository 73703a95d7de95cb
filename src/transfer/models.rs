//! Export file format.
//!
//! A self-contained JSON snapshot of one tournament: the tournament record
//! plus every player, table, and round, with each round's participant
//! snapshots embedded. Document IDs are carried alongside the records so an
//! import can rebuild cross-references under freshly minted IDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StoreResult;
use crate::tournament::models::{
    Participant, Player, PlayerId, Round, RoundId, Table, TableId, Tournament, TournamentId,
};

/// Format version written by [`super::StateTransfer::export`].
pub const EXPORT_VERSION: &str = "1.0";

/// A player record with its document ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedPlayer {
    pub id: PlayerId,
    #[serde(flatten)]
    pub player: Player,
}

/// A table record with its document ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedTable {
    pub id: TableId,
    #[serde(flatten)]
    pub table: Table,
}

/// A participant snapshot with its document ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedParticipant {
    pub id: String,
    #[serde(flatten)]
    pub participant: Participant,
}

/// A round record with its document ID and participant snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedRound {
    pub id: RoundId,
    #[serde(flatten)]
    pub round: Round,
    #[serde(default)]
    pub participants: Vec<ExportedParticipant>,
}

/// Complete snapshot of one tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentExport {
    /// Format version, checked on import
    pub export_version: String,
    /// When the snapshot was taken
    pub exported_at: DateTime<Utc>,
    /// Source tournament document ID
    pub tournament_id: TournamentId,
    /// Tournament record
    pub tournament: Tournament,
    pub players: Vec<ExportedPlayer>,
    pub tables: Vec<ExportedTable>,
    pub rounds: Vec<ExportedRound>,
}

impl TournamentExport {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
