//! Exporting a tournament to a snapshot and importing one back.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::info;

use super::models::{
    EXPORT_VERSION, ExportedParticipant, ExportedPlayer, ExportedRound, ExportedTable,
    TournamentExport,
};
use crate::store::{self, DocumentStore, WriteBatch, paths};
use crate::tournament::errors::{EngineError, EngineResult};
use crate::tournament::manager::allocate_code;
use crate::tournament::models::{Seat, TournamentId};
use crate::tournament::{
    load_participants, load_players, load_rounds, load_tables, load_tournament,
};

/// Counts of what an import created
#[derive(Debug, Clone)]
pub struct ImportResult {
    /// Created tournament document ID
    pub tournament_id: TournamentId,
    pub players: usize,
    pub tables: usize,
    pub rounds: usize,
    pub participants: usize,
}

/// Moves whole tournaments in and out of the store.
#[derive(Clone)]
pub struct StateTransfer {
    store: Arc<dyn DocumentStore>,
}

impl StateTransfer {
    /// Create a new state transfer manager
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Snapshot a tournament and everything under it.
    pub async fn export(&self, tournament_id: &str) -> EngineResult<TournamentExport> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;
        let players = load_players(self.store.as_ref(), tournament_id).await?;
        let tables = load_tables(self.store.as_ref(), tournament_id).await?;
        let rounds = load_rounds(self.store.as_ref(), tournament_id).await?;

        let mut exported_rounds = Vec::with_capacity(rounds.len());
        for round in rounds {
            let participants =
                load_participants(self.store.as_ref(), tournament_id, &round.id).await?;
            exported_rounds.push(ExportedRound {
                id: round.id,
                round: round.data,
                participants: participants
                    .into_iter()
                    .map(|p| ExportedParticipant {
                        id: p.id,
                        participant: p.data,
                    })
                    .collect(),
            });
        }

        info!(
            "Exported tournament '{}' ({tournament_id}): {} players, {} tables, {} rounds",
            tournament.name,
            players.len(),
            tables.len(),
            exported_rounds.len()
        );
        Ok(TournamentExport {
            export_version: EXPORT_VERSION.to_string(),
            exported_at: self.store.server_timestamp(),
            tournament_id: tournament_id.to_string(),
            tournament,
            players: players
                .into_iter()
                .map(|p| ExportedPlayer {
                    id: p.id,
                    player: p.data,
                })
                .collect(),
            tables: tables
                .into_iter()
                .map(|t| ExportedTable {
                    id: t.id,
                    table: t.data,
                })
                .collect(),
            rounds: exported_rounds,
        })
    }

    /// Restore a snapshot as a new tournament, atomically.
    ///
    /// Every document gets a freshly minted ID; cross-references (player to
    /// table, table to players, participant to both) are rewritten through
    /// the ID maps. A reference to an ID the snapshot does not contain is
    /// kept verbatim so a partial snapshot stays importable. Timestamps are
    /// preserved from the snapshot, and the new tournament gets its own
    /// join code.
    pub async fn import(&self, export: &TournamentExport) -> EngineResult<ImportResult> {
        if export.export_version != EXPORT_VERSION {
            return Err(EngineError::UnsupportedExportVersion(
                export.export_version.clone(),
            ));
        }

        let tournament_id = self.store.new_id();
        let player_ids: HashMap<&str, String> = export
            .players
            .iter()
            .map(|p| (p.id.as_str(), self.store.new_id()))
            .collect();
        let table_ids: HashMap<&str, String> = export
            .tables
            .iter()
            .map(|t| (t.id.as_str(), self.store.new_id()))
            .collect();

        let remap = |map: &HashMap<&str, String>, id: &String| {
            map.get(id.as_str()).cloned().unwrap_or_else(|| id.clone())
        };

        let mut batch = WriteBatch::new();

        let mut tournament = export.tournament.clone();
        tournament.tournament_code = allocate_code(self.store.as_ref()).await?;
        batch.set(
            paths::TOURNAMENTS,
            tournament_id.clone(),
            store::to_document(&tournament)?,
        );

        for entry in &export.players {
            let mut player = entry.player.clone();
            player.table_id = player.table_id.as_ref().map(|t| remap(&table_ids, t));
            batch.set(
                paths::players(&tournament_id),
                player_ids[entry.id.as_str()].clone(),
                store::to_document(&player)?,
            );
        }

        for entry in &export.tables {
            let mut table = entry.table.clone();
            table.players = table
                .players
                .iter()
                .map(|p| remap(&player_ids, p))
                .collect();
            table.positions = table
                .positions
                .iter()
                .map(|(p, seat)| (remap(&player_ids, p), *seat))
                .collect::<BTreeMap<String, Seat>>();
            batch.set(
                paths::tables(&tournament_id),
                table_ids[entry.id.as_str()].clone(),
                store::to_document(&table)?,
            );
        }

        let mut participant_count = 0;
        for entry in &export.rounds {
            let round_id = self.store.new_id();
            batch.set(
                paths::rounds(&tournament_id),
                round_id.clone(),
                store::to_document(&entry.round)?,
            );
            for snapshot in &entry.participants {
                let mut participant = snapshot.participant.clone();
                participant.player_id = remap(&player_ids, &participant.player_id);
                participant.table_id =
                    participant.table_id.as_ref().map(|t| remap(&table_ids, t));
                batch.set(
                    paths::participants(&tournament_id, &round_id),
                    self.store.new_id(),
                    store::to_document(&participant)?,
                );
                participant_count += 1;
            }
        }

        self.store.commit(batch).await?;

        info!(
            "Imported tournament '{}' as {tournament_id}: {} players, {} tables, {} rounds",
            export.tournament.name,
            export.players.len(),
            export.tables.len(),
            export.rounds.len()
        );
        Ok(ImportResult {
            tournament_id,
            players: export.players.len(),
            tables: export.tables.len(),
            rounds: export.rounds.len(),
            participants: participant_count,
        })
    }
}
