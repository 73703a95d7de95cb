//! Tournament administration: creation, player import, elimination, deletion.

use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};
use rand::Rng;
use serde_json::json;

use super::errors::{EngineError, EngineResult};
use super::models::{Player, Tournament, TournamentStatus, TournamentType};
use super::{load_players, load_rounds, load_tables, load_tournament};
use crate::store::{self, DocumentStore, WriteBatch, paths};

/// Join codes skip easily confused characters (I, L, O, 0, 1).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 4;
const CODE_ATTEMPTS: usize = 64;

/// Parameters for a new tournament
#[derive(Debug, Clone)]
pub struct TournamentConfig {
    /// Display name
    pub name: String,
    /// Format
    pub tournament_type: TournamentType,
    /// Per-game timer in seconds
    pub timer_duration: u32,
    /// Player cap, 0 = unlimited
    pub max_players: u32,
    /// Total rounds; required > 0 for cutline tournaments
    pub total_rounds: u32,
}

impl TournamentConfig {
    /// Open-ended standard tournament
    pub fn standard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tournament_type: TournamentType::Standard,
            timer_duration: 5,
            max_players: 0,
            total_rounds: 0,
        }
    }

    /// Cutline tournament with a fixed round count
    pub fn cutline(name: impl Into<String>, total_rounds: u32) -> Self {
        Self {
            name: name.into(),
            tournament_type: TournamentType::Cutline,
            timer_duration: 5,
            max_players: 0,
            total_rounds,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> EngineResult<()> {
        if self.tournament_type == TournamentType::Cutline && self.total_rounds == 0 {
            return Err(EngineError::MissingTotalRounds);
        }
        Ok(())
    }
}

/// Result of a bulk player import
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// IDs of created player documents, in input order
    pub imported: Vec<String>,
    /// Names skipped (duplicates or over capacity)
    pub skipped: Vec<String>,
}

/// Allocate a 4-character join code unique across all tournaments
/// (case-insensitive), retrying a bounded number of times.
pub(crate) async fn allocate_code(store: &dyn DocumentStore) -> EngineResult<String> {
    let tournaments: Vec<store::Doc<Tournament>> =
        store::list_as(store, paths::TOURNAMENTS).await?;
    let taken: HashSet<String> = tournaments
        .iter()
        .map(|t| t.data.tournament_code.to_uppercase())
        .collect();

    let mut rng = rand::rng();
    for _ in 0..CODE_ATTEMPTS {
        let code: String = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        if !taken.contains(&code) {
            return Ok(code);
        }
    }
    Err(EngineError::CodeExhausted)
}

/// Tournament administration manager
#[derive(Clone)]
pub struct TournamentManager {
    store: Arc<dyn DocumentStore>,
}

impl TournamentManager {
    /// Create a new tournament manager
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a tournament with a freshly allocated join code.
    ///
    /// The code is 4 characters, unique across all tournaments
    /// (case-insensitive). Allocation retries a bounded number of times
    /// before giving up with `CodeExhausted`.
    pub async fn create_tournament(&self, config: TournamentConfig) -> EngineResult<String> {
        config.validate()?;

        let code = allocate_code(self.store.as_ref()).await?;
        let tournament = Tournament {
            name: config.name.clone(),
            tournament_type: config.tournament_type,
            timer_duration: config.timer_duration,
            max_players: config.max_players,
            total_rounds: config.total_rounds,
            status: TournamentStatus::Staging,
            current_round: 0,
            round_in_progress: false,
            tournament_code: code.clone(),
            last_table_number: 0,
            created_at: self.store.server_timestamp(),
        };

        let id = self.store.new_id();
        self.store
            .set(paths::TOURNAMENTS, &id, store::to_document(&tournament)?)
            .await?;

        info!(
            "Created tournament '{}' ({}) with code {code}",
            config.name, id
        );
        Ok(id)
    }

    /// Add a single player, failing on a duplicate name.
    pub async fn add_player(&self, tournament_id: &str, name: &str) -> EngineResult<String> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;
        let players = load_players(self.store.as_ref(), tournament_id).await?;

        if players
            .iter()
            .any(|p| p.data.name.eq_ignore_ascii_case(name))
        {
            return Err(EngineError::DuplicateName(name.to_string()));
        }
        if tournament.max_players > 0 && players.len() as u32 >= tournament.max_players {
            return Err(EngineError::TournamentFull(tournament.max_players));
        }

        let player = Player::new(name, self.store.server_timestamp());
        let id = self.store.new_id();
        self.store
            .set(
                &paths::players(tournament_id),
                &id,
                store::to_document(&player)?,
            )
            .await?;
        Ok(id)
    }

    /// Bulk import players by name.
    ///
    /// Names duplicated within the batch or already present in the
    /// tournament (case-insensitive) are skipped, as are names beyond the
    /// tournament's player cap. The outcome reports both sets; nothing here
    /// is fatal unless the tournament is already full.
    pub async fn import_players(
        &self,
        tournament_id: &str,
        names: &[String],
    ) -> EngineResult<ImportOutcome> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;
        let existing = load_players(self.store.as_ref(), tournament_id).await?;

        let mut seen: HashSet<String> = existing
            .iter()
            .map(|p| p.data.name.to_lowercase())
            .collect();

        let mut fresh: Vec<String> = Vec::new();
        let mut outcome = ImportOutcome::default();
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.to_lowercase()) {
                fresh.push(name.to_string());
            } else {
                outcome.skipped.push(name.to_string());
            }
        }

        let capacity = if tournament.max_players > 0 {
            let available = tournament.max_players as usize - existing.len().min(tournament.max_players as usize);
            if available == 0 {
                return Err(EngineError::TournamentFull(tournament.max_players));
            }
            available
        } else {
            fresh.len()
        };

        if fresh.len() > capacity {
            warn!(
                "Tournament {tournament_id} has {capacity} open slot(s); skipping {} name(s)",
                fresh.len() - capacity
            );
            for name in fresh.drain(capacity..) {
                outcome.skipped.push(name);
            }
        }

        let collection = paths::players(tournament_id);
        let now = self.store.server_timestamp();
        let mut batch = WriteBatch::new();
        let mut ids = Vec::with_capacity(fresh.len());
        for name in &fresh {
            let id = self.store.new_id();
            batch.set(
                collection.clone(),
                id.clone(),
                store::to_document(&Player::new(name.clone(), now))?,
            );
            ids.push(id);
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }

        info!(
            "Imported {} player(s) into {tournament_id} ({} skipped)",
            ids.len(),
            outcome.skipped.len()
        );
        outcome.imported = ids;
        Ok(outcome)
    }

    /// Eliminate a player from the running.
    ///
    /// Sets `eliminated` and `eliminatedInRound`, and clears any table
    /// assignment in the same batch (eliminated players never hold a table).
    /// Elimination is one-way; a second call fails.
    pub async fn eliminate_player(
        &self,
        tournament_id: &str,
        player_id: &str,
    ) -> EngineResult<()> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;
        let collection = paths::players(tournament_id);
        let player = store::get_as::<Player>(self.store.as_ref(), &collection, player_id)
            .await?
            .ok_or_else(|| EngineError::PlayerNotFound(player_id.to_string()))?;

        if player.data.eliminated {
            return Err(EngineError::AlreadyEliminated(player.data.name));
        }

        let mut batch = WriteBatch::new();
        batch.require_field(collection.clone(), player_id, "eliminated", json!(false));
        batch.update(
            collection,
            player_id,
            store::to_document(&json!({
                "eliminated": true,
                "eliminatedInRound": tournament.current_round,
                "tableId": null,
                "position": null,
            }))?,
        );
        self.store.commit(batch).await?;

        info!(
            "Eliminated '{}' from {tournament_id} in round {}",
            player.data.name, tournament.current_round
        );
        Ok(())
    }

    /// Delete a tournament and everything under it, atomically.
    pub async fn delete_tournament(&self, tournament_id: &str) -> EngineResult<()> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;

        let players = load_players(self.store.as_ref(), tournament_id).await?;
        let tables = load_tables(self.store.as_ref(), tournament_id).await?;
        let rounds = load_rounds(self.store.as_ref(), tournament_id).await?;

        let mut batch = WriteBatch::new();
        for round in &rounds {
            let participants = self
                .store
                .list(&paths::participants(tournament_id, &round.id))
                .await?;
            for (participant_id, _) in participants {
                batch.delete(
                    paths::participants(tournament_id, &round.id),
                    participant_id,
                );
            }
            batch.delete(paths::rounds(tournament_id), round.id.clone());
        }
        for table in &tables {
            batch.delete(paths::tables(tournament_id), table.id.clone());
        }
        for player in &players {
            batch.delete(paths::players(tournament_id), player.id.clone());
        }
        batch.delete(paths::TOURNAMENTS, tournament_id);
        self.store.commit(batch).await?;

        info!(
            "Deleted tournament '{}' ({}): {} players, {} tables, {} rounds",
            tournament.name,
            tournament_id,
            players.len(),
            tables.len(),
            rounds.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manager() -> (Arc<MemoryStore>, TournamentManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = TournamentManager::new(store.clone());
        (store, manager)
    }

    #[test]
    fn test_cutline_config_requires_total_rounds() {
        let mut config = TournamentConfig::cutline("Championship", 4);
        assert!(config.validate().is_ok());

        config.total_rounds = 0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::MissingTotalRounds)
        ));
    }

    #[tokio::test]
    async fn test_create_tournament_allocates_code() {
        let (store, manager) = manager();
        let id = manager
            .create_tournament(TournamentConfig::standard("Spring League"))
            .await
            .unwrap();

        let tournament = load_tournament(store.as_ref(), &id).await.unwrap();
        assert_eq!(tournament.name, "Spring League");
        assert_eq!(tournament.status, TournamentStatus::Staging);
        assert_eq!(tournament.current_round, 0);
        assert!(!tournament.round_in_progress);
        assert_eq!(tournament.tournament_code.len(), 4);
        assert!(
            tournament
                .tournament_code
                .chars()
                .all(|c| CODE_ALPHABET.contains(&(c as u8)))
        );
    }

    #[tokio::test]
    async fn test_codes_are_unique_across_tournaments() {
        let (store, manager) = manager();
        let mut codes = HashSet::new();
        for i in 0..10 {
            let id = manager
                .create_tournament(TournamentConfig::standard(format!("League {i}")))
                .await
                .unwrap();
            let tournament = load_tournament(store.as_ref(), &id).await.unwrap();
            assert!(codes.insert(tournament.tournament_code.to_uppercase()));
        }
    }

    #[tokio::test]
    async fn test_import_skips_duplicates_case_insensitively() {
        let (store, manager) = manager();
        let id = manager
            .create_tournament(TournamentConfig::standard("League"))
            .await
            .unwrap();

        let names: Vec<String> = ["Aki", "Botan", "aki", "Chie"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let outcome = manager.import_players(&id, &names).await.unwrap();
        assert_eq!(outcome.imported.len(), 3);
        assert_eq!(outcome.skipped, vec!["aki".to_string()]);

        // Re-importing an existing name skips it too.
        let outcome = manager
            .import_players(&id, &["BOTAN".to_string(), "Daigo".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome.imported.len(), 1);
        assert_eq!(outcome.skipped, vec!["BOTAN".to_string()]);

        let players = load_players(store.as_ref(), &id).await.unwrap();
        assert_eq!(players.len(), 4);
    }

    #[tokio::test]
    async fn test_import_respects_player_cap() {
        let (_, manager) = manager();
        let mut config = TournamentConfig::standard("Small League");
        config.max_players = 4;
        let id = manager.create_tournament(config).await.unwrap();

        let names: Vec<String> = (0..6).map(|i| format!("Player {i}")).collect();
        let outcome = manager.import_players(&id, &names).await.unwrap();
        assert_eq!(outcome.imported.len(), 4);
        assert_eq!(outcome.skipped.len(), 2);

        // Full tournament rejects further imports outright.
        let result = manager
            .import_players(&id, &["Overflow".to_string()])
            .await;
        assert!(matches!(result, Err(EngineError::TournamentFull(4))));
    }

    #[tokio::test]
    async fn test_add_player_rejects_duplicate_name() {
        let (_, manager) = manager();
        let id = manager
            .create_tournament(TournamentConfig::standard("League"))
            .await
            .unwrap();

        manager.add_player(&id, "Aki").await.unwrap();
        let result = manager.add_player(&id, "AKI").await;
        assert!(matches!(result, Err(EngineError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn test_eliminate_player_clears_table_and_is_one_way() {
        let (store, manager) = manager();
        let id = manager
            .create_tournament(TournamentConfig::standard("League"))
            .await
            .unwrap();
        let player_id = manager.add_player(&id, "Aki").await.unwrap();

        // Seat the player somewhere first.
        store
            .update(
                &paths::players(&id),
                &player_id,
                store::to_document(&json!({"tableId": "tbl-1", "position": "East"})).unwrap(),
            )
            .await
            .unwrap();

        manager.eliminate_player(&id, &player_id).await.unwrap();

        let player = store::get_as::<Player>(store.as_ref(), &paths::players(&id), &player_id)
            .await
            .unwrap()
            .unwrap();
        assert!(player.data.eliminated);
        assert_eq!(player.data.eliminated_in_round, Some(0));
        assert_eq!(player.data.table_id, None);
        assert_eq!(player.data.position, None);

        let result = manager.eliminate_player(&id, &player_id).await;
        assert!(matches!(result, Err(EngineError::AlreadyEliminated(_))));
    }

    #[tokio::test]
    async fn test_delete_tournament_cascades() {
        let (store, manager) = manager();
        let id = manager
            .create_tournament(TournamentConfig::standard("League"))
            .await
            .unwrap();
        manager
            .import_players(&id, &["Aki".to_string(), "Botan".to_string()])
            .await
            .unwrap();

        manager.delete_tournament(&id).await.unwrap();

        assert!(
            store
                .get(paths::TOURNAMENTS, &id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(store.list(&paths::players(&id)).await.unwrap().is_empty());
    }
}
