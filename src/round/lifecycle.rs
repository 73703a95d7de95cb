//! Round state machine: start, end, and in-round game recording.
//!
//! A tournament moves `no-round` -> `in_progress` -> `completed` and back
//! around for each subsequent round. Starting a round snapshots every active
//! player as an immutable participant and flips the tournament's progress
//! flags in the same atomic batch; a partial snapshot would desynchronize
//! every later ranking baseline, so it can never happen.

use std::sync::Arc;

use log::info;
use serde_json::json;

use crate::score;
use crate::store::{self, DocumentStore, StoreError, WriteBatch, paths};
use crate::tournament::errors::{EngineError, EngineResult};
use crate::tournament::models::{
    Participant, Player, Round, RoundStatus, ScoreEvent, TABLE_SIZE, TournamentStatus,
};
use crate::tournament::{load_players, load_rounds, load_tournament};

/// Retries for a negative correction whose wins guard lost a commit race.
const CORRECTION_ATTEMPTS: usize = 5;

/// Outcome of a successful round start
#[derive(Debug, Clone)]
pub struct RoundSummary {
    /// Created round document ID
    pub round_id: String,
    /// Round number, `previous current_round + 1`
    pub round_number: u32,
    /// Number of participant snapshots taken
    pub participants: usize,
    /// Number of full tables implied by the participant count
    pub tables: usize,
}

/// Round progression state machine
#[derive(Clone)]
pub struct RoundLifecycle {
    store: Arc<dyn DocumentStore>,
}

impl RoundLifecycle {
    /// Create a new round lifecycle manager
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Start the next round with the default score multiplier.
    pub async fn start(&self, tournament_id: &str) -> EngineResult<RoundSummary> {
        self.start_with_multiplier(tournament_id, 1.0).await
    }

    /// Start the next round.
    ///
    /// Preconditions: no round in progress, and the active player count is a
    /// positive multiple of four (the engine never starts a round with a
    /// partial table). The round document, every participant snapshot, and
    /// the tournament flag flip commit in one batch, guarded by a
    /// `roundInProgress == false` precondition so a concurrent double start
    /// fails fast instead of double-snapshotting.
    pub async fn start_with_multiplier(
        &self,
        tournament_id: &str,
        score_multiplier: f64,
    ) -> EngineResult<RoundSummary> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;
        if tournament.round_in_progress {
            return Err(EngineError::RoundInProgress(tournament.current_round));
        }

        let players = load_players(self.store.as_ref(), tournament_id).await?;
        let active: Vec<_> = players.into_iter().filter(|p| p.data.is_active()).collect();
        if active.is_empty() {
            return Err(EngineError::NoActivePlayers);
        }
        if active.len() % TABLE_SIZE != 0 {
            return Err(EngineError::UnevenPlayerCount(active.len()));
        }

        let round_number = tournament.current_round + 1;
        let now = self.store.server_timestamp();
        let round = Round {
            round_number,
            started_at: now,
            ended_at: None,
            status: RoundStatus::InProgress,
            score_multiplier,
        };

        let round_id = self.store.new_id();
        let mut batch = WriteBatch::new();
        batch.require_field(
            paths::TOURNAMENTS,
            tournament_id,
            "roundInProgress",
            json!(false),
        );
        batch.set(
            paths::rounds(tournament_id),
            round_id.clone(),
            store::to_document(&round)?,
        );

        let participants_collection = paths::participants(tournament_id, &round_id);
        for player in &active {
            let snapshot = Participant::snapshot(&player.id, &player.data, now);
            batch.set(
                participants_collection.clone(),
                self.store.new_id(),
                store::to_document(&snapshot)?,
            );
        }

        batch.update(
            paths::TOURNAMENTS,
            tournament_id,
            store::to_document(&json!({
                "currentRound": round_number,
                "roundInProgress": true,
                "status": TournamentStatus::Active,
            }))?,
        );
        self.store.commit(batch).await?;

        info!(
            "Started round {round_number} of {tournament_id}: {} participants, {} tables",
            active.len(),
            active.len() / TABLE_SIZE
        );
        Ok(RoundSummary {
            round_id,
            round_number,
            participants: active.len(),
            tables: active.len() / TABLE_SIZE,
        })
    }

    /// End the in-progress round.
    ///
    /// Marks the round completed and clears `roundInProgress`;
    /// `currentRound` is left as-is (it denotes the last started round).
    pub async fn end(&self, tournament_id: &str) -> EngineResult<()> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;
        if !tournament.round_in_progress {
            return Err(EngineError::NoRoundInProgress);
        }

        let rounds = load_rounds(self.store.as_ref(), tournament_id).await?;
        let current = rounds
            .iter()
            .find(|r| {
                r.data.round_number == tournament.current_round
                    && r.data.status == RoundStatus::InProgress
            })
            .ok_or(EngineError::RoundDocMissing(tournament.current_round))?;

        let now = self.store.server_timestamp();
        let mut batch = WriteBatch::new();
        batch.require_field(
            paths::TOURNAMENTS,
            tournament_id,
            "roundInProgress",
            json!(true),
        );
        batch.update(
            paths::rounds(tournament_id),
            current.id.clone(),
            store::to_document(&json!({
                "status": RoundStatus::Completed,
                "endedAt": now,
            }))?,
        );
        batch.update(
            paths::TOURNAMENTS,
            tournament_id,
            store::to_document(&json!({"roundInProgress": false}))?,
        );
        self.store.commit(batch).await?;

        info!(
            "Ended round {} of {tournament_id}",
            tournament.current_round
        );
        Ok(())
    }

    /// Record a won (or mis-recorded) game for a player in the current round.
    ///
    /// Appends a score event tagged with the in-progress round number and
    /// bumps the player's win counter atomically. Positive deltas refresh
    /// `lastWinAt`; negative deltas correct earlier mistakes and never drive
    /// cumulative wins below zero, while the ledger keeps the full audit
    /// history either way.
    pub async fn record_game(
        &self,
        tournament_id: &str,
        winner_id: &str,
        delta: f64,
    ) -> EngineResult<ScoreEvent> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;
        if !tournament.round_in_progress {
            return Err(EngineError::NoRoundInProgress);
        }

        let collection = paths::players(tournament_id);
        for _ in 0..CORRECTION_ATTEMPTS {
            let player = store::get_as::<Player>(self.store.as_ref(), &collection, winner_id)
                .await?
                .ok_or_else(|| EngineError::PlayerNotFound(winner_id.to_string()))?;

            let now = self.store.server_timestamp();
            let event = ScoreEvent {
                delta,
                round_number: Some(tournament.current_round),
                timestamp: now,
            };

            let mut batch = WriteBatch::new();
            let wins_delta = if delta < 0.0 {
                // The floor is computed from the wins value read above, so
                // it is only valid while that value still holds. The guard
                // turns a concurrent counter update into a retry instead of
                // letting a stale clamp push wins negative.
                batch.require_field(
                    collection.clone(),
                    winner_id,
                    "wins",
                    json!(player.data.wins),
                );
                delta.max(-(player.data.wins as f64))
            } else {
                delta
            };
            score::ledger::push_event(&mut batch, &collection, winner_id, &event)?;
            batch.increment(collection.clone(), winner_id, "wins", wins_delta);
            if delta > 0.0 {
                batch.update(
                    collection.clone(),
                    winner_id,
                    store::to_document(&json!({"lastWinAt": now}))?,
                );
            }
            match self.store.commit(batch).await {
                Ok(()) => return Ok(event),
                Err(StoreError::PreconditionFailed { .. }) if delta < 0.0 => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::Store(StoreError::TransactionFailed(format!(
            "wins correction for {winner_id} kept losing to concurrent updates"
        ))))
    }

    /// Record a single win for a player in the current round.
    pub async fn record_win(
        &self,
        tournament_id: &str,
        winner_id: &str,
    ) -> EngineResult<ScoreEvent> {
        self.record_game(tournament_id, winner_id, 1.0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tournament::manager::{TournamentConfig, TournamentManager};

    async fn setup(player_count: usize) -> (Arc<MemoryStore>, RoundLifecycle, String, Vec<String>) {
        let store = Arc::new(MemoryStore::new());
        let manager = TournamentManager::new(store.clone());
        let id = manager
            .create_tournament(TournamentConfig::standard("League"))
            .await
            .unwrap();
        let names: Vec<String> = (0..player_count).map(|i| format!("Player {i}")).collect();
        let outcome = manager.import_players(&id, &names).await.unwrap();
        let lifecycle = RoundLifecycle::new(store.clone());
        (store, lifecycle, id, outcome.imported)
    }

    #[tokio::test]
    async fn test_start_round_snapshots_participants() {
        let (store, lifecycle, id, _) = setup(8).await;

        let summary = lifecycle.start(&id).await.unwrap();
        assert_eq!(summary.round_number, 1);
        assert_eq!(summary.participants, 8);
        assert_eq!(summary.tables, 2);

        let tournament = load_tournament(store.as_ref(), &id).await.unwrap();
        assert!(tournament.round_in_progress);
        assert_eq!(tournament.current_round, 1);
        assert_eq!(tournament.status, TournamentStatus::Active);

        let participants = store
            .list(&paths::participants(&id, &summary.round_id))
            .await
            .unwrap();
        assert_eq!(participants.len(), 8);

        let rounds = load_rounds(store.as_ref(), &id).await.unwrap();
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].data.status, RoundStatus::InProgress);
        assert_eq!(rounds[0].data.score_multiplier, 1.0);
    }

    #[tokio::test]
    async fn test_start_rejects_double_start_and_uneven_counts() {
        let (_, lifecycle, id, _) = setup(8).await;

        lifecycle.start(&id).await.unwrap();
        assert!(matches!(
            lifecycle.start(&id).await,
            Err(EngineError::RoundInProgress(1))
        ));

        let (_, lifecycle, id, _) = setup(6).await;
        assert!(matches!(
            lifecycle.start(&id).await,
            Err(EngineError::UnevenPlayerCount(6))
        ));

        let (_, lifecycle, id, _) = setup(0).await;
        assert!(matches!(
            lifecycle.start(&id).await,
            Err(EngineError::NoActivePlayers)
        ));
    }

    #[tokio::test]
    async fn test_eliminated_players_are_not_snapshotted() {
        let (store, lifecycle, id, player_ids) = setup(8).await;
        let manager = TournamentManager::new(store.clone());
        // Knock out a full table's worth to keep the count even.
        for pid in &player_ids[..4] {
            manager.eliminate_player(&id, pid).await.unwrap();
        }

        let summary = lifecycle.start(&id).await.unwrap();
        assert_eq!(summary.participants, 4);
        assert_eq!(summary.tables, 1);
    }

    #[tokio::test]
    async fn test_end_round_completes_and_clears_flag() {
        let (store, lifecycle, id, _) = setup(4).await;

        assert!(matches!(
            lifecycle.end(&id).await,
            Err(EngineError::NoRoundInProgress)
        ));

        lifecycle.start(&id).await.unwrap();
        lifecycle.end(&id).await.unwrap();

        let tournament = load_tournament(store.as_ref(), &id).await.unwrap();
        assert!(!tournament.round_in_progress);
        assert_eq!(tournament.current_round, 1);

        let rounds = load_rounds(store.as_ref(), &id).await.unwrap();
        assert_eq!(rounds[0].data.status, RoundStatus::Completed);
        assert!(rounds[0].data.ended_at.is_some());

        // Round numbers keep climbing across start/end cycles.
        let summary = lifecycle.start(&id).await.unwrap();
        assert_eq!(summary.round_number, 2);
    }

    #[tokio::test]
    async fn test_record_win_updates_ledger_wins_and_last_win() {
        let (store, lifecycle, id, player_ids) = setup(4).await;
        lifecycle.start(&id).await.unwrap();

        let winner = &player_ids[0];
        let event = lifecycle.record_win(&id, winner).await.unwrap();
        assert_eq!(event.round_number, Some(1));
        assert_eq!(event.delta, 1.0);

        lifecycle.record_game(&id, winner, 2.0).await.unwrap();

        let player = store::get_as::<Player>(store.as_ref(), &paths::players(&id), winner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.data.wins, 3);
        assert_eq!(player.data.score_events.len(), 2);
        assert!(player.data.last_win_at.is_some());
    }

    #[tokio::test]
    async fn test_negative_delta_corrects_without_underflow() {
        let (store, lifecycle, id, player_ids) = setup(4).await;
        lifecycle.start(&id).await.unwrap();

        let pid = &player_ids[0];
        lifecycle.record_win(&id, pid).await.unwrap();
        // Over-correct; wins must floor at zero while the ledger keeps both.
        lifecycle.record_game(&id, pid, -2.0).await.unwrap();

        let player = store::get_as::<Player>(store.as_ref(), &paths::players(&id), pid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.data.wins, 0);
        assert_eq!(player.data.score_events.len(), 2);

        // A correction never refreshes the last-win marker.
        let before = player.data.last_win_at;
        lifecycle.record_game(&id, pid, -0.5).await.unwrap();
        let player = store::get_as::<Player>(store.as_ref(), &paths::players(&id), pid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.data.last_win_at, before);
    }

    /// Store that slips one extra wins update in front of the next commit,
    /// standing in for a second process racing the same player.
    struct ContendedStore {
        inner: MemoryStore,
        rival_correction: std::sync::Mutex<Option<(String, String, f64)>>,
    }

    #[async_trait::async_trait]
    impl DocumentStore for ContendedStore {
        async fn get(
            &self,
            collection: &str,
            id: &str,
        ) -> crate::store::StoreResult<Option<crate::store::Document>> {
            self.inner.get(collection, id).await
        }

        async fn set(
            &self,
            collection: &str,
            id: &str,
            doc: crate::store::Document,
        ) -> crate::store::StoreResult<()> {
            self.inner.set(collection, id, doc).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            fields: crate::store::Document,
        ) -> crate::store::StoreResult<()> {
            self.inner.update(collection, id, fields).await
        }

        async fn delete(&self, collection: &str, id: &str) -> crate::store::StoreResult<()> {
            self.inner.delete(collection, id).await
        }

        async fn list(
            &self,
            collection: &str,
        ) -> crate::store::StoreResult<Vec<(String, crate::store::Document)>> {
            self.inner.list(collection).await
        }

        async fn commit(&self, batch: WriteBatch) -> crate::store::StoreResult<()> {
            let pending = self.rival_correction.lock().unwrap().take();
            if let Some((collection, id, by)) = pending {
                let mut rival = WriteBatch::new();
                rival.increment(collection, id, "wins", by);
                self.inner.commit(rival).await?;
            }
            self.inner.commit(batch).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_corrections_cannot_push_wins_negative() {
        let store = Arc::new(ContendedStore {
            inner: MemoryStore::new(),
            rival_correction: std::sync::Mutex::new(None),
        });
        let manager = TournamentManager::new(store.clone());
        let id = manager
            .create_tournament(TournamentConfig::standard("League"))
            .await
            .unwrap();
        let names: Vec<String> = (0..4).map(|i| format!("Player {i}")).collect();
        let pid = manager.import_players(&id, &names).await.unwrap().imported[0].clone();

        let lifecycle = RoundLifecycle::new(store.clone());
        lifecycle.start(&id).await.unwrap();
        lifecycle.record_win(&id, &pid).await.unwrap();

        // A rival correction lands between our read of wins == 1 and our
        // commit. Without the guard both clamps would apply and the counter
        // would end at -1; with it, the retry re-reads wins == 0 and clamps
        // its decrement away.
        *store.rival_correction.lock().unwrap() =
            Some((paths::players(&id), pid.clone(), -1.0));
        lifecycle.record_game(&id, &pid, -1.0).await.unwrap();

        let player = store::get_as::<Player>(store.as_ref(), &paths::players(&id), &pid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.data.wins, 0);
        // The failed first attempt left nothing behind; exactly one
        // correction event joined the ledger.
        assert_eq!(player.data.score_events.len(), 2);
    }

    #[tokio::test]
    async fn test_record_requires_round_in_progress_and_known_player() {
        let (_, lifecycle, id, player_ids) = setup(4).await;

        assert!(matches!(
            lifecycle.record_win(&id, &player_ids[0]).await,
            Err(EngineError::NoRoundInProgress)
        ));

        lifecycle.start(&id).await.unwrap();
        assert!(matches!(
            lifecycle.record_win(&id, "nobody").await,
            Err(EngineError::PlayerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_multiplier_is_persisted_on_the_round() {
        let (store, lifecycle, id, _) = setup(4).await;
        lifecycle.start_with_multiplier(&id, 2.0).await.unwrap();

        let rounds = load_rounds(store.as_ref(), &id).await.unwrap();
        assert_eq!(rounds[0].data.score_multiplier, 2.0);
    }
}
