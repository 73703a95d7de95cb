//! Integration tests for tournament export and import
//!
//! A played tournament is snapshotted, restored under fresh IDs, and the
//! copy is checked to behave exactly like the original.

use std::sync::Arc;

use table_league::{
    AssignStrategy, MemoryStore, RankingEngine, RoundLifecycle, StateTransfer, TableAssigner,
    TournamentConfig, TournamentExport, TournamentManager,
    tournament::{load_players, load_rounds},
};

async fn played_tournament(store: Arc<MemoryStore>) -> String {
    let manager = TournamentManager::new(store.clone());
    let id = manager
        .create_tournament(TournamentConfig::cutline("Winter Cup", 3))
        .await
        .unwrap();
    let names: Vec<String> = (0..8).map(|i| format!("Player {i:02}")).collect();
    let players = manager.import_players(&id, &names).await.unwrap().imported;

    let assigner = TableAssigner::new(store.clone());
    let lifecycle = RoundLifecycle::new(store.clone());

    assigner.assign(&id, AssignStrategy::Random).await.unwrap();
    lifecycle.start(&id).await.unwrap();
    lifecycle.record_win(&id, &players[0]).await.unwrap();
    lifecycle.record_win(&id, &players[3]).await.unwrap();
    lifecycle.end(&id).await.unwrap();

    assigner.assign(&id, AssignStrategy::RoundRobin).await.unwrap();
    lifecycle.start_with_multiplier(&id, 2.0).await.unwrap();
    lifecycle.record_win(&id, &players[0]).await.unwrap();
    lifecycle.end(&id).await.unwrap();

    manager.eliminate_player(&id, &players[7]).await.unwrap();
    id
}

#[tokio::test]
async fn test_imported_copy_reproduces_the_standings() {
    let store = Arc::new(MemoryStore::new());
    let id = played_tournament(store.clone()).await;

    let transfer = StateTransfer::new(store.clone());
    let export = transfer.export(&id).await.unwrap();
    let result = transfer.import(&export).await.unwrap();

    let ranking = RankingEngine::new(store);
    let original = ranking.standings(&id).await.unwrap();
    let copy = ranking.standings(&result.tournament_id).await.unwrap();

    assert_eq!(original.len(), copy.len());
    for (a, b) in original.iter().zip(&copy) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.rank, b.rank);
        assert_eq!(a.tournament_score, b.tournament_score);
        assert_eq!(a.round_score, b.round_score);
        assert_eq!(a.last_win_at, b.last_win_at);
        assert_eq!(a.table_round_score, b.table_round_score);
    }
}

#[tokio::test]
async fn test_imported_copy_can_keep_playing() {
    let store = Arc::new(MemoryStore::new());
    let id = played_tournament(store.clone()).await;

    let transfer = StateTransfer::new(store.clone());
    let export = transfer.export(&id).await.unwrap();
    let copy_id = transfer.import(&export).await.unwrap().tournament_id;

    // Bring the field back to a multiple of four, then play round 3.
    let manager = TournamentManager::new(store.clone());
    let copy_players = load_players(store.as_ref(), &copy_id).await.unwrap();
    let active: Vec<_> = copy_players.iter().filter(|p| p.data.is_active()).collect();
    assert_eq!(active.len(), 7);
    for player in &active[..3] {
        manager.eliminate_player(&copy_id, &player.id).await.unwrap();
    }

    let lifecycle = RoundLifecycle::new(store.clone());
    let summary = lifecycle.start(&copy_id).await.unwrap();
    assert_eq!(summary.round_number, 3);
    assert_eq!(summary.participants, 4);
    lifecycle.end(&copy_id).await.unwrap();

    // The original tournament is untouched.
    let original_rounds = load_rounds(store.as_ref(), &id).await.unwrap();
    assert_eq!(original_rounds.len(), 2);
}

#[tokio::test]
async fn test_reexport_matches_modulo_ids_and_code() {
    let store = Arc::new(MemoryStore::new());
    let id = played_tournament(store.clone()).await;

    let transfer = StateTransfer::new(store.clone());
    let first = transfer.export(&id).await.unwrap();
    let copy_id = transfer.import(&first).await.unwrap().tournament_id;
    let second = transfer.export(&copy_id).await.unwrap();

    assert_eq!(first.tournament.name, second.tournament.name);
    assert_eq!(first.tournament.current_round, second.tournament.current_round);
    assert_eq!(first.players.len(), second.players.len());
    assert_eq!(first.tables.len(), second.tables.len());
    assert_eq!(first.rounds.len(), second.rounds.len());

    // Per-player state survives, keyed by name since IDs were remapped.
    let mut a: Vec<_> = first.players.iter().collect();
    let mut b: Vec<_> = second.players.iter().collect();
    a.sort_by(|x, y| x.player.name.cmp(&y.player.name));
    b.sort_by(|x, y| x.player.name.cmp(&y.player.name));
    for (x, y) in a.iter().zip(&b) {
        assert_ne!(x.id, y.id);
        assert_eq!(x.player.wins, y.player.wins);
        assert_eq!(x.player.score_events, y.player.score_events);
        assert_eq!(x.player.eliminated, y.player.eliminated);
        assert_eq!(x.player.registered_at, y.player.registered_at);
    }

    // Rounds match field for field, participants included.
    for (x, y) in first.rounds.iter().zip(&second.rounds) {
        assert_eq!(x.round.round_number, y.round.round_number);
        assert_eq!(x.round.score_multiplier, y.round.score_multiplier);
        assert_eq!(x.round.started_at, y.round.started_at);
        assert_eq!(x.participants.len(), y.participants.len());
    }
}

#[tokio::test]
async fn test_snapshot_survives_a_json_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let id = played_tournament(store.clone()).await;

    let transfer = StateTransfer::new(store.clone());
    let export = transfer.export(&id).await.unwrap();
    let parsed = TournamentExport::from_json(&export.to_json().unwrap()).unwrap();

    // The parsed snapshot imports like the in-memory one.
    let result = transfer.import(&parsed).await.unwrap();
    assert_eq!(result.players, 8);
    assert_eq!(result.rounds, 2);
    assert_eq!(result.participants, 16);
}
