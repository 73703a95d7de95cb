//! Tournament entities, shared errors, and tournament administration.
//!
//! The entity records in [`models`] are shared by every engine component;
//! [`TournamentManager`] covers the administrative operations around them:
//! creation (with join-code allocation), bulk player import, elimination,
//! and cascade deletion.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{EngineError, EngineResult, IntegrityWarning};
pub use manager::{ImportOutcome, TournamentConfig, TournamentManager};
pub use models::{
    Participant, Player, PlayerId, Round, RoundId, RoundStatus, ScoreEvent, Seat, TABLE_SIZE,
    Table, TableId, Tournament, TournamentId, TournamentStatus, TournamentType,
};

use crate::store::{self, Doc, DocumentStore, paths};

/// Load a tournament document or fail with `TournamentNotFound`.
pub async fn load_tournament(
    store: &dyn DocumentStore,
    tournament_id: &str,
) -> EngineResult<Tournament> {
    store::get_as::<Tournament>(store, paths::TOURNAMENTS, tournament_id)
        .await?
        .map(|doc| doc.data)
        .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.to_string()))
}

/// Load all players of a tournament.
pub async fn load_players(
    store: &dyn DocumentStore,
    tournament_id: &str,
) -> EngineResult<Vec<Doc<Player>>> {
    Ok(store::list_as(store, &paths::players(tournament_id)).await?)
}

/// Load all tables of a tournament.
pub async fn load_tables(
    store: &dyn DocumentStore,
    tournament_id: &str,
) -> EngineResult<Vec<Doc<Table>>> {
    Ok(store::list_as(store, &paths::tables(tournament_id)).await?)
}

/// Load all rounds of a tournament, ordered by round number.
pub async fn load_rounds(
    store: &dyn DocumentStore,
    tournament_id: &str,
) -> EngineResult<Vec<Doc<Round>>> {
    let mut rounds: Vec<Doc<Round>> = store::list_as(store, &paths::rounds(tournament_id)).await?;
    rounds.sort_by_key(|r| r.data.round_number);
    Ok(rounds)
}

/// Load the participant snapshots of one round.
pub async fn load_participants(
    store: &dyn DocumentStore,
    tournament_id: &str,
    round_id: &str,
) -> EngineResult<Vec<Doc<Participant>>> {
    Ok(store::list_as(store, &paths::participants(tournament_id, round_id)).await?)
}
