//! Score ledger computation and the append operation.
//!
//! Aggregates are pure, total functions from a player's event list and the
//! tournament's round multiplier map. An event tagged with a round absent
//! from the map scores at multiplier 1; the repair module reports such
//! events as integrity warnings.

use std::collections::HashMap;
use std::sync::Arc;

use crate::store::{self, Doc, DocumentStore, WriteBatch, paths};
use crate::tournament::errors::{EngineError, EngineResult};
use crate::tournament::models::{Player, Round, ScoreEvent};

/// Round number to score multiplier
pub type MultiplierMap = HashMap<u32, f64>;

/// Build the multiplier map from a tournament's round documents.
pub fn multiplier_map(rounds: &[Doc<Round>]) -> MultiplierMap {
    rounds
        .iter()
        .map(|r| (r.data.round_number, r.data.score_multiplier))
        .collect()
}

fn multiplier_for(multipliers: &MultiplierMap, round_number: Option<u32>) -> f64 {
    round_number
        .and_then(|n| multipliers.get(&n).copied())
        .unwrap_or(1.0)
}

/// Total tournament score: the sum of every event's delta scaled by its
/// round's multiplier. Insertion order does not matter.
pub fn tournament_score(events: &[ScoreEvent], multipliers: &MultiplierMap) -> f64 {
    events
        .iter()
        .map(|e| e.delta * multiplier_for(multipliers, e.round_number))
        .sum()
}

/// Score accumulated in one specific round.
pub fn round_score(events: &[ScoreEvent], round_number: u32, multipliers: &MultiplierMap) -> f64 {
    events
        .iter()
        .filter(|e| e.round_number == Some(round_number))
        .map(|e| e.delta * multiplier_for(multipliers, e.round_number))
        .sum()
}

/// Append a score event into a batch.
///
/// `ArrayAppend` keeps the ledger append-only and serializes concurrent
/// appends to the same player at the store.
pub(crate) fn push_event(
    batch: &mut WriteBatch,
    collection: &str,
    player_id: &str,
    event: &ScoreEvent,
) -> EngineResult<()> {
    batch.array_append(
        collection,
        player_id,
        "scoreEvents",
        serde_json::to_value(event).map_err(store::StoreError::from)?,
    );
    Ok(())
}

/// Append-only writer over per-player score ledgers
#[derive(Clone)]
pub struct ScoreLedger {
    store: Arc<dyn DocumentStore>,
}

impl ScoreLedger {
    /// Create a new ledger writer
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append a score event to a player's ledger.
    ///
    /// A zero round number is rejected at the write boundary; events without
    /// a round silently zero round-level aggregates, so they must never be
    /// created. Corrections are new events with a negative delta, never
    /// rewrites of existing entries.
    pub async fn append_score_event(
        &self,
        tournament_id: &str,
        player_id: &str,
        delta: f64,
        round_number: u32,
    ) -> EngineResult<ScoreEvent> {
        if round_number == 0 {
            return Err(EngineError::MissingRoundNumber);
        }

        let collection = paths::players(tournament_id);
        if store::get_as::<Player>(self.store.as_ref(), &collection, player_id)
            .await?
            .is_none()
        {
            return Err(EngineError::PlayerNotFound(player_id.to_string()));
        }

        let event = ScoreEvent {
            delta,
            round_number: Some(round_number),
            timestamp: self.store.server_timestamp(),
        };
        let mut batch = WriteBatch::new();
        push_event(&mut batch, &collection, player_id, &event)?;
        self.store.commit(batch).await?;
        Ok(event)
    }
}
