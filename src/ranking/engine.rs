//! Standings: a strict total order over players.
//!
//! Players are compared on five levels, each consulted only when every
//! earlier level ties:
//!
//! 1. tournament score, descending (multiplier-weighted ledger sum)
//! 2. score in the last completed round, descending
//! 3. most recent win timestamp, descending (players who never won sort last)
//! 4. combined last-round score of the player's table, descending (taken
//!    from the round's participant snapshots, so later reseating cannot
//!    change a settled round)
//! 5. name, ascending (case-insensitive, then exact)
//!
//! Two players never compare equal unless they share a name byte for byte,
//! so the order is reproducible run to run. Eliminated players always sort
//! below active ones.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::score::{MultiplierMap, multiplier_map, round_score, tournament_score};
use crate::store::{Doc, DocumentStore};
use crate::tournament::errors::EngineResult;
use crate::tournament::models::{Participant, Player, PlayerId, Round, RoundStatus, TableId};
use crate::tournament::{load_participants, load_players, load_rounds, load_tournament};

/// One row of the computed leaderboard
#[derive(Debug, Clone)]
pub struct Standing {
    /// Player document ID
    pub player_id: PlayerId,
    /// Display name
    pub name: String,
    /// 1-based position in the order
    pub rank: u32,
    /// Multiplier-weighted sum of the whole ledger
    pub tournament_score: f64,
    /// Score in the last completed round, 0 before any round completes
    pub round_score: f64,
    /// Most recent positive-delta game
    pub last_win_at: Option<DateTime<Utc>>,
    /// Combined last-round score of the player's snapshot table
    pub table_round_score: f64,
    /// Cumulative wins
    pub wins: i64,
    /// Out of the running
    pub eliminated: bool,
}

struct RankKey {
    eliminated: bool,
    tournament_score: f64,
    round_score: f64,
    last_win_at: Option<DateTime<Utc>>,
    table_round_score: f64,
    name_lower: String,
    name: String,
}

impl RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.eliminated
            .cmp(&other.eliminated)
            .then_with(|| other.tournament_score.total_cmp(&self.tournament_score))
            .then_with(|| other.round_score.total_cmp(&self.round_score))
            .then_with(|| cmp_last_win(self.last_win_at, other.last_win_at))
            .then_with(|| other.table_round_score.total_cmp(&self.table_round_score))
            .then_with(|| self.name_lower.cmp(&other.name_lower))
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// Later wins rank higher; never having won sorts after any win.
fn cmp_last_win(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn build_key(
    player: &Doc<Player>,
    last_round: Option<u32>,
    multipliers: &MultiplierMap,
    snapshot_table: &HashMap<PlayerId, TableId>,
    table_scores: &HashMap<TableId, f64>,
) -> RankKey {
    let round = last_round
        .map(|n| round_score(&player.data.score_events, n, multipliers))
        .unwrap_or(0.0);
    let table = snapshot_table
        .get(&player.id)
        .and_then(|tid| table_scores.get(tid))
        .copied()
        .unwrap_or(0.0);
    RankKey {
        eliminated: player.data.eliminated,
        tournament_score: tournament_score(&player.data.score_events, multipliers),
        round_score: round,
        last_win_at: player.data.last_win_at,
        table_round_score: table,
        name_lower: player.data.name.to_lowercase(),
        name: player.data.name.clone(),
    }
}

fn keys_for(
    players: &[Doc<Player>],
    rounds: &[Doc<Round>],
    last_round_participants: &[Doc<Participant>],
) -> HashMap<PlayerId, RankKey> {
    let multipliers = multiplier_map(rounds);
    let last_round = rounds
        .iter()
        .filter(|r| r.data.status == RoundStatus::Completed)
        .map(|r| r.data.round_number)
        .max();

    // Table membership at round start, per the participant snapshots.
    let snapshot_table: HashMap<PlayerId, TableId> = last_round_participants
        .iter()
        .filter_map(|p| {
            p.data
                .table_id
                .clone()
                .map(|tid| (p.data.player_id.clone(), tid))
        })
        .collect();

    let mut table_scores: HashMap<TableId, f64> = HashMap::new();
    if let Some(n) = last_round {
        for player in players {
            if let Some(tid) = snapshot_table.get(&player.id) {
                *table_scores.entry(tid.clone()).or_default() +=
                    round_score(&player.data.score_events, n, &multipliers);
            }
        }
    }

    players
        .iter()
        .map(|p| {
            let key = build_key(p, last_round, &multipliers, &snapshot_table, &table_scores);
            (p.id.clone(), key)
        })
        .collect()
}

/// Sort players best-first, in place.
///
/// Pass the full roster, eliminated players included: table context sums a
/// round's scores over everyone who sat the table per that round's
/// snapshots, and a tablemate eliminated since then still counts.
/// Eliminated players themselves sort last.
pub fn sort_players_by_rank(
    players: &mut [Doc<Player>],
    rounds: &[Doc<Round>],
    last_round_participants: &[Doc<Participant>],
) {
    let keys = keys_for(players, rounds, last_round_participants);
    players.sort_by(|a, b| keys[&a.id].cmp(&keys[&b.id]));
}

/// Compute the full leaderboard for a set of players.
///
/// Like [`sort_players_by_rank`], expects the full roster so table context
/// includes eliminated tablemates; eliminated players rank last.
pub fn compute_standings(
    players: &[Doc<Player>],
    rounds: &[Doc<Round>],
    last_round_participants: &[Doc<Participant>],
) -> Vec<Standing> {
    let keys = keys_for(players, rounds, last_round_participants);
    let mut ordered: Vec<&Doc<Player>> = players.iter().collect();
    ordered.sort_by(|a, b| keys[&a.id].cmp(&keys[&b.id]));

    ordered
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let key = &keys[&player.id];
            Standing {
                player_id: player.id.clone(),
                name: player.data.name.clone(),
                rank: i as u32 + 1,
                tournament_score: key.tournament_score,
                round_score: key.round_score,
                last_win_at: key.last_win_at,
                table_round_score: key.table_round_score,
                wins: player.data.wins,
                eliminated: player.data.eliminated,
            }
        })
        .collect()
}

/// Store-backed standings reader.
#[derive(Clone)]
pub struct RankingEngine {
    store: Arc<dyn DocumentStore>,
}

impl RankingEngine {
    /// Create a new ranking engine
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Current leaderboard over active players; eliminated players are
    /// excluded from the output but their ledgers still feed the table
    /// context of players who shared their table in the last round.
    pub async fn standings(&self, tournament_id: &str) -> EngineResult<Vec<Standing>> {
        load_tournament(self.store.as_ref(), tournament_id).await?;
        let players = load_players(self.store.as_ref(), tournament_id).await?;
        let rounds = load_rounds(self.store.as_ref(), tournament_id).await?;

        let last_completed = rounds
            .iter()
            .filter(|r| r.data.status == RoundStatus::Completed)
            .max_by_key(|r| r.data.round_number);
        let participants = match last_completed {
            Some(round) => {
                load_participants(self.store.as_ref(), tournament_id, &round.id).await?
            }
            None => Vec::new(),
        };

        // Eliminated players sort last, so dropping them afterwards keeps
        // the active ranks contiguous from one.
        let mut standings = compute_standings(&players, &rounds, &participants);
        standings.retain(|s| !s.eliminated);
        Ok(standings)
    }
}
