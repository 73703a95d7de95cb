//! Table assignment strategies and the assigner that persists them.

use std::sync::Arc;

use log::{info, warn};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ranking::sort_players_by_rank;
use crate::store::{self, Doc, DocumentStore, WriteBatch, paths};
use crate::tournament::errors::{EngineError, EngineResult};
use crate::tournament::models::{Player, PlayerId, RoundStatus, Seat, TABLE_SIZE, Table, TableId};
use crate::tournament::{load_participants, load_players, load_rounds, load_tables, load_tournament};

/// How players are grouped into tables of four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignStrategy {
    /// Uniform shuffle
    Random,
    /// Current standings, consecutive groups (1-4 together, 5-8 together, ...)
    Ranking,
    /// Current standings dealt across tables (1st, 2nd, ... on different tables)
    RoundRobin,
}

impl std::fmt::Display for AssignStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignStrategy::Random => write!(f, "random"),
            AssignStrategy::Ranking => write!(f, "ranking"),
            AssignStrategy::RoundRobin => write!(f, "round_robin"),
        }
    }
}

/// One table created by an assignment pass
#[derive(Debug, Clone)]
pub struct AssignedTable {
    /// Created table document ID
    pub table_id: TableId,
    /// Issued table number
    pub table_number: u32,
    /// Seated players, East first
    pub players: Vec<PlayerId>,
}

/// Result of an assignment pass
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    /// Strategy actually applied (may differ from the requested one when
    /// standings do not exist yet)
    pub strategy: AssignStrategy,
    /// Created tables, in table-number order
    pub tables: Vec<AssignedTable>,
    /// Players left without a seat when the active count is not a multiple
    /// of four; they stay registered and unassigned
    pub unseated: Vec<PlayerId>,
}

/// Split an ordered slice into consecutive groups of `table_size`.
///
/// Returns the full groups and the short tail. Order within each group
/// follows the input order.
pub fn partition_consecutive<T: Clone>(items: &[T], table_size: usize) -> (Vec<Vec<T>>, Vec<T>) {
    let full = items.len() / table_size * table_size;
    let groups = items[..full]
        .chunks(table_size)
        .map(|chunk| chunk.to_vec())
        .collect();
    (groups, items[full..].to_vec())
}

/// Deal an ordered slice across tables: item `i` lands on table
/// `i % num_tables`, so the top `num_tables` items all sit apart.
pub fn partition_round_robin<T: Clone>(items: &[T], table_size: usize) -> (Vec<Vec<T>>, Vec<T>) {
    let num_tables = items.len() / table_size;
    if num_tables == 0 {
        return (Vec::new(), items.to_vec());
    }
    let full = num_tables * table_size;
    let mut groups = vec![Vec::with_capacity(table_size); num_tables];
    for (i, item) in items[..full].iter().enumerate() {
        groups[i % num_tables].push(item.clone());
    }
    (groups, items[full..].to_vec())
}

/// Assigns active players to tables and persists the result.
#[derive(Clone)]
pub struct TableAssigner {
    store: Arc<dyn DocumentStore>,
}

impl TableAssigner {
    /// Create a new table assigner
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Reassign every active player to a fresh set of tables.
    ///
    /// Existing tables are deleted and every player unassigned first, so
    /// after any pass each player references at most one live table.
    /// Standings-based strategies fall back to [`AssignStrategy::Random`]
    /// before the first round, when no standings exist. Table numbers
    /// continue from the tournament's high-water mark and are never reused.
    pub async fn assign(
        &self,
        tournament_id: &str,
        strategy: AssignStrategy,
    ) -> EngineResult<AssignmentOutcome> {
        let tournament = load_tournament(self.store.as_ref(), tournament_id).await?;
        let mut players = load_players(self.store.as_ref(), tournament_id).await?;
        let old_tables = load_tables(self.store.as_ref(), tournament_id).await?;

        let active_count = players.iter().filter(|p| p.data.is_active()).count();
        if active_count < TABLE_SIZE {
            return Err(EngineError::NotEnoughPlayers(active_count));
        }

        let strategy = match strategy {
            AssignStrategy::Random => AssignStrategy::Random,
            other if tournament.current_round == 0 => {
                warn!(
                    "No standings before round 1; falling back from {other} to random \
                     assignment for {tournament_id}"
                );
                AssignStrategy::Random
            }
            other => other,
        };

        // Order the full roster first: standings read table context from every
        // player who sat the last round, eliminated ones included. Eliminated
        // players drop out only after ordering.
        match strategy {
            AssignStrategy::Random => players.shuffle(&mut rand::rng()),
            AssignStrategy::Ranking | AssignStrategy::RoundRobin => {
                self.order_by_standings(tournament_id, &mut players).await?;
            }
        }
        let active: Vec<Doc<Player>> = players
            .into_iter()
            .filter(|p| p.data.is_active())
            .collect();

        let (groups, leftover) = match strategy {
            AssignStrategy::RoundRobin => partition_round_robin(&active, TABLE_SIZE),
            _ => partition_consecutive(&active, TABLE_SIZE),
        };

        // Old tables go first, then each new table lands in its own batch so
        // a crash mid-pass leaves whole tables, never half-seated ones.
        self.clear(tournament_id, &old_tables, &active).await?;

        let start = old_tables
            .iter()
            .map(|t| t.data.table_number)
            .max()
            .unwrap_or(0)
            .max(tournament.last_table_number);

        let now = self.store.server_timestamp();
        let players_collection = paths::players(tournament_id);
        let mut tables = Vec::with_capacity(groups.len());
        for (offset, group) in groups.iter().enumerate() {
            let table_number = start + offset as u32 + 1;
            let table_id = self.store.new_id();
            let table = Table::seated(
                table_number,
                group.iter().map(|p| p.id.clone()).collect(),
                now,
            );

            let mut batch = WriteBatch::new();
            batch.set(
                paths::tables(tournament_id),
                table_id.clone(),
                store::to_document(&table)?,
            );
            for (seat_index, player) in group.iter().enumerate() {
                batch.update(
                    players_collection.clone(),
                    player.id.clone(),
                    store::to_document(&json!({
                        "tableId": table_id,
                        "position": Seat::ORDER[seat_index],
                    }))?,
                );
            }
            batch.update(
                paths::TOURNAMENTS,
                tournament_id,
                store::to_document(&json!({"lastTableNumber": table_number}))?,
            );
            self.store.commit(batch).await?;

            tables.push(AssignedTable {
                table_id,
                table_number,
                players: group.iter().map(|p| p.id.clone()).collect(),
            });
        }

        let unseated: Vec<PlayerId> = leftover.iter().map(|p| p.id.clone()).collect();
        if !unseated.is_empty() {
            warn!(
                "{} player(s) left unseated in {tournament_id} (active count not a \
                 multiple of {TABLE_SIZE})",
                unseated.len()
            );
        }
        info!(
            "Assigned {} table(s) in {tournament_id} using {strategy}",
            tables.len()
        );
        Ok(AssignmentOutcome {
            strategy,
            tables,
            unseated,
        })
    }

    /// Delete all tables and unassign every player, in one batch.
    pub async fn clear_assignments(&self, tournament_id: &str) -> EngineResult<()> {
        load_tournament(self.store.as_ref(), tournament_id).await?;
        let tables = load_tables(self.store.as_ref(), tournament_id).await?;
        let players = load_players(self.store.as_ref(), tournament_id).await?;
        self.clear(tournament_id, &tables, &players).await?;
        info!(
            "Cleared {} table(s) in {tournament_id}",
            tables.len()
        );
        Ok(())
    }

    async fn clear(
        &self,
        tournament_id: &str,
        tables: &[Doc<Table>],
        players: &[Doc<Player>],
    ) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        for table in tables {
            batch.delete(paths::tables(tournament_id), table.id.clone());
        }
        let collection = paths::players(tournament_id);
        for player in players {
            if player.data.table_id.is_some() || player.data.position.is_some() {
                batch.update(
                    collection.clone(),
                    player.id.clone(),
                    store::to_document(&json!({"tableId": null, "position": null}))?,
                );
            }
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(())
    }

    /// Sort `players` best-first by the current standings.
    async fn order_by_standings(
        &self,
        tournament_id: &str,
        players: &mut [Doc<Player>],
    ) -> EngineResult<()> {
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
        sort_players_by_rank(players, &rounds, &participants);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::round::RoundLifecycle;
    use crate::store::MemoryStore;
    use crate::tournament::manager::{TournamentConfig, TournamentManager};

    async fn setup(player_count: usize) -> (Arc<MemoryStore>, TableAssigner, String) {
        let store = Arc::new(MemoryStore::new());
        let manager = TournamentManager::new(store.clone());
        let id = manager
            .create_tournament(TournamentConfig::standard("League"))
            .await
            .unwrap();
        let names: Vec<String> = (0..player_count).map(|i| format!("Player {i:02}")).collect();
        manager.import_players(&id, &names).await.unwrap();
        (store.clone(), TableAssigner::new(store), id)
    }

    #[test]
    fn test_partition_consecutive_groups_and_tail() {
        let items: Vec<u32> = (0..10).collect();
        let (groups, tail) = partition_consecutive(&items, 4);
        assert_eq!(groups, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
        assert_eq!(tail, vec![8, 9]);
    }

    #[test]
    fn test_partition_round_robin_deals_across_tables() {
        let items: Vec<u32> = (0..8).collect();
        let (groups, tail) = partition_round_robin(&items, 4);
        assert_eq!(groups, vec![vec![0, 2, 4, 6], vec![1, 3, 5, 7]]);
        assert!(tail.is_empty());

        // Fewer than one full table seats nobody.
        let (groups, tail) = partition_round_robin(&items[..3], 4);
        assert!(groups.is_empty());
        assert_eq!(tail, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_assign_seats_everyone_once() {
        let (store, assigner, id) = setup(8).await;
        let outcome = assigner.assign(&id, AssignStrategy::Random).await.unwrap();
        assert_eq!(outcome.tables.len(), 2);
        assert!(outcome.unseated.is_empty());
        assert_eq!(outcome.strategy, AssignStrategy::Random);

        let mut seated = HashSet::new();
        for table in &outcome.tables {
            assert_eq!(table.players.len(), 4);
            for pid in &table.players {
                assert!(seated.insert(pid.clone()));
            }
        }
        assert_eq!(seated.len(), 8);

        let players = load_players(store.as_ref(), &id).await.unwrap();
        for player in &players {
            assert!(player.data.table_id.is_some());
            assert!(player.data.position.is_some());
        }
    }

    #[tokio::test]
    async fn test_leftover_players_stay_unseated() {
        let (store, assigner, id) = setup(9).await;
        let outcome = assigner.assign(&id, AssignStrategy::Random).await.unwrap();
        assert_eq!(outcome.tables.len(), 2);
        assert_eq!(outcome.unseated.len(), 1);

        let players = load_players(store.as_ref(), &id).await.unwrap();
        let leftover = players
            .iter()
            .find(|p| p.id == outcome.unseated[0])
            .unwrap();
        assert_eq!(leftover.data.table_id, None);
    }

    #[tokio::test]
    async fn test_assign_requires_a_full_table() {
        let (_, assigner, id) = setup(3).await;
        assert!(matches!(
            assigner.assign(&id, AssignStrategy::Random).await,
            Err(EngineError::NotEnoughPlayers(3))
        ));
    }

    #[tokio::test]
    async fn test_table_numbers_never_recycle() {
        let (store, assigner, id) = setup(8).await;
        assigner.assign(&id, AssignStrategy::Random).await.unwrap();
        let second = assigner.assign(&id, AssignStrategy::Random).await.unwrap();

        let numbers: Vec<u32> = second.tables.iter().map(|t| t.table_number).collect();
        assert_eq!(numbers, vec![3, 4]);

        let tables = load_tables(store.as_ref(), &id).await.unwrap();
        assert_eq!(tables.len(), 2);

        // Clearing tables does not reset the counter.
        assigner.clear_assignments(&id).await.unwrap();
        let third = assigner.assign(&id, AssignStrategy::Random).await.unwrap();
        let numbers: Vec<u32> = third.tables.iter().map(|t| t.table_number).collect();
        assert_eq!(numbers, vec![5, 6]);
    }

    #[tokio::test]
    async fn test_ranked_strategies_fall_back_before_round_one() {
        let (_, assigner, id) = setup(8).await;
        let outcome = assigner.assign(&id, AssignStrategy::Ranking).await.unwrap();
        assert_eq!(outcome.strategy, AssignStrategy::Random);

        let outcome = assigner
            .assign(&id, AssignStrategy::RoundRobin)
            .await
            .unwrap();
        assert_eq!(outcome.strategy, AssignStrategy::Random);
    }

    #[tokio::test]
    async fn test_ranking_strategy_groups_by_standings() {
        let (store, assigner, id) = setup(8).await;
        let lifecycle = RoundLifecycle::new(store.clone());

        lifecycle.start(&id).await.unwrap();
        // Give each player a distinct score so standings are unambiguous.
        let players = load_players(store.as_ref(), &id).await.unwrap();
        let mut by_name = players.clone();
        by_name.sort_by(|a, b| a.data.name.cmp(&b.data.name));
        for (i, player) in by_name.iter().enumerate() {
            if i > 0 {
                lifecycle
                    .record_game(&id, &player.id, i as f64)
                    .await
                    .unwrap();
            }
        }
        lifecycle.end(&id).await.unwrap();

        let outcome = assigner.assign(&id, AssignStrategy::Ranking).await.unwrap();
        assert_eq!(outcome.strategy, AssignStrategy::Ranking);

        // Best four (Player 07..04) share the first table.
        let top: HashSet<String> = by_name[4..].iter().map(|p| p.id.clone()).collect();
        let first: HashSet<String> = outcome.tables[0].players.iter().cloned().collect();
        assert_eq!(first, top);
    }

    #[tokio::test]
    async fn test_round_robin_disperses_the_top_players() {
        let (store, assigner, id) = setup(8).await;
        let lifecycle = RoundLifecycle::new(store.clone());

        lifecycle.start(&id).await.unwrap();
        let players = load_players(store.as_ref(), &id).await.unwrap();
        let mut by_name = players.clone();
        by_name.sort_by(|a, b| a.data.name.cmp(&b.data.name));
        for (i, player) in by_name.iter().enumerate() {
            if i > 0 {
                lifecycle
                    .record_game(&id, &player.id, i as f64)
                    .await
                    .unwrap();
            }
        }
        lifecycle.end(&id).await.unwrap();

        let outcome = assigner
            .assign(&id, AssignStrategy::RoundRobin)
            .await
            .unwrap();
        assert_eq!(outcome.strategy, AssignStrategy::RoundRobin);

        // The two best players sit at different tables.
        let best = &by_name[7].id;
        let second = &by_name[6].id;
        let table_of = |pid: &String| {
            outcome
                .tables
                .iter()
                .position(|t| t.players.contains(pid))
                .unwrap()
        };
        assert_ne!(table_of(best), table_of(second));
    }
}
