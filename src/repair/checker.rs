//! Integrity scanning and round-number backfill.
//!
//! The scan is read-only and reports every finding instead of stopping at
//! the first; findings are warnings, not errors, because a live league must
//! keep running on imperfect data. The only write path here is the
//! round-number backfill, which is dry-run unless explicitly applied.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;

use crate::store::{self, DocumentStore, WriteBatch, paths};
use crate::tournament::errors::{EngineResult, IntegrityWarning};
use crate::tournament::models::{Round, ScoreEvent};
use crate::tournament::{load_players, load_rounds, load_tables, load_tournament};

/// Findings of one integrity scan
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub warnings: Vec<IntegrityWarning>,
}

impl IntegrityReport {
    /// No findings
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Outcome of a round-number backfill pass
#[derive(Debug, Clone)]
pub struct BackfillReport {
    /// Events whose round could be inferred from the round time windows
    pub inferred: usize,
    /// Events matching no round window, left untouched
    pub unmatched: usize,
    /// Whether the inferences were written back
    pub applied: bool,
}

/// Scans tournaments for inconsistencies and repairs ledger round tags.
#[derive(Clone)]
pub struct IntegrityChecker {
    store: Arc<dyn DocumentStore>,
}

impl IntegrityChecker {
    /// Create a new integrity checker
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Scan one tournament, reporting every inconsistency found.
    pub async fn scan(&self, tournament_id: &str) -> EngineResult<IntegrityReport> {
        load_tournament(self.store.as_ref(), tournament_id).await?;
        let players = load_players(self.store.as_ref(), tournament_id).await?;
        let tables = load_tables(self.store.as_ref(), tournament_id).await?;
        let rounds = load_rounds(self.store.as_ref(), tournament_id).await?;

        let table_ids: HashSet<&str> = tables.iter().map(|t| t.id.as_str()).collect();
        let player_ids: HashSet<&str> = players.iter().map(|p| p.id.as_str()).collect();
        let round_numbers: HashSet<u32> = rounds.iter().map(|r| r.data.round_number).collect();
        let windows = round_windows(&rounds);

        let mut report = IntegrityReport::default();

        for table in &tables {
            for pid in &table.data.players {
                if !player_ids.contains(pid.as_str()) {
                    report.warnings.push(IntegrityWarning::OrphanPlayerRef {
                        table_number: table.data.table_number,
                        player_id: pid.clone(),
                    });
                }
            }
        }

        for player in &players {
            let name = &player.data.name;

            if let Some(table_id) = &player.data.table_id {
                if !table_ids.contains(table_id.as_str()) {
                    report.warnings.push(IntegrityWarning::OrphanTableRef {
                        player_id: player.id.clone(),
                        player_name: name.clone(),
                        table_id: table_id.clone(),
                    });
                }
                if player.data.eliminated {
                    report.warnings.push(IntegrityWarning::EliminatedAtTable {
                        player_id: player.id.clone(),
                        player_name: name.clone(),
                        table_id: table_id.clone(),
                    });
                }
            }

            let mut ledger_total = 0.0;
            for (index, event) in player.data.score_events.iter().enumerate() {
                ledger_total += event.delta;
                match event.round_number {
                    None => {
                        report.warnings.push(IntegrityWarning::EventMissingRound {
                            player_id: player.id.clone(),
                            player_name: name.clone(),
                            index,
                        });
                    }
                    Some(n) if !round_numbers.contains(&n) => {
                        report.warnings.push(IntegrityWarning::EventUnknownRound {
                            player_id: player.id.clone(),
                            player_name: name.clone(),
                            index,
                            round_number: n,
                        });
                    }
                    Some(_) => {}
                }
                if infer_round(&windows, event.timestamp).is_none() {
                    report.warnings.push(IntegrityWarning::EventOutsideRounds {
                        player_id: player.id.clone(),
                        player_name: name.clone(),
                        timestamp: event.timestamp,
                    });
                }
            }

            // Wins are floored at zero, so the ledger sum is clamped before
            // comparing.
            let expected = ledger_total.max(0.0);
            if (player.data.wins as f64 - expected).abs() > f64::EPSILON {
                report.warnings.push(IntegrityWarning::WinsMismatch {
                    player_id: player.id.clone(),
                    player_name: name.clone(),
                    wins: player.data.wins,
                    ledger_total,
                });
            }
        }

        info!(
            "Integrity scan of {tournament_id}: {} warning(s)",
            report.warnings.len()
        );
        Ok(report)
    }

    /// Infer round numbers for untagged ledger events from the round time
    /// windows, writing them back only when `apply` is set.
    ///
    /// An event belongs to a round when its timestamp falls between the
    /// round's start and end (rounds still in progress have an open end).
    /// Events matching no window are left untouched and counted.
    pub async fn backfill_round_numbers(
        &self,
        tournament_id: &str,
        apply: bool,
    ) -> EngineResult<BackfillReport> {
        load_tournament(self.store.as_ref(), tournament_id).await?;
        let players = load_players(self.store.as_ref(), tournament_id).await?;
        let rounds = load_rounds(self.store.as_ref(), tournament_id).await?;
        let windows = round_windows(&rounds);

        let mut report = BackfillReport {
            inferred: 0,
            unmatched: 0,
            applied: apply,
        };
        let collection = paths::players(tournament_id);
        let mut batch = WriteBatch::new();

        for player in &players {
            let mut events = player.data.score_events.clone();
            let mut changed = false;
            for (index, event) in events.iter_mut().enumerate() {
                if event.round_number.is_some() {
                    continue;
                }
                match infer_round(&windows, event.timestamp) {
                    Some(n) => {
                        info!(
                            "'{}' ({}): event #{index} at {} inferred as round {n}",
                            player.data.name, player.id, event.timestamp
                        );
                        event.round_number = Some(n);
                        changed = true;
                        report.inferred += 1;
                    }
                    None => report.unmatched += 1,
                }
            }
            if changed && apply {
                batch.update(
                    collection.clone(),
                    player.id.clone(),
                    store::to_document(&serde_json::json!({
                        "scoreEvents": events,
                    }))?,
                );
            }
        }

        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        info!(
            "Backfill of {tournament_id}: {} inferred, {} unmatched, applied: {}",
            report.inferred, report.unmatched, report.applied
        );
        Ok(report)
    }
}

/// (round number, start, end) per round, end open while in progress.
fn round_windows(rounds: &[store::Doc<Round>]) -> Vec<(u32, DateTime<Utc>, Option<DateTime<Utc>>)> {
    rounds
        .iter()
        .map(|r| (r.data.round_number, r.data.started_at, r.data.ended_at))
        .collect()
}

fn infer_round(
    windows: &[(u32, DateTime<Utc>, Option<DateTime<Utc>>)],
    at: DateTime<Utc>,
) -> Option<u32> {
    windows
        .iter()
        .find(|(_, start, end)| *start <= at && end.map_or(true, |e| at <= e))
        .map(|(n, _, _)| *n)
}
