//! # Table League
//!
//! A round and ranking engine for live multi-table leagues: players sit in
//! tables of four, play timed rounds, and accumulate scores in append-only
//! per-player ledgers from which a deterministic five-level ranking is
//! computed.
//!
//! ## Core Modules
//!
//! - [`store`]: storage abstraction (atomic write batches over a document
//!   hierarchy), with in-memory and PostgreSQL backends
//! - [`tournament`]: entity models and tournament administration
//! - [`score`]: score ledgers and multiplier-weighted aggregates
//! - [`round`]: the round lifecycle state machine and game recording
//! - [`seating`]: table assignment strategies
//! - [`ranking`]: deterministic standings computation
//! - [`transfer`]: whole-tournament export and import
//! - [`repair`]: integrity scanning and ledger backfill
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use table_league::{
//!     AssignStrategy, MemoryStore, RoundLifecycle, TableAssigner,
//!     TournamentConfig, TournamentManager,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let manager = TournamentManager::new(store.clone());
//!
//! let id = manager
//!     .create_tournament(TournamentConfig::standard("Spring League"))
//!     .await?;
//! let names: Vec<String> = (1..=8).map(|i| format!("Player {i}")).collect();
//! manager.import_players(&id, &names).await?;
//!
//! TableAssigner::new(store.clone())
//!     .assign(&id, AssignStrategy::Random)
//!     .await?;
//! RoundLifecycle::new(store).start(&id).await?;
//! # Ok(())
//! # }
//! ```

/// Storage abstraction and backends.
pub mod store;
pub use store::{DocumentStore, MemoryStore, PgStore, StoreConfig, StoreError, WriteBatch};

/// Tournament entities and administration.
pub mod tournament;
pub use tournament::{
    EngineError, EngineResult, IntegrityWarning, Player, Round, RoundStatus, ScoreEvent, Seat,
    Table, Tournament, TournamentConfig, TournamentManager, TournamentStatus, TournamentType,
};

/// Score ledgers and aggregates.
pub mod score;
pub use score::{ScoreLedger, round_score, tournament_score};

/// Round lifecycle.
pub mod round;
pub use round::{RoundLifecycle, RoundSummary};

/// Table assignment.
pub mod seating;
pub use seating::{AssignStrategy, AssignmentOutcome, TableAssigner};

/// Standings.
pub mod ranking;
pub use ranking::{RankingEngine, Standing, compute_standings};

/// Export and import.
pub mod transfer;
pub use transfer::{StateTransfer, TournamentExport};

/// Integrity scanning and repair.
pub mod repair;
pub use repair::{BackfillReport, IntegrityChecker, IntegrityReport};
