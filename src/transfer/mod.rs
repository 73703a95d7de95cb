//! Whole-tournament state export and import.

pub mod manager;
pub mod models;

pub use manager::{ImportResult, StateTransfer};
pub use models::{
    EXPORT_VERSION, ExportedParticipant, ExportedPlayer, ExportedRound, ExportedTable,
    TournamentExport,
};
