//! Table seating: grouping active players into tables of four.

pub mod assigner;

pub use assigner::{
    AssignStrategy, AssignedTable, AssignmentOutcome, TableAssigner, partition_consecutive,
    partition_round_robin,
};
