//! Course slot allocation for a group of students over several days.
//!
//! A randomized greedy assigner gives every student a fixed number of
//! distinct classes without overfilling a class or double-booking a period.
//! Independent checkers then verify the result, and an output scorer grades
//! the rendered timetable.
//!
//! - **`data`**: catalog, configuration, allocation and report types
//! - **`solver`**: the assignment engine and its capacity/period bookkeeping
//! - **`checkers`**: stateless constraint checks
//! - **`output_validator`**: clarity score of a rendered allocation
//! - **`formatter`**, **`stats`**, **`pipeline`**: rendering, run statistics, one full pass
//! - **`config`**, **`server`**: file-backed providers and the HTTP surface

pub mod checkers;
pub mod config;
pub mod data;
pub mod error;
pub mod formatter;
pub mod output_validator;
pub mod pipeline;
pub mod server;
pub mod solver;
pub mod stats;

pub use error::{Result, SchedulerError};
