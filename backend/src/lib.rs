//! Calendar Assistant Backend Library
//!
//! Turns natural-language calendar requests into dependency-ordered
//! operations against one or more calendar accounts. The main binary is in
//! `src/main.rs`.

pub mod api;
pub mod assistant;
pub mod availability;
pub mod calendar;
pub mod config;
pub mod error;
pub mod intent;
pub mod orchestrator;
/// Session snapshot persistence
///
/// Keeps a parked task graph or an open clarification between turns.
pub mod session;
