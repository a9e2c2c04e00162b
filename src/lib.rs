//! Weekly timetable scheduler.
//!
//! Assigns every required weekly lesson (teacher × classroom × subject) of
//! the current term to a (day, period) slot in a 5 × 7 grid, then replaces
//! the term's stored grid in one transaction.

pub mod config;
pub mod data;
pub mod error;
pub mod occupancy;
pub mod report;
pub mod rules;
pub mod server;
pub mod service;
pub mod solver;
pub mod store;
