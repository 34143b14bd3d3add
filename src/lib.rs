//! Invoice-automation ROI simulator.
//!
//! The engine (`simulation`) turns a handful of AP-team parameters into
//! savings, payback and ROI figures. Scenarios are persisted through a
//! `ScenarioBackend` (SQLite on the server, a JSON cache on the client), and
//! the `api` module serves everything over HTTP.

pub mod analytics;
pub mod api;
pub mod config;
pub mod middleware;
pub mod models;
pub mod report;
pub mod scenarios;
pub mod simulation;
