//! # warden-contracts
//!
//! Shared types for the WARDEN rule engine: events, verdicts, actions,
//! decisions, snapshots, alert summaries, and the error enum.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate beyond construction-time validation and verdict ordering.

pub mod action;
pub mod alert;
pub mod decision;
pub mod error;
pub mod event;
pub mod scope;
pub mod snapshot;
pub mod verdict;
