//! # warden-policy
//!
//! TOML-driven compliance rules for the WARDEN engine.
//!
//! ## Overview
//!
//! This crate turns a policy file into a [`RuleRegistry`](warden_core::RuleRegistry)
//! of [`PolicyRule`]s. Each rule names the (kind, phase) pairs it applies to
//! and one parameterized check: path restriction, staleness, command or
//! content pattern, documentation trigger, or task-list reminder. Thresholds
//! and patterns are policy, so they live in the file rather than the engine.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use warden_policy::{build_warden, PolicyConfig};
//!
//! let config = PolicyConfig::from_file(Path::new("policies/project.toml"))?;
//! let warden = build_warden(&config, Box::new(handler), Box::new(SystemClock))?;
//! let handled = warden.handle(event);
//! ```

pub mod config;
pub mod engine;
pub mod rule;

pub use config::{CheckConfig, MatchVerdict, PolicyConfig, RuleConfig, Settings, WatchedResource};
pub use engine::{build_engine, build_registry, build_warden, compile_rule, default_scope};
pub use rule::{Check, PolicyRule};

// ── Tests ─────────────────────────────────────────────────────────────────────
