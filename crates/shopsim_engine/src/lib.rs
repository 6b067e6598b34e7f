//! Deterministic backend simulation for storefront workflows.
//!
//! This crate provides:
//! - A fixed endpoint table with per-endpoint failure categories
//! - Latency profiles and seeded delay sampling
//! - Failure injection through live-updating settings
//! - An async simulator whose calls can be cancelled mid-delay
//! - Decision campaigns with determinism fingerprints
//!
//! # Example
//!
//! ```rust,ignore
//! use shopsim_engine::{Endpoint, SettingsStore, Simulator};
//!
//! let sim = Simulator::new(SettingsStore::default(), 42);
//! let reply = sim.call(Endpoint::Search, &token).await?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod campaign;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod generators;
pub mod profile;
pub mod settings;
pub mod simulator;

pub use campaign::{run_campaign, CampaignReport, CampaignRow, OutcomeStats};
pub use endpoint::{Endpoint, PAYMENT_FAILURES};
pub use engine::{decide, Decision, Outcome, SuccessKind};
pub use error::{CallError, Error, Result};
pub use profile::{DelayRange, LatencyProfile};
pub use settings::{FailureTable, SettingsStore, SimSettings};
pub use simulator::{Reply, Simulator};
