#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! x402x Facilitator Server
//!
//! HTTP facilitator for the x402x router-settlement payment protocol:
//! verifies and settles EIP-3009 authorizations directly or through a
//! `SettlementRouter` contract across one or more EVM networks.
//!
//! # Modules
//!
//! - [`config`] — configuration types and loading
//! - [`error`] — HTTP mapping for the closed error taxonomy
//! - [`handlers`] — `/verify`, `/settle`, `/calculate-fee`, `/supported`, health
//! - [`rate_limit`] — per-IP fixed-window rate limiting
//! - [`shutdown`] — signal handling and connection draining
//! - [`state`] — application state built from a loaded configuration

pub mod config;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod shutdown;
pub mod state;

pub use state::{build, AppState, BuildError, SharedAppState};
