//! Core domain + application logic for the bulletin monitor.
//!
//! This crate is intentionally transport-free. The upstream bulletin
//! service and the notification channel live behind ports (traits)
//! implemented in adapter crates.

pub mod attachments;
pub mod config;
pub mod detector;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod formatting;
pub mod ledger;
pub mod links;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod source;

pub use errors::{Error, Result};
