//! Core domain and application logic for the Telegram relay bot.
//!
//! This crate is framework-agnostic. Telegram lives behind ports (traits)
//! implemented in the adapter crate; storage has an in-memory and a SQLite
//! implementation here.

pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod relay;
pub mod sqlite;
pub mod state;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
