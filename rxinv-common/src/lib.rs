//! # rxinv Common Library
//!
//! Shared code for the pharmacy inventory ingestion services:
//! - Common error type
//! - TOML configuration model and loading
//! - Relational schema bootstrap
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
