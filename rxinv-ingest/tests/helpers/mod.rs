//! Test Helper Utilities
//!
//! Shared fixtures for rxinv-ingest integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;

pub use db_utils::{count_rows, create_test_db, ledger_rows, stock_rows, LedgerRow};
pub use fixtures::{csv, csv_with_rows, TestEnv, FILE, OTHER_TENANT, TENANT};
