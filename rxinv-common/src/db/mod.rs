//! Relational schema bootstrap and connection setup

pub mod init;

pub use init::*;
