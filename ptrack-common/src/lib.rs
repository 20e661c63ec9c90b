//! # ptrack Common Library
//!
//! Shared code for the ptrack service:
//! - Domain records and their insert/patch shapes
//! - The Storage contract with in-memory and SQLite backends
//! - Weekly and friend activity aggregation
//! - Bootstrap configuration loading
//! - Timestamp utilities

pub mod activity;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{Error, Result};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
