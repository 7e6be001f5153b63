//! # chartwatch core
//!
//! Storage-agnostic logic for chartwatch: snapshot models, dimension keys,
//! the [`store::SnapshotReader`] trait, and the comparison engines built on
//! top of it (lifecycle classifier, weekly insights/trending, history).
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. The application
//! crate supplies a SQLite-backed reader; tests and embedders can use
//! [`store::memory::InMemoryStore`].

pub mod classify;
pub mod dimension;
pub mod error;
pub mod history;
pub mod models;
pub mod store;
pub mod weekly;

pub use error::{ChartError, Result};
