//! # chartwatch
//!
//! Daily App Store chart snapshots in SQLite, and the reports built on top
//! of them: which apps are new, which came back, which fell out, and which
//! moved.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  CSV files  │──▶│   ingest    │──▶│  SQLite  │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │ SnapshotReader
//!                                   ┌──────┴───────┐
//!                                   │ chartwatch-  │
//!                                   │ core engines │
//!                                   └──────┬───────┘
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema bootstrap |
//! | [`sqlite_store`] | SQLite `SnapshotReader` and row inserts |
//! | [`ingest`] | CSV ingestion |
//! | [`compare`] | Lifecycle report command |
//! | [`weekly`] | Weekly insights and trending commands |
//! | [`history`] | Per-date entry/exit events |
//! | [`meta`] | Available filter values |
//! | [`stats`] | Database overview |
//! | [`export`] | JSON / CSV / table rendering |
//! | [`server`] | HTTP API |

pub mod compare;
pub mod config;
pub mod db;
pub mod export;
pub mod history;
pub mod ingest;
pub mod meta;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod weekly;
