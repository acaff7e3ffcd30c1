//! `wit_migrate` - idempotent migration between project stores.
//!
//! Copies area and iteration trees, test configurations, work items (with a
//! synthesized history), shared queries and test plans from a source project
//! into a target project. Every migrated work item carries a reflected
//! identity pointing back at its source, so a run can be repeated at any
//! time and only creates what is missing.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Layered run configuration
//! - [`error`] - Error types and handling
//! - [`format`] - Summary output (text, JSON)
//! - [`identity`] - Reflected identities and the migrated-item index
//! - [`logging`] - Tracing subscriber setup
//! - [`migrate`] - Run coordinator and per-kind processors
//! - [`model`] - Work items, classification nodes, test plans, queries
//! - [`reconcile`] - Test configuration translation by name
//! - [`replicate`] - Work item copy and history synthesis
//! - [`storage`] - Store capabilities and the `SQLite` implementation
//! - [`sync`] - Hierarchy mirroring and path rewriting

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod identity;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod reconcile;
pub mod replicate;
pub mod storage;
pub mod sync;

pub use config::MigrationConfig;
pub use error::{ErrorCode, MigrateError, ParseError, Result, StructuredError};
pub use identity::{IdentityResolver, ReflectedIdentity, compute_identity, parse_identity};
pub use migrate::{MigrationEngine, MigrationKind, RunSummary};
pub use storage::SqliteStore;
