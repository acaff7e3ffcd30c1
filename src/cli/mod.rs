//! Command-line interface definitions.

pub mod commands;

use crate::config::CliOverrides;
use crate::migrate::MigrationKind;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "wit-migrate",
    version,
    about = "Idempotent migration of work items, classification trees, test plans and queries between projects",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Errors only.
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Also write JSON log events to this file.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty project store.
    Init(InitArgs),

    /// Migrate one kind of entity (or all of them) from source to target.
    Migrate(MigrateArgs),

    /// Decode a reflected identity and print the source id.
    Identity(IdentityArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Database file to create.
    pub db: PathBuf,

    /// Project name.
    #[arg(long)]
    pub project: String,

    /// Collection endpoint.
    #[arg(long, default_value = "http://localhost:8080/tfs/DefaultCollection")]
    pub endpoint: String,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// What to migrate.
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Migration config file (default: ./migration.yaml if present).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Source project store.
    #[arg(long, value_name = "PATH", env = "WITM_SOURCE_DB")]
    pub source: Option<PathBuf>,

    /// Target project store.
    #[arg(long, value_name = "PATH", env = "WITM_TARGET_DB")]
    pub target: Option<PathBuf>,

    /// Graft source paths under a node named after the source project.
    #[arg(long)]
    pub prefix_project_to_nodes: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl MigrateArgs {
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            source_db: self.source.clone(),
            target_db: self.target.clone(),
            prefix_project_to_nodes: self.prefix_project_to_nodes.then_some(true),
        }
    }
}

#[derive(Args, Debug)]
pub struct IdentityArgs {
    /// Value of the identity field, e.g. `https://host/tfs/Project/42`.
    pub value: String,
}

/// Migration kind as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Nodes,
    TestConfigurations,
    WorkItems,
    Queries,
    TestPlans,
    All,
}

impl KindArg {
    /// `None` means every kind.
    #[must_use]
    pub const fn kind(self) -> Option<MigrationKind> {
        match self {
            Self::Nodes => Some(MigrationKind::Nodes),
            Self::TestConfigurations => Some(MigrationKind::TestConfigurations),
            Self::WorkItems => Some(MigrationKind::WorkItems),
            Self::Queries => Some(MigrationKind::Queries),
            Self::TestPlans => Some(MigrationKind::TestPlans),
            Self::All => None,
        }
    }
}
