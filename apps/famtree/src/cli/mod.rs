//! # famtree CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Create a new empty store file
//! - `status` - Show store metrics
//! - `list` / `show` - Inspect individuals
//! - `hash` - Canonical checksum and BLAKE3 digest
//! - `add` / `set` / `set-family` - Create and edit records
//! - `link` / `unlink` - Edit relationships
//! - `delete` - Delete an individual or a family with full cascade
//! - `query` - Relationship queries
//! - `collate` - Copy a connected subset into a new store file
//! - `graph` - Emit a DOT or JSON projection

mod commands;

use crate::config::{Config, OutputFormat, StoreFormat};
use clap::{Parser, Subcommand};
use famtree_core::FamtreeError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// famtree - genealogical record store
///
/// Individuals, the families joining them, and every relationship query
/// needed to draw a family tree.
#[derive(Parser, Debug)]
#[command(name = "famtree")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a famtree.toml configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the store file
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Store encoding used when saving
    #[arg(short = 'F', long, global = true, value_enum)]
    pub format: Option<StoreFormat>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty store
    Init {
        /// Overwrite an existing store
        #[arg(short, long)]
        force: bool,
    },

    /// Show store metrics
    Status,

    /// List individuals sorted by surname
    List,

    /// Show one individual with its relationships
    Show { id: String },

    /// Canonical checksum of the store
    Hash,

    /// Create an individual and print its id
    Add {
        #[arg(long)]
        forename: Option<String>,
        #[arg(long)]
        surname: Option<String>,
        /// M or F
        #[arg(long)]
        sex: Option<String>,
    },

    /// Set an individual attribute (e.g. `birth.year`, `sex`, `note`)
    Set {
        id: String,
        attribute: String,
        value: String,
    },

    /// Set a family attribute on one of an individual's spousal families
    SetFamily {
        id: String,
        /// e.g. `marriage.year`, `divorce.place`, `note`
        attribute: String,
        value: String,
        #[arg(long)]
        family: Option<String>,
    },

    /// Create a relationship
    #[command(subcommand)]
    Link(LinkCommand),

    /// Remove a relationship
    #[command(subcommand)]
    Unlink(UnlinkCommand),

    /// Delete a record
    #[command(subcommand)]
    Delete(DeleteCommand),

    /// Run a relationship query
    #[command(subcommand)]
    Query(QueryCommand),

    /// Copy a connected subset into a new store file
    #[command(subcommand)]
    Collate(CollateCommand),

    /// Build a graph projection
    Graph {
        /// Root individual; the whole store when absent
        #[arg(long)]
        root: Option<String>,

        /// Walk upward from the root (`--ancestors=false` overrides the config)
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        ancestors: Option<bool>,

        /// Walk downward from the root (`--descendants=false` overrides the config)
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        descendants: Option<bool>,

        /// Output file (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        output_format: Option<OutputFormat>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LinkCommand {
    /// Pair two individuals as spouses
    Spouse {
        a: String,
        b: String,
        #[arg(long)]
        family: Option<String>,
    },
    /// Make FATHER the father of CHILD
    Father { child: String, father: String },
    /// Make MOTHER the mother of CHILD
    Mother { child: String, mother: String },
    /// Record CHILD as a child of PARENT
    Child {
        parent: String,
        child: String,
        #[arg(long)]
        family: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UnlinkCommand {
    /// Leave a spousal family (default: the first)
    Spouse {
        id: String,
        #[arg(long)]
        family: Option<String>,
    },
    /// Detach an individual from its parents
    Parents { id: String },
    /// Detach CHILD from PARENT's family
    Child { parent: String, child: String },
}

#[derive(Subcommand, Debug)]
pub enum DeleteCommand {
    /// Delete an individual and cascade
    Individual { id: String },
    /// Delete a family and every reference to it
    Family { id: String },
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    Parents { id: String },
    Siblings { id: String },
    Spouses { id: String },
    Children {
        id: String,
        #[arg(long)]
        family: Option<String>,
    },
    /// Every ancestor, mother's line first
    Ancestors { id: String },
    /// Ancestors with no further known parent
    Roots { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CollateCommand {
    /// The individual and all ancestors
    Ancestors {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        siblings: bool,
    },
    /// The individual, spouses and all descendants
    Descendants {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        siblings: bool,
    },
    /// Parents, siblings, spouses and children
    Family {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Settings resolved from flags and configuration.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    /// Format for new store files.
    pub format: StoreFormat,
    /// Format requested with `--format`; overrides the existing encoding.
    pub format_flag: Option<StoreFormat>,
    pub json_mode: bool,
    pub config: Config,
}

impl Context {
    #[must_use]
    pub fn resolve(cli: &Cli, config: Config) -> Self {
        Self {
            database: config.database(cli.database.as_deref()),
            format: config.store_format(cli.format),
            format_flag: cli.format,
            json_mode: cli.json_mode,
            config,
        }
    }

    /// Format for rewriting a store whose current encoding is `existing`.
    #[must_use]
    pub fn save_format(&self, existing: Option<StoreFormat>) -> StoreFormat {
        self.format_flag.or(existing).unwrap_or(self.format)
    }
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: Config) -> Result<(), FamtreeError> {
    let ctx = Context::resolve(&cli, config);

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::List) => cmd_list(&ctx),
        Some(Commands::Show { id }) => cmd_show(&ctx, &id),
        Some(Commands::Hash) => cmd_hash(&ctx),
        Some(Commands::Add {
            forename,
            surname,
            sex,
        }) => cmd_add(&ctx, forename, surname, sex.as_deref()),
        Some(Commands::Set {
            id,
            attribute,
            value,
        }) => cmd_set(&ctx, &id, &attribute, &value),
        Some(Commands::SetFamily {
            id,
            attribute,
            value,
            family,
        }) => cmd_set_family(&ctx, &id, &attribute, &value, family.as_deref()),
        Some(Commands::Link(link)) => cmd_link(&ctx, link),
        Some(Commands::Unlink(unlink)) => cmd_unlink(&ctx, unlink),
        Some(Commands::Delete(delete)) => cmd_delete(&ctx, delete),
        Some(Commands::Query(query)) => cmd_query(&ctx, query),
        Some(Commands::Collate(collate)) => cmd_collate(&ctx, collate),
        Some(Commands::Graph {
            root,
            ancestors,
            descendants,
            output,
            output_format,
        }) => cmd_graph(
            &ctx,
            root.as_deref(),
            ancestors,
            descendants,
            output.as_deref(),
            output_format,
        ),
    }
}

// =============================================================================
// TESTS
// =============================================================================
