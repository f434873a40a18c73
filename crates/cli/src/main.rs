mod cmd;
mod logging;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kbindex_core::index::DocumentKind;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "kbx",
    version,
    about = "Incremental knowledge index for agent document corpora"
)]
struct Cli {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/kbindex/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config profile to use
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Index this directory with default settings, ignoring any config file
    #[arg(long, global = true, conflicts_with_all = ["config", "profile"])]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate configuration and report on the index
    Doctor,

    /// Bring the index up to date with the corpus
    Sync(SyncArgs),

    /// Full-text search over frontmatter and body
    Search(SearchArgs),

    /// Show transitive dependencies or dependents of a document
    Deps(DepsArgs),

    /// Show a stored document
    Show(ShowArgs),

    /// Show direct references from and to a document
    Links(LinksArgs),
}

/// Output format for query commands.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON for scripting
    Json,
    /// Paths only, one per line
    Quiet,
}

/// Flags shared by every query command.
#[derive(Debug, Args)]
pub struct FormatArgs {
    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,

    /// Shorthand for --output json
    #[arg(long, conflicts_with = "quiet")]
    pub json: bool,

    /// Shorthand for --output quiet
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

impl FormatArgs {
    pub fn resolve(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.quiet {
            OutputFormat::Quiet
        } else {
            self.output
        }
    }
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Re-parse every file, not only changed ones
    #[arg(long)]
    pub full: bool,

    /// Print each applied document
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search terms; a trailing `*` makes a term a prefix
    #[arg(required = true)]
    pub terms: Vec<String>,

    /// Match documents containing any term instead of all of them
    #[arg(long)]
    pub any: bool,

    /// Only return documents of this kind
    #[arg(long, short = 'k')]
    pub kind: Option<DocumentKind>,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<u32>,

    #[command(flatten)]
    pub format: FormatArgs,
}

#[derive(Debug, Args)]
pub struct DepsArgs {
    /// Document path, relative to the corpus root
    pub path: String,

    /// Show what the document depends on (default)
    #[arg(long, conflicts_with = "descendants")]
    pub ancestors: bool,

    /// Show what depends on the document
    #[arg(long)]
    pub descendants: bool,

    /// Maximum number of hops
    #[arg(long, short = 'd')]
    pub depth: Option<u32>,

    #[command(flatten)]
    pub format: FormatArgs,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Document path, relative to the corpus root
    pub path: String,

    /// Include the body text
    #[arg(long, short = 'b')]
    pub body: bool,

    /// Print the document as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct LinksArgs {
    /// Document path, relative to the corpus root
    pub path: String,

    /// Only show references pointing at the document
    #[arg(long, conflicts_with = "outgoing")]
    pub incoming: bool,

    /// Only show references the document makes
    #[arg(long)]
    pub outgoing: bool,

    #[command(flatten)]
    pub format: FormatArgs,
}

fn main() {
    let cli = Cli::parse();
    let ctx = cmd::Context { config: cli.config, profile: cli.profile, root: cli.root };

    match cli.command {
        Commands::Doctor => cmd::doctor::run(&ctx),
        Commands::Sync(args) => cmd::sync::run(&ctx, args),
        Commands::Search(args) => cmd::search::run(&ctx, args),
        Commands::Deps(args) => cmd::deps::run(&ctx, args),
        Commands::Show(args) => cmd::show::run(&ctx, args),
        Commands::Links(args) => cmd::links::run(&ctx, args),
    }
}
