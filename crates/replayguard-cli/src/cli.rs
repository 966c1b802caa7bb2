//! Command-line argument surface (spec §6.3).
//!
//! Grounded on the teacher's `mockforge-cli/src/main.rs` top-level `Cli`
//! struct: a global verbosity flag plus one `mod` per subcommand.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Replay recorded HTTP sessions and verify compatibility against dynamic
/// templates, a live target, or an OpenAPI contract.
#[derive(Debug, Parser)]
#[command(name = "replayguard", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format for a command's final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Machine-readable JSON (spec §6.4).
    Json,
    /// Human-readable colored text.
    Text,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a session file and report compatibility.
    Replay(ReplayArgs),
    /// Attach tags to the interactions of a session file.
    Tag(TagArgs),
    /// Inspect session files in a directory.
    Session(SessionArgs),
    /// Generate shell completion scripts.
    Completions(CompletionsArgs),
}

/// `replayguard replay <session-file>` (spec §6.3).
#[derive(Debug, clap::Args)]
pub struct ReplayArgs {
    /// Session file to replay.
    pub session_file: PathBuf,

    /// OpenAPI contract file to import routes from before replay.
    #[arg(long)]
    pub contract: Option<PathBuf>,

    /// Config file (.json/.yaml) with `ReplayConfig` settings.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the report to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Minimum acceptable compatibility score (0-100). See `--fail-on-threshold`.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Exit non-zero when the session's compatibility score falls below `--threshold`.
    #[arg(long)]
    pub fail_on_threshold: bool,

    /// Replay against the live target instead of synthesizing from templates.
    #[arg(long)]
    pub no_dynamic: bool,

    /// Zero out every tolerance rule for this run (spec §4.E).
    #[arg(long, conflicts_with = "tolerant")]
    pub strict: bool,

    /// Force-enable every tolerance rule with its defaults (spec §4.E).
    #[arg(long, conflicts_with = "strict")]
    pub tolerant: bool,

    /// Compile every resolved route's template before replay starts.
    #[arg(long)]
    pub preload_templates: bool,

    /// Include route-resolution/template cache metrics in the report.
    #[arg(long)]
    pub performance: bool,

    /// Restrict replay to these HTTP methods (repeatable).
    #[arg(long = "filter-methods", value_delimiter = ',')]
    pub filter_methods: Vec<String>,

    /// Restrict replay to routes matching these globs/substrings (repeatable).
    #[arg(long = "filter-routes", value_delimiter = ',')]
    pub filter_routes: Vec<String>,

    /// Restrict replay to interactions carrying one of these tags (repeatable).
    #[arg(long = "filter-tags", value_delimiter = ',')]
    pub filter_tags: Vec<String>,

    /// Restrict replay to sessions carrying one of these tags (repeatable).
    #[arg(long = "filter-session-tags", value_delimiter = ',')]
    pub filter_session_tags: Vec<String>,
}

/// `replayguard tag <session-file>` (spec §6.3).
#[derive(Debug, clap::Args)]
pub struct TagArgs {
    /// Session file to modify.
    pub session_file: PathBuf,

    /// Tags to add to every interaction (repeatable).
    #[arg(long = "add", value_delimiter = ',')]
    pub add: Vec<String>,

    /// Write the result to this file instead of overwriting `session_file`.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// `replayguard session list|show` (spec §6.3).
#[derive(Debug, clap::Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub action: SessionAction,
}

#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// List session files in a directory, newest first.
    List {
        /// Directory to scan for `*.json` session files.
        #[arg(default_value = ".")]
        directory: PathBuf,
    },
    /// Show the interactions recorded in one session file.
    Show {
        /// Session file to display.
        session_file: PathBuf,
    },
}

/// `replayguard completions <shell>`.
#[derive(Debug, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate a completion script for.
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
