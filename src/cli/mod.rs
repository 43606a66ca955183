//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "qsb",
    version,
    author = "neur0map",
    about = "Blended search suggestions across configured corpora",
    long_about = "qsb fans a query out to every enabled corpus, blends the answers into a \
                  ranked promoted list and learns shortcuts from the suggestions you pick."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/qsb/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Query all enabled corpora and print the promoted suggestions
    Query {
        /// Search query text
        query: String,

        /// Query only this corpus
        #[arg(long)]
        corpus: Option<String>,

        /// Maximum number of promoted suggestions (defaults to search.max_promoted)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Give up on corpora that have not answered after this many milliseconds
        #[arg(long, default_value = "2000")]
        timeout_ms: u64,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Query and record a click on one of the promoted suggestions
    Click {
        /// Search query text
        query: String,

        /// Query only this corpus
        #[arg(long)]
        corpus: Option<String>,

        /// Position in the promoted list (0-based)
        #[arg(long, default_value = "0")]
        position: usize,
    },

    /// List enabled corpora in rank order
    Corpora,

    /// Inspect or clear click history
    Shortcuts {
        #[command(subcommand)]
        action: ShortcutsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ShortcutsAction {
    /// List stored shortcuts, optionally only those matching a query prefix
    List {
        /// Query prefix
        query: Option<String>,
    },

    /// Forget all clicks and shortcuts
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query() {
        let cli = Cli::try_parse_from([
            "qsb", "query", "cal", "--corpus", "apps", "--limit", "3", "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                query,
                corpus,
                limit,
                timeout_ms,
                json,
            } => {
                assert_eq!(query, "cal");
                assert_eq!(corpus.as_deref(), Some("apps"));
                assert_eq!(limit, Some(3));
                assert_eq!(timeout_ms, 2000);
                assert!(json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["qsb", "corpora", "--profile", "minimal", "-v"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("minimal"));
        assert!(cli.verbose);
    }
}
