//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dadyar",
    version,
    about = "Persian legal question answering over a local document corpus",
    long_about = "Dadyar ingests Persian legal documents (statutes, regulations, rulings), \
                  segments them into legal units, and answers questions with retrieval-augmented \
                  generation: domain classification, filtered vector search, cross-encoder \
                  re-ranking, and cited answers from a configured language model."
)]
pub struct Cli {
    /// Config file path (defaults to ~/.config/dadyar/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply (e.g. "offline", "accuracy")
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
    /// Ingest documents (.txt/.md files or directories) into the corpus
    Ingest {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Retrieval only: search the corpus without generating an answer
    Search {
        /// Search query text
        query: String,

        /// Number of results to return
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Restrict to a legal domain (criminal/civil/family/commercial)
        #[arg(short, long)]
        domain: Option<String>,

        /// Restrict to a document type (law/regulation/ruling/document)
        #[arg(short = 't', long = "type")]
        document_type: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a question through the full RAG pipeline
    Ask {
        /// Question text (Persian)
        question: String,

        /// Number of context units in the final answer
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Disable domain classification and metadata filtering
        #[arg(long)]
        no_enhanced: bool,

        /// Disable cross-encoder re-ranking
        #[arg(long)]
        no_rerank: bool,

        /// Output the answer payload as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop with conversation memory
    Chat {
        /// Number of context units per answer
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show corpus and index statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

impl Cli {
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
    fn test_ask_flags() {
        let cli = Cli::parse_from([
            "dadyar",
            "ask",
            "مجازات سرقت چیست؟",
            "-k",
            "3",
            "--no-rerank",
            "--json",
        ]);
        match cli.command {
            Commands::Ask {
                question,
                top_k,
                no_enhanced,
                no_rerank,
                json,
            } => {
                assert_eq!(question, "مجازات سرقت چیست؟");
                assert_eq!(top_k, Some(3));
                assert!(!no_enhanced);
                assert!(no_rerank);
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_requires_paths() {
        assert!(Cli::try_parse_from(["dadyar", "ingest"]).is_err());
    }
}
