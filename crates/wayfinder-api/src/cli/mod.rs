//! CLI command definitions for the `wayfinder` binary.
//!
//! Uses clap derive macros for argument parsing. Every command accepts the
//! global `--json` flag for machine-readable output.

pub mod chat;
pub mod index;
pub mod memory;
pub mod search;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use wayfinder_types::entity::EntityType;
use wayfinder_types::memory::MemoryType;

/// Semantic search and travel chat over the Wayfinder index.
#[derive(Parser)]
#[command(name = "wayfinder", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logs (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "WAYFINDER_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the text index from the record store.
    Index {
        /// Rebuild from scratch even if an index exists.
        #[arg(long)]
        force: bool,
    },

    /// Embed an image file and add it to the image index.
    #[command(name = "add-image")]
    AddImage {
        /// Entity type (location, festival, item).
        entity_type: EntityType,

        /// Source entity id.
        entity_id: i64,

        /// Path to the image file.
        path: PathBuf,

        /// Title stored with the image.
        #[arg(long)]
        title: Option<String>,
    },

    /// Semantic search over indexed entities.
    Search {
        /// Search query.
        query: String,

        /// Entity types to include (repeatable). Defaults to all.
        #[arg(long = "type", short = 't')]
        entity_types: Vec<String>,

        /// Maximum number of results.
        #[arg(long, default_value = "10")]
        top_k: usize,

        /// Minimum similarity score.
        #[arg(long, default_value = "0.5")]
        min_score: f32,

        /// Search by image instead of text.
        #[arg(long)]
        image: Option<PathBuf>,

        /// User id the search is made for.
        #[arg(long)]
        user_id: Option<i64>,
    },

    /// Quick title suggestions for a partial query.
    Suggest {
        query: String,

        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Entities similar to an indexed entity.
    Similar {
        entity_type: EntityType,
        entity_id: i64,

        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Personalized recommendations from a user's memories.
    Recommend {
        user_id: i64,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Ask the travel assistant. Without a message, starts an interactive session.
    Chat {
        /// Message to send.
        message: Option<String>,

        /// Continue an existing session.
        #[arg(long)]
        session: Option<String>,

        #[arg(long)]
        user_id: Option<i64>,

        /// Number of retrieved entities used as context (1-10).
        #[arg(long, default_value = "5")]
        max_context: usize,

        /// Do not list sources under the answer.
        #[arg(long)]
        no_sources: bool,
    },

    /// Store and browse user memories.
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },

    /// Show the stored history of a chat session.
    History {
        session_id: String,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Index sizes and provider availability.
    Stats,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Remember something about a user.
    Store {
        user_id: i64,

        /// preference, interest, visited, dislike, or context.
        memory_type: MemoryType,

        content: String,

        #[arg(long, default_value = "1.0")]
        confidence: f64,
    },

    /// List a user's memories, most recent first.
    List {
        user_id: i64,

        #[arg(long = "type")]
        memory_type: Option<MemoryType>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shorten `text` to `max` characters with a trailing ellipsis.
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_parses_repeated_types() {
        let cli = Cli::try_parse_from([
            "wayfinder", "search", "beaches", "-t", "location", "-t", "festival", "--top-k", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                query,
                entity_types,
                top_k,
                ..
            } => {
                assert_eq!(query, "beaches");
                assert_eq!(entity_types, vec!["location", "festival"]);
                assert_eq!(top_k, 3);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_similar_rejects_unknown_entity_type() {
        assert!(Cli::try_parse_from(["wayfinder", "similar", "restaurant", "1"]).is_err());
        assert!(Cli::try_parse_from(["wayfinder", "similar", "Location", "1"]).is_ok());
    }

    #[test]
    fn test_memory_store_parses_type() {
        let cli = Cli::try_parse_from([
            "wayfinder", "--json", "memory", "store", "7", "preference", "loves seafood",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Memory {
                action: MemoryCommand::Store {
                    user_id,
                    memory_type,
                    confidence,
                    ..
                },
            } => {
                assert_eq!(user_id, 7);
                assert_eq!(memory_type, MemoryType::Preference);
                assert!((confidence - 1.0).abs() < f64::EPSILON);
            }
            _ => panic!("expected memory store"),
        }
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("short", 10), "short");
        assert_eq!(ellipsize("Marble Mountains", 10), "Marble ...");
    }
}
