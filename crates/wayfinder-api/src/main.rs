//! Wayfinder CLI entry point.
//!
//! Binary name: `wayfinder`
//!
//! Parses CLI arguments, initializes tracing and application state, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing::{debug, warn};
use wayfinder_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::chat::ChatArgs;
use cli::search::SearchArgs;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        enable_otel: cli.otel,
        json: cli.log_json,
        verbosity: cli.verbose,
        quiet: cli.quiet,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "wayfinder", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;
    let json = cli.json;

    if matches!(
        cli.command,
        Commands::Search { .. }
            | Commands::Suggest { .. }
            | Commands::Similar { .. }
            | Commands::Recommend { .. }
            | Commands::Chat { .. }
    ) {
        warm_index(&state).await;
    }

    match cli.command {
        Commands::Index { force } => cli::index::index(&state, force, json).await,

        Commands::AddImage {
            entity_type,
            entity_id,
            path,
            title,
        } => cli::index::add_image(&state, entity_type, entity_id, &path, title, json).await,

        Commands::Search {
            query,
            entity_types,
            top_k,
            min_score,
            image,
            user_id,
        } => {
            let args = SearchArgs {
                query,
                entity_types,
                top_k,
                min_score,
                image,
                user_id,
            };
            cli::search::search(&state, args, json).await
        }

        Commands::Suggest { query, limit } => cli::search::suggest(&state, &query, limit, json).await,

        Commands::Similar {
            entity_type,
            entity_id,
            limit,
        } => cli::search::similar(&state, entity_type, entity_id, limit, json),

        Commands::Recommend { user_id, limit } => {
            cli::search::recommend(&state, user_id, limit, json).await
        }

        Commands::Chat {
            message,
            session,
            user_id,
            max_context,
            no_sources,
        } => {
            let args = ChatArgs {
                message,
                session,
                user_id,
                max_context,
                include_sources: !no_sources,
            };
            cli::chat::chat(&state, args, json).await
        }

        Commands::Memory { action } => {
            cli::memory::handle_memory_command(action, &state, json).await
        }

        Commands::History { session_id, limit } => {
            cli::memory::history(&state, &session_id, limit, json).await
        }

        Commands::Stats => cli::status::stats(&state, json),

        Commands::Completions { .. } => unreachable!("handled before state init"),
    }
}

/// Build the text index on first use when a record store is configured.
/// Query commands still run when indexing fails.
async fn warm_index(state: &AppState) {
    if state.record_backend.is_none() {
        return;
    }
    match state.indexer.ensure_indexed().await {
        Ok(outcome) => debug!(?outcome, "Startup indexing checked"),
        Err(e) => warn!(error = %e, "Startup indexing failed; continuing with the current index"),
    }
}
