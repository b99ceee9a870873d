//! Search commands: semantic search, suggestions, similar items, recommendations.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use wayfinder_types::entity::EntityType;
use wayfinder_types::search::{SearchType, SemanticSearchRequest};

use super::{ellipsize, print_json};
use crate::state::AppState;

fn results_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        header
            .iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

fn score_cell(score: f32) -> Cell {
    let color = if score >= 0.8 {
        Color::Green
    } else if score >= 0.6 {
        Color::Yellow
    } else {
        Color::DarkGrey
    };
    Cell::new(format!("{score:.3}")).fg(color)
}

fn print_empty(what: &str) {
    println!();
    println!("  {} No {what} found.", style("i").blue().bold());
    println!();
}

pub struct SearchArgs {
    pub query: String,
    pub entity_types: Vec<String>,
    pub top_k: usize,
    pub min_score: f32,
    pub image: Option<PathBuf>,
    pub user_id: Option<i64>,
}

/// Run a semantic search.
///
/// ```bash
/// wayfinder search "quiet beaches" --type location --top-k 5
/// wayfinder search "pagoda" --image ./photo.jpg
/// ```
pub async fn search(state: &AppState, args: SearchArgs, json: bool) -> Result<()> {
    let mut request = SemanticSearchRequest::new(args.query);
    if !args.entity_types.is_empty() {
        request.entity_types = args.entity_types;
    }
    request.top_k = args.top_k;
    request.min_score = args.min_score;
    request.user_id = args.user_id;
    if let Some(path) = &args.image {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        request.search_type = SearchType::Image;
        request.image_base64 = Some(STANDARD.encode(bytes));
    }

    let response = state.search.semantic_search(&request).await?;

    if json {
        return print_json(&response);
    }
    if !response.success {
        bail!(
            "Search failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }
    if response.results.is_empty() {
        print_empty("results");
        return Ok(());
    }

    let mut table = results_table(&["Score", "Type", "Id", "Title", "Location"]);
    for result in &response.results {
        table.add_row(vec![
            score_cell(result.score),
            Cell::new(result.entity_type).fg(Color::Cyan),
            Cell::new(result.id).fg(Color::DarkGrey),
            Cell::new(ellipsize(&result.title, 48)),
            Cell::new(result.location.as_deref().unwrap_or("")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!(
        "  {} results for '{}' ({:.1} ms, {} search)",
        style(response.total_count).bold(),
        style(&response.query).cyan(),
        response.search_time_ms,
        response.search_type
    );
    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn suggest(state: &AppState, query: &str, limit: usize, json: bool) -> Result<()> {
    let suggestions = state.search.suggestions(query, limit).await?;

    if json {
        return print_json(&suggestions);
    }
    if suggestions.is_empty() {
        print_empty("suggestions");
        return Ok(());
    }

    println!();
    for suggestion in &suggestions {
        println!(
            "  {} {} {}",
            style(format!("{:.2}", suggestion.score)).dim(),
            suggestion.text,
            style(format!("({}/{})", suggestion.entity_type, suggestion.entity_id)).dim()
        );
    }
    println!();
    Ok(())
}

pub fn similar(
    state: &AppState,
    entity_type: EntityType,
    entity_id: i64,
    limit: usize,
    json: bool,
) -> Result<()> {
    let items = state.search.similar_items(entity_type, entity_id, limit)?;

    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        print_empty("similar items");
        return Ok(());
    }

    let mut table = results_table(&["Similarity", "Type", "Id", "Name"]);
    for item in &items {
        table.add_row(vec![
            score_cell(item.similarity_score),
            Cell::new(item.entity_type).fg(Color::Cyan),
            Cell::new(item.entity_id).fg(Color::DarkGrey),
            Cell::new(ellipsize(&item.name, 48)),
        ]);
    }

    println!();
    println!(
        "  Similar to {}",
        style(format!("{entity_type}/{entity_id}")).cyan().bold()
    );
    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn recommend(state: &AppState, user_id: i64, limit: usize, json: bool) -> Result<()> {
    let recommendations = state.search.recommendations(user_id, limit).await?;

    if json {
        return print_json(&recommendations);
    }
    if recommendations.is_empty() {
        print_empty("recommendations");
        return Ok(());
    }

    let mut table = results_table(&["Score", "Type", "Id", "Name", "Reason"]);
    for rec in &recommendations {
        table.add_row(vec![
            score_cell(rec.score),
            Cell::new(rec.entity_type).fg(Color::Cyan),
            Cell::new(rec.entity_id).fg(Color::DarkGrey),
            Cell::new(ellipsize(&rec.name, 40)),
            Cell::new(&rec.reason).fg(Color::Magenta),
        ]);
    }

    println!();
    println!("  Recommendations for user {}", style(user_id).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}
