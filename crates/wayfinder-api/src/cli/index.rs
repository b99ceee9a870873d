//! Index building commands: `index` and `add-image`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use wayfinder_core::indexer::startup::{IndexingOutcome, IndexingReport};
use wayfinder_types::entity::{EntityType, Modality};
use wayfinder_types::index::NewEmbedding;
use wayfinder_types::metadata::Metadata;

use super::print_json;
use crate::state::AppState;

/// Build (or with `force`, rebuild) the text index.
///
/// ```bash
/// wayfinder index
/// wayfinder index --force --json
/// ```
pub async fn index(state: &AppState, force: bool, json: bool) -> Result<()> {
    let outcome = if force {
        state.indexer.rebuild().await
    } else {
        state.indexer.ensure_indexed().await
    }
    .context("Indexing failed")?;

    if json {
        return print_json(&outcome);
    }

    println!();
    match &outcome {
        IndexingOutcome::AlreadyCompleted => {
            println!("  {} Index already built in this process", style("i").blue().bold());
        }
        IndexingOutcome::ExistingIndex { count } => {
            println!(
                "  {} Text index already holds {} records (use {} to rebuild)",
                style("✓").green().bold(),
                style(count).bold(),
                style("--force").cyan()
            );
        }
        IndexingOutcome::EmbeddingsUnavailable => {
            println!(
                "  {} No text embedder configured. Set {} and retry.",
                style("✗").red().bold(),
                style("OPENAI_API_KEY").yellow()
            );
        }
        IndexingOutcome::Rebuilt(report) => print_report(report),
    }
    println!();
    Ok(())
}

fn print_report(report: &IndexingReport) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Category").fg(Color::White),
        Cell::new("Table").fg(Color::White),
        Cell::new("Fetched").fg(Color::White),
        Cell::new("Indexed").fg(Color::White),
        Cell::new("Skipped").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);
    for category in &report.categories {
        table.add_row(vec![
            Cell::new(category.entity_type).fg(Color::Cyan),
            Cell::new(&category.table).fg(Color::DarkGrey),
            Cell::new(category.fetched),
            Cell::new(category.indexed).fg(Color::Green),
            Cell::new(category.skipped).fg(Color::Yellow),
            Cell::new(category.error.as_deref().unwrap_or("")).fg(Color::Red),
        ]);
    }

    println!("  {} Text index rebuilt", style("✓").green().bold());
    println!();
    println!("{table}");
    println!();
    println!("  {} records indexed", style(report.total_indexed()).bold());
}

/// Embed an image file and append it to the image index.
pub async fn add_image(
    state: &AppState,
    entity_type: EntityType,
    entity_id: i64,
    path: &Path,
    title: Option<String>,
    json: bool,
) -> Result<()> {
    if !state.embeddings.image_available() {
        bail!("Image embeddings are disabled (embedding.image_enabled = false)");
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let Some(vector) = state.embeddings.embed_image(&bytes).await else {
        bail!("Failed to generate image embedding for {}", path.display());
    };

    let mut metadata = Metadata::new();
    if let Some(title) = title {
        metadata.insert("title", title)?;
    }
    metadata.insert("image_path", path.display().to_string())?;

    let id = state
        .index
        .add(
            Modality::Image,
            NewEmbedding {
                vector,
                entity_id,
                entity_type,
                metadata,
            },
        )
        .await?;
    state.index.save().await.context("Failed to save index")?;

    if json {
        return print_json(&serde_json::json!({
            "id": id,
            "entity_type": entity_type,
            "entity_id": entity_id,
            "image_count": state.index.len(Modality::Image),
        }));
    }

    println!();
    println!(
        "  {} Added image for {}/{} (image index: {} records)",
        style("✓").green().bold(),
        style(entity_type).cyan(),
        style(entity_id).cyan(),
        style(state.index.len(Modality::Image)).bold()
    );
    println!();
    Ok(())
}
