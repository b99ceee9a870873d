//! `stats`: index sizes and provider availability.

use anyhow::Result;
use console::style;

use wayfinder_infra::config::index_dir;
use wayfinder_types::entity::Modality;

use super::print_json;
use crate::state::AppState;

pub fn stats(state: &AppState, json: bool) -> Result<()> {
    let index = state.index.stats();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "index_dir": index_dir(&state.config, &state.data_dir).display().to_string(),
            "index": index,
            "text_embeddings": state.embeddings.text_available(),
            "image_embeddings": state.embeddings.image_available(),
            "generation": state.rag.llm_available(),
            "record_backend": state.record_backend,
            "durable_memory": state.memory.durable_configured(),
        });
        return print_json(&status);
    }

    let check_mark = |ok: bool| {
        if ok {
            format!("{}", style("✓").green())
        } else {
            format!("{}", style("✗").red())
        }
    };

    println!();
    println!(
        "  {} Wayfinder v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Index ──").dim());
    for modality in [Modality::Text, Modality::Image] {
        println!(
            "  {:<6} {} vectors ({}-d)",
            modality.as_str(),
            style(index.count(modality)).bold(),
            state.index.dimension(modality)
        );
    }
    println!(
        "  {}",
        style(index_dir(&state.config, &state.data_dir).display()).dim()
    );
    println!();

    println!("  {}", style("── Providers ──").dim());
    println!(
        "  {} Text embeddings ({})",
        check_mark(state.embeddings.text_available()),
        state.config.embedding.model
    );
    println!(
        "  {} Image embeddings (CLIP)",
        check_mark(state.embeddings.image_available())
    );
    println!(
        "  {} Generation ({})",
        check_mark(state.rag.llm_available()),
        state.config.generation.model
    );
    println!();

    println!("  {}", style("── Records ──").dim());
    match &state.record_backend {
        Some(name) => println!("  {} Backend: {}", check_mark(true), style(name).cyan()),
        None => println!("  {} No record backend (memory stays in-process)", check_mark(false)),
    }
    println!();
    Ok(())
}
