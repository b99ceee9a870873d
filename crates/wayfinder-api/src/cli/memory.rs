//! User memory and conversation history commands.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use wayfinder_types::chat::ConversationRole;
use wayfinder_types::memory::{MemoryType, NewUserMemory};

use super::{MemoryCommand, ellipsize, print_json};
use crate::state::AppState;

pub async fn handle_memory_command(cmd: MemoryCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        MemoryCommand::Store {
            user_id,
            memory_type,
            content,
            confidence,
        } => store(state, user_id, memory_type, content, confidence, json).await,
        MemoryCommand::List {
            user_id,
            memory_type,
            limit,
        } => list(state, user_id, memory_type, limit, json).await,
    }
}

/// Store a memory for a user.
///
/// ```bash
/// wayfinder memory store 7 preference "loves quiet beaches"
/// ```
async fn store(
    state: &AppState,
    user_id: i64,
    memory_type: MemoryType,
    content: String,
    confidence: f64,
    json: bool,
) -> Result<()> {
    let mut memory = NewUserMemory::new(user_id, memory_type, content);
    memory.confidence = confidence;
    let id = state.memory.store_memory(memory).await?;

    if json {
        return print_json(&serde_json::json!({
            "success": true,
            "memory_id": id,
            "durable": state.memory.durable_configured(),
        }));
    }

    println!();
    match id {
        Some(id) => println!(
            "  {} Stored {} memory #{} for user {}",
            style("✓").green().bold(),
            style(memory_type).magenta(),
            style(id).bold(),
            style(user_id).cyan()
        ),
        None => println!(
            "  {} Stored {} memory for user {}",
            style("✓").green().bold(),
            style(memory_type).magenta(),
            style(user_id).cyan()
        ),
    }
    if !state.memory.durable_configured() {
        println!(
            "  {}",
            style("No durable record store configured; the memory lives only in this process.").dim()
        );
    }
    println!();
    Ok(())
}

async fn list(
    state: &AppState,
    user_id: i64,
    memory_type: Option<MemoryType>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let memories = state
        .memory
        .get_user_memories(user_id, memory_type, limit)
        .await;

    if json {
        return print_json(&memories);
    }

    if memories.is_empty() {
        println!();
        println!(
            "  {} No memories for user {}.",
            style("i").blue().bold(),
            style(user_id).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Content").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Confidence").fg(Color::White),
        Cell::new("Date").fg(Color::White),
    ]);

    for memory in &memories {
        let type_cell = match memory.memory_type {
            MemoryType::Preference => Cell::new("preference").fg(Color::Magenta),
            MemoryType::Interest => Cell::new("interest").fg(Color::Cyan),
            MemoryType::Visited => Cell::new("visited").fg(Color::Green),
            MemoryType::Dislike => Cell::new("dislike").fg(Color::Red),
            MemoryType::Context => Cell::new("context").fg(Color::Blue),
        };
        table.add_row(vec![
            Cell::new(ellipsize(&memory.content, 60)).fg(Color::White),
            type_cell,
            Cell::new(format!("{:.2}", memory.confidence)).fg(Color::Yellow),
            Cell::new(memory.created_at.format("%Y-%m-%d").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("  Memories for user {}", style(user_id).cyan().bold());
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} memor{}",
        style(memories.len()).bold(),
        if memories.len() == 1 { "y" } else { "ies" }
    );
    println!();
    Ok(())
}

/// Show a session's messages, oldest first.
pub async fn history(state: &AppState, session_id: &str, limit: usize, json: bool) -> Result<()> {
    let messages = state
        .memory
        .get_conversation_history(session_id, limit)
        .await;

    if json {
        return print_json(&messages);
    }

    if messages.is_empty() {
        println!();
        println!(
            "  {} No stored messages for session {}.",
            style("i").blue().bold(),
            style(session_id).cyan()
        );
        println!();
        return Ok(());
    }

    println!();
    for message in &messages {
        let who = match message.role {
            ConversationRole::User => style("you").cyan().bold(),
            ConversationRole::Assistant => style("assistant").green().bold(),
        };
        println!(
            "  {} {}",
            who,
            style(message.timestamp.format("%Y-%m-%d %H:%M").to_string()).dim()
        );
        println!("  {}", message.content);
        println!();
    }
    Ok(())
}
