//! Travel assistant chat: a single turn, or an interactive loop on stdin.
//!
//! Inside the loop, `/clear` drops the cached session history and `/quit`
//! (or end of input) exits.

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use wayfinder_types::chat::{RagChatRequest, RagChatResponse};

use super::print_json;
use crate::state::AppState;

pub struct ChatArgs {
    pub message: Option<String>,
    pub session: Option<String>,
    pub user_id: Option<i64>,
    pub max_context: usize,
    pub include_sources: bool,
}

/// Line typed in interactive mode.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Clear,
    Skip,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Skip,
        "/quit" | "/exit" => Input::Quit,
        "/clear" => Input::Clear,
        message => Input::Message(message),
    }
}

pub async fn chat(state: &AppState, args: ChatArgs, json: bool) -> Result<()> {
    if !state.rag.llm_available() && !json {
        println!(
            "  {} No generative model configured. Set {} to get answers.",
            style("!").yellow().bold(),
            style("OPENAI_API_KEY").yellow()
        );
    }

    let mut session = args.session.clone();
    if let Some(message) = &args.message {
        let response = send(state, &args, message, session).await?;
        return render(&response, json);
    }

    if !json {
        println!();
        println!(
            "  {} Da Nang travel assistant. {} clears the session, {} exits.",
            style("⚡").bold(),
            style("/clear").cyan(),
            style("/quit").cyan()
        );
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        if !json {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match classify(&line) {
            Input::Quit => break,
            Input::Skip => continue,
            Input::Clear => {
                if let Some(id) = session.take() {
                    state.rag.clear_session(&id);
                }
                if !json {
                    println!("  {}", style("Session cleared.").dim());
                }
            }
            Input::Message(message) => {
                let response = send(state, &args, message, session.clone()).await?;
                session = Some(response.session_id.clone());
                render(&response, json)?;
            }
        }
    }
    Ok(())
}

async fn send(
    state: &AppState,
    args: &ChatArgs,
    message: &str,
    session_id: Option<String>,
) -> Result<RagChatResponse> {
    let mut request = RagChatRequest::new(message);
    request.user_id = args.user_id;
    request.session_id = session_id;
    request.include_sources = args.include_sources;
    request.max_context_items = args.max_context;
    Ok(state.rag.chat(request).await?)
}

fn render(response: &RagChatResponse, json: bool) -> Result<()> {
    if json {
        return print_json(response);
    }

    println!();
    println!("{}", response.message);
    if let Some(error) = &response.error {
        println!();
        println!("  {} {}", style("✗").red(), style(error).dim());
    }
    if response.degraded_context {
        println!(
            "  {}",
            style("(answered without retrieved context: embeddings unavailable)").yellow()
        );
    }
    if !response.sources.is_empty() {
        println!();
        println!("  {}", style("── Sources ──").dim());
        for source in &response.sources {
            println!(
                "  {} {} {}",
                style(format!("{:.2}", source.relevance_score)).dim(),
                source.title,
                style(format!("({}/{})", source.entity_type, source.entity_id)).dim()
            );
        }
    }
    println!();
    println!(
        "  {}",
        style(format!(
            "session {} · {} tokens · {:.0} ms",
            response.session_id, response.tokens_used, response.response_time_ms
        ))
        .dim()
    );
    println!();
    Ok(())
}
