//! `skylog ask`: one question, or an interactive session.

use skylog_agent::AgentLoop;
use skylog_config::AppConfig;
use skylog_core::event::EventBus;
use skylog_core::message::{Conversation, SessionId};
use skylog_core::store::FlightStore;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    question: Option<String>,
    session: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    // Check for API key early and give a clear error
    if !config.has_api_key() && config.provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    SKYLOG_API_KEY, LLM_API_KEY or OPENAI_API_KEY");
        eprintln!();
        eprintln!("  Or add api_key to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let store = Arc::new(super::open_store(&config).await?);
    let provider = skylog_providers::build_from_config(&config)?;
    let agent = AgentLoop::from_config(
        &config,
        provider,
        store.clone(),
        Arc::new(EventBus::default()),
    );

    let session_id = SessionId(session);
    let mut conv = Conversation::new();

    if let Some(question) = question {
        // Single question mode
        eprint!("  Thinking...");
        let reply = agent.chat(&session_id, &mut conv, &question).await;
        eprint!("\r              \r");
        println!("{}", reply.text);
        if !reply.is_success() {
            return Err("the agent could not answer".into());
        }
        return Ok(());
    }

    let tables = store.list_tables().await.unwrap_or_default();
    println!();
    println!("  skylog: interactive mode");
    println!();
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", config.model);
    println!("  Database:  {} ({} tables)", config.store.path, tables.len());
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type '/clear' to forget the conversation, 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/clear" => {
                conv.clear();
                println!("  (conversation cleared)");
                continue;
            }
            _ => {}
        }

        eprint!("  ...");
        let reply = agent.chat(&session_id, &mut conv, line).await;
        eprint!("\r     \r");
        println!();
        let prefix = if reply.is_success() { "skylog" } else { "[Error]" };
        for text_line in reply.text.lines() {
            println!("  {prefix} > {text_line}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}
