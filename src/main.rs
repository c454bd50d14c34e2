// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, VectorDbCommands};
use weave_core::{Agent, AgentEvent, SessionStore};
use weave_memory::VectorStore;
use weave_model::{chat_stream_with_retry, CompletionRequest, Message};
use weave_telegram::{Dispatcher, HttpTelegramTransport};

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(io::stderr)).init();
}

fn weave_home() -> std::path::PathBuf {
    dirs::home_dir().unwrap_or_default().join(".config/weave")
}

fn sessions_dir() -> std::path::PathBuf {
    weave_core::default_sessions_dir(&weave_home())
}

fn vector_db_path() -> std::path::PathBuf {
    weave_home().join("vector_db.json")
}

/// Spawn a task that sets `flag` on SIGINT/SIGTERM (Ctrl-C on non-Unix
/// targets). Signals bypass ordinary control flow, so every long-running
/// front-end (the agent loop, the Telegram dispatcher) checks this flag
/// cooperatively at its own safe points rather than being cancelled outright.
fn spawn_shutdown_listener() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let task_flag = flag.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => return,
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(_) => return,
            };
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = sigint.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        task_flag.store(true, Ordering::Relaxed);
    });
    flag
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Arc::new(weave_config::load(cli.config.as_deref())?);

    match cli.command {
        Commands::Agent { prompt, session } => run_agent(config, &session, prompt).await,
        Commands::Console { session } => run_console(config, &session).await,
        Commands::Telegram => run_telegram(config).await,
        Commands::VectorDb { command } => run_vector_db(command),
        Commands::Status => run_status(&config),
        Commands::TestLlm => run_test_llm(&config).await,
    }
}

fn build_agent(config: Arc<weave_config::Config>, session: &str, shutdown: Arc<AtomicBool>) -> anyhow::Result<Agent> {
    let model = weave_model::from_config(&config)?;
    let session_store = SessionStore::new(sessions_dir());
    let vector_store = Arc::new(tokio::sync::RwLock::new(VectorStore::load(vector_db_path())?));
    let mut agent = Agent::new(config, session.to_string(), model, session_store, vector_store)?;
    agent.set_shutdown_flag(shutdown);
    Ok(agent)
}

/// Print every `AgentEvent` to stdout the way a one-shot or REPL front-end
/// should: text deltas stream as they arrive, tool activity is reported on
/// its own line, and a failure prints a single descriptive line with no
/// stack trace.
fn print_event(event: AgentEvent) {
    match event {
        AgentEvent::TextDelta(delta) => {
            print!("{delta}");
            let _ = io::stdout().flush();
        }
        AgentEvent::ToolCallStarted(call) => {
            println!("\n[tool] {} {}", call.name, call.arguments);
        }
        AgentEvent::ToolCallFinished { tool_name, is_error, output, .. } => {
            let tag = if is_error { "error" } else { "ok" };
            println!("[tool:{tag}] {tool_name} -> {output}");
        }
        AgentEvent::TurnComplete => {
            println!();
        }
        AgentEvent::Error(msg) => {
            eprintln!("\nerror: {msg}");
        }
        AgentEvent::Interrupted => {
            eprintln!("\ninterrupted");
        }
    }
}

async fn run_agent(config: Arc<weave_config::Config>, session: &str, prompt: String) -> anyhow::Result<()> {
    let shutdown = spawn_shutdown_listener();
    let mut agent = build_agent(config, session, shutdown)?;
    agent.run(prompt, &mut print_event).await?;
    Ok(())
}

async fn run_console(config: Arc<weave_config::Config>, session: &str) -> anyhow::Result<()> {
    let shutdown = spawn_shutdown_listener();
    let mut agent = build_agent(config, session, shutdown.clone())?;

    println!("weave console — type your message and press enter; Ctrl-D or Ctrl-C to quit.");
    let stdin = io::stdin();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).context("reading from stdin")?;
        if read == 0 {
            break; // EOF (Ctrl-D)
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        agent.run(line.to_string(), &mut print_event).await?;
    }
    Ok(())
}

async fn run_telegram(config: Arc<weave_config::Config>) -> anyhow::Result<()> {
    let telegram_config = config
        .tools
        .telegram
        .clone()
        .ok_or_else(|| anyhow::anyhow!("tools.telegram.bot_token is not configured"))?;
    let model = weave_model::from_config(&config)?;
    let transport = HttpTelegramTransport::new(telegram_config.bot_token)?;

    let dispatcher = Dispatcher::new(
        transport,
        config.clone(),
        model,
        sessions_dir(),
        vector_db_path(),
        telegram_config.chat_id,
    );

    let shutdown = spawn_shutdown_listener();
    let dispatcher_shutdown = dispatcher.shutdown_flag();
    let bridge = tokio::spawn(async move {
        while !shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        }
        dispatcher_shutdown.store(true, Ordering::Relaxed);
    });

    dispatcher.run().await;
    bridge.abort();
    Ok(())
}

fn run_vector_db(command: VectorDbCommands) -> anyhow::Result<()> {
    let path = vector_db_path();
    let mut store = VectorStore::load(&path)?;

    match command {
        VectorDbCommands::List => {
            if store.is_empty() {
                println!("(empty)");
            }
            for entry in store.entries() {
                println!("{}  {}", entry.id, entry.text);
            }
        }
        VectorDbCommands::Add { text } => {
            let embedding = weave_memory::embed(&text);
            let entry = store.upsert(text, embedding);
            println!("stored {}", entry.id);
            store.save()?;
        }
        VectorDbCommands::Search { query, top_k } => {
            let embedding = weave_memory::embed(&query);
            for (entry, score) in store.search(&embedding, top_k) {
                println!("{:.4}  {}  {}", score, entry.id, entry.text);
            }
        }
        VectorDbCommands::Stats => {
            println!("entries: {}", store.len());
            println!("path: {}", store.path().display());
        }
    }
    Ok(())
}

fn run_status(config: &weave_config::Config) -> anyhow::Result<()> {
    println!("model: {}", config.agents.defaults.model);
    if let Some(embedding_model) = &config.agents.defaults.embedding_model {
        println!("embedding model: {embedding_model}");
    }
    println!("disable_rag: {}", config.agents.defaults.disable_rag);
    println!("load_chat_history: {}", config.agents.defaults.load_chat_history);
    println!();
    println!("providers:");
    println!("  openrouter: {}", has_key(&config.providers.openrouter));
    println!("  anthropic:  {}", has_key(&config.providers.anthropic));
    println!("  openai:     {}", has_key(&config.providers.openai));
    println!("  groq:       {}", has_key(&config.providers.groq));
    println!();
    println!("telegram configured: {}", config.tools.telegram.is_some());
    println!("web search configured: {}", config.tools.web.as_ref().and_then(|w| w.search.as_ref()).is_some());
    Ok(())
}

fn has_key(creds: &Option<weave_config::ProviderCreds>) -> &'static str {
    match creds.as_ref().and_then(|c| c.api_key.as_ref()) {
        Some(_) => "configured",
        None => "missing",
    }
}

async fn run_test_llm(config: &weave_config::Config) -> anyhow::Result<()> {
    let provider = weave_model::from_config(config)?;
    let request = CompletionRequest {
        model: provider.model_name().to_string(),
        messages: vec![Message::user("hello")],
        tools: Vec::new(),
        max_tokens: 64,
    };
    let response = chat_stream_with_retry(&*provider, request, |_event| {}).await?;
    println!("{}", response.content.unwrap_or_default());
    Ok(())
}
