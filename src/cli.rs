// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "weave",
    about = "A multi-front-end conversational agent runtime",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides the default search order).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum VectorDbCommands {
    /// List every stored entry (id + text, embeddings omitted).
    List,
    /// Embed `text` and upsert it into the store.
    Add {
        /// Text to embed and store.
        text: String,
    },
    /// Embed `query` and print the `top_k` most similar entries.
    Search {
        /// Query text.
        query: String,
        /// Number of results to return.
        #[arg(long, short = 'k', default_value = "5")]
        top_k: usize,
    },
    /// Print entry count and the store's on-disk path.
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single prompt against a session and print the reply.
    Agent {
        /// The prompt to send.
        prompt: String,
        /// Session id to run under (reused across invocations if
        /// `agents.defaults.load_chat_history` is set).
        #[arg(long, short = 's', default_value = "default")]
        session: String,
    },

    /// Interactive REPL: read a line, run a turn, print the reply, repeat.
    Console {
        /// Session id to run under.
        #[arg(long, short = 's', default_value = "console")]
        session: String,
    },

    /// Run the Telegram long-poll dispatcher until interrupted.
    Telegram,

    /// Inspect or edit the local semantic memory store.
    VectorDb {
        #[command(subcommand)]
        command: VectorDbCommands,
    },

    /// Print the resolved configuration and which provider credentials are
    /// present, without printing secret values.
    Status,

    /// Send a one-off "hello" completion to the configured provider and
    /// print the reply, to smoke-test credentials.
    TestLlm,
}
