//! Echo Bot Example
//!
//! Joins one channel and answers a handful of commands:
//!
//! ```text
//! !echo <text>   repeat <text>
//! !ping          Pong!
//! !info          who sent this, and when
//! !help          list the commands
//! ```
//!
//! Every chat line is also logged through the `"message"` event.
//!
//! # Usage
//!
//! ```bash
//! PICARTO_TOKEN=... cargo run --package echo-bot -- --channel studio --username mybot
//! ```
//!
//! Settings not given on the command line come from `picabot.toml` and
//! `PICABOT_*` variables (see `picabot_runtime::config`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use picabot::prelude::*;
use time::macros::format_description;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "A simple picabot echo bot")]
struct Args {
    /// Channel to join (overrides `bot.channel`).
    #[arg(long)]
    channel: Option<String>,

    /// Bot account name (overrides `bot.username`).
    #[arg(long)]
    username: Option<String>,

    /// Bot token.
    #[arg(long, env = "PICARTO_TOKEN", hide_env_values = true)]
    token: String,

    /// Configuration file; searched for when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration profile (overrides `PICABOT_PROFILE`).
    #[arg(long)]
    profile: Option<String>,
}

const HELP: &str = "Commands: !echo <text>, !ping, !info, !help";

// ============================================================================
// Handlers
// ============================================================================

fn register_handlers(bot: &PicaBot) -> Result<()> {
    let sender = bot.sender();
    bot.command("echo", move |_msg, args: Vec<String>| {
        let sender = sender.clone();
        async move {
            if args.is_empty() {
                return sender.send_message("Usage: !echo <text>").await;
            }
            sender.send_message(args.join(" ")).await
        }
    })?;

    let sender = bot.sender();
    bot.command("ping", move |_msg, _args| {
        let sender = sender.clone();
        async move { sender.send_message("Pong!").await }
    })?;

    let sender = bot.sender();
    bot.command("info", move |msg: Arc<Message>, _args| {
        let sender = sender.clone();
        async move {
            let at = msg
                .received_at()
                .format(format_description!("[hour]:[minute]:[second] UTC"))
                .unwrap_or_else(|_| "unknown".to_string());
            sender
                .send_message(format!("{} wrote at {at}", msg.sender_name()))
                .await
        }
    })?;

    let sender = bot.sender();
    bot.command("help", move |_msg, _args| {
        let sender = sender.clone();
        async move { sender.send_message(HELP).await }
    })?;

    bot.on(MESSAGE_EVENT, |msg: Arc<Message>| async move {
        info!(from = msg.sender_name(), "{}", msg.text());
    });

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let config = loader.load()?;
    logging::init_from_config(&config.logging);

    let channel = args
        .channel
        .or_else(|| config.bot.channel.clone())
        .context("no channel given; pass --channel or set bot.channel")?;
    let username = args
        .username
        .or_else(|| config.bot.username.clone())
        .context("no username given; pass --username or set bot.username")?;

    let bot = PicaBot::builder(Credentials::token(username, args.token, channel))
        .config(&config)
        .build()?;
    register_handlers(&bot)?;

    info!(commands = ?bot.dispatcher().command_names(), "Echo bot starting");
    bot.run_until_shutdown().await?;
    info!("Echo bot stopped");

    Ok(())
}
