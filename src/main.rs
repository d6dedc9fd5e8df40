mod app;
mod bookmarks;
mod cache;
mod cli;
mod commands;
mod config;
mod db;
mod error;
mod event;
mod logging;
mod outbox;
mod remote;
mod services;
mod store;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use crate::logging::LogTarget;

#[derive(Parser, Debug)]
#[command(name = "storysync")]
#[command(about = "Offline-first story client with a durable outbox and bookmark sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/storysync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Run one operation without the terminal UI
  #[command(subcommand)]
  command: Option<cli::CliCommand>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let target = if args.command.is_some() {
    LogTarget::Stderr
  } else {
    LogTarget::File
  };
  let _log_guard = logging::init(&config.logging, target)?;

  match args.command {
    Some(command) => {
      let services = services::Services::new(&config)?;
      cli::run(command, services).await
    }
    None => {
      let mut app = app::App::new(config).await?;
      app.run().await
    }
  }
}
