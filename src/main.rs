mod api;
mod app;
mod cache;
mod cli;
mod client;
mod commands;
mod config;
mod db;
mod event;
mod logging;
mod mutation;
mod query;
mod table;
mod transport;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing::info;

use crate::cache::CacheStore;
use crate::client::ApiClient;
use crate::db::{CredentialStore, Database};
use crate::transport::HttpTransport;

#[derive(Parser, Debug)]
#[command(name = "storedesk")]
#[command(about = "A terminal admin console for a commerce backend, inspired by k9s")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/storedesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// View to open on start (categories, products, orders, reviews, plans)
  #[arg(short, long, default_value = "products")]
  view: String,

  #[command(subcommand)]
  command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
  /// Store the API bearer token
  Login {
    #[arg(long, env = "STOREDESK_TOKEN")]
    token: String,
  },
  /// Forget the stored token
  Logout,
  /// Show the API endpoint and whether a token is stored
  Status,
  /// Print one record
  Show {
    resource: cli::Resource,
    /// Record id, or slug with --slug
    key: String,
    #[arg(long)]
    slug: bool,
  },
  /// Create a record from a JSON object
  Create {
    resource: cli::Resource,
    #[arg(long)]
    json: String,
  },
  /// Update a record from a JSON object
  Update {
    resource: cli::Resource,
    id: String,
    #[arg(long)]
    json: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = logging::init()?;

  let args = Args::parse();
  let credentials = CredentialStore::new(Database::open()?);

  match &args.command {
    Some(CliCommand::Login { token }) => {
      credentials.store_token(token)?;
      println!("Token stored.");
      return Ok(());
    }
    Some(CliCommand::Logout) => {
      credentials.clear()?;
      println!("Token removed.");
      return Ok(());
    }
    _ => {}
  }

  let config = config::Config::load(args.config.as_deref())?;
  let authenticated = credentials.is_authenticated();
  let transport = HttpTransport::new(&config.api, Arc::new(credentials))?;

  if matches!(args.command, Some(CliCommand::Status)) {
    println!("API:   {}", transport.base_url());
    println!("Token: {}", if authenticated { "stored" } else { "missing" });
    return Ok(());
  }

  let api_url = transport.base_url().to_string();
  let store = CacheStore::new().with_eviction_grace(config.cache.eviction_grace());
  let client = ApiClient::new(store, Arc::new(transport));

  let output = match args.command {
    Some(CliCommand::Show { resource, key, slug }) => {
      Some(cli::show(&client, resource, key, slug).await?)
    }
    Some(CliCommand::Create { resource, json }) => {
      Some(cli::create(&client, resource, &json).await?)
    }
    Some(CliCommand::Update { resource, id, json }) => {
      Some(cli::update(&client, resource, id, &json).await?)
    }
    _ => None,
  };
  if let Some(output) = output {
    println!("{}", output);
    return Ok(());
  }

  info!(api = %api_url, authenticated, "starting storedesk");
  let mut app = app::App::new(config, client, authenticated, &args.view);
  app.run().await?;

  Ok(())
}
