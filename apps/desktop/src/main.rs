use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{CurrencyListController, ListHandle, SeedDataset};
use shared::domain::CurrencyCategory;
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod shell;

use config::{load_seed_dataset, load_settings, normalize_database_url};
use render::{render_rows, render_snapshot};

#[derive(Parser, Debug)]
#[command(name = "currency-desktop", about = "Browse and search stored crypto and fiat currencies")]
struct Cli {
    #[arg(long, default_value = "currency.toml")]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    /// TOML file replacing the built-in seed dataset.
    #[arg(long)]
    seed: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long)]
        category: Option<CurrencyCategory>,
        #[arg(long)]
        json: bool,
    },
    Insert,
    Clear,
    Search {
        query: String,
        #[arg(long)]
        category: Option<CurrencyCategory>,
        #[arg(long)]
        json: bool,
    },
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    if let Some(seed) = cli.seed {
        settings.seed_path = Some(seed);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await?;
    storage.health_check().await?;
    info!(%database_url, "currency store ready");

    let seed = match &settings.seed_path {
        Some(path) => load_seed_dataset(path)?,
        None => SeedDataset::builtin(),
    };
    let mut controller = CurrencyListController::with_seed(Arc::new(storage.clone()), seed);

    match cli.command.unwrap_or(Command::Shell) {
        Command::List { category, json } => {
            controller
                .load(category.unwrap_or(settings.default_category))
                .await?;
            print_currencies(&controller, json)?;
        }
        Command::Insert => {
            controller.insert(None).await?;
            print!("{}", render_snapshot(&controller.snapshot()));
        }
        Command::Clear => {
            controller.clear().await?;
            let remaining = storage.count(CurrencyCategory::All).await?;
            println!("cleared currency store ({remaining} remaining)");
        }
        Command::Search {
            query,
            category,
            json,
        } => {
            controller
                .load(category.unwrap_or(settings.default_category))
                .await?;
            controller.search(&query);
            print_currencies(&controller, json)?;
        }
        Command::Shell => {
            shell::run(ListHandle::spawn(controller), settings.default_category).await?;
        }
    }

    Ok(())
}

fn print_currencies(controller: &CurrencyListController, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(controller.displayed())?);
    } else {
        print!("{}", render_rows(controller.displayed()));
    }
    Ok(())
}
