use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use podstore::config::Config;
use podstore::fulfillment::FulfillmentClient;
use podstore::platform::PlatformClient;

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("podstore")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("podstore.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn print_json<T: Serialize>(heading: &str, value: &T) -> Result<()> {
    println!("{}", heading.green().bold());
    println!("{}", serde_json::to_string_pretty(value).context("Failed to render response")?);
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Config => {
            let yaml = serde_yaml::to_string(config).context("Failed to render config")?;
            println!("{}", yaml);
            Ok(())
        }
        Commands::Products { offset, limit } => {
            let client = FulfillmentClient::from_config(&config.fulfillment)?;
            let page = client.list_products(*offset, *limit).await?;
            print_json("Products:", &page)
        }
        Commands::Product { id } => {
            let client = FulfillmentClient::from_config(&config.fulfillment)?;
            let product = client.get_product(id).await?;
            print_json(&format!("Product {}:", id), &product)
        }
        Commands::Orders { status, offset, limit } => {
            let client = FulfillmentClient::from_config(&config.fulfillment)?;
            let page = client.list_orders(status.as_deref(), *offset, *limit).await?;
            print_json("Orders:", &page)
        }
        Commands::Order { id } => {
            let client = FulfillmentClient::from_config(&config.fulfillment)?;
            let order = client.get_order(id).await?;
            print_json(&format!("Order {}:", id), &order)
        }
        Commands::ShopProducts { limit } => {
            let client = PlatformClient::from_config(&config.platform)?;
            let products = client.list_products(*limit).await?;
            print_json("Shop products:", &products)
        }
        Commands::ShopOrders { status, limit } => {
            let client = PlatformClient::from_config(&config.platform)?;
            let orders = client.list_orders(status.as_deref(), *limit).await?;
            print_json("Shop orders:", &orders)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
