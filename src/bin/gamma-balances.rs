#![forbid(unsafe_code)]
//! Lists account balances and nonces at the head of a gamma ledger

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};
use gamma_ledger::config::{load_config, load_config_from};
use gamma_ledger::persistence::{init_data_dir, is_data_dir_initialized};
use gamma_ledger::{Genesis, Ledger};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory holding `database/genesis.json` and `database/block.db`
    #[arg(long)]
    datadir: Option<PathBuf>,
    /// Path to a config.toml (defaults to ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Genesis JSON used to initialize an empty data directory
    #[arg(long)]
    genesis: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let data_dir = cli.datadir.unwrap_or(config.ledger.data_dir);

    if !is_data_dir_initialized(&data_dir) {
        let genesis_path = cli.genesis.or(config.genesis.path).ok_or_else(|| {
            format!(
                "{} is not initialized; pass --genesis to create it",
                data_dir.display()
            )
        })?;
        let genesis = Genesis::load(&genesis_path)?;
        init_data_dir(&data_dir, &genesis)?;
        println!(
            "{}",
            format!("Initialized {} from {}", data_dir.display(), genesis_path.display()).green()
        );
    }

    let ledger = Ledger::new_from_disk(&data_dir, config.ledger.mining_difficulty)?;

    let head = match ledger.head_number() {
        Some(number) => format!("#{} {}", number, ledger.head_hash()),
        None => "genesis".to_string(),
    };
    println!("{}", format!("{} ledger at {}", ledger.symbol(), head).bright_cyan().bold());
    println!();

    let mut accounts: Vec<_> = ledger.balances().iter().collect();
    accounts.sort_by_key(|(address, _)| address.to_lower_hex());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Account")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Balance")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Nonce")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
        ]);

    for (address, balance) in accounts {
        table.add_row(vec![
            Cell::new(address.to_checksum_hex()).fg(TableColor::White),
            Cell::new(balance)
                .fg(TableColor::Green)
                .set_alignment(CellAlignment::Right),
            Cell::new(ledger.nonce_of(address)).set_alignment(CellAlignment::Right),
        ]);
    }

    println!("{}", table);

    ledger.close()?;
    Ok(())
}
