use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::*;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use prettytable::{row, Table};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use fairpool::config::{StoreBackend, StoreConfig};
use fairpool::{
    distribute_all, open_ledger, ClaimCoordinator, ClaimReceipt, ClaimantMetadata,
    CreatePoolRequest, FairpoolConfig, PaymentMethod, PoolResult,
};

const SIMULATION_OWNER: &str = "simulator";

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); FAIRPOOL__* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a pool and let concurrent claimants race for it
    #[command(alias = "sim")]
    Simulate {
        #[arg(short, long, default_value = "10000")]
        budget: u64,

        #[arg(short, long, default_value = "5")]
        slots: u32,

        /// Number of concurrent claimants, may exceed the slot count
        #[arg(short = 'n', long, default_value = "8")]
        claimants: usize,

        /// Persist to a sled database at this path instead of the configured store
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Preview a one-shot split of a budget
    Distribute {
        #[arg(short, long)]
        budget: u64,

        #[arg(short, long)]
        slots: u32,

        /// Seed for a reproducible split
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .parse_default_env()
        .init();

    if let Err(e) = run(cli) {
        error!("{}", e);
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> PoolResult<()> {
    let mut config = FairpoolConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            budget,
            slots,
            claimants,
            store,
        } => {
            if let Some(path) = store {
                config.store = StoreConfig {
                    backend: StoreBackend::Sled,
                    path: Some(path),
                };
            }
            run_simulation(config, budget, slots, claimants)
        }
        Commands::Distribute { budget, slots, seed } => run_distribution(budget, slots, seed),
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn run_simulation(
    config: FairpoolConfig,
    budget: u64,
    slots: u32,
    claimants: usize,
) -> PoolResult<()> {
    let coordinator = ClaimCoordinator::new(open_ledger(&config.store)?, config);
    let created = coordinator.create_pool(CreatePoolRequest {
        owner_id: SIMULATION_OWNER.to_string(),
        budget,
        total_slots: slots,
        payment_methods: vec![PaymentMethod::Wave],
    })?;

    println!("{}", "Running Claim Simulation".green().bold());
    println!("Pool: {} (token {})", created.pool_id, created.shareable_token);
    println!("Budget: {}  Slots: {}  Claimants: {}\n", budget, slots, claimants);

    info!("Releasing {} claimants against pool {}", claimants, created.pool_id);
    let outcomes: Vec<(String, PoolResult<ClaimReceipt>)> = (0..claimants)
        .into_par_iter()
        .map(|i| {
            let claimant = format!("claimant-{:03}", i);
            let outcome = coordinator.claim_with_retry(
                &created.shareable_token,
                &claimant,
                ClaimantMetadata::named(claimant.clone()),
            );
            (claimant, outcome)
        })
        .collect();

    let mut granted: Vec<(&str, &ClaimReceipt)> = Vec::new();
    let mut rejected: BTreeMap<&'static str, usize> = BTreeMap::new();
    for (claimant, outcome) in &outcomes {
        match outcome {
            Ok(receipt) => granted.push((claimant.as_str(), receipt)),
            Err(e) => *rejected.entry(e.code()).or_default() += 1,
        }
    }
    granted.sort_by_key(|(_, receipt)| receipt.slot);

    let mut table = Table::new();
    table.add_row(row!["Slot", "Claimant", "Portion", "Share"]);
    for (claimant, receipt) in &granted {
        table.add_row(row![
            receipt.slot,
            claimant,
            receipt.portion,
            format!("{:.2}%", receipt.portion as f64 * 100.0 / budget as f64)
        ]);
    }
    table.printstd();

    if !rejected.is_empty() {
        println!("\n{}", "Rejections".yellow().bold());
        for (code, count) in &rejected {
            println!("  {:<28} {}", code, count);
        }
    }

    let view = coordinator.pool_view(&created.shareable_token, Some(SIMULATION_OWNER))?;
    println!("\nStatus: {}", view.status.to_string().cyan());
    if let Some(dashboard) = view.dashboard {
        let stats = dashboard.stats;
        println!(
            "Distributed {} of {} across {} claims (min {}, max {}, std dev {:.2})",
            dashboard.total_distributed, budget, stats.count, stats.min, stats.max,
            stats.standard_deviation
        );
        if dashboard.total_distributed == budget {
            println!("{}", "Budget fully distributed".green());
        } else if view.remaining_slots > 0 {
            println!(
                "{}",
                format!("{} slots left unclaimed", view.remaining_slots).yellow()
            );
        }
    }
    Ok(())
}

fn run_distribution(budget: u64, slots: u32, seed: Option<u64>) -> PoolResult<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let distribution = distribute_all(&mut rng, budget, slots)?;

    let mut table = Table::new();
    table.add_row(row!["Slot", "Portion", "Share"]);
    for (i, portion) in distribution.portions.iter().enumerate() {
        table.add_row(row![
            i + 1,
            portion,
            format!("{:.2}%", *portion as f64 * 100.0 / budget as f64)
        ]);
    }
    table.printstd();

    let stats = distribution.stats();
    println!(
        "Total {}  Average {:.2}  Std dev {:.2}",
        stats.total, stats.average, stats.standard_deviation
    );
    Ok(())
}
