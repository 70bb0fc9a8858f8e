use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use agora::{load_world, World};

#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(about = "Run a settlement economy simulation from JSON definitions")]
struct Args {
    /// World definition file (parameters, goods, regions, settlements)
    #[arg(short, long, default_value = "data/config.json")]
    config: PathBuf,

    /// Recipe definition file
    #[arg(short, long, default_value = "data/recipes.json")]
    recipes: PathBuf,

    /// Number of ticks to simulate
    #[arg(short, long, default_value = "100")]
    ticks: u64,

    /// Random seed (uses a random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print a report every N ticks (0 = only at the end)
    #[arg(long, default_value = "0")]
    report_every: u64,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let mut world = match load_world(&args.config, &args.recipes, seed) {
        Ok(world) => world,
        Err(err) => {
            eprintln!("failed to load world: {err}");
            let mut cause = err.source();
            while let Some(inner) = cause {
                eprintln!("  caused by: {inner}");
                cause = inner.source();
            }
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Simulating {} ticks ({} settlements, seed {})",
        args.ticks,
        world.get_all_settlements().len(),
        world.seed()
    );

    for _ in 0..args.ticks {
        world.simulation_step();
        if args.report_every > 0 && world.tick % args.report_every == 0 {
            print_report(&world);
        }
    }
    print_report(&world);
    ExitCode::SUCCESS
}

fn print_report(world: &World) {
    println!("\n=== Tick {} ===", world.tick);
    for settlement in world.get_all_settlements() {
        println!(
            "{} (pop {}, {}): wealth {:.1}, storage {:.1}/{:.1}, labor {:.1}/{:.1}",
            settlement.name,
            settlement.population,
            settlement.terrain_type,
            settlement.wealth,
            settlement.get_current_storage_load(),
            settlement.storage.capacity,
            settlement.current_labor_pool,
            settlement.max_labor_pool,
        );
        for good in world.goods.iter() {
            let stored = settlement.get_total_stored(good.id);
            if stored <= 0.0 && !settlement.local_prices.contains_key(&good.id) {
                continue;
            }
            match settlement.local_prices.get(&good.id) {
                Some(price) => println!("    {:<12} {:>8.1} @ {:.2}", good.name, stored, price),
                None => println!("    {:<12} {:>8.1}", good.name, stored),
            }
        }
        for entry in settlement.log_entries() {
            println!("    log: {entry}");
        }
    }

    let trades: Vec<_> = world.recent_trades().collect();
    if !trades.is_empty() {
        println!("Recent trades:");
        for trade in trades {
            println!("  {trade}");
        }
    }
    println!(
        "Totals: {} trades, {} failed deliveries, {} production cycles",
        world.stats.total_trades,
        world.stats.failed_deliveries,
        world.stats.total_production_cycles,
    );
}
