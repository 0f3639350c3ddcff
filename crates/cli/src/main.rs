//! RSIM — cycle-accurate SPARC V9 multiprocessor core/memory-unit simulator CLI.
//!
//! A single entry point: load a pre-decoded program image (JSON array of
//! `StaticInstruction`), optionally override the default `SimConfig` from a
//! JSON file, run the requested number of cycles across `--cpus` processor
//! cores, and report per-processor statistics.

use std::{fs, process};

use clap::Parser;
use rsim_core::{SimConfig, Simulator};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "rsim",
    author,
    version,
    about = "Cycle-accurate SPARC V9 multiprocessor core/memory-unit simulator",
    long_about = "Runs a pre-decoded static-instruction program image through the RSIM core\nand memory-unit pipeline for a fixed number of cycles, then reports\nper-processor statistics.\n\nExample:\n  rsim --program image.json --cycles 100000 --cpus 4"
)]
struct Cli {
    /// Pre-decoded program image: a JSON array of `StaticInstruction`.
    #[arg(short, long)]
    program: String,

    /// Optional JSON file overriding the default `SimConfig` (partial
    /// overrides are accepted; unset fields keep their defaults).
    #[arg(short, long)]
    config: Option<String>,

    /// Number of processor cores sharing the program image.
    #[arg(long, default_value_t = 1)]
    cpus: u32,

    /// Starting program counter for every core.
    #[arg(long, default_value_t = 0)]
    start_pc: u32,

    /// Number of cycles to run.
    #[arg(long, default_value_t = 100_000)]
    cycles: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let program_json = fs::read_to_string(&cli.program).unwrap_or_else(|e| {
        eprintln!("Error reading program {}: {e}", cli.program);
        process::exit(1);
    });
    let program = serde_json::from_str(&program_json).unwrap_or_else(|e| {
        eprintln!("Error parsing program {}: {e}", cli.program);
        process::exit(1);
    });

    let config = match cli.config {
        Some(path) => {
            let raw = fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Error reading config {path}: {e}");
                process::exit(1);
            });
            serde_json::from_str::<SimConfig>(&raw).unwrap_or_else(|e| {
                eprintln!("Error parsing config {path}: {e}");
                process::exit(1);
            })
        }
        None => SimConfig::default(),
    };

    let mut sim = Simulator::new(program, cli.cpus, cli.start_pc, config);
    sim.run(cli.cycles);

    for proc in sim.processors() {
        let stats = &proc.stats;
        println!(
            "cpu {}: cycles={} fetched={} graduated={} ipc={:.3} predictor_acc={:.3} exceptions={}",
            proc.id,
            stats.cycles,
            stats.fetched,
            stats.graduated,
            stats.graduate_fetch_ratio(),
            stats.predictor_accuracy(),
            stats.exceptions,
        );
    }
}
