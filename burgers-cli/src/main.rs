mod logging;
mod namelist;
mod plan_cache_file;
mod sink;

use burgers_core::{NoPlanCache, PlanCache, SimMode, Simulation};
use clap::Parser;
use namelist::{Namelist, NamelistError};
use plan_cache_file::PlanCacheFile;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sink::JsonLinesSink;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Seed used when neither the command line nor the namelist sets one.
const DEFAULT_SEED: u64 = 1;

#[derive(Parser, Debug)]
#[command(author, version, about = "1D stochastic Burgers solver (DNS and LES)")]
struct Args {
    /// Simulation mode (dns|les)
    #[arg(short, long, default_value = "dns")]
    mode: String,

    /// Namelist (JSON) with the run configuration
    #[arg(short, long, default_value = "namelist.json")]
    namelist: PathBuf,

    /// Output file (JSON lines); defaults to burgers_<mode>.jsonl
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// RNG seed, overrides the namelist
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error), overrides the namelist
    #[arg(long)]
    log_level: Option<String>,

    /// Transform plan cache file (default ~/.burgers_plans.json)
    #[arg(long, conflicts_with = "no_plan_cache")]
    plan_cache: Option<PathBuf>,

    /// Do not read or write the transform plan cache
    #[arg(long)]
    no_plan_cache: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let namelist = Namelist::load(&args.namelist)?;
    let level = args.log_level.as_deref().unwrap_or(&namelist.logging.level);
    logging::init(level, namelist.logging.file.as_deref())?;

    let mode = SimMode::parse(&args.mode).ok_or_else(|| NamelistError::UnknownMode(args.mode.clone()))?;
    let params = namelist.to_params(mode)?;
    let seed = args.seed.or(namelist.seed).unwrap_or(DEFAULT_SEED);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("burgers_{}.jsonl", mode.as_str())));

    info!("##############################################################");
    info!("#                                                            #");
    info!("#                         burgers                            #");
    info!("#        stochastic Burgers equation, DNS and LES            #");
    info!("#                                                            #");
    info!("##############################################################");
    info!(
        mode = mode.as_str(),
        namelist = %args.namelist.display(),
        output = %output.display(),
        seed,
        "configuration loaded"
    );

    let mut cache: Box<dyn PlanCache> = if args.no_plan_cache {
        Box::new(NoPlanCache)
    } else {
        let path = args.plan_cache.clone().unwrap_or_else(PlanCacheFile::default_path);
        Box::new(PlanCacheFile::new(path))
    };

    let started = Instant::now();
    let mut sim = Simulation::new(params, ChaCha8Rng::seed_from_u64(seed), cache.as_mut())?;
    let mut sink = JsonLinesSink::create(&output)?;
    let summary = sim.run(&mut sink);
    let wall = started.elapsed();

    println!("Wrote {} output to: {}", mode.as_str().to_uppercase(), output.display());
    println!(
        "Steps: {} (t={:.6}, saves={}){}",
        summary.steps,
        summary.time,
        summary.saves,
        if summary.stalled { " [stopped early: step collapsed]" } else { "" }
    );
    println!("Wall time: {:.3} s", wall.as_secs_f64());

    Ok(())
}
