use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use combsearch::logging::init_logging;
use combsearch::source::read_slots;
use combsearch::{
    best_hit, Hit, JoinAssembler, LookupEvaluator, RunConfig, SearchEngine, SelectionMode,
};

/// Thompson-sampling search over a combinatorial library.
#[derive(Debug, Parser)]
#[command(
    name = "combsearch",
    author,
    version,
    about = "Thompson-sampling search over a combinatorial product space"
)]
struct Cli {
    /// Path to the YAML run file.
    #[arg(short, long, value_name = "FILE", default_value = "combsearch.yaml")]
    config: PathBuf,

    /// Override the selection mode (maximize, minimize, maximize_boltzmann, minimize_boltzmann).
    #[arg(long, value_name = "MODE")]
    mode: Option<SelectionMode>,

    /// Override the RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the number of search cycles.
    #[arg(long, value_name = "COUNT")]
    cycles: Option<usize>,

    /// Override the number of warm-up trials per element.
    #[arg(long, value_name = "COUNT")]
    warmup_trials: Option<usize>,

    /// Suppress progress lines.
    #[arg(long)]
    hide_progress: bool,

    /// Exit after validating the configuration.
    #[arg(long)]
    validate_only: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = RunConfig::from_path(&cli.config)?;

    if let Some(mode) = cli.mode {
        config.search.mode = mode;
    }
    if let Some(seed) = cli.seed {
        config.search.seed = Some(seed);
    }
    if let Some(cycles) = cli.cycles {
        config.search.search_cycles = cycles;
    }
    if let Some(trials) = cli.warmup_trials {
        config.search.warmup_trials = trials;
    }
    if cli.hide_progress {
        config.search.hide_progress = true;
    }

    config.validate()?;

    if cli.validate_only {
        println!("Configuration {} is valid.", cli.config.display());
        return Ok(());
    }

    let _guard = init_logging(&config.logging)?;

    let slots = read_slots(&config.slots, config.max_per_slot)?;
    let evaluator = LookupEvaluator::from_path(&config.scores)?;
    info!(entries = evaluator.len(), path = %config.scores.display(), "loaded score table");
    let assembler = JoinAssembler {
        separator: config.separator.clone(),
    };

    let mode = config.search.mode;
    let mut engine = SearchEngine::new(config.search.clone(), slots, assembler, evaluator)?;
    let outcome = engine.run().context("search failed")?;

    if let Some(best) = best_hit(mode, &outcome.search).or(best_hit(mode, &outcome.warmup)) {
        info!(score = best.score, name = %best.name, product = %best.product, "best hit");
    }
    info!(
        warmup = outcome.warmup.len(),
        search = outcome.search.len(),
        committed = engine.tracker().committed(),
        "run finished"
    );

    if let Some(path) = config.output.as_ref() {
        write_hits(path, outcome.warmup.iter().chain(&outcome.search))
            .with_context(|| format!("writing hits to {}", path.display()))?;
    }
    Ok(())
}

fn write_hits<'a>(path: &Path, hits: impl Iterator<Item = &'a Hit<String>>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for hit in hits {
        serde_json::to_writer(&mut out, hit)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
