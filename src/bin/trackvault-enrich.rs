//! CLI utility to add waveform peaks and detected BPM to a generated batch directory.

use std::path::PathBuf;

use trackvault::enrichment::{BatchDirectory, EnrichmentOptions, enrich_batch};
use trackvault::tempo::OnsetTempoEstimator;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if trackvault::logging::init().is_err() {
        trackvault::logging::init_stdout();
    }
    let settings = trackvault::config::load_or_default()
        .map_err(|err| format!("Failed to load settings: {err}"))?;

    let mut enrichment = EnrichmentOptions::from(&settings);
    if let Some(peaks) = options.peak_count {
        enrichment.peak_count = peaks;
    }
    if let Some(workers) = options.workers {
        enrichment.workers = workers;
    }
    if let Some(threshold) = options.bpm_threshold {
        enrichment.bpm_discrepancy_threshold = threshold;
    }

    let batch = BatchDirectory::new(options.directory);
    let report = enrich_batch(&batch, &enrichment, &OnsetTempoEstimator::default(), None)
        .map_err(|err| err.to_string())?;

    for discrepancy in &report.discrepancies {
        println!(
            "BPM mismatch: {} declared {} detected {}",
            discrepancy.title, discrepancy.declared, discrepancy.detected
        );
    }
    println!("{}", report.summary());
    Ok(())
}

struct Options {
    directory: PathBuf,
    peak_count: Option<usize>,
    workers: Option<usize>,
    bpm_threshold: Option<u32>,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut directory = None;
    let mut peak_count = None;
    let mut workers = None;
    let mut bpm_threshold = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--peaks" => {
                idx += 1;
                peak_count = Some(parse_value::<usize>(&args, idx, "--peaks")?);
            }
            "--workers" => {
                idx += 1;
                workers = Some(parse_value::<usize>(&args, idx, "--workers")?);
            }
            "--bpm-threshold" => {
                idx += 1;
                bpm_threshold = Some(parse_value::<u32>(&args, idx, "--bpm-threshold")?);
            }
            value if !value.starts_with('-') && directory.is_none() => {
                directory = Some(PathBuf::from(value));
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    let directory =
        directory.ok_or_else(|| format!("Batch directory is required\n\n{}", help_text()))?;
    if peak_count == Some(0) {
        return Err("--peaks must be at least 1".to_string());
    }
    Ok(Some(Options {
        directory,
        peak_count,
        workers: workers.map(|workers: usize| workers.max(1)),
        bpm_threshold,
    }))
}

fn parse_value<T: std::str::FromStr>(args: &[String], idx: usize, flag: &str) -> Result<T, String> {
    let value = args
        .get(idx)
        .ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("Invalid value for {flag}: {value}"))
}

fn help_text() -> String {
    [
        "trackvault-enrich",
        "",
        "Adds waveform peaks and detected BPM to every record of a batch's metadata.json.",
        "",
        "Usage:",
        "  trackvault-enrich <dir> [--peaks N] [--workers N] [--bpm-threshold N]",
        "",
        "Options:",
        "  --peaks <n>          Peaks per waveform (default from settings, 200).",
        "  --workers <n>        Records analysed in parallel (default from settings, 1).",
        "  --bpm-threshold <n>  Flag detected BPM differing from declared by more than n.",
    ]
    .join("\n")
}
