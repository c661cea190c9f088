//! CLI utility to synthesize a batch of tracks from a prompt catalog.

use std::path::PathBuf;

use trackvault::blob_store::FsBlobStore;
use trackvault::catalog::{CatalogStore, ImportOptions, import_batch};
use trackvault::config::PipelineSettings;
use trackvault::enrichment::{BatchDirectory, EnrichmentOptions, enrich_batch};
use trackvault::generation::{
    DEFAULT_TRACK_SECONDS, GenerationOptions, HttpChunkSynthesizer, PromptCatalog, generate_batch,
};
use trackvault::tempo::OnsetTempoEstimator;

const DEFAULT_OUTPUT_DIR: &str = "generated_tracks";

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
    let prompts = PromptCatalog::load(&options.prompts).map_err(|err| err.to_string())?;
    let synthesizer = HttpChunkSynthesizer::new(options.endpoint.clone());

    let generation = GenerationOptions {
        duration_seconds: options.duration_seconds,
        chunk_seconds: settings.chunk_seconds,
        crossfade_seconds: settings.crossfade_seconds,
        count: options.count,
        resume: options.resume,
    };
    let report = generate_batch(&prompts, &synthesizer, &options.output_dir, &generation, None)
        .map_err(|err| err.to_string())?;
    println!(
        "Generated {} track(s), {} skipped, {} failed; {} record(s) in {}",
        report.generated,
        report.skipped_existing,
        report.failed,
        report.total_records,
        options.output_dir.display()
    );

    if options.import {
        import_generated(&settings, &prompts, options.output_dir)?;
    }
    Ok(())
}

/// Enrich the fresh batch, then import it into the catalog.
fn import_generated(
    settings: &PipelineSettings,
    prompts: &PromptCatalog,
    output_dir: PathBuf,
) -> Result<(), String> {
    let batch = BatchDirectory::new(output_dir);
    let enrichment = enrich_batch(
        &batch,
        &EnrichmentOptions::from(settings),
        &OnsetTempoEstimator::default(),
        None,
    )
    .map_err(|err| err.to_string())?;
    println!("Enrichment: {}", enrichment.summary());

    let db_path = settings.catalog_db_path().map_err(|err| err.to_string())?;
    let media_root = settings.media_root_path().map_err(|err| err.to_string())?;
    let mut store = CatalogStore::open(&db_path)
        .map_err(|err| format!("Open catalog {} failed: {err}", db_path.display()))?;
    let report = import_batch(
        &mut store,
        &batch,
        &FsBlobStore::new(media_root),
        Some(prompts),
        &ImportOptions::default(),
    )
    .map_err(|err| err.to_string())?;
    println!("Import complete: {}", report.summary());
    Ok(())
}

struct Options {
    prompts: PathBuf,
    endpoint: String,
    output_dir: PathBuf,
    duration_seconds: u32,
    count: Option<usize>,
    resume: bool,
    import: bool,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut prompts = None;
    let mut endpoint = None;
    let mut output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
    let mut duration_seconds = DEFAULT_TRACK_SECONDS;
    let mut count = None;
    let mut resume = false;
    let mut import = false;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--prompts" => {
                idx += 1;
                prompts = Some(PathBuf::from(value_at(&args, idx, "--prompts")?));
            }
            "--endpoint" => {
                idx += 1;
                endpoint = Some(value_at(&args, idx, "--endpoint")?.to_string());
            }
            "--out" => {
                idx += 1;
                output_dir = PathBuf::from(value_at(&args, idx, "--out")?);
            }
            "--duration" => {
                idx += 1;
                let value = value_at(&args, idx, "--duration")?;
                duration_seconds = value
                    .parse()
                    .ok()
                    .filter(|seconds: &u32| *seconds > 0)
                    .ok_or_else(|| format!("Invalid value for --duration: {value}"))?;
            }
            "--count" => {
                idx += 1;
                let value = value_at(&args, idx, "--count")?;
                count = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid value for --count: {value}"))?,
                );
            }
            "--resume" => resume = true,
            "--import" => import = true,
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    let prompts = prompts.ok_or_else(|| "--prompts is required".to_string())?;
    let endpoint = endpoint.ok_or_else(|| "--endpoint is required".to_string())?;
    Ok(Some(Options {
        prompts,
        endpoint,
        output_dir,
        duration_seconds,
        count,
        resume,
        import,
    }))
}

fn value_at<'a>(args: &'a [String], idx: usize, flag: &str) -> Result<&'a str, String> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn help_text() -> String {
    [
        "trackvault-generate",
        "",
        "Synthesizes every prompt of a prompt catalog into WAV files plus metadata.json.",
        "",
        "Usage:",
        "  trackvault-generate --prompts FILE --endpoint URL [--out DIR] [--duration S]",
        "                      [--count N] [--resume] [--import]",
        "",
        "Options:",
        "  --prompts <file>  JSON prompt catalog (see data/track_prompts.json).",
        "  --endpoint <url>  Synthesis service accepting {prompt, duration_seconds} POSTs.",
        "  --out <dir>       Output batch directory (default: generated_tracks).",
        "  --duration <s>    Target track length in seconds (default: 60).",
        "  --count <n>       Only generate the first n prompts.",
        "  --resume          Keep the existing metadata.json and skip titles already in it.",
        "  --import          Enrich the batch and import it into the catalog afterwards.",
    ]
    .join("\n")
}
