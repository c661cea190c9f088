//! CLI utility to import an enriched batch directory into the catalog.

use std::path::PathBuf;

use trackvault::blob_store::FsBlobStore;
use trackvault::catalog::{CatalogStore, ImportOptions, import_batch};
use trackvault::enrichment::BatchDirectory;
use trackvault::generation::PromptCatalog;

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
    let db_path = match options.db_path {
        Some(path) => path,
        None => settings.catalog_db_path().map_err(|err| err.to_string())?,
    };
    let media_root = match options.media_root {
        Some(path) => path,
        None => settings.media_root_path().map_err(|err| err.to_string())?,
    };
    let prompts = options
        .prompts
        .as_deref()
        .map(PromptCatalog::load)
        .transpose()
        .map_err(|err| err.to_string())?;

    let mut store = CatalogStore::open(&db_path)
        .map_err(|err| format!("Open catalog {} failed: {err}", db_path.display()))?;
    let blobs = FsBlobStore::new(media_root);
    let report = import_batch(
        &mut store,
        &BatchDirectory::new(options.directory),
        &blobs,
        prompts.as_ref(),
        &ImportOptions::default(),
    )
    .map_err(|err| err.to_string())?;

    println!("Import complete: {}", report.summary());
    Ok(())
}

struct Options {
    directory: PathBuf,
    db_path: Option<PathBuf>,
    media_root: Option<PathBuf>,
    prompts: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut directory = None;
    let mut db_path = None;
    let mut media_root = None;
    let mut prompts = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--db" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--db requires a value".to_string())?;
                db_path = Some(PathBuf::from(value));
            }
            "--media" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--media requires a value".to_string())?;
                media_root = Some(PathBuf::from(value));
            }
            "--prompts" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--prompts requires a value".to_string())?;
                prompts = Some(PathBuf::from(value));
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
    Ok(Some(Options {
        directory,
        db_path,
        media_root,
        prompts,
    }))
}

fn help_text() -> String {
    [
        "trackvault-import",
        "",
        "Imports the tracks of a batch directory (metadata.json + audio) into the catalog.",
        "Titles already in the catalog are skipped.",
        "",
        "Usage:",
        "  trackvault-import <dir> [--db PATH] [--media PATH] [--prompts FILE]",
        "",
        "Options:",
        "  --db <path>       Catalog database (defaults to the app data location).",
        "  --media <path>    Media root for stored audio (defaults to the app data location).",
        "  --prompts <file>  Prompt catalog used to fill missing lyrics, artist and language.",
    ]
    .join("\n")
}
