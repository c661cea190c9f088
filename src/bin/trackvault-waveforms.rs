//! CLI utility to compute waveform previews for catalog tracks that have none.

use std::path::PathBuf;

use trackvault::blob_store::FsBlobStore;
use trackvault::catalog::{CatalogStore, regenerate_waveforms};

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
    let peak_count = options.peak_count.unwrap_or(settings.peak_count);

    let store = CatalogStore::open(&db_path)
        .map_err(|err| format!("Open catalog {} failed: {err}", db_path.display()))?;
    let report = regenerate_waveforms(&store, &FsBlobStore::new(media_root), peak_count)
        .map_err(|err| err.to_string())?;

    println!("Done: {}", report.summary());
    Ok(())
}

#[derive(Default)]
struct Options {
    db_path: Option<PathBuf>,
    media_root: Option<PathBuf>,
    peak_count: Option<usize>,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options::default();
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
                options.db_path = Some(PathBuf::from(value));
            }
            "--media" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--media requires a value".to_string())?;
                options.media_root = Some(PathBuf::from(value));
            }
            "--peaks" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--peaks requires a value".to_string())?;
                let peaks: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid value for --peaks: {value}"))?;
                if peaks == 0 {
                    return Err("--peaks must be at least 1".to_string());
                }
                options.peak_count = Some(peaks);
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    Ok(Some(options))
}

fn help_text() -> String {
    [
        "trackvault-waveforms",
        "",
        "Generates waveform peaks for active catalog tracks that have no waveform yet.",
        "",
        "Usage:",
        "  trackvault-waveforms [--db PATH] [--media PATH] [--peaks N]",
        "",
        "Options:",
        "  --db <path>     Catalog database (defaults to the app data location).",
        "  --media <path>  Media root holding stored audio (defaults to the app data location).",
        "  --peaks <n>     Peaks per waveform (default from settings, 200).",
    ]
    .join("\n")
}
