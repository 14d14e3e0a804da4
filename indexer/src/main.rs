use anyhow::{Context, Result};
use catalog_core::builder::build_index_set;
use catalog_core::persist::{save_index_set, IndexPaths};
use catalog_core::{Corpus, Document};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the product catalog index set", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every index from input JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => build_index(Path::new(&input), Path::new(&output)),
    }
}

fn build_index(input: &Path, output: &Path) -> Result<()> {
    let documents = read_documents(input)?;
    let corpus = Corpus::from_documents(documents);
    tracing::info!(num_docs = corpus.len(), skipped = corpus.skipped(), "ingested documents");

    let set = build_index_set(&corpus);
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    save_index_set(&IndexPaths::new(output), &set, created_at)
        .with_context(|| format!("writing index to {}", output.display()))?;

    tracing::info!(output = %output.display(), "index build complete");
    Ok(())
}

fn input_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn read_documents(input: &Path) -> Result<Vec<Document>> {
    let files = input_files(input);
    if files.is_empty() {
        anyhow::bail!("no .json or .jsonl input found at {}", input.display());
    }
    let mut docs = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
    }
    Ok(docs)
}

/// One document per line. A line that does not parse is logged and skipped.
fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<Document>(&line) {
            Ok(doc) => docs.push(doc),
            Err(e) => tracing::warn!(file = %file.display(), line = lineno + 1, error = %e, "skipping malformed document"),
        }
    }
    Ok(())
}

/// Either a single document object or an array of them.
fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    let json: serde_json::Value =
        serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => {
            tracing::warn!(file = %file.display(), "expected an object or array, ignoring file");
            return Ok(());
        }
    };
    for (i, v) in values.into_iter().enumerate() {
        match serde_json::from_value::<Document>(v) {
            Ok(doc) => docs.push(doc),
            Err(e) => tracing::warn!(file = %file.display(), entry = i, error = %e, "skipping malformed document"),
        }
    }
    Ok(())
}
