use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use docqa_core::config::{expand_path, Config, Settings};
use docqa_core::extract::PlainTextExtractor;
use docqa_core::Chunker;
use docqa_embed::build_embedder;
use docqa_pipeline::{AnswerPipeline, IngestReport};

const USAGE: &str = "Usage:
  docqa ask <document> [question] [--limit N]   answer one question, or start a session
  docqa search <document> <query> [--limit N]
  docqa chunks <document>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn document_arg(args: &[String]) -> PathBuf {
    match args.first() {
        Some(p) => expand_path(p),
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1)
        }
    }
}

async fn ingest_with_spinner(pipeline: &AnswerPipeline, path: &Path) -> anyhow::Result<IngestReport> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Indexing {}", path.display()));
    pb.enable_steady_tick(Duration::from_millis(100));
    let report = pipeline
        .ingest_file(path, &PlainTextExtractor::new())
        .await
        .with_context(|| format!("indexing {}", path.display()));
    match &report {
        Ok(r) => {
            tracing::info!(source_id = %r.source_id, pages = r.pages, units = r.units, dim = r.dimension, "document ready");
            pb.finish_with_message(format!("✅ {} indexed: {} pages, {} parts", r.source_id, r.pages, r.units));
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "indexing failed");
            pb.abandon_with_message("❌ Indexing failed");
        }
    }
    report
}

/// `--limit N` / `-n N` anywhere after the document, plus the remaining positional args.
fn split_limit(args: &[String]) -> (Option<usize>, Vec<String>) {
    let mut limit = None;
    let mut rest = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "-n" => {
                limit = Some(args.get(i + 1).and_then(|v| v.parse().ok()).unwrap_or_else(|| {
                    eprintln!("Error: --limit requires a number");
                    std::process::exit(1)
                }));
                i += 1;
            }
            other => rest.push(other.to_string()),
        }
        i += 1;
    }
    (limit, rest)
}

async fn answer(pipeline: &AnswerPipeline, question: &str, limit: usize) -> anyhow::Result<()> {
    let answer = pipeline.query_with_k(question, limit).await?;
    tracing::debug!(grounded = answer.grounded, contexts = answer.num_contexts, "answer ready");
    println!("\n{}", answer.text);
    if answer.grounded {
        println!("\n📚 Sources:");
        for source in &answer.sources {
            println!("  - page {}, part {}", source.page, source.part);
        }
    } else {
        println!("\n⚠️  Nothing in the document matched closely enough to answer.");
    }
    Ok(())
}

async fn session(pipeline: &AnswerPipeline, limit: usize) -> anyhow::Result<()> {
    println!("Ask questions about the document. Empty line or 'exit' to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else { break };
        let question = line.trim();
        if question.is_empty() || question == "exit" || question == "quit" {
            break;
        }
        if let Err(e) = answer(pipeline, question, limit).await {
            tracing::error!(error = %format!("{e:#}"), "question failed");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    init_logging(&settings);
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "ask" => {
            let (limit, rest) = split_limit(&args);
            let path = document_arg(&rest);
            let limit = limit.unwrap_or(settings.retrieval.top_k);
            let pipeline = AnswerPipeline::from_settings(&settings)?;
            ingest_with_spinner(&pipeline, &path).await?;
            match rest.get(1) {
                Some(question) => answer(&pipeline, question, limit).await?,
                None => session(&pipeline, limit).await?,
            }
        }
        "search" => {
            let (limit, rest) = split_limit(&args);
            let path = document_arg(&rest);
            let limit = limit.unwrap_or(settings.retrieval.top_k);
            let Some(query) = rest.get(1).cloned() else {
                eprintln!("{USAGE}");
                std::process::exit(1)
            };
            let pipeline = AnswerPipeline::new(&settings, build_embedder(&settings.embedding)?)?;
            ingest_with_spinner(&pipeline, &path).await?;
            let results = pipeline.search(&query, limit).await?;
            println!("\n🔍 Found {} results for: \"{}\"", results.len(), query);
            for (i, r) in results.iter().enumerate() {
                let preview: String = r.unit.text.chars().take(200).collect();
                println!("\n  {}. score={:.4}  page={}  part={}", i + 1, r.score, r.unit.offset.page, r.unit.sequence_index);
                println!("     {}", preview.replace('\n', " "));
            }
        }
        "chunks" => {
            let path = document_arg(&args);
            let pages = PlainTextExtractor::new().extract_file(&path)?;
            let chunker = Chunker::new(settings.chunking.clone())?;
            let source_id = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let units = chunker.chunk_pages(&source_id, &pages);
            println!("📄 {} pages, {} parts (chunk_size={}, overlap={})", pages.len(), units.len(), settings.chunking.chunk_size, settings.chunking.overlap);
            for u in &units {
                println!("  part {:>4}  page {:>3}  bytes {}..{}  chars {}", u.sequence_index, u.offset.page, u.offset.start, u.offset.end, u.text.chars().count());
            }
        }
        _ => {
            eprintln!("Unknown command: {}\n{USAGE}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn limit_is_taken_from_anywhere_after_the_command() {
        let (limit, rest) = split_limit(&args(&["notes.txt", "--limit", "8", "what grows?"]));
        assert_eq!(limit, Some(8));
        assert_eq!(rest, args(&["notes.txt", "what grows?"]));

        let (limit, rest) = split_limit(&args(&["notes.txt", "what grows?", "-n", "3"]));
        assert_eq!(limit, Some(3));
        assert_eq!(rest, args(&["notes.txt", "what grows?"]));
    }

    #[test]
    fn no_limit_leaves_positionals_alone() {
        let (limit, rest) = split_limit(&args(&["notes.txt"]));
        assert_eq!(limit, None);
        assert_eq!(rest, args(&["notes.txt"]));
    }
}
