use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use chunklens_core::{ChunkService, Config, DirectorySource};
use chunklens_store::{Bucket, SqliteStore};
use clap::{Parser, Subcommand};
use serde::Serialize;

/// Structure-aware chunking of rendered HTML documents, with quality assessment and
/// chunk-to-source alignment.
#[derive(Parser)]
#[command(name = "chunklens", version)]
struct Cli {
    /// Path to the TOML configuration file. Falls back to `CHUNKLENS_CONFIG`, then
    /// `config/default.toml`; a missing file means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk one or more documents, replacing their stored chunk sets for the chunker.
    Chunk {
        #[arg(required = true)]
        documents: Vec<String>,

        /// DEFAULT-1024T, READ-CONTENT-PARA, READ-CONTENT-PARA-LLM, READ-CONTENT-SHORT
        /// or READ-CONTENT-SHORT-LLM.
        #[arg(long, default_value = "READ-CONTENT-PARA")]
        chunker: String,
    },

    /// Assess a stored chunk set.
    Assess {
        document: String,

        #[arg(long, default_value = "READ-CONTENT-PARA")]
        chunker: String,

        /// basic-heuristics or ai-advanced.
        #[arg(long, default_value = "basic-heuristics")]
        method: String,
    },

    /// Align a stored chunk set back onto the rendered document.
    Align {
        document: String,

        #[arg(long, default_value = "READ-CONTENT-PARA")]
        chunker: String,

        /// Chunk index to highlight in the rendered HTML.
        #[arg(long)]
        highlight: Option<usize>,

        /// Write the highlighted HTML here instead of embedding it in the JSON output.
        #[arg(long, requires = "highlight")]
        output: Option<PathBuf>,
    },

    /// Summarize the LLM cost ledger.
    Costs {
        #[arg(long)]
        document: Option<String>,

        /// Group by `hour` or `day` instead of printing one total.
        #[arg(long)]
        bucket: Option<Bucket>,

        /// Only records at or after this RFC 3339 timestamp.
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Only records before this RFC 3339 timestamp.
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },
}

fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli {
        return path;
    }
    if let Ok(path) = std::env::var("CHUNKLENS_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// Logs go to stderr so stdout carries only JSON.
fn init_subscriber(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.observability.log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)?;
    init_subscriber(&config);
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let store = SqliteStore::open(&config.storage.sqlite_path)
        .await
        .with_context(|| format!("failed to open database {}", config.storage.sqlite_path))?;
    let source = DirectorySource::new(&config.source.directory);
    let service = ChunkService::new(&config, config.provider(), store, source)?;

    match cli.command {
        Command::Chunk { documents, chunker } => {
            if let [document] = documents.as_slice() {
                let run = service.chunk(document, &chunker).await?;
                print_json(&run)?;
            } else {
                let outcomes = service.chunk_many(&documents, &chunker).await?;
                print_json(&outcomes)?;
            }
        }
        Command::Assess {
            document,
            chunker,
            method,
        } => {
            let assessment = service.assess(&document, &chunker, &method).await?;
            print_json(&assessment)?;
        }
        Command::Align {
            document,
            chunker,
            highlight,
            output,
        } => {
            let mut alignment = service.align(&document, &chunker, highlight).await?;
            if let (Some(path), Some(html)) = (output, alignment.html.take()) {
                tokio::fs::write(&path, html)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "highlighted html written");
            }
            print_json(&alignment)?;
        }
        Command::Costs {
            document,
            bucket,
            since,
            until,
        } => match bucket {
            Some(bucket) => {
                let buckets = service.cost_buckets(document.as_deref(), bucket).await?;
                print_json(&buckets)?;
            }
            None => {
                let summary = service.cost_summary(document.as_deref(), since, until).await?;
                print_json(&summary)?;
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_align_with_highlight() {
        let cli = Cli::try_parse_from([
            "chunklens",
            "align",
            "doc-1",
            "--chunker",
            "DEFAULT-1024T",
            "--highlight",
            "3",
            "--output",
            "out.html",
        ])
        .unwrap();
        match cli.command {
            Command::Align {
                document,
                chunker,
                highlight,
                output,
            } => {
                assert_eq!(document, "doc-1");
                assert_eq!(chunker, "DEFAULT-1024T");
                assert_eq!(highlight, Some(3));
                assert_eq!(output, Some(PathBuf::from("out.html")));
            }
            _ => panic!("expected align"),
        }
    }

    #[test]
    fn output_requires_highlight() {
        assert!(Cli::try_parse_from(["chunklens", "align", "d", "--output", "x.html"]).is_err());
    }

    #[test]
    fn parses_cost_bucket() {
        let cli = Cli::try_parse_from(["chunklens", "costs", "--bucket", "day"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Costs {
                bucket: Some(Bucket::Day),
                ..
            }
        ));
        assert!(Cli::try_parse_from(["chunklens", "costs", "--bucket", "week"]).is_err());
    }

    #[test]
    fn chunk_requires_a_document() {
        assert!(Cli::try_parse_from(["chunklens", "chunk"]).is_err());
        let cli = Cli::try_parse_from(["chunklens", "chunk", "a", "b"]).unwrap();
        assert!(matches!(cli.command, Command::Chunk { documents, .. } if documents.len() == 2));
    }

    #[test]
    fn explicit_config_path_wins() {
        assert_eq!(
            resolve_config_path(Some(PathBuf::from("x.toml"))),
            PathBuf::from("x.toml")
        );
    }
}
