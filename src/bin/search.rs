//! Search binary entry point.
//!
//! This binary runs ranked multi-field search over a catalog database. It
//! supports both single-query and interactive REPL modes, with table or JSON
//! output.
//!
//! # Examples
//!
//! Single query:
//! ```bash
//! search --db-path citations.db --tag "machine learning" --author "Ann Lee"
//! ```
//!
//! JSON output:
//! ```bash
//! search --db-path citations.db --venue KDD --year 2019 --format json
//! ```
//!
//! Interactive mode:
//! ```bash
//! search --db-path citations.db --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use citation_network::{
    search::{RankedSearchEngine, SearchEngine, SearchFilters, SearchHit, SearchQuery, DEFAULT_PAGE_LIMIT},
    storage::{sqlite::SqliteStorage, CatalogStorage},
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for search results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Search CLI for querying the catalog database
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Ranked multi-field search over the catalog database",
    long_about = "Query the catalog by tag, author, venue and year. Texts matching more fields rank first.

EXAMPLES:
  Single query:
    search --db-path citations.db --tag \"machine learning\" --author \"Ann Lee\"

  JSON output:
    search --db-path citations.db --venue KDD --year 2019 --format json

  Interactive mode:
    search --db-path citations.db --interactive"
)]
struct Args {
    /// Database file path
    #[arg(long, env = "CN_DB_PATH", value_name = "PATH", default_value = "citations.db")]
    db_path: PathBuf,

    /// Exact tag name
    #[arg(long, value_name = "TAG")]
    tag: Option<String>,

    /// Exact author name
    #[arg(long, value_name = "NAME")]
    author: Option<String>,

    /// Venue name fragment
    #[arg(long, value_name = "TEXT")]
    venue: Option<String>,

    /// Publication year
    #[arg(long, value_name = "YEAR")]
    year: Option<String>,

    /// Raw hits fetched per field
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PAGE_LIMIT)]
    limit: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

impl Args {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            tag: self.tag.clone(),
            author: self.author.clone(),
            venue_name: self.venue.clone(),
            year: self.year.clone(),
        }
    }

    fn has_filters(&self) -> bool {
        self.tag.is_some() || self.author.is_some() || self.venue.is_some() || self.year.is_some()
    }
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Parse `field=value` pairs separated by `;`.
///
/// Recognized fields are `tag`, `author`, `venue` and `year`.
fn parse_filters(line: &str) -> std::result::Result<SearchFilters, String> {
    let mut filters = SearchFilters::default();

    for part in line.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| format!("Expected field=value, got '{}'", part))?;
        let value = Some(value.trim().to_string());

        match key.trim() {
            "tag" => filters.tag = value,
            "author" => filters.author = value,
            "venue" | "venue_name" => filters.venue_name = value,
            "year" => filters.year = value,
            other => return Err(format!("Unknown field '{}'", other)),
        }
    }

    Ok(filters)
}

/// Execute a search and return ranked hits
async fn execute_search(
    engine: &RankedSearchEngine<SqliteStorage>,
    filters: SearchFilters,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    debug!("Executing search with filters: {:?}", filters);

    let query = SearchQuery::new(filters, Some(limit));
    engine
        .search(&query)
        .await
        .context("Failed to execute search")
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let head: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

/// Format results as a pretty table
fn format_results_table(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Authors").add_attribute(Attribute::Bold),
        Cell::new("Venue").add_attribute(Attribute::Bold),
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("Matches").add_attribute(Attribute::Bold),
    ]);

    for (idx, hit) in hits.iter().enumerate() {
        let authors = hit
            .text
            .authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let color = match hit.match_count {
            0 | 1 => Color::White,
            2 => Color::Yellow,
            _ => Color::Green,
        };

        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(truncate(&hit.text.title, 60)),
            Cell::new(truncate(&authors, 40)),
            Cell::new(truncate(&hit.text.venue_name, 30)),
            Cell::new(hit.text.year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(hit.match_count).fg(color),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(hits: &[SearchHit]) -> Result<String> {
    serde_json::to_string_pretty(hits).context("Failed to serialize results to JSON")
}

/// Display detailed view of a single result
fn display_result_detail(hit: &SearchHit, rank: usize) {
    let text = &hit.text;
    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("ID: {}", text.id);
    println!("Title: {}", text.title);
    println!(
        "Authors: {}",
        text.authors
            .iter()
            .map(|a| {
                if a.orgs.is_empty() {
                    a.name.clone()
                } else {
                    let orgs: Vec<&str> = a.orgs.iter().map(|o| o.name.as_str()).collect();
                    format!("{} ({})", a.name, orgs.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Venue: {}", text.venue_name);
    if let Some(year) = text.year {
        println!("Year: {}", year);
    }
    println!("Citations: {}", text.n_citation);
    println!(
        "Tags: {}",
        text.tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!("Matches: {}", hit.match_count);
    println!("\nAbstract:\n{}", text.abstract_text);
    println!("{}", "═".repeat(80));
}

fn print_output(hits: &[SearchHit], format: OutputFormat, elapsed_secs: f64) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", format_results_table(hits));
            println!("\nFound {} results in {:.2}s", hits.len(), elapsed_secs);
        }
        OutputFormat::Json => println!("{}", format_results_json(hits)?),
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  tag=..; author=..; venue=..; year=..  - Search (any subset of fields)");
    println!("  /limit N        - Set raw hits fetched per field");
    println!("  /format table   - Use table output format");
    println!("  /format json    - Use JSON output format");
    println!("  /detail N       - Show full details for result rank N");
    println!("  /help           - Show this help");
    println!("  Ctrl+D or Ctrl+C - Exit");
}

/// Run interactive REPL mode
async fn run_interactive(
    engine: RankedSearchEngine<SqliteStorage>,
    mut limit: usize,
    mut format: OutputFormat,
) -> Result<()> {
    println!("Interactive Citation Search");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;
    let mut last_results: Vec<SearchHit> = Vec::new();

    loop {
        match rl.readline("Search> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts.as_slice() {
                        ["/help"] => print_help(),
                        ["/limit", n] => match n.parse::<usize>() {
                            Ok(n) if n > 0 => {
                                limit = n;
                                println!("Set limit to {}", limit);
                            }
                            _ => eprintln!("Invalid number: must be a positive integer"),
                        },
                        ["/format", "table"] => {
                            format = OutputFormat::Table;
                            println!("Set output format to table");
                        }
                        ["/format", "json"] => {
                            format = OutputFormat::Json;
                            println!("Set output format to JSON");
                        }
                        ["/detail", n] => match n.parse::<usize>() {
                            Ok(rank) if rank > 0 && rank <= last_results.len() => {
                                display_result_detail(&last_results[rank - 1], rank);
                            }
                            _ => eprintln!(
                                "Invalid rank: last search had {} results",
                                last_results.len()
                            ),
                        },
                        _ => eprintln!("Unknown command: {}. Type /help for available commands.", line),
                    }
                    continue;
                }

                let filters = match parse_filters(line) {
                    Ok(filters) => filters,
                    Err(e) => {
                        eprintln!("{}", e);
                        continue;
                    }
                };

                let start = Instant::now();
                match execute_search(&engine, filters, limit).await {
                    Ok(hits) => {
                        if let Err(e) = print_output(&hits, format, start.elapsed().as_secs_f64()) {
                            eprintln!("Error formatting results: {}", e);
                        }
                        last_results = hits;
                    }
                    Err(e) => eprintln!("Search failed: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging(&args.log_level);

    if !args.interactive && !args.has_filters() {
        anyhow::bail!(
            "Either a filter (--tag, --author, --venue, --year) or --interactive must be specified.\n\
             Use --help for usage information."
        );
    }

    if !args.db_path.exists() {
        anyhow::bail!(
            "Database file not found: {}\n\
             Please run the ingestion binary first to create the database.",
            args.db_path.display()
        );
    }

    info!("Loading database from: {}", args.db_path.display());
    let storage = Arc::new(
        SqliteStorage::open(&args.db_path)
            .with_context(|| format!("Failed to open database {}", args.db_path.display()))?,
    );

    let text_count = storage
        .count_texts()
        .await
        .context("Failed to count texts in database")?;
    info!("Database contains {} texts", text_count);

    let engine = RankedSearchEngine::new(storage);

    if args.interactive {
        run_interactive(engine, args.limit, args.format).await
    } else {
        let start = Instant::now();
        let hits = execute_search(&engine, args.filters(), args.limit).await?;
        print_output(&hits, args.format, start.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters() {
        let filters = parse_filters("tag=ml; author = Ann Lee ;venue=KDD").unwrap();
        assert_eq!(filters.tag.as_deref(), Some("ml"));
        assert_eq!(filters.author.as_deref(), Some("Ann Lee"));
        assert_eq!(filters.venue_name.as_deref(), Some("KDD"));
        assert_eq!(filters.year, None);
    }

    #[test]
    fn test_parse_filters_rejects_unknown_field() {
        assert!(parse_filters("title=x").is_err());
        assert!(parse_filters("ml").is_err());
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }
}
