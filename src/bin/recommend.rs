//! Recommendation binary entry point.
//!
//! Embeds a query, retrieves related papers from the vector index, and prints
//! them as a ranked table, a JSON response, or the raw radial-graph elements.
//! Supports single-query and interactive REPL modes.
//!
//! # Examples
//!
//! Single query with default settings:
//! ```bash
//! recommend --query "DNA computing with reaction-diffusion systems"
//! ```
//!
//! Graph elements for a renderer, reproducible layout:
//! ```bash
//! recommend --query "neural networks" --format graph --seed 42
//! ```
//!
//! Interactive mode:
//! ```bash
//! recommend --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use paper_radar::{
    api::RecommendResponse,
    config::{AppConfig, LabelTableSpec},
    embedding::fastembed::FastEmbedProvider,
    index::pinecone::PineconeClient,
    layout::ColorScheme,
    query::{RecommendQuery, Recommendation, Recommender},
    recommend::by_rank,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Engine = Recommender<FastEmbedProvider, PineconeClient>;

/// Output format for recommendations
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table sorted by rank
    Table,
    /// Full JSON response (ranked results plus graph elements)
    Json,
    /// Cytoscape elements only, in display order
    Graph,
}

/// Recommend related papers for a piece of text
#[derive(Parser, Debug)]
#[command(
    name = "recommend",
    version,
    about = "Recommend research papers related to a text and lay them out as a radial graph",
    long_about = "Embed a text, retrieve the closest papers from the vector index, and lay them \
                  out around the query: closer rings are more related papers.

Requires PINECONE_API_KEY (environment or .env file).

EXAMPLES:
  Single query:
    recommend --query \"DNA computing\"

  More results, stronger query weight:
    recommend --query \"DNA computing\" --top-k 30 --boost 3

  Graph elements for a renderer:
    recommend --query \"DNA computing\" --format graph --seed 42

  Interactive mode:
    recommend --interactive"
)]
struct Args {
    /// Query text (required for single-query mode, omitted in interactive mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Number of papers to retrieve (1-50)
    #[arg(long, value_name = "N", default_value = "10")]
    top_k: usize,

    /// Repeat the query text N times before embedding (1-5)
    #[arg(long, value_name = "N", default_value = "1")]
    boost: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Seed the display shuffle for reproducible layouts
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Label table as INSTITUTION=PATH (repeatable, replaces configured tables)
    #[arg(long = "label-table", value_name = "NAME=PATH")]
    label_tables: Vec<String>,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Shuffle source: fixed seed across the session, or fresh entropy per query
struct ShuffleSource {
    seeded: Option<StdRng>,
}

impl ShuffleSource {
    fn new(seed: Option<u64>) -> Self {
        Self {
            seeded: seed.map(StdRng::seed_from_u64),
        }
    }

    fn next_rng(&mut self) -> StdRng {
        match &mut self.seeded {
            Some(rng) => StdRng::from_rng(rng).unwrap_or_else(|_| StdRng::from_entropy()),
            None => StdRng::from_entropy(),
        }
    }
}

/// Execute one query
async fn execute(engine: &Engine, query: &RecommendQuery, shuffle: &mut ShuffleSource) -> Recommendation {
    debug!("Executing recommendation for query: {}", query.text);
    let mut rng = shuffle.next_rng();
    engine.recommend_with_rng(query, &mut rng).await
}

/// Parse a "#RRGGBB" color for terminal output
fn terminal_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

/// Truncate on a character boundary
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Format results as a pretty table
fn format_table(recommendation: &Recommendation, colors: &ColorScheme) -> String {
    if let Some(failure) = &recommendation.failure {
        return failure.to_string();
    }
    if recommendation.records.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Institution").add_attribute(Attribute::Bold),
        Cell::new("Label").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
        Cell::new("URL").add_attribute(Attribute::Bold),
    ]);

    for record in by_rank(&recommendation.records) {
        let mut institution = Cell::new(&record.institution);
        if let Some(color) = terminal_color(colors.color_for(&record.institution)) {
            institution = institution.fg(color);
        }

        table.add_row(vec![
            Cell::new(record.rank + 1),
            Cell::new(truncate(&record.title, 60)),
            institution,
            Cell::new(record.class_label.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.4}", record.score)),
            Cell::new(&record.url),
        ]);
    }

    table.to_string()
}

/// Print a recommendation in the requested format
fn print_recommendation(recommendation: Recommendation, format: OutputFormat, colors: &ColorScheme) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", format_table(&recommendation, colors)),
        OutputFormat::Json => {
            let response = RecommendResponse::from(recommendation);
            let json = serde_json::to_string_pretty(&response).with_context(|| "Failed to serialize response")?;
            println!("{}", json);
        }
        OutputFormat::Graph => {
            if let Some(failure) = &recommendation.failure {
                eprintln!("{}", failure);
            }
            let json = serde_json::to_string_pretty(&recommendation.graph.to_cytoscape())
                .with_context(|| "Failed to serialize graph elements")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Display detailed view of a single result
fn display_detail(recommendation: &Recommendation, rank: usize) {
    let Some(node) = recommendation
        .graph
        .nodes
        .iter()
        .find(|n| n.record.rank + 1 == rank)
    else {
        eprintln!(
            "Rank {} out of range (last query had {} results)",
            rank,
            recommendation.records.len()
        );
        return;
    };

    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("Title: {}", node.record.title);
    println!("Institution: {}", node.record.institution);
    println!("Label: {}", node.record.class_label.as_deref().unwrap_or("-"));
    println!("URL: {}", node.record.url);
    println!("Score: {:.4}", node.record.score);
    println!("Node: {} at ({:.1}, {:.1})", node.id, node.position.x, node.position.y);
    println!("{}", "═".repeat(80));
}

/// Validate a REPL setting value.
///
/// `place` maps the parsed value to `(top_k, boost)`. Returns `None` for a
/// value that is not a number or is out of range.
fn parse_setting(raw: &str, place: impl Fn(usize) -> (usize, usize)) -> Option<RecommendQuery> {
    let value = raw.parse::<usize>().ok()?;
    let (top_k, boost) = place(value);
    RecommendQuery::new(String::new(), Some(top_k), Some(boost)).ok()
}

fn print_help() {
    println!("Commands:");
    println!("  <text>          - Recommend papers for the text");
    println!("  /top N          - Set number of results to N (1-50)");
    println!("  /boost N        - Repeat the query N times before embedding (1-5)");
    println!("  /format F       - Output format: table, json or graph");
    println!("  /detail N       - Show full details for result rank N");
    println!("  /help           - Show this help");
    println!("  Ctrl+D or Ctrl+C - Exit");
}

/// Run interactive REPL mode
async fn run_interactive(
    engine: Engine,
    mut top_k: usize,
    mut boost: usize,
    mut format: OutputFormat,
    mut shuffle: ShuffleSource,
) -> Result<()> {
    println!("Interactive Paper Recommendation");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;
    let mut last: Option<Recommendation> = None;

    loop {
        match rl.readline("Recommend> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match (parts[0], parts.get(1)) {
                        ("/help", _) => print_help(),
                        ("/top", Some(n)) => match parse_setting(n, |v| (v, boost)) {
                            Some(q) => {
                                top_k = q.top_k;
                                println!("Set top-k to {}", top_k);
                            }
                            None => eprintln!("Invalid number: must be between 1 and 50"),
                        },
                        ("/boost", Some(n)) => match parse_setting(n, |v| (top_k, v)) {
                            Some(q) => {
                                boost = q.boost;
                                println!("Set boost to {}", boost);
                            }
                            None => eprintln!("Invalid number: must be between 1 and 5"),
                        },
                        ("/format", Some(f)) => match OutputFormat::from_str(f, true) {
                            Ok(f) => {
                                format = f;
                                println!("Set output format to {:?}", format);
                            }
                            Err(_) => eprintln!("Invalid format: must be 'table', 'json' or 'graph'"),
                        },
                        ("/detail", Some(n)) => match (n.parse::<usize>(), &last) {
                            (Ok(rank), Some(previous)) if rank > 0 => display_detail(previous, rank),
                            (Ok(_), None) => eprintln!("No results yet"),
                            _ => eprintln!("Invalid rank: must be a positive integer"),
                        },
                        (command, None) if matches!(command, "/top" | "/boost" | "/format" | "/detail") => {
                            eprintln!("Usage: {} <value>", command)
                        }
                        (command, _) => {
                            eprintln!("Unknown command: {}. Type /help for available commands.", command)
                        }
                    }
                    continue;
                }

                let query = RecommendQuery::new(line.to_string(), Some(top_k), Some(boost))?;
                let start = Instant::now();
                let recommendation = execute(&engine, &query, &mut shuffle).await;
                let elapsed = start.elapsed();

                let count = recommendation.records.len();
                last = Some(recommendation.clone());
                if let Err(e) = print_recommendation(recommendation, format, &engine.layout_config().colors) {
                    eprintln!("Error formatting output: {}", e);
                }
                if matches!(format, OutputFormat::Table) {
                    println!("\nFound {} papers in {:.2}s", count, elapsed.as_secs_f64());
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
    let args = Args::parse();
    setup_logging(&args.log_level);

    // Validate arguments before any expensive initialisation
    let query = match (&args.query, args.interactive) {
        (Some(text), false) => Some(
            RecommendQuery::new(text.clone(), Some(args.top_k), Some(args.boost))
                .with_context(|| "Invalid query parameters")?,
        ),
        (None, true) => {
            RecommendQuery::new(String::new(), Some(args.top_k), Some(args.boost))
                .with_context(|| "Invalid query parameters")?;
            None
        }
        _ => anyhow::bail!(
            "Either --query or --interactive must be specified.\n\
             Use --help for usage information."
        ),
    };

    let mut config = AppConfig::from_env().with_context(|| "Failed to load configuration")?;
    if let Some(dir) = args.cache_dir.clone() {
        config.model_cache_dir = Some(dir);
    } else if config.model_cache_dir.is_none() {
        config.model_cache_dir = dirs::cache_dir().map(|p| p.join("fastembed"));
    }
    if !args.label_tables.is_empty() {
        config.label_tables = args
            .label_tables
            .iter()
            .map(|raw| LabelTableSpec::parse(raw))
            .collect::<Result<_, _>>()
            .with_context(|| "Invalid --label-table value")?;
    }
    debug!("Configuration: {:?}", config);

    info!("Initializing recommendation pipeline");
    let start = Instant::now();
    let engine = Recommender::from_config(&config)
        .await
        .with_context(|| "Failed to initialize the recommendation pipeline")?;
    info!("Pipeline ready in {:.2}s", start.elapsed().as_secs_f64());

    let mut shuffle = ShuffleSource::new(args.seed);

    match query {
        Some(query) => {
            let recommendation = execute(&engine, &query, &mut shuffle).await;
            let failed = recommendation.failure.is_some();
            print_recommendation(recommendation, args.format, &engine.layout_config().colors)?;
            if failed {
                std::process::exit(2);
            }
        }
        None => run_interactive(engine, args.top_k, args.boost, args.format, shuffle).await?,
    }

    Ok(())
}
