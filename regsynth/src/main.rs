use clap::{Parser, Subcommand, ValueEnum};
use model::prelude::*;
use regsynth::prelude::*;
use regsynth::PipelineConfig;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "regsynth")]
#[command(about = "Derive register test suites from extracted datasheet tables")]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum AnalyzerKind {
    /// Header matching, no model service needed
    Heuristic,
    /// Ask a local Ollama model
    Ollama,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the test suite for one analysis record
    Synth {
        /// JSON file holding the analysis record
        #[arg(short, long)]
        analysis: PathBuf,
        /// Datasheet file name recorded as the suite source
        #[arg(long, default_value = "unknown")]
        source_file: String,
        /// Page the record was taken from
        #[arg(long, default_value = "0")]
        page: usize,
        /// Print an outline instead of JSON
        #[arg(long)]
        outline: bool,
    },
    /// List pages that look like register descriptions
    Scan {
        /// Extracted document (JSON export)
        #[arg(short, long)]
        document: PathBuf,
        #[arg(long, default_value = "0")]
        start: usize,
        /// Last page (defaults to the end of the document)
        #[arg(long)]
        end: Option<usize>,
        #[arg(long)]
        min_tables: Option<usize>,
        /// Extra keyword that must appear on the page (repeatable)
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
    },
    /// Analyze selected tables and write a batch report
    Run {
        /// Extracted document (JSON export)
        #[arg(short, long)]
        document: PathBuf,
        #[arg(long, conflicts_with = "pages")]
        start: Option<usize>,
        #[arg(long, conflicts_with = "pages")]
        end: Option<usize>,
        /// Explicit pages, comma separated
        #[arg(long, value_delimiter = ',')]
        pages: Vec<usize>,
        /// Process every page (the default without --start, --end or --pages)
        #[arg(long, conflicts_with_all = ["start", "end", "pages"])]
        all_pages: bool,
        #[arg(long, value_enum, default_value = "heuristic")]
        analyzer: AnalyzerKind,
        /// Model name, overrides the config file
        #[arg(short, long)]
        model: Option<String>,
        /// Concurrent analyzer calls, overrides the config file
        #[arg(short, long)]
        workers: Option<usize>,
        /// Directory the report is written to
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        /// Also render each suite as an outline
        #[arg(long)]
        outline: bool,
    },
    /// Check that the Ollama service is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            PipelineConfig::load(path)?
        }
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Synth {
            analysis,
            source_file,
            page,
            outline,
        } => synth(&analysis, source_file, page, outline)?,
        Commands::Scan {
            document,
            start,
            end,
            min_tables,
            keywords,
        } => {
            let min_tables = min_tables.unwrap_or(config.selection.min_tables);
            scan(&document, start, end, min_tables, keywords)?;
        }
        Commands::Run {
            document,
            start,
            end,
            pages,
            all_pages,
            analyzer,
            model,
            workers,
            output,
            outline,
        } => {
            let options = RunOptions {
                start,
                end,
                pages,
                all_pages,
                analyzer,
                model,
                workers,
                output,
                outline,
            };
            run(&document, &config, options).await?;
        }
        Commands::Health => health_check(&config).await?,
    }

    Ok(())
}

fn synth(
    path: &Path,
    source_file: String,
    page: usize,
    outline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let analysis = RegisterAnalysis::from_value(&value)?;

    let suite = synthesize_suite(&analysis, &SourceRef::new(source_file, page));
    if outline {
        print!("{}", OutlineRenderer::new().render(&suite)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&suite)?);
    }

    Ok(())
}

fn scan(
    path: &Path,
    start: usize,
    end: Option<usize>,
    min_tables: usize,
    keywords: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = ExtractedDocument::load(path)?;
    let pages = find_register_pages(&document, start, end, min_tables, keywords)?;

    println!(
        "{} candidate register pages in {} ({} pages):",
        pages.len(),
        document.metadata().filename,
        document.page_count()
    );
    for page in pages {
        let content = document.page(page)?;
        println!("  - page {} ({} tables)", page, content.table_count());
    }

    Ok(())
}

struct RunOptions {
    start: Option<usize>,
    end: Option<usize>,
    pages: Vec<usize>,
    all_pages: bool,
    analyzer: AnalyzerKind,
    model: Option<String>,
    workers: Option<usize>,
    output: PathBuf,
    outline: bool,
}

async fn run(
    path: &Path,
    config: &PipelineConfig,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = ExtractedDocument::load(path)?;

    let scope = if !options.pages.is_empty() {
        PageSelection::pages(options.pages)
    } else if options.all_pages || (options.start.is_none() && options.end.is_none()) {
        PageSelection::all()
    } else {
        let last_page = document.page_count().saturating_sub(1);
        PageSelection::range(options.start.unwrap_or(0), options.end.unwrap_or(last_page))
    };
    let selection = config.apply_selection(scope);

    let mut batch_config = config.batch_config();
    if let Some(workers) = options.workers {
        batch_config = batch_config.with_workers(workers);
    }

    let runner = match options.analyzer {
        AnalyzerKind::Heuristic => BatchRunner::new(HeuristicAnalyzer::new(), batch_config)?,
        AnalyzerKind::Ollama => {
            let mut ollama_config = config.ollama_config();
            if let Some(model) = options.model {
                ollama_config = ollama_config.with_model(model);
            }
            let model = ollama_config.model.clone();
            let provider = OllamaProvider::new(ollama_config)?;
            let analyzer = LlmAnalyzer::new(provider, model)
                .with_temperature(config.ollama.temperature)
                .with_max_rows(config.ollama.max_rows);
            BatchRunner::new(analyzer, batch_config)?
        }
    };
    let runner = if options.outline {
        runner.with_renderer(OutlineRenderer::new())
    } else {
        runner
    };

    let cancel = runner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no new tables will be analyzed");
            cancel.cancel();
        }
    });

    let report = runner.run(&document, &selection).await?;

    for rendered in &report.rendered {
        print!("{}", rendered.text);
    }
    for failure in &report.failures {
        error!(
            "Page {} table {} ({:?}): {}",
            failure.page, failure.table, failure.stage, failure.reason
        );
    }

    let written = report.write_json(&options.output)?;
    println!("{}", report.summary());
    println!("Report: {}", written.display());

    Ok(())
}

async fn health_check(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let provider = OllamaProvider::new(config.ollama_config())?;
    println!("Checking Ollama at {}...", config.ollama.base_url);

    if let Err(e) = provider.health_check().await {
        println!("✗ Health check failed: {}", e);
        error!("Health check failed: {}", e);
        return Err(e.into());
    }
    println!("✓ Ollama is running and accessible.");
    info!("Health check successful");

    let models = provider.list_models().await?;
    if models.is_empty() {
        println!("  No models installed. Pull one with `ollama pull {}`.", config.ollama.model);
    }
    for model in models {
        let marker = if model.name == config.ollama.model { "*" } else { "-" };
        println!(
            "  {} {} ({})",
            marker,
            model.name,
            model
                .size
                .map(|s| format!("{:.1} GB", s as f64 / 1_000_000_000.0))
                .unwrap_or_else(|| "unknown size".to_string())
        );
    }

    Ok(())
}
