use hybrag::cli::{Cli, Commands, ConfigAction, RetrievalArgs};
use hybrag::config::Config;
use hybrag::embedding::provider_from_config;
use hybrag::error::{RagError, Result};
use hybrag::manager::{IndexManager, IngestReport};
use hybrag::retrieval::{CrossEncoderReranker, RelevanceScorer, RetrievalParams};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Rebuild => {
            cmd_rebuild(cli.config, cli.profile).await?;
        }
        Commands::Add { files } => {
            cmd_add(cli.config, cli.profile, &files).await?;
        }
        Commands::Query {
            query,
            retrieval,
            json,
        } => {
            cmd_query(cli.config, cli.profile, &query, &retrieval, json).await?;
        }
        Commands::Context {
            question,
            retrieval,
            system_hint,
        } => {
            cmd_context(cli.config, cli.profile, &question, &retrieval, system_hint).await?;
        }
        Commands::Status => {
            cmd_status(cli.config, cli.profile).await?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "hybrag=debug" } else { "hybrag=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn open_manager(config_path: Option<PathBuf>, profile: Option<String>) -> Result<IndexManager> {
    let config = load_config(config_path, profile)?;

    let embedder = provider_from_config(&config.embedding)?;
    let scorer: Option<Arc<dyn RelevanceScorer>> = if config.reranker.enabled {
        let reranker = CrossEncoderReranker::new(&config.reranker.model)
            .map_err(|e| RagError::Config(format!("Failed to load reranker: {}", e)))?;
        Some(Arc::new(reranker) as Arc<dyn RelevanceScorer>)
    } else {
        None
    };

    IndexManager::open(config, embedder, scorer)
}

async fn cmd_rebuild(config_path: Option<PathBuf>, profile: Option<String>) -> Result<()> {
    let manager = open_manager(config_path, profile)?;
    tracing::info!(
        "Rebuilding from {}",
        manager.config().docs_dir().display()
    );

    let report = manager.rebuild_from_folder().await?;
    println!("✓ Index rebuilt: {} units", report.units);
    print_report(&report);
    Ok(())
}

async fn cmd_add(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    files: &[PathBuf],
) -> Result<()> {
    let manager = open_manager(config_path, profile)?;
    let report = manager.add_files(files).await?;

    println!(
        "✓ Added {} documents ({} units)",
        report.accepted.len(),
        report.units
    );
    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestReport) {
    for source in &report.accepted {
        println!("  + {}", source);
    }
    for skipped in &report.skipped {
        println!("  ⚠ skipped {}: {}", skipped.source, skipped.error);
    }
}

fn resolve_retrieval(config: &Config, args: &RetrievalArgs) -> (String, usize, RetrievalParams) {
    let strategy = args
        .strategy
        .clone()
        .unwrap_or_else(|| config.retrieval.strategy.clone());
    let top_k = args.top_k.unwrap_or(config.retrieval.top_k);

    let mut params = config.retrieval.params();
    if let Some(lambda) = args.lambda {
        params.mmr_lambda = lambda;
    }
    if let Some(alpha) = args.alpha {
        params.hybrid_alpha = alpha;
    }

    (strategy, top_k, params)
}

async fn cmd_query(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    query: &str,
    args: &RetrievalArgs,
    json: bool,
) -> Result<()> {
    let manager = open_manager(config_path, profile)?;
    let (strategy, top_k, params) = resolve_retrieval(manager.config(), args);

    let citations = manager.query(query, &strategy, top_k, Some(params)).await?;

    if json {
        let output = serde_json::to_string_pretty(&citations).map_err(|e| RagError::Json {
            source: e,
            context: "Failed to serialize citations".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if citations.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for citation in &citations {
        println!(
            "[{}] {:.4}  {} ({})",
            citation.rank, citation.score, citation.title, citation.source
        );
        println!("    {}", citation.preview(160).replace('\n', " "));
    }
    Ok(())
}

async fn cmd_context(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    question: &str,
    args: &RetrievalArgs,
    system_hint: Option<String>,
) -> Result<()> {
    let manager = open_manager(config_path, profile)?;
    let (strategy, top_k, params) = resolve_retrieval(manager.config(), args);

    let pack = manager
        .context(question, &[], &strategy, top_k, Some(params))
        .await?;

    println!("{}", pack.render_prompt(system_hint.as_deref()));
    let footer = pack.sources_footer();
    if !footer.is_empty() {
        println!("\n{}", footer);
    }
    Ok(())
}

async fn cmd_status(config_path: Option<PathBuf>, profile: Option<String>) -> Result<()> {
    let manager = open_manager(config_path, profile)?;
    let stats = manager.stats().await?;

    println!("hybrag Status");
    println!("=============");
    println!("\nIndex directory: {}", manager.config().index_dir().display());
    println!("Documents directory: {}", manager.config().docs_dir().display());
    println!("\nDense units:   {}", stats.dense_units);
    println!("Lexical units: {}", stats.lexical_units);
    println!("Dimension:     {}", stats.dimension);
    println!("Embedder:      {}", stats.embedding_model);

    match &stats.manifest {
        Some(manifest) => {
            println!("\nLast built with {} ({}D)", manifest.model, manifest.dimension);
            println!("Updated: {}", manifest.updated_at);
        }
        None => println!("\nNo index persisted yet. Run 'hybrag rebuild'."),
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Save default config
            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Documents folder: {}", config.docs_dir().display());
            println!("  Index folder:     {}", config.index_dir().display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    match profile {
        Some(profile) => Config::load_with_profile(&path, &profile),
        None => Config::load_or_default(&path),
    }
}
