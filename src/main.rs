use qsb::cli::{Cli, Commands, ConfigAction, ShortcutsAction};
use qsb::config::{Config, ConfigValidator};
use qsb::corpus::{Corpora, CorpusRanker, DefaultCorpusRanker};
use qsb::error::{QsbError, Result};
use qsb::provider::BlendingSuggestionsProvider;
use qsb::shortcuts::{ShortcutRepository, SqliteShortcutRepository};
use qsb::suggestion::{ListSuggestionCursor, SuggestionCursor};
use qsb::suggestions::Suggestions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    let config_path = cli.config;
    let profile = cli.profile;

    match cli.command {
        Commands::Query {
            query,
            corpus,
            limit,
            timeout_ms,
            json,
        } => {
            let config = load_config(config_path, profile)?;
            cmd_query(&config, &query, corpus, limit, timeout_ms, json)?;
        }
        Commands::Click {
            query,
            corpus,
            position,
        } => {
            let config = load_config(config_path, profile)?;
            cmd_click(&config, &query, corpus, position)?;
        }
        Commands::Corpora => {
            let config = load_config(config_path, profile)?;
            cmd_corpora(&config)?;
        }
        Commands::Shortcuts { action } => {
            let config = load_config(config_path, profile)?;
            cmd_shortcuts(&config, action)?;
        }
        Commands::Config { action } => {
            cmd_config(config_path, profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "qsb=debug" } else { "qsb=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| QsbError::Io {
            source: e,
            context: "Failed to create tokio runtime".to_string(),
        })
}

fn cmd_query(
    config: &Config,
    query: &str,
    corpus: Option<String>,
    limit: Option<usize>,
    timeout_ms: u64,
    json: bool,
) -> Result<()> {
    let rt = runtime()?;
    let handle = rt.handle().clone();
    let max_promoted = limit.unwrap_or(config.search.max_promoted);

    rt.block_on(async move {
        let provider = build_provider(config, handle)?;
        let suggestions = provider.get_suggestions(query, corpus.as_deref(), max_promoted)?;
        wait_for_results(&suggestions, timeout_ms).await?;

        let promoted = suggestions.get_promoted(provider.promoter(), max_promoted)?;
        if json {
            print_json(&suggestions, &promoted)?;
        } else {
            print_promoted(&suggestions, &promoted)?;
        }

        suggestions.release();
        provider.shutdown().await;
        Ok::<(), QsbError>(())
    })
}

fn cmd_click(config: &Config, query: &str, corpus: Option<String>, position: usize) -> Result<()> {
    let rt = runtime()?;
    let handle = rt.handle().clone();
    let max_promoted = config.search.max_promoted;

    rt.block_on(async move {
        let provider = build_provider(config, handle)?;
        let suggestions = provider.get_suggestions(query, corpus.as_deref(), max_promoted)?;
        wait_for_results(&suggestions, 2000).await?;

        let mut promoted = suggestions.get_promoted(provider.promoter(), max_promoted)?;
        promoted.move_to(position)?;
        let chosen = promoted.current()?.clone();

        if config.shortcuts.enabled {
            provider.report_click(query, &chosen)?;
            println!("✓ Recorded click on \"{}\" from {}", chosen.text1, chosen.source);
        } else {
            println!("Shortcuts are disabled; click on \"{}\" not recorded", chosen.text1);
        }

        suggestions.release();
        provider.shutdown().await;
        Ok::<(), QsbError>(())
    })
}

fn cmd_corpora(config: &Config) -> Result<()> {
    let corpora = Corpora::from_config(&config.corpora);

    let repository = if config.shortcuts.enabled {
        Some(Arc::new(open_shortcuts(config)?) as Arc<dyn ShortcutRepository>)
    } else {
        None
    };
    let scores = match &repository {
        Some(repo) => repo.corpus_scores()?,
        None => Default::default(),
    };
    let ranker = match repository {
        Some(repo) => DefaultCorpusRanker::new(repo),
        None => DefaultCorpusRanker::without_usage(),
    };

    println!("Enabled corpora (rank order):");
    for (rank, corpus) in ranker.rank(&corpora.enabled()).iter().enumerate() {
        if corpus.is_hidden() {
            continue;
        }
        println!(
            "  {}. {} ({} sources, {} clicks)",
            rank + 1,
            corpus.name(),
            corpus.sources().len(),
            scores.get(corpus.name()).copied().unwrap_or(0)
        );
    }

    let disabled: Vec<_> = corpora
        .all()
        .iter()
        .filter(|c| !corpora.is_enabled(c.name()) && !c.is_hidden())
        .map(|c| c.name().to_string())
        .collect();
    if !disabled.is_empty() {
        println!("Disabled: {}", disabled.join(", "));
    }

    Ok(())
}

fn cmd_shortcuts(config: &Config, action: ShortcutsAction) -> Result<()> {
    let repository = open_shortcuts(config)?;

    match action {
        ShortcutsAction::List { query } => {
            let query = query.unwrap_or_default();
            let entries = repository.list_shortcuts(&query)?;

            if entries.is_empty() {
                println!("No shortcuts for {:?}", query);
                return Ok(());
            }

            for entry in entries {
                println!(
                    "  {:>3} hits  {}  {} [{}]",
                    entry.hits,
                    entry.last_hit.format("%Y-%m-%d %H:%M"),
                    entry.suggestion.text1,
                    entry.corpus
                );
            }
        }
        ShortcutsAction::Clear => {
            repository.clear_history()?;
            println!("✓ Shortcut history cleared");
        }
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
            let json = serde_json::to_string_pretty(&config).map_err(|e| QsbError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Corpora: {}", config.corpora.len());
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

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!("Config file not found, using defaults. Run 'qsb config init' to create one.");
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn build_provider(
    config: &Config,
    runtime: tokio::runtime::Handle,
) -> Result<BlendingSuggestionsProvider> {
    let corpora = Corpora::from_config(&config.corpora);
    let provider = BlendingSuggestionsProvider::new(corpora, config.search.clone(), runtime);

    if config.shortcuts.enabled {
        let repository = open_shortcuts(config)?;
        Ok(provider.with_shortcuts(Arc::new(repository)))
    } else {
        Ok(provider)
    }
}

fn open_shortcuts(config: &Config) -> Result<SqliteShortcutRepository> {
    let data_dir = expand_path(&config.storage.data_dir)?;
    SqliteShortcutRepository::new(
        &data_dir.join("shortcuts.sqlite"),
        &config.shortcuts,
        config.search.max_shortcuts,
    )
}

async fn wait_for_results(suggestions: &Suggestions, timeout_ms: u64) -> Result<()> {
    let wait = suggestions.wait_until_done();
    match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
        Ok(done) => done,
        Err(_) => {
            tracing::warn!(
                "Timed out after {}ms with {} of {} corpora answered",
                timeout_ms,
                suggestions.result_count()?,
                suggestions.expected_result_count()?
            );
            Ok(())
        }
    }
}

fn print_promoted(suggestions: &Suggestions, promoted: &ListSuggestionCursor) -> Result<()> {
    if promoted.is_empty() {
        println!("No suggestions for \"{}\"", suggestions.query()?);
        return Ok(());
    }

    for (i, suggestion) in promoted.iter().enumerate() {
        let marker = if suggestion.is_shortcut { "*" } else { " " };
        match &suggestion.text2 {
            Some(text2) => println!(
                "{}{:>2}. {} - {} [{}]",
                marker, i, suggestion.text1, text2, suggestion.source
            ),
            None => println!("{}{:>2}. {} [{}]", marker, i, suggestion.text1, suggestion.source),
        }
    }

    for result in suggestions.corpus_results()? {
        tracing::debug!(
            "{}: {} suggestions in {:?}",
            result.corpus,
            result.count,
            result.latency
        );
    }

    Ok(())
}

fn print_json(suggestions: &Suggestions, promoted: &ListSuggestionCursor) -> Result<()> {
    let corpora: Vec<_> = suggestions
        .corpus_results()?
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "corpus": r.corpus,
                "count": r.count,
                "latency_ms": r.latency.as_millis() as u64,
            })
        })
        .collect();
    let promoted: Vec<_> = promoted.iter().map(|s| s.as_ref()).collect();

    let output = serde_json::json!({
        "id": suggestions.id().to_string(),
        "query": suggestions.query()?,
        "done": suggestions.is_done()?,
        "corpora": corpora,
        "promoted": promoted,
    });

    let json = serde_json::to_string_pretty(&output).map_err(|e| QsbError::Json {
        source: e,
        context: "Failed to serialize results".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| QsbError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| QsbError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
