use dadyar::cache::ResultCache;
use dadyar::classify::KeywordClassifier;
use dadyar::cli::{Cli, Commands, ConfigAction};
use dadyar::config::Config;
use dadyar::domain::{DocumentType, LegalDomain};
use dadyar::embedding::FastEmbedProvider;
use dadyar::error::{DadyarError, Result};
use dadyar::ingest::DocumentIngestor;
use dadyar::llm::{self, ChatTurn};
use dadyar::rag::{ChainOptions, RagEngine};
use dadyar::retrieval::{EnhancedRetriever, Reranker};
use dadyar::segment::LegalUnitSegmenter;
use dadyar::store::VectorStore;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    let config = load_config(cli.config.clone(), cli.profile.clone())?;

    match cli.command {
        Commands::Ingest { paths } => cmd_ingest(&config, &paths),
        Commands::Search {
            query,
            top_k,
            domain,
            document_type,
            json,
        } => cmd_search(&config, &query, top_k, domain, document_type, json),
        Commands::Ask {
            question,
            top_k,
            no_enhanced,
            no_rerank,
            json,
        } => cmd_ask(&config, &question, top_k, no_enhanced, no_rerank, json),
        Commands::Chat { top_k } => cmd_chat(&config, top_k),
        Commands::Stats { json } => cmd_stats(&config, json),
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "dadyar=debug" } else { "dadyar=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(config_path: Option<std::path::PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        tracing::debug!("no config file, using defaults; run 'dadyar config init' to create one");
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    if let Some(profile) = profile {
        config.apply_profile(&profile)?;
    }
    config.storage.data_dir = expand_path(&config.storage.data_dir)?;
    Ok(config)
}

fn open_store(config: &Config) -> Result<(Arc<VectorStore>, ResultCache)> {
    let cache = ResultCache::new(&config.cache);
    let embedder = FastEmbedProvider::new(&config.embedding).map_err(|e| DadyarError::Upstream {
        service: "embedding".to_string(),
        reason: e.to_string(),
    })?;
    let store = Arc::new(VectorStore::open(config, Arc::new(embedder), cache.clone())?);
    Ok((store, cache))
}

fn cmd_ingest(config: &Config, paths: &[std::path::PathBuf]) -> Result<()> {
    let (store, _cache) = open_store(config)?;
    let segmenter = LegalUnitSegmenter::new(&config.chunking)?;
    let ingestor = DocumentIngestor::new(Box::new(segmenter), store.clone());

    let mut total_units = 0usize;
    let mut total_docs = 0usize;
    for path in paths {
        let reports = if path.is_dir() {
            ingestor.ingest_dir(path)?
        } else {
            ingestor.ingest_file(path)?.into_iter().collect()
        };
        for report in reports {
            println!(
                "✓ {} — {} units ({}, {})",
                report.source,
                report.unit_count,
                report.document_type.as_str(),
                report.legal_domain.label(),
            );
            total_units += report.unit_count;
            total_docs += 1;
        }
    }

    println!("\nIngested {} documents, {} units", total_docs, total_units);
    Ok(())
}

fn parse_domain(value: &str) -> Result<LegalDomain> {
    LegalDomain::parse(value)
        .ok_or_else(|| DadyarError::Config(format!("Unknown legal domain: {}", value)))
}

fn parse_document_type(value: &str) -> Result<DocumentType> {
    DocumentType::parse(value)
        .ok_or_else(|| DadyarError::Config(format!("Unknown document type: {}", value)))
}

fn cmd_search(
    config: &Config,
    query: &str,
    top_k: usize,
    domain: Option<String>,
    document_type: Option<String>,
    json: bool,
) -> Result<()> {
    let domain = domain.as_deref().map(parse_domain).transpose()?;
    let document_type = document_type.as_deref().map(parse_document_type).transpose()?;

    let (store, cache) = open_store(config)?;
    let classifier = Arc::new(KeywordClassifier::new(cache));
    // An explicit --domain always filters, independent of the config knob
    let retriever = EnhancedRetriever::new(store, classifier, true);

    let hits = retriever.retrieve(query, top_k, domain, document_type)?;

    if json {
        let payload: Vec<serde_json::Value> = hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "score": hit.score,
                    "source": hit.unit.source,
                    "unit_kind": hit.unit.unit_kind.as_str(),
                    "unit_title": hit.unit.unit_title,
                    "legal_domain": hit.unit.legal_domain.as_str(),
                    "document_type": hit.unit.document_type.as_str(),
                    "content": hit.unit.content,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload).map_err(|e| DadyarError::Json {
            source: e,
            context: "serializing search results".to_string(),
        })?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} {} — {}",
            i + 1,
            hit.score,
            hit.unit.unit_kind.as_str(),
            hit.unit.unit_title,
            hit.unit.source,
        );
        println!("   {}\n", first_line(&hit.unit.content, 120));
    }
    Ok(())
}

fn build_engine(config: &Config) -> Result<RagEngine> {
    let (store, cache) = open_store(config)?;
    let classifier = Arc::new(KeywordClassifier::new(cache.clone()));
    let reranker = Arc::new(Reranker::new(&config.reranker));
    let llm = llm::from_config(&config.llm);

    Ok(RagEngine::new(
        store,
        classifier,
        reranker,
        llm,
        cache,
        config.retrieval.enable_domain_filter,
    ))
}

fn chain_options(config: &Config, top_k: Option<usize>, no_enhanced: bool, no_rerank: bool) -> ChainOptions {
    ChainOptions {
        top_k: top_k.unwrap_or(config.retrieval.default_top_k),
        use_enhanced_retrieval: !no_enhanced,
        use_reranking: !no_rerank && config.reranker.enabled,
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| DadyarError::Io {
        source: e,
        context: "creating tokio runtime".to_string(),
    })
}

fn cmd_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    no_enhanced: bool,
    no_rerank: bool,
    json: bool,
) -> Result<()> {
    let engine = build_engine(config)?;
    let chain = engine.chain(chain_options(config, top_k, no_enhanced, no_rerank));

    let answer = runtime()?.block_on(chain.ask(question))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&answer).map_err(|e| DadyarError::Json {
                source: e,
                context: "serializing answer".to_string(),
            })?
        );
        return Ok(());
    }

    println!("{}\n", answer.answer);
    if !answer.sources.is_empty() {
        println!("منابع: {}", answer.sources.join("، "));
    }
    if let (Some(label), Some(confidence)) = (&answer.domain_label, answer.domain_confidence) {
        println!("حوزه: {} ({:.0}%)", label, confidence * 100.0);
    }
    if let Some(elapsed) = answer.response_time_seconds {
        println!("({:.3}s)", elapsed);
    }
    Ok(())
}

fn cmd_chat(config: &Config, top_k: Option<usize>) -> Result<()> {
    use std::io::{BufRead, Write};

    let engine = build_engine(config)?;
    if !engine.has_generation_backend() {
        println!("No generation backend configured; answers will be extractive.");
    }
    let options = chain_options(config, top_k, false, false);
    let rt = runtime()?;

    println!("dadyar chat — پرسش خود را بنویسید (خروج: exit)");
    let stdin = std::io::stdin();
    let mut memory: Vec<ChatTurn> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(|e| DadyarError::Io {
            source: e,
            context: "reading from stdin".to_string(),
        })?;
        if read == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        let chain = engine.chain(options).with_memory(memory.clone());
        match rt.block_on(chain.ask(question)) {
            Ok(answer) => {
                println!("\n{}\n", answer.answer);
                if !answer.sources.is_empty() {
                    println!("منابع: {}\n", answer.sources.join("، "));
                }
                memory.push(ChatTurn::user(question));
                memory.push(ChatTurn::assistant(answer.answer));
            }
            Err(DadyarError::Upstream { service, reason }) => {
                eprintln!("⚠ {} unavailable: {}. Try again later.", service, reason);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn cmd_stats(config: &Config, json: bool) -> Result<()> {
    let (store, _cache) = open_store(config)?;
    let stats = store.stats()?;
    let per_domain = store.units_per_domain()?;

    if json {
        let payload = serde_json::json!({
            "documents": stats.document_count,
            "units": stats.unit_count,
            "indexed_vectors": stats.indexed_vectors,
            "dimension": stats.dimension,
            "db_size_bytes": stats.db_size_bytes,
            "units_per_domain": per_domain
                .iter()
                .map(|(domain, count)| (domain.as_str().to_string(), *count))
                .collect::<std::collections::BTreeMap<_, _>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload).map_err(|e| DadyarError::Json {
            source: e,
            context: "serializing stats".to_string(),
        })?);
        return Ok(());
    }

    println!("Dadyar Corpus");
    println!("=============");
    println!("Documents:       {}", stats.document_count);
    println!("Units:           {}", stats.unit_count);
    println!("Indexed vectors: {}", stats.indexed_vectors);
    println!("Dimension:       {}", stats.dimension);
    println!("Catalog size:    {} KiB", stats.db_size_bytes / 1024);
    if !per_domain.is_empty() {
        println!("\nUnits per domain:");
        for (domain, count) in per_domain {
            println!("  {:<12} {}", domain.as_str(), count);
        }
    }
    Ok(())
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
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
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
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
    }
    Ok(())
}

fn first_line(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    let truncated: String = line.chars().take(max_chars).collect();
    if truncated.chars().count() < line.chars().count() {
        format!("{}…", truncated)
    } else {
        truncated
    }
}

fn expand_path(path: &std::path::Path) -> Result<std::path::PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| DadyarError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DadyarError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
