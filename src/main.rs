//! flexiflight command line
//!
//! Usage:
//!   flexiflight "round trip from Ottawa to Paris 2026-05-01 2026-05-07, max 1 stop"
//!   flexiflight --request-file request.json --format json
//!   flexiflight --budget 5 --no-cache "one way YOW to LHR this summer"

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use flexiflight::airports;
use flexiflight::cache::ResponseCache;
use flexiflight::config::PlannerConfig;
use flexiflight::error::{ConfigError, InterpretError, PlanError};
use flexiflight::interpreter::RuleBasedInterpreter;
use flexiflight::llm::{ChatClient, ChatConfig, LlmExplainer, LlmInterpreter, NoExplanation};
use flexiflight::render::render_text;
use flexiflight::serpapi::SerpApiClient;
use flexiflight::traits::{Explainer, RequestInterpreter};
use flexiflight::visa::{StaticVisaTable, VisaPurpose};
use flexiflight::{Planner, TravelRequest};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "flexiflight")]
#[command(about = "Find and rank flexible flight itineraries")]
struct Args {
    /// Free-form travel request
    request: Option<String>,

    /// Load a structured travel request (JSON) instead of interpreting text
    #[arg(long)]
    request_file: Option<PathBuf>,

    /// Number of ranked options to return
    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Maximum live provider calls for this run
    #[arg(short = 'b', long)]
    budget: Option<usize>,

    /// Keep the response cache in memory only
    #[arg(long)]
    no_cache: bool,

    /// Persistent response cache (JSON Lines)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Strategies evaluated concurrently
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Upper bound on routing strategies
    #[arg(long)]
    max_strategies: Option<usize>,

    /// Provider call timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: Format,

    /// OpenAI-compatible endpoint for interpretation and explanation
    #[arg(long)]
    llm_endpoint: Option<String>,

    /// Public holiday excluded from PTO counts (repeatable)
    #[arg(long = "holiday", value_name = "YYYY-MM-DD")]
    holidays: Vec<NaiveDate>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn apply_args(config: &mut PlannerConfig, args: &Args) {
    if let Some(top_n) = args.top_n {
        config.top_n = top_n;
    }
    if let Some(budget) = args.budget {
        config.fetch.call_budget = budget;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(max) = args.max_strategies {
        config.generator.max_strategies = max;
    }
    if let Some(secs) = args.timeout {
        config.fetch.timeout = Duration::from_secs(secs);
        config.serpapi.timeout_secs = secs;
    }
    if let Some(path) = &args.cache_file {
        config.cache_file = Some(path.clone());
    }
    if args.no_cache {
        config.cache_file = None;
    }
    if let Some(endpoint) = &args.llm_endpoint {
        config.chat = Some(ChatConfig {
            endpoint: endpoint.clone(),
            ..config.chat.clone().unwrap_or_default()
        });
    }
    config.generator.holidays.extend(args.holidays.iter().copied());
}

fn load_request(args: &Args, config: &PlannerConfig, today: NaiveDate) -> Result<TravelRequest, InterpretError> {
    if let Some(path) = &args.request_file {
        let text = std::fs::read_to_string(path)
            .map_err(|e| InterpretError::Unrecognized(format!("{}: {}", path.display(), e)))?;
        let request: TravelRequest = serde_json::from_str(&text)?;
        request.validate()?;
        return Ok(request);
    }

    let text = args
        .request
        .as_deref()
        .ok_or_else(|| InterpretError::Unrecognized("no request given".to_string()))?;

    match &config.chat {
        Some(chat) => LlmInterpreter::new(ChatClient::new(chat.clone())?, today).interpret(text),
        None => RuleBasedInterpreter::new(today)?.interpret(text),
    }
}

fn load_cache(config: &PlannerConfig) -> ResponseCache {
    let Some(path) = &config.cache_file else {
        return ResponseCache::new();
    };
    match ResponseCache::load(path) {
        Ok(cache) => {
            info!(path = %path.display(), entries = cache.len(), "loaded response cache");
            cache
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cache unreadable, starting empty");
            ResponseCache::new()
        }
    }
}

/// Visa rules for travellers holding a passport from the origin's country.
fn visa_table(request: &TravelRequest) -> StaticVisaTable {
    let home = request
        .origins
        .codes()
        .first()
        .and_then(|code| airports::country_of(code))
        .unwrap_or("CA");
    StaticVisaTable::new()
        .home_country(home)
        .require("CN", VisaPurpose::Entry, "Visitor visa required unless visa-free transit applies")
        .require("CN", VisaPurpose::Transit, "Visa-free transit needs an onward ticket within 240 hours")
        .require("GB", VisaPurpose::Entry, "Electronic Travel Authorisation required")
}

fn config_failure(err: &ConfigError) -> ExitCode {
    error!(error = %err, "configuration error");
    eprintln!("Configuration error: {}", err);
    ExitCode::from(1)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = match PlannerConfig::from_env() {
        Ok(config) => config,
        Err(err) => return config_failure(&err),
    };
    apply_args(&mut config, &args);
    if let Err(err) = config.validate() {
        return config_failure(&err);
    }

    let today = Utc::now().date_naive();
    let request = match load_request(&args, &config, today) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("Could not understand the request: {}", err);
            return ExitCode::from(1);
        }
    };

    if let Err(err) = config.require_api_key() {
        return config_failure(&err);
    }
    let provider = match SerpApiClient::new(config.serpapi.clone()) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            eprintln!("Could not build HTTP client: {}", err);
            return ExitCode::from(1);
        }
    };

    let cache = Arc::new(load_cache(&config));
    let planner = match Planner::new(&config, provider, Arc::clone(&cache), Arc::new(visa_table(&request))) {
        Ok(planner) => planner,
        Err(err) => return config_failure(&err),
    };

    let outcome = planner.plan(&request);

    if let Some(path) = &config.cache_file {
        match cache.flush(path) {
            Ok(entries) => info!(path = %path.display(), entries, "flushed response cache"),
            Err(err) => warn!(path = %path.display(), error = %err, "could not persist cache"),
        }
    }

    let mut report = match outcome {
        Ok(report) => report,
        Err(PlanError::NoCandidates { strategies, failures }) => {
            println!(
                "No itinerary matched the request ({} strategies searched, {} failed).",
                strategies, failures
            );
            return ExitCode::SUCCESS;
        }
        Err(err @ PlanError::Infeasible) => {
            eprintln!("{}", err);
            return ExitCode::from(2);
        }
        Err(err @ PlanError::ProviderUnavailable { .. }) => {
            eprintln!("{}", err);
            return ExitCode::from(3);
        }
        Err(PlanError::Config(err)) => return config_failure(&err),
    };

    let explainer: Box<dyn Explainer> = match config.chat.clone().map(ChatClient::new) {
        Some(Ok(client)) => Box::new(LlmExplainer::new(client)),
        Some(Err(err)) => {
            warn!(error = %err, "explanations disabled");
            Box::new(NoExplanation)
        }
        None => Box::new(NoExplanation),
    };
    match explainer.explain(&report.records) {
        Ok(text) if !text.is_empty() => report.explanation = Some(text),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "explanation failed"),
    }

    match args.format {
        Format::Text => print!("{}", render_text(&report)),
        Format::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("Could not encode report: {}", err);
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}
