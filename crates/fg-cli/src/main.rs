//! FilterGate CLI
//!
//! CLI tool for matching requests against filter lists and replaying
//! request traces.

mod bench;
mod report;

use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fg_core::{psl, Config, Engine, HttpMethod, Request, RequestType};
use fg_rules::RuleStore;

#[derive(Parser)]
#[command(name = "fg-cli")]
#[command(about = "FilterGate request matcher and tools")]
struct Cli {
    /// Log rule routing and parse errors to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Public suffix list (public_suffix_list.dat)
    #[arg(long, global = true)]
    psl: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match one request and print the result as JSON
    Match {
        /// Filter list files
        #[arg(short, long, required = true)]
        list: Vec<String>,

        /// Request URL
        #[arg(short, long)]
        url: String,

        /// URL of the page that made the request
        #[arg(short, long)]
        source: Option<String>,

        /// Request type (document, script, image, xhr, ...)
        #[arg(short = 't', long = "type", default_value = "document")]
        request_type: String,

        /// HTTP method
        #[arg(short, long)]
        method: Option<String>,

        /// Engine config (JSON)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Load filter lists and print rule and table counts
    Stats {
        /// Filter list files
        #[arg(short, long, required = true)]
        list: Vec<String>,

        /// Engine config (JSON)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Replay a JSONL request trace and report matching latency
    Bench {
        /// Filter list files
        #[arg(short, long, required = true)]
        list: Vec<String>,

        /// Trace file, one JSON request per line
        #[arg(long)]
        trace: String,

        /// Passes over the trace
        #[arg(short, long, default_value = "3")]
        iterations: usize,

        /// Maximum requests loaded from the trace
        #[arg(long, default_value = "100000")]
        limit: usize,

        /// Engine config (JSON)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Match {
            list,
            url,
            source,
            request_type,
            method,
            config,
        } => load_config(config.as_deref(), cli.psl.as_deref(), cli.verbose).and_then(|config| {
            cmd_match(&list, &url, source.as_deref(), &request_type, method.as_deref(), config)
        }),
        Commands::Stats { list, config } => {
            load_config(config.as_deref(), cli.psl.as_deref(), cli.verbose).and_then(|config| cmd_stats(&list, config))
        }
        Commands::Bench {
            list,
            trace,
            iterations,
            limit,
            config,
        } => load_config(config.as_deref(), cli.psl.as_deref(), cli.verbose).and_then(|config| {
            bench::run(bench::BenchOptions {
                list_paths: list,
                trace_path: trace,
                iterations,
                limit,
                config,
            })
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Read the config file, if any, install the logger and load the public
/// suffix list.
fn load_config(path: Option<&str>, psl_path: Option<&str>, verbose: bool) -> Result<Config, String> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
            Config::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))?
        }
        None => Config::default(),
    };

    let verbose = verbose || config.verbose;
    init_logging(verbose);

    if let Some(path) = psl_path {
        let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        psl::load_public_suffix_list(&text).map_err(|e| format!("Invalid public suffix list '{}': {}", path, e))?;
        log::debug!("loaded public suffix list from {}", path);
    }

    Ok(config.with_verbose(verbose))
}

/// Stderr subscriber; `log` records are forwarded into it. `RUST_LOG`
/// overrides the level picked by `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Parse every list into one store; list ids follow argument order.
pub(crate) fn load_store(paths: &[String]) -> Result<RuleStore, String> {
    if paths.is_empty() {
        return Err("No filter lists specified".to_string());
    }

    let mut store = RuleStore::new();
    for (list_id, path) in paths.iter().enumerate() {
        let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        let list_id = u16::try_from(list_id).map_err(|_| "Too many filter lists".to_string())?;
        let stats = store.add_list(list_id, &content);
        log::debug!(
            "[{}] {}: {} rules, {} skipped, {} errors",
            list_id,
            Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
            stats.rules,
            stats.skipped,
            stats.errors
        );
    }
    Ok(store)
}

fn cmd_match(
    lists: &[String],
    url: &str,
    source: Option<&str>,
    request_type: &str,
    method: Option<&str>,
    config: Config,
) -> Result<(), String> {
    let engine = Engine::new(load_store(lists)?, config);

    let request_type = RequestType::parse_name(request_type);
    let mut request = Request::new(url, source, request_type);
    if let Some(name) = method {
        let method = HttpMethod::parse_name(name).ok_or_else(|| format!("Unknown HTTP method '{}'", name))?;
        request = request.with_method(method);
    }

    // Sub-resources inherit the document-level rule of their page
    let frame_rule = match source {
        Some(source) if !request_type.intersects(RequestType::DOCUMENT) => engine.match_frame(source),
        _ => None,
    };

    let result = engine.match_request(&request, frame_rule);
    let report = report::MatchReport::new(&request, &result);
    let json = serde_json::to_string_pretty(&report).map_err(|e| format!("Failed to encode result: {}", e))?;
    println!("{json}");

    Ok(())
}

fn cmd_stats(lists: &[String], config: Config) -> Result<(), String> {
    let start = Instant::now();
    let store = load_store(lists)?;
    let parse_time = start.elapsed();

    let build_start = Instant::now();
    let engine = Engine::new(store, config);
    let build_time = build_start.elapsed();

    let counts = engine.network_engine().table_counts();
    println!("Loaded {} filter lists", lists.len());
    println!("  Rules:     {}", engine.rules_count());
    println!("  Hostname:  {}", counts.hostname);
    println!("  Trie:      {}", counts.trie);
    println!("  Domains:   {}", counts.domains);
    println!("  SeqScan:   {}", counts.seq_scan);
    println!(
        "  Time:      {:.1}ms (parse: {:.1}ms, index: {:.1}ms)",
        start.elapsed().as_secs_f64() * 1000.0,
        parse_time.as_secs_f64() * 1000.0,
        build_time.as_secs_f64() * 1000.0,
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_installs_once_and_keeps_verbose() {
        let config = load_config(None, None, true).unwrap();
        assert!(config.verbose);
        // A second install is a no-op
        let config = load_config(None, None, false).unwrap();
        assert!(!config.verbose);
        log::debug!("still routed after a second install");
    }

    #[test]
    fn missing_suffix_list_is_an_error() {
        let err = load_config(None, Some("/nonexistent/public_suffix_list.dat"), false).unwrap_err();
        assert!(err.contains("public_suffix_list.dat"));
    }
}
