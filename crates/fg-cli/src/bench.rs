use std::fs;
use std::time::Instant;

use serde::Deserialize;

use fg_core::{Config, Engine, HttpMethod, Request, RequestType};

use crate::load_store;
use crate::report::{decision, Decision};

pub struct BenchOptions {
    pub list_paths: Vec<String>,
    pub trace_path: String,
    pub iterations: usize,
    pub limit: usize,
    pub config: Config,
}

/// One line of a JSONL request trace.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceRecord {
    url: String,
    #[serde(rename = "type", default = "default_type")]
    request_type: String,
    #[serde(alias = "initiator", alias = "sourceUrl", alias = "frameUrl", default)]
    source: Option<String>,
    #[serde(default)]
    method: Option<String>,
}

fn default_type() -> String {
    "other".to_string()
}

#[derive(Default)]
struct Tally {
    none: usize,
    allow: usize,
    block: usize,
    redirect: usize,
}

impl Tally {
    fn add(&mut self, decision: Decision) {
        match decision {
            Decision::None => self.none += 1,
            Decision::Allow => self.allow += 1,
            Decision::Block => self.block += 1,
            Decision::Redirect => self.redirect += 1,
        }
    }
}

pub fn run(opts: BenchOptions) -> Result<(), String> {
    println!("============================================================");
    println!("FilterGate trace replay");
    println!("============================================================");

    let load_start = Instant::now();
    let store = load_store(&opts.list_paths)?;
    let engine = Engine::new(store, opts.config);
    println!(
        "Indexed {} rules in {:.1}ms",
        engine.rules_count(),
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    let requests = load_trace_jsonl(&opts.trace_path, opts.limit)?;
    println!("Loaded {} requests from {}", requests.len(), opts.trace_path);

    for iteration in 0..opts.iterations.max(1) {
        // First pass runs on a cold cache
        if iteration == 0 {
            engine.clear_cache();
        }

        let mut tally = Tally::default();
        let mut latencies = Vec::with_capacity(requests.len());
        let pass_start = Instant::now();

        for request in &requests {
            let start = Instant::now();
            let frame_rule = match request.source_url() {
                Some(source) if !request.request_type().intersects(RequestType::DOCUMENT) => {
                    engine.match_frame(source)
                }
                _ => None,
            };
            let result = engine.match_request(request, frame_rule);
            let basic = result.get_basic_result();
            latencies.push(start.elapsed().as_secs_f64() * 1_000_000.0);
            tally.add(decision(basic.as_deref()));
        }

        let total = pass_start.elapsed();
        latencies.sort_by(|a, b| a.total_cmp(b));

        println!();
        println!("Pass {} ({})", iteration + 1, if iteration == 0 { "cold" } else { "warm" });
        println!(
            "  Total:     {:.1}ms ({:.0} req/s)",
            total.as_secs_f64() * 1000.0,
            requests.len() as f64 / total.as_secs_f64().max(f64::EPSILON)
        );
        println!(
            "  Latency:   p50 {:.2}us, p95 {:.2}us, p99 {:.2}us",
            percentile(&latencies, 0.50),
            percentile(&latencies, 0.95),
            percentile(&latencies, 0.99)
        );
        println!(
            "  Decisions: {} block, {} redirect, {} allow, {} none",
            tally.block, tally.redirect, tally.allow, tally.none
        );
    }

    Ok(())
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let idx = ((values.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(values.len() - 1);
    values[idx]
}

fn load_trace_jsonl(path: &str, limit: usize) -> Result<Vec<Request>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read trace '{}': {}", path, e))?;
    let requests = parse_trace(&text, limit);

    if requests.is_empty() {
        return Err(format!("Trace loaded 0 requests from {}", path));
    }
    Ok(requests)
}

/// Parse trace lines, skipping blank and malformed ones.
fn parse_trace(text: &str, limit: usize) -> Vec<Request> {
    let mut out = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if out.len() >= limit {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: TraceRecord = match serde_json::from_str(trimmed) {
            Ok(record) => record,
            Err(e) => {
                log::debug!("trace line {}: {}", line_no + 1, e);
                continue;
            }
        };
        if record.url.is_empty() {
            continue;
        }

        let mut request = Request::new(
            &record.url,
            record.source.as_deref(),
            RequestType::parse_name(&record.request_type),
        );
        if let Some(method) = record.method.as_deref().and_then(HttpMethod::parse_name) {
            request = request.with_method(method);
        }
        out.push(request);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trace_lines() {
        let trace = r#"
{"url": "https://ads.net/a.js", "type": "script", "initiator": "https://news.org/"}
not json
{"url": "https://news.org/", "type": "main_frame", "method": "GET"}
{"url": ""}
{"url": "https://cdn.net/x"}
"#;
        let requests = parse_trace(trace, 10);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].request_type(), RequestType::SCRIPT);
        assert_eq!(requests[0].source_hostname(), "news.org");
        assert!(requests[0].is_third_party());
        assert_eq!(requests[1].method(), Some(HttpMethod::GET));
        assert_eq!(requests[2].request_type(), RequestType::OTHER);

        assert_eq!(parse_trace(trace, 1).len(), 1);
    }

    #[test]
    fn percentile_picks_rank() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.50), 2.0);
        assert_eq!(percentile(&values, 0.99), 4.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }
}
