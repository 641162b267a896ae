// Bank Analyzer - command line
//
// bank-analyzer [--config <file>] <command> ...

use anyhow::{bail, Context, Result};
use bank_analyzer::{
    init_tracing, Account, Analyzer, AnalyzerConfig, ComparisonRequest, Period, Query,
    SeriesBatch,
};
use serde::Serialize;
use std::env;
use std::fs;
use std::path::Path;

const USAGE: &str = "\
Usage: bank-analyzer [--config <file>] <command> [args]

Commands:
  stats                                          Row counts per relation
  resolve <identifier>                           Resolved entity as JSON
  detail  <identifier> <scope> <account> <period>...
                                                 Report lines (scope: individual | prudential)
  values  <identifier> <scope> <account> <period>...
                                                 Consolidated values (scope: individual | prudential | financial)
  series  <requests.json>                        Batch time series
  compare <compare.json>                         Comparison table

Environment: BANK_ANALYZER_DATA_DIR, BANK_ANALYZER_SQLITE, RUST_LOG";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if let Err(e) = run(args) {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Vec<String>) -> Result<()> {
    let (config_path, args) = split_config_flag(args)?;

    let config = match &config_path {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::from_env(),
    };
    init_tracing(&config.log_filter);

    let command = match args.first() {
        Some(command) => command.as_str(),
        None => {
            eprintln!("{}", USAGE);
            bail!("no command given");
        }
    };
    if command == "help" || command == "--help" {
        println!("{}", USAGE);
        return Ok(());
    }

    let analyzer = Analyzer::open(config)?;
    let rest = &args[1..];

    match command {
        "stats" => run_stats(&analyzer),
        "resolve" => {
            let identifier = rest.first().context("resolve needs an <identifier>")?;
            print_json(&analyzer.resolve(identifier)?)
        }
        "detail" => {
            let (identifier, scope, query) = parse_lookup(rest)?;
            print_json(&analyzer.detail(identifier, Some(scope), &query)?)
        }
        "values" => {
            let (identifier, scope, query) = parse_lookup(rest)?;
            print_json(&analyzer.values(identifier, Some(scope), &query)?)
        }
        "series" => {
            let path = rest.first().context("series needs a <requests.json>")?;
            let batch: SeriesBatch = read_json(path)?;
            print_json(&analyzer.series_batch(&batch.requests, &batch.policy)?)
        }
        "compare" => {
            let path = rest.first().context("compare needs a <compare.json>")?;
            let request: ComparisonRequest = read_json(path)?;
            print_json(&analyzer.compare(&request)?)
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("unknown command '{}'", other)
        }
    }
}

fn run_stats(analyzer: &Analyzer) -> Result<()> {
    let stats = analyzer.stats();

    println!("📊 Relations");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  entity_detail  {:>10}", stats.entity_detail);
    println!("  group_detail   {:>10}", stats.group_detail);
    println!("  group_values   {:>10}", stats.group_values);
    println!("  registry       {:>10}", stats.registry);
    println!("  indexed names  {:>10}", analyzer.resolver().index_len());

    Ok(())
}

/// Pull `--config <file>` out of the argument list, wherever it appears
fn split_config_flag(args: Vec<String>) -> Result<(Option<String>, Vec<String>)> {
    let mut config = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        if arg == "--config" {
            config = Some(iter.next().context("--config needs a <file>")?);
        } else {
            rest.push(arg);
        }
    }

    Ok((config, rest))
}

/// `<identifier> <scope> <account> <period>...`
fn parse_lookup(args: &[String]) -> Result<(&str, &str, Query)> {
    if args.len() < 4 {
        bail!("expected <identifier> <scope> <account> <period>...");
    }

    let account = match args[2].parse::<i64>() {
        Ok(code) => Account::Code(code),
        Err(_) => Account::Name(args[2].clone()),
    };
    let periods = args[3..]
        .iter()
        .map(|p| {
            p.parse::<Period>()
                .with_context(|| format!("'{}' is not a YYYYMM period", p))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((args[0].as_str(), args[1].as_str(), Query::new(vec![account], periods)))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let content = fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
