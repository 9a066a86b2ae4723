//! Command-line front end for splitting and reassembling JSON documents.
//!
//! Usage:
//!   segments split --id <uid> --budget <bytes> [FILE]
//!   segments join [--timeout <secs>]
//!
//! `split` reads one JSON document from FILE (or stdin) and prints one chunk
//! envelope per line. `join` reads envelopes from stdin, one per line, and
//! prints every document it manages to reassemble.

use json_segments::{split_document, JsonCodec, Registry, RegistryConfig};
use log::{info, warn};
use std::io::{self, BufRead, Read, Write};
use std::process::exit;
use std::time::Duration;

#[derive(Debug)]
enum Command {
    Split {
        group_id: String,
        budget: usize,
        path: Option<String>,
    },
    Join {
        timeout: Duration,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let command = match parse_args() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run with --help for usage.");
            exit(2);
        }
    };

    let result = match command {
        Command::Split {
            group_id,
            budget,
            path,
        } => run_split(&group_id, budget, path.as_deref()),
        Command::Join { timeout } => run_join(timeout),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

fn print_usage(program: &str) {
    println!("JSON document segmenter");
    println!();
    println!("Usage:");
    println!("  {} split --id <uid> --budget <bytes> [FILE]", program);
    println!("  {} join [--timeout <secs>]", program);
    println!();
    println!("Options:");
    println!("  --id <uid>         Group id stamped on every chunk");
    println!("  --budget <bytes>   Maximum encoded size of one envelope");
    println!(
        "  --timeout <secs>   Drop groups idle this long, 0 drops any idle group (default {})",
        RegistryConfig::default().timeout.as_secs()
    );
    println!("  --help             Show this help");
}

fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().collect();
    let program = args
        .first()
        .and_then(|s| s.split('/').next_back())
        .unwrap_or("segments")
        .to_string();

    if args.iter().skip(1).any(|a| a == "--help" || a == "-h") {
        print_usage(&program);
        exit(0);
    }

    let mut rest = args.into_iter().skip(1);
    let subcommand = rest.next().ok_or("missing command")?;

    match subcommand.as_str() {
        "split" => {
            let mut group_id = None;
            let mut budget = None;
            let mut path = None;
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--id" => group_id = Some(rest.next().ok_or("--id needs a value")?),
                    "--budget" => {
                        let value = rest.next().ok_or("--budget needs a value")?;
                        budget = Some(
                            value
                                .parse::<usize>()
                                .map_err(|_| format!("invalid budget: {}", value))?,
                        );
                    }
                    other if other.starts_with("--") => {
                        return Err(format!("unknown option: {}", other));
                    }
                    _ if path.is_none() => path = Some(arg),
                    _ => return Err(format!("unexpected argument: {}", arg)),
                }
            }
            Ok(Command::Split {
                group_id: group_id.ok_or("split requires --id")?,
                budget: budget.ok_or("split requires --budget")?,
                path,
            })
        }
        "join" => {
            let mut timeout = RegistryConfig::default().timeout;
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--timeout" => {
                        let value = rest.next().ok_or("--timeout needs a value")?;
                        let secs = value
                            .parse::<u64>()
                            .map_err(|_| format!("invalid timeout: {}", value))?;
                        timeout = Duration::from_secs(secs);
                    }
                    other => return Err(format!("unknown option: {}", other)),
                }
            }
            Ok(Command::Join { timeout })
        }
        other => Err(format!("unknown command: {}", other)),
    }
}

fn run_split(
    group_id: &str,
    budget: usize,
    path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    // Re-encoding normalises whitespace, so the chunks carry compact JSON.
    let document: serde_json::Value = serde_json::from_str(&text)?;
    let chunks = split_document(&JsonCodec, &document, group_id, budget)?;
    info!("Split into {} chunks", chunks.len());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for chunk in &chunks {
        writeln!(out, "{}", chunk.to_json()?)?;
    }
    out.flush()?;
    Ok(())
}

fn run_join(timeout: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let config = RegistryConfig {
        timeout,
        ..Default::default()
    };
    let mut registry = Registry::with_config(JsonCodec, config)?;
    registry.set_consumer(|doc: serde_json::Value| println!("{}", doc));

    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Err(e) = registry.accept_json(line) {
            warn!("Line {}: {}", index + 1, e);
        }
        registry.evict_expired();
    }

    if registry.pending_count() > 0 {
        warn!(
            "{} groups still incomplete at end of input",
            registry.pending_count()
        );
    }
    eprintln!("{}", registry.stats().to_json());
    Ok(())
}
