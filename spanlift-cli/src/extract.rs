use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use spanlift_extract::{extract, extract_payload, ExtractError, ExtractionConfig, ExtractionResult};
use spanlift_types::CapturedRequest;
use tokio::sync::{mpsc, Mutex};

use crate::cli::ExtractArgs;

type Outcome = Result<ExtractionResult, ExtractError>;

pub fn run(args: ExtractArgs) -> Result<()> {
    let config = crate::config::resolve(args.config.as_deref(), args.graphql, args.elasticsearch)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.raw {
        let path = args.input.as_deref().context("--raw requires --input")?;
        let payload = std::fs::read(path)
            .with_context(|| format!("Failed to read raw request: {}", path.display()))?;
        let outcome = extract_payload(&config, &payload);
        write_outcome(&mut out, &args.format, 1, &outcome)?;
        return Ok(());
    }

    let reader: Box<dyn BufRead> = match args.input.as_deref() {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            Box::new(io::BufReader::new(file))
        }
        None => {
            info!("Reading captured requests from stdin...");
            Box::new(io::stdin().lock())
        }
    };

    let (requests, errors) = read_requests(reader)?;
    let total = requests.len();

    let workers = usize::from(args.workers);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .build()
        .context("Failed to start worker runtime")?;
    let outcomes = rt.block_on(replay(config, requests, workers));

    let mut failed = 0u32;
    for (line, outcome) in &outcomes {
        if outcome.is_err() {
            failed += 1;
        }
        write_outcome(&mut out, &args.format, *line, outcome)?;
    }
    out.flush()?;

    info!(
        "{} exchange(s) replayed: {} extracted, {} malformed, {} unreadable line(s)",
        total,
        outcomes
            .iter()
            .filter(|(_, o)| o.as_ref().is_ok_and(|r| !r.is_empty()))
            .count(),
        failed,
        errors
    );

    if errors > 0 {
        anyhow::bail!("{} input line(s) could not be parsed", errors);
    }

    Ok(())
}

/// Parse NDJSON captured requests, keyed by 1-based line number.
///
/// Blank lines are skipped. Lines that are not a valid request are reported on
/// stderr and counted rather than aborting the replay.
fn read_requests(reader: impl BufRead) -> Result<(Vec<(usize, CapturedRequest)>, u32)> {
    let mut requests = Vec::new();
    let mut errors = 0u32;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CapturedRequest>(&line) {
            Ok(request) => requests.push((idx + 1, request)),
            Err(e) => {
                eprintln!("  PARSE ERROR (line {}): {}", idx + 1, e);
                errors += 1;
            }
        }
    }

    Ok((requests, errors))
}

/// Fan requests out over `workers` tasks and collect outcomes in input order.
///
/// Jobs travel over a bounded channel so at most a few per worker are queued
/// at once. Each worker owns a copy of the config; nothing else is shared.
async fn replay(
    config: ExtractionConfig,
    requests: Vec<(usize, CapturedRequest)>,
    workers: usize,
) -> Vec<(usize, Outcome)> {
    let (job_tx, job_rx) = mpsc::channel::<(usize, CapturedRequest)>(workers * 4);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    for worker in 0..workers {
        let job_rx = Arc::clone(&job_rx);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let mut handled = 0usize;
            loop {
                let job = job_rx.lock().await.recv().await;
                let Some((line, request)) = job else { break };
                let outcome = extract(&config, &request.as_exchange());
                if done_tx.send((line, outcome)).is_err() {
                    break;
                }
                handled += 1;
            }
            debug!("worker {} done after {} exchange(s)", worker, handled);
        });
    }
    drop(done_tx);

    tokio::spawn(async move {
        for job in requests {
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
    });

    let mut outcomes = BTreeMap::new();
    while let Some((line, outcome)) = done_rx.recv().await {
        outcomes.insert(line, outcome);
    }
    outcomes.into_iter().collect()
}

fn write_outcome(out: &mut impl Write, format: &str, line: usize, outcome: &Outcome) -> Result<()> {
    match format {
        "json" => {
            let output = match outcome {
                Ok(result) => serde_json::json!({ "line": line, "result": result }),
                Err(e) => serde_json::json!({
                    "line": line,
                    "error": e.to_string(),
                    "protocol": e.protocol().as_str(),
                }),
            };
            writeln!(out, "{}", output)?;
        }
        _ => match outcome {
            Ok(result) if result.is_empty() => writeln!(out, "{}: -", line)?,
            Ok(result) => {
                let attrs = result
                    .attributes()
                    .into_iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(out, "{}: {}", line, attrs)?;
            }
            Err(e) => writeln!(out, "{}: ERROR {}", line, e)?,
        },
    }
    Ok(())
}
