//! Drives the routes endpoint in a loop and shows how the pipeline behaves.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use clap::Parser;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "demo-runner")]
#[command(about = "Repeatedly calls the flight routes API and reports latency and status", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5073")]
    url: String,

    #[arg(long, default_value = "OPO")]
    from: String,

    #[arg(long, default_value = "LIS")]
    to: String,

    /// Pause between calls in milliseconds.
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,

    /// Stop after this many calls; runs until Ctrl+C when omitted.
    #[arg(short, long)]
    count: Option<u64>,
}

#[derive(Debug, Default)]
struct Summary {
    sent: u64,
    by_status: BTreeMap<String, u64>,
    interrupted: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let summary = run(&cli, &client, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    println!("\nSummary after {} calls:", summary.sent);
    for (status, count) in &summary.by_status {
        println!("  {:<6} {}", status, count);
    }
    if summary.interrupted {
        println!("  (last call interrupted)");
    }
    Ok(())
}

/// Call the endpoint until `count` is reached or `stop` resolves.
///
/// `stop` also cuts short a call that is still in flight.
async fn run(cli: &Cli, client: &reqwest::Client, stop: impl Future<Output = ()>) -> Summary {
    let endpoint = format!("{}/api/flights/routes", cli.url.trim_end_matches('/'));
    let mut summary = Summary::default();
    tokio::pin!(stop);

    println!("Calling {} ({} -> {}), Ctrl+C to stop", endpoint, cli.from, cli.to);

    loop {
        if cli.count.is_some_and(|count| summary.sent >= count) {
            break;
        }
        summary.sent += 1;

        let started = Instant::now();
        let outcome = tokio::select! {
            outcome = call_once(client, &endpoint, &cli.from, &cli.to) => outcome,
            _ = &mut stop => {
                println!("#{:<4} {:>6}ms  interrupted", summary.sent, started.elapsed().as_millis());
                summary.interrupted = true;
                break;
            }
        };
        let elapsed = started.elapsed();

        let label = match outcome {
            Ok((status, detail)) => {
                println!("#{:<4} {:>6}ms  {}  {}", summary.sent, elapsed.as_millis(), status, detail);
                status.as_u16().to_string()
            }
            Err(e) => {
                println!("#{:<4} {:>6}ms  request failed: {}", summary.sent, elapsed.as_millis(), e);
                "error".to_string()
            }
        };
        *summary.by_status.entry(label).or_default() += 1;

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(cli.interval_ms)) => {}
            _ = &mut stop => break,
        }
    }

    summary
}

async fn call_once(
    client: &reqwest::Client,
    endpoint: &str,
    from: &str,
    to: &str,
) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
    let res = client
        .get(endpoint)
        .query(&[("from", from), ("to", to)])
        .send()
        .await?;
    let status = res.status();
    Ok((status, describe(res).await))
}

async fn describe(res: reqwest::Response) -> String {
    let retry_after = res
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| format!(" (retry after {}s)", v));

    let body = res.text().await.unwrap_or_default();
    let text = match serde_json::from_str::<Value>(&body) {
        Ok(Value::Array(routes)) => format!("{} routes", routes.len()),
        _ => body,
    };
    format!("{}{}", text, retry_after.unwrap_or_default())
}
