use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;
use std::time::Duration;

use svquery::config::{DEFAULT_CACHE_TTL_SECS, DEFAULT_TIMEOUT_MS};
use svquery::{Endpoint, QueryConfig, QueryEngine, QueryResult};

#[derive(Parser)]
#[command(name = "svquery")]
#[command(about = "Query game servers for map and player counts", long_about = None)]
struct Args {
    /// Servers to query, as [name=]host:port
    #[arg(required = true)]
    endpoints: Vec<Endpoint>,

    /// Per-server query timeout in milliseconds (200-5000)
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Seconds to reuse a successful result (0-30, 0 disables)
    #[arg(short, long, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    cache_ttl: u64,

    /// Re-query every N seconds instead of exiting
    #[arg(short, long)]
    interval: Option<u64>,

    /// Include bots in the shown player count
    #[arg(long)]
    count_bots: bool,
}

/// Player count as shown to users.
fn shown_players(result: &QueryResult, count_bots: bool) -> u8 {
    if count_bots {
        result.players
    } else {
        result.players.saturating_sub(result.bots)
    }
}

fn print_results(endpoints: &[Endpoint], results: &[QueryResult], count_bots: bool) {
    for (i, (endpoint, result)) in endpoints.iter().zip(results).enumerate() {
        if result.ok {
            println!(
                "{}. {} | {} | {}/{} | {}",
                i + 1,
                endpoint.name,
                result.map,
                shown_players(result, count_bots),
                result.max_players,
                endpoint
            );
        } else {
            println!("{}. {} | offline | {}", i + 1, endpoint.name, endpoint);
        }
    }
}

async fn run(args: Args) -> ExitCode {
    let config = QueryConfig::new(args.timeout_ms, args.cache_ttl);
    let engine = QueryEngine::new(config);

    info!(
        "Querying {} servers (timeout={}ms cache_ttl={}s)",
        args.endpoints.len(),
        config.timeout.as_millis(),
        config.cache_ttl.as_secs()
    );

    let Some(interval_secs) = args.interval else {
        return match engine.query_all(&args.endpoints).await {
            Ok(results) => {
                print_results(&args.endpoints, &results, args.count_bots);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        };
    };

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;

        match engine.query_all(&args.endpoints).await {
            Ok(results) => print_results(&args.endpoints, &results, args.count_bots),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }

        let stats = engine.stats_snapshot_and_reset();
        info!(
            "[stats] cache={} requests={} cached={} online={} timeouts={} errors={} avg_response={:.2}ms",
            engine.cache_len(),
            stats.requests,
            stats.cached,
            stats.succeeded,
            stats.timeouts,
            stats.network_errors,
            stats.avg_response_ms
        );
    }
}

fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let args = Args::parse();

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(run(args))
}
