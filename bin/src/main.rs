//! `gavel`: run one complete auction round against an in-process store.
//!
//! Real deployments implement `CoordinationStore` against their coordination
//! service and run the auctioneer and bidders as separate processes; this
//! binary wires the same protocol end to end over `MemoryStore` so the full
//! flow (create, join, barrier, bid, promote, notify) can be exercised and
//! observed locally.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use tokio::runtime::Builder;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use auction_coordination::{
    Amount, Auction, AuctioneerSession, BarrierWait, BestBidRegister, Bidder, BidderSession,
    MemoryStore, PathResolver, PromotionOutcome, RetryPolicy, SubmitOutcome,
};
use config::HouseConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "gavel", version, about = "store-coordinated auction round")]
struct Cli {
    /// Path to the auction-house config file (JSON or YAML).
    #[arg(long, env = "GAVEL_CONFIG")]
    config_path: Option<PathBuf>,
    /// Log filter, e.g. `info` or `auction_coordination=debug`.
    #[arg(long, env = "GAVEL_LOG", default_value = "info")]
    log: String,
    /// Product put up for auction.
    #[arg(long, default_value = "walnut writing desk")]
    product: String,
    /// Start bid in minor currency units.
    #[arg(long, default_value_t = 10_000)]
    start_bid: Amount,
    /// Number of bidders joining the round.
    #[arg(long, default_value_t = 3)]
    bidders: u32,
    /// Worker threads for the runtime (defaults to the number of CPUs).
    #[arg(long, env = "GAVEL_THREADS")]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = dotenv::dotenv() {
        debug!(?err, ".env file not loaded");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .init();

    let mut builder = Builder::new_multi_thread();
    builder.thread_name("gavel").enable_all();
    if let Some(num) = cli.threads {
        builder.worker_threads(num);
    }
    let rt = builder.build()?;

    rt.block_on(async move {
        match tokio::spawn(async move { run(cli).await }).await {
            Err(err) => error!(?err, "failed to run auction round"),
            Ok(Err(err)) => error!(?err, "exited with error"),
            Ok(_) => debug!("exiting..."),
        }
    });

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let house = match &cli.config_path {
        Some(path) => HouseConfig::parse(path)?,
        None => HouseConfig::default(),
    };
    let paths = PathResolver::new(&house.root_path)?;
    let store = Arc::new(MemoryStore::new());

    let auctioneer = AuctioneerSession::create_with_retry_policy(
        Arc::clone(&store),
        paths.clone(),
        Auction {
            id: None,
            product_name: cli.product.clone(),
            start_bid: cli.start_bid,
            start_date: chrono::Utc::now() + chrono::Duration::seconds(1),
            deadline_minutes: 10,
        },
        RetryPolicy::from(&house.promotion),
    )
    .await?;
    let auction = auctioneer.auction().clone();
    info!(
        auction = auction.id.as_deref(),
        product = auction.product_name,
        start_bid = auction.start_bid,
        "auction created"
    );

    let barrier_wait = house.barrier_wait_secs.map(Duration::from_secs);
    let mut bidder_tasks = Vec::new();
    for n in 0..cli.bidders {
        // The first offer deliberately lands below the start bid so one
        // rejection shows up in the round.
        let offer = if n == 0 {
            cli.start_bid.saturating_sub(1_000).max(1)
        } else {
            cli.start_bid + Amount::from(n) * 1_000
        };
        bidder_tasks.push(spawn_bidder(
            Arc::clone(&store),
            paths.clone(),
            auction.clone(),
            format!("bidder-{n}"),
            offer,
            barrier_wait,
        ));
    }

    // Let the bidders reach the barrier before the round opens.
    tokio::time::sleep(Duration::from_millis(100)).await;
    auctioneer.open().await?;

    let token = CancellationToken::new();
    let promotion_task = spawn_promotion_task(
        auctioneer.clone(),
        Duration::from_millis(house.promotion.interval_ms),
        token.clone(),
    );

    for task in bidder_tasks {
        flatten(task).await?;
    }

    // Drain anything the last sweep has not reached yet, then stop the ticker.
    while auctioneer.promote_next().await?.is_some() {}
    token.cancel();
    if let Err(err) = promotion_task.await {
        error!(?err, "error waiting for promotion task");
    }

    let register = BestBidRegister::new(Arc::clone(&store), paths);
    let (best, version) = register
        .read(auction.id.as_deref().expect("created auction has an id"))
        .await?;
    info!(
        value = best.value,
        version,
        bidder = best.bidder.as_deref(),
        "auction round finished"
    );
    Ok(())
}

fn spawn_bidder(
    store: Arc<MemoryStore>,
    paths: PathResolver,
    auction: Auction,
    name: String,
    offer: Amount,
    barrier_wait: Option<Duration>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let (session, mut feed, entered) = BidderSession::participate(
            store,
            paths,
            &auction,
            Bidder::new(name.clone()),
            barrier_wait,
        )
        .await?;
        if entered == BarrierWait::TimedOut {
            warn!(name, "gave up waiting for the auction to open");
            return Ok(());
        }
        debug!(name, "entered auction");

        match session.submit_bid(offer).await? {
            SubmitOutcome::Accepted { queued_node } => {
                info!(name, offer, queued_node, "bid accepted")
            }
            SubmitOutcome::RejectedBelowBest { best } => {
                info!(name, offer, best, "bid rejected below best")
            }
        }

        // Follow the feed until it goes quiet, then stop watching.
        loop {
            match tokio::time::timeout(Duration::from_secs(1), feed.recv()).await {
                Ok(Some(bid)) => info!(name, best = bid.value, "best bid update"),
                Ok(None) => break,
                Err(_) => break,
            }
        }
        feed.unsubscribe();
        Ok(())
    })
}

fn spawn_promotion_task(
    auctioneer: AuctioneerSession<MemoryStore>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("promotion task stopping");
                    return;
                }
                _ = ticker.tick() => {
                    loop {
                        match auctioneer.promote_next().await {
                            Ok(Some(PromotionOutcome::Promoted { bid, version })) => {
                                info!(value = bid.value, version, "promoted best bid");
                            }
                            Ok(Some(PromotionOutcome::Discarded { best })) => {
                                debug!(best = best.value, "discarded stale queued bid");
                            }
                            Ok(None) => break,
                            Err(err) => {
                                warn!(?err, "promotion sweep failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
    })
}

async fn flatten<T>(handle: JoinHandle<Result<T, anyhow::Error>>) -> Result<T, anyhow::Error> {
    match handle.await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(err),
        Err(err) => Err(anyhow!(err)),
    }
}
