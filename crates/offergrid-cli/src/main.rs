use clap::{Parser, Subcommand};
use sqlx::PgPool;

#[derive(Debug, Parser)]
#[command(name = "offergrid-cli")]
#[command(about = "Offergrid marketplace reconciliation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Seed merchants from the YAML config into the database.
    Seed,
    /// Fetch a merchant's feed, ingest it into staging, and auto-match.
    Sync {
        /// Merchant id to sync.
        #[arg(long)]
        merchant: i64,
    },
    /// Run the auto-match pass over PENDING_SYNC staging products.
    Automatch {
        /// Restrict the pass to one merchant.
        #[arg(long)]
        merchant: Option<i64>,
    },
    /// Print the review queue.
    Queue {
        /// Filter by staging status.
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Apply an admin decision to a staging product.
    Decide {
        /// Staging product id.
        #[arg(long)]
        staging: i64,
        /// approve_new, approve_match, or reject.
        #[arg(long)]
        action: String,
        /// Target master product id for approve_match.
        #[arg(long)]
        target: Option<i64>,
        /// Rejection reason for reject.
        #[arg(long)]
        reason: Option<String>,
    },
    /// Re-fetch and re-match one staging product.
    Resync {
        /// Staging product id.
        #[arg(long)]
        staging: i64,
    },
    /// List active merchants.
    Merchants,
    /// Print recent sync logs for a merchant.
    Logs {
        /// Merchant id.
        #[arg(long)]
        merchant: i64,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = offergrid_db::connect_pool_from_env().await?;
    offergrid_db::run_migrations(&pool).await?;

    match cli.command {
        Commands::Seed => seed(&pool).await?,
        Commands::Sync { merchant } => sync(&pool, merchant).await?,
        Commands::Automatch { merchant } => {
            let matched = offergrid_engine::auto_match_pending(&pool, merchant).await?;
            println!("matched {matched} staging products");
        }
        Commands::Queue { status, limit } => queue(&pool, status.as_deref(), limit).await?,
        Commands::Decide {
            staging,
            action,
            target,
            reason,
        } => decide(&pool, staging, &action, target, reason).await?,
        Commands::Resync { staging } => {
            let client = feed_client()?;
            offergrid_engine::resync_staging(&pool, &client, staging).await?;
            println!("staging product {staging} resynced");
        }
        Commands::Merchants => {
            for merchant in offergrid_db::merchants::list_active_merchants(&pool).await? {
                println!(
                    "#{:<6} {:<24} {}",
                    merchant.id,
                    merchant.name,
                    merchant.email.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Logs { merchant, limit } => {
            for log in offergrid_db::sync_logs::list_sync_logs(&pool, merchant, limit).await? {
                println!(
                    "#{:<6} {:<16} started={} processed={} failed={} {}",
                    log.id,
                    log.status,
                    log.started_at,
                    log.records_processed,
                    log.records_failed,
                    log.notes.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(())
}

async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let config = offergrid_core::load_app_config()?;
    let merchants_file = offergrid_core::load_merchants(&config.merchants_path)?;
    let count = offergrid_db::seed::seed_merchants(pool, &merchants_file.merchants).await?;
    println!("seeded {count} merchants from {}", config.merchants_path.display());
    Ok(())
}

async fn sync(pool: &PgPool, merchant_id: i64) -> anyhow::Result<()> {
    let client = feed_client()?;
    let summary = offergrid_engine::sync_merchant(pool, &client, merchant_id).await?;
    println!(
        "sync log {}: {} processed, {} failed",
        summary.sync_log_id, summary.processed, summary.failed
    );
    Ok(())
}

async fn queue(pool: &PgPool, status: Option<&str>, limit: i64) -> anyhow::Result<()> {
    let statuses: Vec<&str> = match status {
        Some(status) => vec![status],
        None => vec!["PENDING_SYNC", "NEEDS_REVIEW"],
    };
    let rows = offergrid_db::staging::review_queue(pool, &statuses, limit).await?;

    if rows.is_empty() {
        println!("review queue is empty");
        return Ok(());
    }
    for row in rows {
        let suggestion = row
            .suggested_product_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "#{:<6} {:<14} {:<40} suggested={:<8} confidence={:<3} [{}]",
            row.id, row.merchant_name, row.raw_title, suggestion, row.match_confidence_score, row.status
        );
    }
    Ok(())
}

async fn decide(
    pool: &PgPool,
    staging_id: i64,
    action: &str,
    target: Option<i64>,
    reason: Option<String>,
) -> anyhow::Result<()> {
    let action = match action {
        "approve_new" => offergrid_engine::DecisionAction::ApproveNew,
        "approve_match" => offergrid_engine::DecisionAction::ApproveMatch,
        "reject" => offergrid_engine::DecisionAction::Reject,
        other => anyhow::bail!("unknown action \"{other}\"; use approve_new, approve_match, or reject"),
    };

    let decision = offergrid_engine::Decision {
        action,
        target_product_id: target,
        variant_mappings: std::collections::HashMap::new(),
        brand_id: None,
        category_id: None,
        rejection_reason: reason,
        admin_notes: None,
    };

    let outcome = offergrid_engine::decide(pool, staging_id, &decision).await?;
    println!(
        "staging {} decided: product={:?} matched={} created={} offers={} rejected_offers={}",
        outcome.staging_id,
        outcome.product_id,
        outcome.variants_matched,
        outcome.variants_created,
        outcome.offers_written,
        outcome.offers_rejected
    );
    for warning in outcome.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn feed_client() -> anyhow::Result<offergrid_feed::FeedClient> {
    let config = offergrid_core::load_app_config()?;
    Ok(offergrid_feed::FeedClient::new(
        config.feed_request_timeout_secs,
        &config.feed_user_agent,
        config.feed_max_retries,
        config.feed_retry_backoff_base_secs,
    )?)
}
