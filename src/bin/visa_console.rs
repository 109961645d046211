use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use visa_tracker::config::{db_path_from_env, parse_time_of_day, DEFAULT_SUMMARY_TIME};
use visa_tracker::kernel::scheduler::{Job, Scheduler};
use visa_tracker::kernel::time::{Clock, SystemClock};
use visa_tracker::services::console;
use visa_tracker::{Reactor, ReactorConfig, SqliteRecordStore};

/// Local driver: every stdin line is a message from `--user N` (default 1).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut user_id: i64 = 1;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--user" {
            if let Some(raw) = args.next() {
                user_id = raw.parse().unwrap_or(user_id);
            }
        }
    }

    // 2. Setup Store + Reactor
    let db_path = db_path_from_env();
    let store = Arc::new(SqliteRecordStore::open(&db_path)?);
    tracing::info!(path = %db_path.display(), user_id, "console session");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let summary_time = std::env::var("SUMMARY_TIME_UTC")
        .ok()
        .and_then(|raw| parse_time_of_day(&raw))
        .or_else(|| parse_time_of_day(DEFAULT_SUMMARY_TIME))
        .context("summary time")?;
    let scheduler = Scheduler::daily(
        summary_time,
        &[Job::DailySummary, Job::DailyQuestionSummary],
        clock.now(),
    );

    let (tx_input, rx_input) = mpsc::channel(100);
    let mut reactor = Reactor::new(rx_input, store, clock, scheduler, ReactorConfig::default());

    // 3. Run until stdin closes and every reply is printed
    println!("Type a message (e.g. 'Delhi approved') or a command (/help).");
    let stdin = BufReader::new(tokio::io::stdin());
    console::session(stdin, tokio::io::stdout(), user_id, tx_input, &mut reactor)
        .await
        .context("console session")?;
    Ok(())
}
