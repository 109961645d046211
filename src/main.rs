use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use visa_tracker::config::Config;
use visa_tracker::kernel::scheduler::{Job, Scheduler};
use visa_tracker::kernel::time::{Clock, SystemClock};
use visa_tracker::services::tasks::join_logged;
use visa_tracker::services::telegram::{driver, TelegramClient};
use visa_tracker::{Reactor, ReactorConfig, RecordStore, SqliteRecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 1. Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing tracing subscriber")?;

    tracing::info!("Visa tracker booting...");

    // 2. Config + storage. Either failing here is fatal.
    let config = Config::from_env().context("loading configuration")?;
    let store = Arc::new(
        SqliteRecordStore::open(&config.db_path)
            .with_context(|| format!("opening record store at {}", config.db_path.display()))?,
    );
    tracing::info!(path = %config.db_path.display(), "record store open");

    // 3. Channels: transport -> reactor -> delivery
    let (tx_inbound, rx_inbound) = mpsc::channel(100);
    let (tx_outbound, rx_outbound) = mpsc::channel(100);
    let shutdown = CancellationToken::new();

    let client = TelegramClient::new(&config.api_base, &config.bot_token, config.poll_timeout_secs);
    let bot_username = match client.get_me().await {
        Ok(me) => me.username,
        Err(e) => {
            tracing::warn!(error = %e, "getMe failed; answering commands addressed to any bot");
            None
        }
    };
    tracing::info!(username = ?bot_username, "bot identity");
    let poller = tokio::spawn(driver::poll_updates(client.clone(), tx_inbound, shutdown.clone()));
    let delivery = tokio::spawn(driver::deliver(client, rx_outbound, config.broadcast_chat_id));

    // 4. Reactor with the daily timers
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Scheduler::daily(
        config.summary_time,
        &[Job::DailySummary, Job::DailyQuestionSummary],
        clock.now(),
    );
    for timer in scheduler.timers() {
        tracing::info!(job = ?timer.job, next_fire = %timer.next_fire, "timer armed");
    }
    let dyn_store: Arc<dyn RecordStore> = store.clone();
    let reactor_config = ReactorConfig {
        bot_username,
        ..ReactorConfig::default()
    };
    let mut reactor = Reactor::new(rx_inbound, dyn_store, clock, scheduler, reactor_config);

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, shutting down");
        }
        ctrl_c.cancel();
    });

    // 5. Run until shutdown
    tracing::info!("Visa tracker active. Press Ctrl+C to stop.");
    reactor.run(tx_outbound, shutdown.clone()).await;

    shutdown.cancel();
    let _ = join_logged("telegram poller", poller).await;
    drop(reactor);
    let _ = join_logged("delivery", delivery).await;

    match Arc::try_unwrap(store) {
        Ok(store) => store.close().context("closing record store")?,
        Err(_) => tracing::warn!("record store still shared at shutdown; leaving it to drop"),
    }
    Ok(())
}
