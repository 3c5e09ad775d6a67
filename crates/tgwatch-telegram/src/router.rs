use std::{sync::Arc, time::Duration};

use teloxide::prelude::*;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, warn};

use tgwatch_bridge::{BridgeConfig, BridgeProcess, LocalOrHttpMediaSource};
use tgwatch_core::{
    config::Config,
    messaging::{
        port::NoticeSink,
        throttled::{ThrottleConfig, ThrottledSink},
    },
    protocol::InboundEvent,
    tracker::Tracker,
};

use crate::{TelegramNames, TelegramNotes};

/// How long shutdown waits for in-flight captures and notices.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the watchdog until the bridge exits or `shutdown` fires.
pub async fn run(cfg: Arc<Config>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(bot = %me.username(), notes_chat = cfg.notes_chat_id, "telegram bot ready"),
        Err(e) => warn!("telegram getMe failed: {e}"),
    }

    // Wrap the raw Telegram sink with a throttling decorator so a burst of
    // deletions doesn't trip flood control. The adapter still retries once on RetryAfter.
    let raw_sink: Arc<dyn NoticeSink> = Arc::new(TelegramNotes::new(bot.clone(), cfg.notes_chat_id));
    let sink: Arc<dyn NoticeSink> =
        Arc::new(ThrottledSink::new(raw_sink, ThrottleConfig::default()));
    let media = Arc::new(LocalOrHttpMediaSource::new(cfg.media_download_timeout)?);
    let names = Arc::new(TelegramNames::new(bot));

    let tracker = Tracker::new(cfg.tracker_settings(), media, names, sink);
    let bridge = BridgeProcess::new(BridgeConfig {
        program: cfg.bridge_command.clone(),
        args: cfg.bridge_args.clone(),
    });

    serve(
        &tracker,
        &bridge,
        cfg.tracker_enabled,
        shutdown,
        DRAIN_TIMEOUT,
    )
    .await
}

/// Feed bridge events to the tracker until the bridge exits or `shutdown`
/// fires, then wait (up to `drain_timeout`) for spawned work before stopping.
pub async fn serve(
    tracker: &Tracker,
    bridge: &BridgeProcess,
    enabled: bool,
    shutdown: CancellationToken,
    drain_timeout: Duration,
) -> anyhow::Result<()> {
    if enabled {
        tracker.start().await;
    } else {
        info!("deleted message tracker disabled; draining bridge only");
    }

    let tasks = TaskTracker::new();
    let result = bridge
        .run(shutdown, &mut |event| {
            if enabled {
                let _ = dispatch_event(tracker, &tasks, event);
            }
            Ok(())
        })
        .await;

    tasks.close();
    if tokio::time::timeout(drain_timeout, tasks.wait()).await.is_err() {
        warn!(
            pending = tasks.len(),
            "shutdown timed out with captures or notices still pending"
        );
    }

    tracker.stop().await;
    result.map_err(|e| anyhow::anyhow!("bridge failed: {e}"))
}

/// Route one inbound event.
///
/// Notifications are classified inline so cache and read-position updates keep
/// stream order. Snapshot capture and notice delivery run on tasks spawned
/// through `tasks`, so shutdown can wait for them.
pub fn dispatch_event(
    tracker: &Tracker,
    tasks: &TaskTracker,
    event: InboundEvent,
) -> Option<JoinHandle<()>> {
    match event {
        InboundEvent::Message(message) => {
            let tracker = tracker.clone();
            Some(tasks.spawn(async move { tracker.observe(message).await }))
        }
        InboundEvent::Notification(notification) => {
            let jobs = tracker.route(notification);
            if jobs.is_empty() {
                return None;
            }
            let tracker = tracker.clone();
            Some(tasks.spawn(async move { tracker.forward(jobs).await }))
        }
        InboundEvent::ArchivedPeers(ids) => {
            tracker.set_ignored_peers(ids);
            None
        }
    }
}
