//! Inbound update dispatcher.
//!
//! One receive task long-polls the transport and feeds a bounded queue; a
//! fixed pool of workers drains the queue into the command handler. The
//! whole set is fail-fast: the first task to terminate takes the process
//! down with it, because a half-alive bot risks corrupting user state.

pub mod queue;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, TelegramConfig};
use crate::error::{FeedmonError, Result};
use crate::telegram::{BotApi, Update};

pub use queue::UpdateQueue;

/// Reply sent when the queue is full and an update has to be dropped.
const OVERFLOW_REPLY: &str = "Bot internal queue overflow";

/// Backoff after a failed long-poll call.
const TRANSPORT_BACKOFF: Duration = Duration::from_secs(10);

/// Pacing delay after each processed batch.
const BATCH_PACING: Duration = Duration::from_millis(100);

/// Consumer of dequeued updates.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    /// Handle one inbound update.
    ///
    /// An error return is fatal for the worker that called it.
    async fn handle(&self, update: Update) -> Result<()>;
}

/// Receive loop plus worker pool over a shared bounded queue.
pub struct UpdateDispatcher {
    api: Arc<dyn BotApi>,
    handler: Arc<dyn UpdateHandler>,
    queue: Arc<UpdateQueue>,
    num_workers: usize,
    poll_timeout_secs: u64,
    updates_limit: i64,
}

impl UpdateDispatcher {
    /// Create a dispatcher with the given transport, handler and config.
    pub fn new(
        api: Arc<dyn BotApi>,
        handler: Arc<dyn UpdateHandler>,
        bot: &BotConfig,
        telegram: &TelegramConfig,
    ) -> Self {
        Self {
            api,
            handler,
            queue: Arc::new(UpdateQueue::new(bot.queue_max_size)),
            num_workers: bot.num_workers,
            poll_timeout_secs: telegram.poll_timeout_secs,
            updates_limit: telegram.updates_limit,
        }
    }

    /// Shared update queue, exposed for inspection in tests.
    pub fn queue(&self) -> Arc<UpdateQueue> {
        Arc::clone(&self.queue)
    }

    /// Run the receive loop and worker pool until the first task terminates.
    ///
    /// Individual tasks are never restarted; any termination is treated as
    /// fatal and surfaced to the caller.
    pub async fn run(&self) -> Result<()> {
        info!(
            "dispatcher starting: {} worker(s), queue capacity {}",
            self.num_workers,
            self.queue.capacity()
        );

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        {
            let api = Arc::clone(&self.api);
            let queue = Arc::clone(&self.queue);
            let poll_timeout = self.poll_timeout_secs;
            let limit = self.updates_limit;
            tasks.spawn(async move { receive_loop(api, queue, poll_timeout, limit).await });
        }

        for id in 0..self.num_workers {
            let queue = Arc::clone(&self.queue);
            let handler = Arc::clone(&self.handler);
            tasks.spawn(async move { worker(id, queue, handler).await });
        }

        // First task out ends the dispatcher.
        match tasks.join_next().await {
            Some(Ok(Err(e))) => {
                error!("dispatcher task failed: {}", e);
                Err(e)
            }
            Some(Ok(Ok(()))) => Err(FeedmonError::Invariant(
                "dispatcher task exited unexpectedly".to_string(),
            )),
            Some(Err(e)) => Err(FeedmonError::Invariant(format!(
                "dispatcher task panicked: {e}"
            ))),
            None => Err(FeedmonError::Invariant(
                "dispatcher started with no tasks".to_string(),
            )),
        }
    }
}

/// Long-poll the transport and feed the queue.
async fn receive_loop(
    api: Arc<dyn BotApi>,
    queue: Arc<UpdateQueue>,
    poll_timeout_secs: u64,
    limit: i64,
) -> Result<()> {
    match api.get_me().await {
        Ok(me) => info!("receiving updates as @{}", me.username.unwrap_or(me.first_name)),
        Err(e) => warn!("getMe failed: {}", e),
    }

    let mut offset: Option<i64> = None;

    loop {
        let updates = match api.get_updates(offset, limit, poll_timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed, backing off: {}", e);
                sleep(TRANSPORT_BACKOFF).await;
                continue;
            }
        };

        if updates.is_empty() {
            debug!("no updates");
            continue;
        }

        // Advance the cursor for the whole batch before handing anything to
        // the workers, so a crash mid-batch never replays already-seen ids.
        if let Some(max_id) = updates.iter().map(|u| u.update_id).max() {
            offset = Some(max_id + 1);
        }

        for update in updates {
            if update.message.is_none() {
                continue;
            }

            if let Err(rejected) = queue.push(update) {
                warn!(
                    "queue full ({}), dropping update {}",
                    queue.capacity(),
                    rejected.update_id
                );
                if let Err(e) = api.respond(&rejected, OVERFLOW_REPLY).await {
                    warn!("overflow reply failed: {}", e);
                }
            }
        }

        sleep(BATCH_PACING).await;
    }
}

/// Drain the queue into the handler, one update at a time.
async fn worker(id: usize, queue: Arc<UpdateQueue>, handler: Arc<dyn UpdateHandler>) -> Result<()> {
    debug!("worker {} started", id);

    loop {
        let update = queue.pop().await?;
        let update_id = update.update_id;

        if let Err(e) = handler.handle(update).await {
            error!("worker {}: handling update {} failed: {}", id, update_id, e);
            return Err(e);
        }
    }
}
