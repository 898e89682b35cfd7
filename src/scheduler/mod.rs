//! Sharded feed polling scheduler.
//!
//! Users are statically partitioned across a fixed set of shard workers.
//! Each shard runs a drift-corrected fixed-interval loop: cycles are
//! anchored to their start time, so a steady pass duration does not
//! accumulate drift, while an overloaded shard degrades to back-to-back
//! cycles instead of piling up catch-up work.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{FeedmonError, Result};
use crate::feed::{FeedItem, FeedReader};
use crate::store::{AuthState, FeedHistory, MuteState, SubscriptionList, UserStore};
use crate::telegram::{BotApi, SendOptions};

/// Polls every user's feeds and pushes new matching items.
#[derive(Clone)]
pub struct FeedScheduler {
    api: Arc<dyn BotApi>,
    store: UserStore,
    reader: Arc<dyn FeedReader>,
    num_workers: usize,
    refresh_interval: Duration,
    max_recents: usize,
}

impl FeedScheduler {
    /// Create a scheduler with the given transport, store and feed reader.
    pub fn new(
        api: Arc<dyn BotApi>,
        store: UserStore,
        reader: Arc<dyn FeedReader>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            api,
            store,
            reader,
            num_workers: config.num_workers.max(1),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            max_recents: config.max_recents,
        }
    }

    /// Shard owning a user. Stable as long as the worker count is unchanged.
    fn shard_of(&self, user_id: i64) -> usize {
        user_id.rem_euclid(self.num_workers as i64) as usize
    }

    /// Run all shard workers until the first one terminates.
    pub async fn run(&self) -> Result<()> {
        info!(
            "scheduler starting: {} shard(s), refresh every {}s",
            self.num_workers,
            self.refresh_interval.as_secs()
        );

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        for shard in 0..self.num_workers {
            let scheduler = self.clone();
            tasks.spawn(async move { scheduler.shard_loop(shard).await });
        }

        match tasks.join_next().await {
            Some(Ok(Err(e))) => {
                error!("scheduler shard failed: {}", e);
                Err(e)
            }
            Some(Ok(Ok(()))) => Err(FeedmonError::Invariant(
                "scheduler shard exited unexpectedly".to_string(),
            )),
            Some(Err(e)) => Err(FeedmonError::Invariant(format!(
                "scheduler shard panicked: {e}"
            ))),
            None => Err(FeedmonError::Invariant(
                "scheduler started with no shards".to_string(),
            )),
        }
    }

    /// Fixed-interval loop for one shard, anchored to cycle start times.
    async fn shard_loop(&self, shard: usize) -> Result<()> {
        loop {
            let cycle_start = Instant::now();
            self.run_cycle(shard).await?;

            let next_start = cycle_start + self.refresh_interval;
            let now = Instant::now();
            if now >= next_start {
                warn!(
                    "shard {}: cycle overran its {}s interval, starting next cycle immediately",
                    shard,
                    self.refresh_interval.as_secs()
                );
            } else {
                sleep_until(next_start).await;
            }
        }
    }

    /// One polling pass over the users this shard owns.
    ///
    /// A failing user is logged and skipped; only store enumeration failure
    /// aborts the cycle (and with it the shard).
    pub async fn run_cycle(&self, shard: usize) -> Result<()> {
        let users = self.store.users_with::<SubscriptionList>()?;

        for user_id in users {
            if self.shard_of(user_id) != shard {
                continue;
            }
            if let Err(e) = self.process_user(user_id).await {
                error!("shard {}: processing user {} failed: {}", shard, user_id, e);
            }
        }
        Ok(())
    }

    /// Poll one user: fan out over all subscribed feeds, detect new items,
    /// and notify. Polling state is written back at most once.
    async fn process_user(&self, user_id: i64) -> Result<()> {
        let mute: MuteState = self.store.load_or_default(user_id)?;
        if mute.stopped {
            debug!("user {} is stopped, skipping", user_id);
            return Ok(());
        }

        let subs: SubscriptionList = self.store.load_or_default(user_id)?;
        if subs.is_empty() {
            return Ok(());
        }

        let Some(auth) = self.store.load::<AuthState>(user_id)? else {
            return Ok(());
        };
        if !auth.auth_valid {
            return Ok(());
        }

        let mut history: FeedHistory = self.store.load_or_default(user_id)?;
        let mut changed = false;

        // All of this user's feeds are fetched concurrently; a hung fetch
        // delays only this user's cycle.
        let results = join_all(
            subs.entries
                .iter()
                .map(|sub| self.reader.fetch_and_parse(&sub.url)),
        )
        .await;

        for (sub, feed) in subs.entries.iter().zip(results) {
            // Fetch or parse failure: skip this feed until the next cycle.
            let Some(feed) = feed else {
                continue;
            };

            let stored = history.watermark(&sub.url);
            if let (Some(stored), Some(new_build)) = (stored, feed.last_build_date) {
                if stored == new_build {
                    debug!("feed {} unchanged", sub.url);
                    continue;
                }
            }
            if let Some(new_build) = feed.last_build_date {
                history.set_watermark(&sub.url, new_build);
                changed = true;
            }

            for item in &feed.items {
                // Items at or before the previous watermark were already
                // seen, unless the watermark had never been set.
                if let (Some(stored), Some(pub_date)) = (stored, item.pub_date) {
                    if pub_date <= stored {
                        continue;
                    }
                }

                let identifier = item.identifier();
                if history.is_recent(&identifier) {
                    continue;
                }
                if !sub.matches(&item.title, &item.description) {
                    continue;
                }

                history.add_recent(identifier, self.max_recents);
                changed = true;
                self.notify(auth.chat_id, &mute, item).await;
            }
        }

        if changed {
            self.store.save(user_id, &history)?;
        }
        Ok(())
    }

    /// Send one item notification. The muted flag is evaluated here, at send
    /// time, so quiet hours apply to when the message goes out.
    async fn notify(&self, chat_id: i64, mute: &MuteState, item: &FeedItem) {
        let text = format!("[{}]({})", item.title, item.link);
        let muted = mute.is_alert_muted_now();

        if let Err(e) = self
            .api
            .send_message(chat_id, &text, &SendOptions::link_notification(muted))
            .await
        {
            warn!("notification to chat {} failed: {}", chat_id, e);
        }
    }
}
