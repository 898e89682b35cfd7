//! Command handling for inbound user messages.
//!
//! Per-user state machine: unauthenticated users can only `/auth` or
//! `/start`; authenticated users get the full command surface. All state
//! lives in the per-user store; the handler itself is stateless.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::dispatcher::UpdateHandler;
use crate::error::Result;
use crate::feed::FeedReader;
use crate::store::{AuthState, MuteState, Subscription, SubscriptionList, UserStore};
use crate::telegram::{BotApi, Update, User};

const HELP_TEXT: &str = "here are the commands I can understand:

/add <rss_url> [keywords]
    - subscribe to the rss feed, with optional keywords to filter by

/list
    - list current subscriptions

/del <number>
    - delete subscription by the number

/words <number> [keywords]
    - replace the list of keywords for a subscription, keywords can be empty
/words add <number> <word>
/words del <number> <word>
    - add or remove a single keyword

/hours <from> <to>
    - quiet hours: only alert between these whole hours of day

/mute
    - keep receiving updates but without any notifications

/unmute
    - turn notifications back on

/stop
    - stop the bot completely, any edit will un-stop it

PRIVACY NOTICE:
There is no privacy. Consider anything you send to this bot as public.";

/// Routes parsed commands to state mutations against the store.
pub struct CommandHandler {
    api: Arc<dyn BotApi>,
    store: UserStore,
    reader: Arc<dyn FeedReader>,
    secret: String,
}

impl CommandHandler {
    /// Create a handler bound to the given transport, store and feed reader.
    pub fn new(
        api: Arc<dyn BotApi>,
        store: UserStore,
        reader: Arc<dyn FeedReader>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            api,
            store,
            reader,
            secret: secret.into(),
        }
    }

    /// Send a reply, logging instead of failing on transport errors.
    ///
    /// A reply that cannot be delivered is not worth crashing a worker over;
    /// the state mutation it confirms has already been persisted.
    async fn reply(&self, update: &Update, text: String) {
        if let Err(e) = self.api.respond(update, &text).await {
            warn!("reply failed: {}", e);
        }
    }

    /// Clear the stopped flag; any edit "wakes" a stopped user.
    fn un_stop(&self, user_id: i64) -> Result<()> {
        let mut state: MuteState = self.store.load_or_default(user_id)?;
        if state.stopped {
            state.stopped = false;
            self.store.save(user_id, &state)?;
        }
        Ok(())
    }

    async fn handle_unauthenticated(
        &self,
        update: &Update,
        from: &User,
        chat_id: i64,
        user_id: i64,
        tokens: &[&str],
    ) -> Result<()> {
        if tokens.len() == 2 && tokens[0] == "/auth" && tokens[1].as_bytes() == self.secret.as_bytes()
        {
            self.store.save(
                user_id,
                &AuthState {
                    auth_valid: true,
                    chat_id,
                },
            )?;
            info!("user {} authenticated", user_id);
            self.reply(update, format!("{}, you are now authenticated", from.first_name))
                .await;
        } else if tokens[0] == "/start" {
            let mut state: MuteState = self.store.load_or_default(user_id)?;
            state.stopped = true;
            self.store.save(user_id, &state)?;
            self.reply(
                update,
                format!(
                    "Hello {}! This bot watches RSS feeds for you. \
                     Send /auth <secret> to get started.",
                    from.first_name
                ),
            )
            .await;
        } else {
            self.reply(update, format!("{}, access denied", from.first_name))
                .await;
        }
        Ok(())
    }

    async fn handle_authenticated(
        &self,
        update: &Update,
        from: &User,
        user_id: i64,
        tokens: &[&str],
    ) -> Result<()> {
        match tokens[0] {
            "/help" => {
                self.reply(update, format!("Hello {}, {}", from.first_name, HELP_TEXT))
                    .await;
            }
            "/add" => self.cmd_add(update, from, user_id, tokens).await?,
            "/list" => self.cmd_list(update, from, user_id).await?,
            "/del" => self.cmd_del(update, from, user_id, tokens).await?,
            "/words" => self.cmd_words(update, from, user_id, tokens).await?,
            "/mute" => self.cmd_set_muted(update, from, user_id, true).await?,
            "/unmute" => self.cmd_set_muted(update, from, user_id, false).await?,
            "/hours" => self.cmd_hours(update, from, user_id, tokens).await?,
            "/stop" => self.cmd_stop(update, from, user_id).await?,
            other => {
                self.reply(
                    update,
                    format!(
                        "Hello {}, I cannot understand {}, try asking for /help",
                        from.first_name, other
                    ),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn cmd_add(
        &self,
        update: &Update,
        from: &User,
        user_id: i64,
        tokens: &[&str],
    ) -> Result<()> {
        self.un_stop(user_id)?;

        if tokens.len() < 2 {
            self.reply(
                update,
                format!("{}, please give arguments to the command", from.first_name),
            )
            .await;
            return Ok(());
        }

        let url = tokens[1];
        let keywords: Vec<String> = tokens[2..].iter().map(|s| s.to_string()).collect();

        let mut subs: SubscriptionList = self.store.load_or_default(user_id)?;
        if subs.entries.iter().any(|e| e.url == url) {
            self.reply(
                update,
                format!("{}, {} is already subscribed", from.first_name, url),
            )
            .await;
            return Ok(());
        }

        // Validate with a live fetch before accepting; a URL we cannot read
        // now would only fail silently on every later cycle.
        if self.reader.fetch_and_parse(url).await.is_none() {
            self.reply(
                update,
                format!(
                    "{}, {} is not looking like a valid RSS feed",
                    from.first_name, url
                ),
            )
            .await;
            return Ok(());
        }

        subs.add(Subscription::new(url, keywords));
        self.store.save(user_id, &subs)?;
        info!("user {} subscribed to {}", user_id, url);

        self.reply(update, format!("{}, it was added", from.first_name))
            .await;
        Ok(())
    }

    async fn cmd_list(&self, update: &Update, from: &User, user_id: i64) -> Result<()> {
        self.un_stop(user_id)?;

        let subs: SubscriptionList = self.store.load_or_default(user_id)?;
        self.reply(
            update,
            format!("{}, here are your subscriptions:", from.first_name),
        )
        .await;

        for (index, entry) in subs.entries.iter().enumerate() {
            let keywords = entry.keywords.join(" ");
            self.reply(update, format!("{}: {} {}", index, entry.url, keywords))
                .await;
        }
        Ok(())
    }

    async fn cmd_del(
        &self,
        update: &Update,
        from: &User,
        user_id: i64,
        tokens: &[&str],
    ) -> Result<()> {
        self.un_stop(user_id)?;

        if tokens.len() < 2 {
            self.reply(
                update,
                format!("{}, please give arguments to the command", from.first_name),
            )
            .await;
            return Ok(());
        }

        let mut subs: SubscriptionList = self.store.load_or_default(user_id)?;
        let removed = tokens[1]
            .parse::<usize>()
            .ok()
            .and_then(|index| subs.remove(index));

        match removed {
            Some(_) => {
                self.store.save(user_id, &subs)?;
                self.reply(
                    update,
                    format!("{}, {} was removed", from.first_name, tokens[1]),
                )
                .await;
            }
            None => {
                self.reply(
                    update,
                    format!("{}, index {} is not known", from.first_name, tokens[1]),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn cmd_words(
        &self,
        update: &Update,
        from: &User,
        user_id: i64,
        tokens: &[&str],
    ) -> Result<()> {
        self.un_stop(user_id)?;

        if tokens.len() < 2 {
            self.reply(
                update,
                format!("{}, please give arguments to the command", from.first_name),
            )
            .await;
            return Ok(());
        }

        let mut subs: SubscriptionList = self.store.load_or_default(user_id)?;

        // `/words add|del <index> <word>` edits one keyword; the plain form
        // `/words <index> [keywords]` replaces the whole list.
        let (index_token, edit): (&str, Option<(&str, &str)>) = match tokens[1] {
            "add" | "del" if tokens.len() >= 4 => (tokens[2], Some((tokens[1], tokens[3]))),
            "add" | "del" => {
                self.reply(
                    update,
                    format!("{}, please give arguments to the command", from.first_name),
                )
                .await;
                return Ok(());
            }
            index => (index, None),
        };

        let entry = index_token
            .parse::<usize>()
            .ok()
            .and_then(|index| subs.get_mut(index));

        let Some(entry) = entry else {
            self.reply(
                update,
                format!("{}, index {} is not known", from.first_name, index_token),
            )
            .await;
            return Ok(());
        };

        match edit {
            Some(("add", word)) => {
                if !entry.keywords.iter().any(|k| k.eq_ignore_ascii_case(word)) {
                    entry.keywords.push(word.to_string());
                }
            }
            Some((_, word)) => {
                entry.keywords.retain(|k| !k.eq_ignore_ascii_case(word));
            }
            None => {
                entry.keywords = tokens[2..].iter().map(|s| s.to_string()).collect();
            }
        }

        self.store.save(user_id, &subs)?;
        self.reply(
            update,
            format!("{}, {} was updated", from.first_name, index_token),
        )
        .await;
        Ok(())
    }

    async fn cmd_set_muted(
        &self,
        update: &Update,
        from: &User,
        user_id: i64,
        muted: bool,
    ) -> Result<()> {
        let mut state: MuteState = self.store.load_or_default(user_id)?;
        state.muted = muted;
        self.store.save(user_id, &state)?;

        let text = if muted { "bot muted" } else { "bot un-muted" };
        self.reply(update, format!("{}, {}", from.first_name, text))
            .await;
        Ok(())
    }

    async fn cmd_hours(
        &self,
        update: &Update,
        from: &User,
        user_id: i64,
        tokens: &[&str],
    ) -> Result<()> {
        self.un_stop(user_id)?;

        let hours = if tokens.len() >= 3 {
            match (tokens[1].parse::<u32>(), tokens[2].parse::<u32>()) {
                (Ok(from_hour), Ok(to_hour)) if from_hour <= 23 && to_hour <= 23 => {
                    Some((from_hour, to_hour))
                }
                _ => None,
            }
        } else {
            None
        };

        let Some((from_hour, to_hour)) = hours else {
            self.reply(
                update,
                format!(
                    "{}, please give two whole hours between 0 and 23",
                    from.first_name
                ),
            )
            .await;
            return Ok(());
        };

        let mut state: MuteState = self.store.load_or_default(user_id)?;
        state.set_hours(from_hour, to_hour);
        self.store.save(user_id, &state)?;

        self.reply(
            update,
            format!(
                "{}, alerts are now limited to {:02}:00-{:02}:00",
                from.first_name, from_hour, to_hour
            ),
        )
        .await;
        Ok(())
    }

    async fn cmd_stop(&self, update: &Update, from: &User, user_id: i64) -> Result<()> {
        let mut state: MuteState = self.store.load_or_default(user_id)?;
        state.stopped = true;
        self.store.save(user_id, &state)?;

        self.reply(
            update,
            format!("{}, bot won't bother you", from.first_name),
        )
        .await;
        Ok(())
    }
}

#[async_trait]
impl UpdateHandler for CommandHandler {
    async fn handle(&self, update: Update) -> Result<()> {
        let Some(message) = update.message.as_ref() else {
            return Ok(());
        };
        let Some(from) = message.from.clone() else {
            return Ok(());
        };

        let user_id = from.id;
        let chat_id = message.chat.id;
        let text = message.text.clone().unwrap_or_default();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(());
        }

        let authenticated = self
            .store
            .load::<AuthState>(user_id)?
            .map(|a| a.auth_valid)
            .unwrap_or(false);

        if authenticated {
            self.handle_authenticated(&update, &from, user_id, &tokens)
                .await
        } else {
            self.handle_unauthenticated(&update, &from, chat_id, user_id, &tokens)
                .await
        }
    }
}
