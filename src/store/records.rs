//! Per-user persisted record types.
//!
//! Each type is one record kind in the store; together they are the closed
//! set of state the bot keeps for a user.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Local, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A persisted per-user record kind.
pub trait UserRecord: Serialize + DeserializeOwned + Default + Send {
    /// Stable kind name, used as the record's file stem.
    const KIND: &'static str;
}

/// Authentication state, created by a successful `/auth`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthState {
    /// Whether the user has presented the bot secret.
    pub auth_valid: bool,
    /// Chat to deliver notifications into.
    pub chat_id: i64,
}

impl UserRecord for AuthState {
    const KIND: &'static str = "auth";
}

/// One feed subscription: a URL plus optional filter keywords.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub url: String,
    pub keywords: Vec<String>,
}

impl Subscription {
    /// Create a subscription for `url` with the given keywords.
    pub fn new(url: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            url: url.into(),
            keywords,
        }
    }

    /// Whether an item with this title and description passes the filter.
    ///
    /// Keywords match case-insensitively as substrings of the title or the
    /// description; an empty keyword list matches everything.
    pub fn matches(&self, title: &str, description: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let title = title.to_lowercase();
        let description = description.to_lowercase();
        self.keywords.iter().any(|kw| {
            let kw = kw.to_lowercase();
            title.contains(&kw) || description.contains(&kw)
        })
    }
}

/// Ordered list of a user's subscriptions.
///
/// Order is insertion order; `/list` and `/del` indices are positions into
/// this sequence and shift down on deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionList {
    pub entries: Vec<Subscription>,
}

impl SubscriptionList {
    /// Append a subscription unless its URL is already present.
    ///
    /// URL comparison is a case-sensitive exact match on the stored string.
    /// Returns false (and leaves the list unchanged) on a duplicate.
    pub fn add(&mut self, subscription: Subscription) -> bool {
        if self.entries.iter().any(|e| e.url == subscription.url) {
            return false;
        }
        self.entries.push(subscription);
        true
    }

    /// Remove the entry at `index`, shifting later entries down.
    pub fn remove(&mut self, index: usize) -> Option<Subscription> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    /// Entry at `index`, if in range.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Subscription> {
        self.entries.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl UserRecord for SubscriptionList {
    const KIND: &'static str = "subscriptions";
}

/// Mute, stop and quiet-hours state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MuteState {
    /// Deliver notifications without an alert.
    pub muted: bool,
    /// Suppress all polling for this user until a write command clears it.
    pub stopped: bool,
    /// Quiet-hours window start, in seconds of day.
    pub day_seconds_from: u32,
    /// Quiet-hours window end, in seconds of day.
    pub day_seconds_to: u32,
}

impl MuteState {
    /// Set the quiet-hours window from whole hours of day.
    pub fn set_hours(&mut self, from_hour: u32, to_hour: u32) {
        self.day_seconds_from = from_hour * 3600;
        self.day_seconds_to = to_hour * 3600;
    }

    /// Whether a notification sent at `day_seconds` should be silent.
    ///
    /// The quiet-hours window is inclusive on both ends and disabled when
    /// both bounds are zero. `from > to` is checked literally, exactly as
    /// stored; it is not normalized into a wraparound range.
    pub fn is_alert_muted_at(&self, day_seconds: u32) -> bool {
        if self.muted {
            return true;
        }
        (self.day_seconds_from != 0 || self.day_seconds_to != 0)
            && (day_seconds < self.day_seconds_from || day_seconds > self.day_seconds_to)
    }

    /// Whether a notification sent right now should be silent, using the
    /// local time of day.
    pub fn is_alert_muted_now(&self) -> bool {
        let now = Local::now();
        self.is_alert_muted_at(now.num_seconds_from_midnight())
    }
}

impl UserRecord for MuteState {
    const KIND: &'static str = "mute";
}

/// Per-feed watermarks plus the recently-notified item cache.
///
/// Persisted together so the scheduler writes a user's polling state back
/// exactly once per cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedHistory {
    /// Last-seen feed-level build timestamp, keyed by feed URL. A missing
    /// entry means the watermark is unset.
    pub watermarks: HashMap<String, DateTime<Utc>>,
    /// FIFO of recently-notified item identifiers, oldest first.
    pub recent: VecDeque<String>,
}

impl FeedHistory {
    /// Stored watermark for a feed URL.
    pub fn watermark(&self, url: &str) -> Option<DateTime<Utc>> {
        self.watermarks.get(url).copied()
    }

    /// Record the latest build timestamp for a feed URL.
    pub fn set_watermark(&mut self, url: &str, when: DateTime<Utc>) {
        self.watermarks.insert(url.to_string(), when);
    }

    /// Whether this item identifier was notified recently.
    pub fn is_recent(&self, identifier: &str) -> bool {
        self.recent.iter().any(|r| r == identifier)
    }

    /// Record a notified item identifier, evicting the oldest entry when the
    /// cache is at `capacity`.
    pub fn add_recent(&mut self, identifier: impl Into<String>, capacity: usize) {
        while self.recent.len() >= capacity.max(1) {
            self.recent.pop_front();
        }
        self.recent.push_back(identifier.into());
    }
}

impl UserRecord for FeedHistory {
    const KIND: &'static str = "feeds";
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_subscription_matches_empty_keywords() {
        let sub = Subscription::new("https://example.com/feed.xml", vec![]);
        assert!(sub.matches("Any title", "any description"));
        assert!(sub.matches("", ""));
    }

    #[test]
    fn test_subscription_matches_case_insensitive() {
        let sub = Subscription::new(
            "https://example.com/feed.xml",
            vec!["Rust".to_string(), "compiler".to_string()],
        );
        assert!(sub.matches("rust 1.80 released", ""));
        assert!(sub.matches("", "A new COMPILER backend"));
        assert!(!sub.matches("go 1.23 released", "gc improvements"));
    }

    #[test]
    fn test_subscription_list_rejects_duplicate_url() {
        let mut list = SubscriptionList::default();
        assert!(list.add(Subscription::new("https://a.example/feed", vec![])));
        assert!(!list.add(Subscription::new("https://a.example/feed", vec!["x".into()])));
        assert_eq!(list.len(), 1);

        // Exact string match: a case variant is a different URL.
        assert!(list.add(Subscription::new("https://A.example/feed", vec![])));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_subscription_list_delete_shifts_indices() {
        let mut list = SubscriptionList::default();
        list.add(Subscription::new("https://a.example/feed", vec![]));
        list.add(Subscription::new("https://b.example/feed", vec![]));
        list.add(Subscription::new("https://c.example/feed", vec![]));

        let removed = list.remove(1).unwrap();
        assert_eq!(removed.url, "https://b.example/feed");
        assert_eq!(list.entries[0].url, "https://a.example/feed");
        assert_eq!(list.entries[1].url, "https://c.example/feed");

        assert!(list.remove(2).is_none());
    }

    #[test]
    fn test_mute_state_plain_mute_wins() {
        let state = MuteState {
            muted: true,
            ..Default::default()
        };
        assert!(state.is_alert_muted_at(12 * 3600));
    }

    #[test]
    fn test_mute_state_quiet_hours_disabled_when_zero() {
        let state = MuteState::default();
        assert!(!state.is_alert_muted_at(0));
        assert!(!state.is_alert_muted_at(3 * 3600));
    }

    #[test]
    fn test_mute_state_quiet_hours_inclusive_bounds() {
        let mut state = MuteState::default();
        state.set_hours(7, 20);

        // One second before the window opens: alert suppressed.
        assert!(state.is_alert_muted_at(7 * 3600 - 1));
        // Both bounds are inclusive.
        assert!(!state.is_alert_muted_at(7 * 3600));
        assert!(!state.is_alert_muted_at(20 * 3600));
        // One second past the window: suppressed again.
        assert!(state.is_alert_muted_at(20 * 3600 + 1));
    }

    #[test]
    fn test_mute_hours_from_greater_than_to_behaves_literally() {
        // `/hours 20 7` stores the bounds as given; the literal check then
        // suppresses everything, because no second of day is both >= 20:00
        // and <= 7:00. Pinned as existing behavior, not a wraparound window.
        let mut state = MuteState::default();
        state.set_hours(20, 7);

        assert!(state.is_alert_muted_at(23 * 3600));
        assert!(state.is_alert_muted_at(3 * 3600));
        assert!(state.is_alert_muted_at(12 * 3600));
    }

    #[test]
    fn test_feed_history_recency_fifo_eviction() {
        let mut history = FeedHistory::default();
        for i in 0..5 {
            history.add_recent(format!("item-{i}"), 3);
            assert!(history.recent.len() <= 3);
        }

        // The two oldest entries were evicted.
        assert!(!history.is_recent("item-0"));
        assert!(!history.is_recent("item-1"));
        assert!(history.is_recent("item-2"));
        assert!(history.is_recent("item-3"));
        assert!(history.is_recent("item-4"));
    }

    #[test]
    fn test_feed_history_watermark_roundtrip() {
        let mut history = FeedHistory::default();
        let url = "https://a.example/feed";
        assert!(history.watermark(url).is_none());

        let when = Utc.with_ymd_and_hms(2024, 10, 2, 15, 4, 5).unwrap();
        history.set_watermark(url, when);
        assert_eq!(history.watermark(url), Some(when));
        assert!(history.watermark("https://other.example/feed").is_none());
    }

    #[test]
    fn test_record_kinds_are_distinct() {
        let kinds = [
            AuthState::KIND,
            SubscriptionList::KIND,
            MuteState::KIND,
            FeedHistory::KIND,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in kinds.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
