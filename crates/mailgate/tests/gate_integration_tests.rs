//! End-to-end tests wiring the full policy set through the gate against
//! in-memory backends.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use mailgate::{
    Evaluator, EventContext, Group, GroupStatus, KvStore, MailgateConfig, MemoryGroupStore,
    MemoryStore, NotificationGate, NotificationSender, SendError, SlidingWindowCounter,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct CountingSender {
    sends: AtomicUsize,
}

impl CountingSender {
    fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for CountingSender {
    async fn send(&self, _group: &Group) -> Result<(), SendError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    groups: Arc<MemoryGroupStore>,
    sender: Arc<CountingSender>,
    gate: NotificationGate,
    config: MailgateConfig,
}

fn harness(config: MailgateConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let groups = Arc::new(MemoryGroupStore::new());
    let sender = Arc::new(CountingSender::default());
    let evaluator = config
        .build_evaluator(store.clone(), groups.clone())
        .expect("default config must build");
    let gate = NotificationGate::new(evaluator, groups.clone(), sender.clone());
    Harness {
        store,
        groups,
        sender,
        gate,
        config,
    }
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 24, h, m, s).unwrap()
}

/// Seeds the counter bucket one resolution before `t` so the throughput
/// window reads a chosen rate.
async fn seed_throughput(h: &Harness, t: DateTime<Utc>, total: i64) {
    let counter = SlidingWindowCounter::new(
        h.store.clone() as Arc<dyn KvStore>,
        h.config.resolution,
        h.config.samples,
    );
    let key = counter.bucket_key(t - ChronoDuration::seconds(h.config.resolution as i64));
    h.store.insert(&key, total, Duration::from_secs(3600)).await;
}

#[tokio::test]
async fn test_new_group_with_default_config_notifies() {
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);
    let group = Group::new("abc123", now);

    let sent = h.gate.process(&group, &EventContext::new("root", now), true).await;
    assert!(sent);
    assert_eq!(h.sender.sends(), 1);
    assert_eq!(h.groups.last_email_sent(group.id).await, Some(now));
}

#[tokio::test]
async fn test_repeat_occurrence_with_quiet_state_notifies() {
    // times_seen > 1, no throttle running, last_email_sent unset: every
    // policy approves on its own merits.
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);
    let mut group = Group::new("abc123", now);
    group.times_seen = 3;

    assert!(h.gate.process(&group, &EventContext::new("root", now), false).await);
}

#[tokio::test]
async fn test_skipped_logger_suppresses_repeat_occurrences() {
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);
    let mut group = Group::new("abc123", now);
    group.times_seen = 2;

    assert!(!h.gate.process(&group, &EventContext::new("http404", now), false).await);
    assert_eq!(h.sender.sends(), 0);

    // The forced path still wins for brand-new groups.
    let fresh = Group::new("def456", now);
    assert!(h.gate.process(&fresh, &EventContext::new("http404", now), true).await);
}

#[tokio::test]
async fn test_throttle_suppresses_under_load_and_cooldown_holds() {
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);

    // 1500 over the 150s window = 10/s, double the 5/s limit.
    seed_throughput(&h, now, 1500).await;

    let mut group = Group::new("abc123", now);
    group.times_seen = 2;
    assert!(!h.gate.process(&group, &EventContext::new("root", now), false).await);

    // Minutes later the window is empty but the cooldown still holds.
    let later = now + ChronoDuration::seconds(300);
    assert!(!h.gate.process(&group, &EventContext::new("root", later), false).await);

    // New groups bypass the throttle via the forced path.
    let fresh = Group::new("def456", later);
    assert!(h.gate.process(&fresh, &EventContext::new("root", later), true).await);
}

#[tokio::test]
async fn test_created_group_storm_engages_throttle() {
    // Forced notifications for brand-new groups still count toward the
    // throughput window, so a storm of new groups engages the throttle
    // for everything that follows.
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);

    // 800 new groups in one 10s bucket: 800 over the 150s window is
    // 5.33/s, past the 5/s limit.
    for i in 0..800 {
        let fresh = Group::new(format!("storm{i}"), now);
        assert!(h.gate.process(&fresh, &EventContext::new("root", now), true).await);
    }
    assert_eq!(h.sender.sends(), 800);

    // One resolution later the bucket has closed; a repeat occurrence
    // must now be suppressed.
    let later = now + ChronoDuration::seconds(10);
    let mut group = Group::new("abc123", now);
    group.times_seen = 2;
    assert!(!h.gate.process(&group, &EventContext::new("root", later), false).await);
    assert_eq!(h.sender.sends(), 800);
}

#[tokio::test]
async fn test_moderate_load_stays_open() {
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);

    // 450 over 150s = 3/s, under the limit.
    seed_throughput(&h, now, 450).await;

    let mut group = Group::new("abc123", now);
    group.times_seen = 2;
    assert!(h.gate.process(&group, &EventContext::new("root", now), false).await);
}

#[tokio::test]
async fn test_burst_since_last_email_renotifies() {
    let mut config = MailgateConfig::default();
    config.amount_trigger = 10;
    let h = harness(config);

    let now = at(12, 0, 0);
    let mut group = Group::new("abc123", now);
    group.times_seen = 50;
    group.last_email_sent = Some(now - ChronoDuration::seconds(120));

    // Exactly at the trigger: denied (strict comparison).
    for _ in 0..10 {
        h.groups
            .record_message(group.id, now - ChronoDuration::seconds(60))
            .await;
    }
    assert!(!h.gate.process(&group, &EventContext::new("root", now), false).await);

    // One more pushes it over.
    h.groups
        .record_message(group.id, now - ChronoDuration::seconds(60))
        .await;
    assert!(h.gate.process(&group, &EventContext::new("root", now), false).await);
}

#[tokio::test]
async fn test_quiet_recent_group_is_suppressed() {
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);

    let mut group = Group::new("abc123", now);
    group.times_seen = 2;
    group.last_email_sent = Some(now - ChronoDuration::seconds(60));

    // Recently notified, no burst, throttle open: wakeup denies.
    assert!(!h.gate.process(&group, &EventContext::new("root", now), false).await);
}

#[tokio::test]
async fn test_regression_on_resolved_group_notifies() {
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);

    let mut group = Group::new("abc123", now);
    group.times_seen = 40;
    group.status = GroupStatus::Resolved;
    group.last_email_sent = Some(now - ChronoDuration::seconds(60));

    assert!(h.gate.process(&group, &EventContext::new("root", now), false).await);
}

#[tokio::test]
async fn test_successful_send_updates_bookkeeping_once() {
    let h = harness(MailgateConfig::default());
    let now = at(12, 0, 0);
    let mut group = Group::new("abc123", now);
    group.times_seen = 2;

    assert!(h.gate.process(&group, &EventContext::new("root", now), false).await);
    assert_eq!(h.groups.last_email_sent(group.id).await, Some(now));

    // Next occurrence soon after is suppressed by the wakeup policy, so
    // the bookkeeping keeps the original timestamp.
    let later = now + ChronoDuration::seconds(30);
    group.last_email_sent = Some(now);
    group.times_seen = 3;
    assert!(!h.gate.process(&group, &EventContext::new("root", later), false).await);
    assert_eq!(h.groups.last_email_sent(group.id).await, Some(now));
}

#[tokio::test]
async fn test_empty_evaluator_gates_nothing() {
    let groups = Arc::new(MemoryGroupStore::new());
    let sender = Arc::new(CountingSender::default());
    let gate = NotificationGate::new(Evaluator::new(vec![]), groups, sender.clone());

    let now = at(12, 0, 0);
    let mut group = Group::new("abc123", now);
    group.times_seen = 2;

    assert!(gate.process(&group, &EventContext::new("root", now), false).await);
    assert_eq!(sender.sends(), 1);
}
