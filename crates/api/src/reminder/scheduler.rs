use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crm_ticketing_domain::{ticket_id_from_key, Reminder, ReminderStatus, TicketEventType};
use crm_ticketing_infra::{Context, KVEntry, KVError, KVOperation};
use futures::StreamExt;
use tokio::sync::{watch, Notify};
use tracing::{error, info, warn};

/// Entry in the pending-reminder heap. `BinaryHeap` is a max-heap, so the
/// ordering is reversed to get earliest-first; ties on `remind_time` break
/// on the key so ordering stays deterministic.
#[derive(Debug, Clone)]
struct HeapEntry(Reminder);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.remind_time == other.0.remind_time && self.0.key == other.0.key
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .remind_time
            .cmp(&self.0.remind_time)
            .then_with(|| other.0.key.cmp(&self.0.key))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct SchedulerInner {
    ctx: Context,
    heap: Mutex<BinaryHeap<HeapEntry>>,
    /// Single-slot wake signal for the fire loop. Producers that changed the
    /// heap head must notify; spurious wakes are fine.
    wake: Notify,
    shutdown: watch::Sender<bool>,
}

/// Durable per-ticket reminder scheduler.
///
/// The KV bucket is the source of truth: every mutation lands there first
/// and the watch loop folds it into the in-memory heap, so the heap never
/// holds state that a restart could not rebuild. A single fire loop pops due
/// entries and publishes their payloads to the bus.
///
/// The handle is cheap to clone; the composition root owns the loops'
/// lifetime through [`ReminderScheduler::stop`].
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler").finish_non_exhaustive()
    }
}

impl ReminderScheduler {
    /// Rebuilds scheduling state from the KV bucket, then spawns the watch
    /// and fire loops. Fails when the bucket is unreachable; boot should not
    /// proceed without recovery.
    pub async fn start(ctx: Context) -> anyhow::Result<Self> {
        let (shutdown, _) = watch::channel(false);
        let scheduler = Self {
            inner: Arc::new(SchedulerInner {
                ctx,
                heap: Mutex::new(BinaryHeap::new()),
                wake: Notify::new(),
                shutdown,
            }),
        };

        scheduler.recover().await?;
        scheduler.spawn_watch_loop();
        scheduler.spawn_fire_loop();
        Ok(scheduler)
    }

    /// Signals both loops to exit. Idempotent.
    pub fn stop(&self) {
        let _ = self.inner.shutdown.send(true);
        self.inner.wake.notify_one();
    }

    /// Keys currently queued for firing.
    pub fn pending_keys(&self) -> Vec<String> {
        let heap = self.inner.heap.lock().unwrap();
        heap.iter().map(|entry| entry.0.key.clone()).collect()
    }

    /// Queues `reminder`, replacing any entry already held for its key.
    pub(crate) fn schedule(&self, reminder: Reminder) {
        let mut heap = self.inner.heap.lock().unwrap();
        heap.retain(|entry| entry.0.key != reminder.key);
        heap.push(HeapEntry(reminder));
        drop(heap);
        self.inner.wake.notify_one();
    }

    /// Drops the heap entry for `key`, if any. The KV record is untouched.
    pub(crate) fn remove(&self, key: &str) {
        let mut heap = self.inner.heap.lock().unwrap();
        heap.retain(|entry| entry.0.key != key);
    }

    async fn recover(&self) -> anyhow::Result<()> {
        info!("Loading existing reminders");
        let keys = self.inner.ctx.kv.keys().await?;

        let mut recovered = 0;
        for key in keys {
            let entry = match self.inner.ctx.kv.get(&key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    warn!(key = %key, error = %err, "failed to read reminder during recovery");
                    continue;
                }
            };
            // One bad record must never halt recovery
            let reminder: Reminder = match serde_json::from_slice(&entry.value) {
                Ok(reminder) => reminder,
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping undecodable reminder record");
                    continue;
                }
            };
            if reminder.status == ReminderStatus::Pending {
                self.schedule(reminder);
                recovered += 1;
            }
        }
        info!(recovered, "reminder recovery complete");
        Ok(())
    }

    fn spawn_watch_loop(&self) {
        let scheduler = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    return;
                }
                let mut updates = match scheduler.inner.ctx.kv.watch_all().await {
                    Ok(updates) => updates,
                    Err(err) => {
                        error!(error = %err, "failed to watch reminder bucket, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        update = updates.next() => match update {
                            Some(entry) => scheduler.apply_watch_entry(entry),
                            None => {
                                warn!("reminder watch stream ended, re-establishing");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    fn apply_watch_entry(&self, entry: KVEntry) {
        // Every committed write supersedes whatever the heap held for the key
        self.remove(&entry.key);

        if entry.operation != KVOperation::Put {
            return;
        }
        if entry.value.is_empty() {
            warn!(key = %entry.key, "received empty reminder data");
            return;
        }

        let mut reminder: Reminder = match serde_json::from_slice(&entry.value) {
            Ok(reminder) => reminder,
            Err(err) => {
                error!(key = %entry.key, error = %err, "failed to parse reminder data");
                return;
            }
        };

        if reminder.status == ReminderStatus::Pending {
            reminder.revision = entry.revision;
            self.schedule(reminder);
        }
    }

    fn spawn_fire_loop(&self) {
        let scheduler = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    return;
                }

                let next = scheduler.next_action();
                match next {
                    NextAction::Idle => {
                        tokio::select! {
                            _ = shutdown.changed() => return,
                            _ = scheduler.inner.wake.notified() => {}
                            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                        }
                    }
                    NextAction::Sleep(delay) => {
                        // A wake usually means the head changed; loop and
                        // re-evaluate instead of firing blindly.
                        tokio::select! {
                            _ = shutdown.changed() => return,
                            _ = scheduler.inner.wake.notified() => {}
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    NextAction::Fire(reminder) => scheduler.fire(reminder).await,
                }
            }
        });
    }

    /// Peeks the heap and decides what the fire loop should do next. The
    /// lock is never held across an await point.
    fn next_action(&self) -> NextAction {
        let mut heap = self.inner.heap.lock().unwrap();
        let head_time = match heap.peek() {
            Some(head) => head.0.remind_time,
            None => return NextAction::Idle,
        };

        let now = self.inner.ctx.sys.now_utc();
        let delay = head_time.signed_duration_since(now);
        if delay > chrono::Duration::zero() {
            return NextAction::Sleep(delay.to_std().unwrap_or(Duration::from_secs(1)));
        }

        match heap.pop() {
            Some(entry) => NextAction::Fire(entry.0),
            None => NextAction::Idle,
        }
    }

    /// Publishes a due reminder and marks its record completed.
    ///
    /// The record is re-read first: the popped heap entry may have lost a
    /// race against cancel or snooze. Completion is written with
    /// compare-and-swap so a mutation that sneaks in between the read and
    /// the write surfaces as a conflict instead of being overwritten.
    async fn fire(&self, reminder: Reminder) {
        let key = reminder.key.clone();

        loop {
            let entry = match self.inner.ctx.kv.get(&key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    warn!(key = %key, "reminder missing from KV store, dropping");
                    return;
                }
                Err(err) => {
                    error!(key = %key, error = %err, "failed to read reminder before firing");
                    return;
                }
            };

            let mut stored: Reminder = match serde_json::from_slice(&entry.value) {
                Ok(stored) => stored,
                Err(err) => {
                    error!(key = %key, error = %err, "failed to parse stored reminder, dropping");
                    return;
                }
            };

            if stored.status != ReminderStatus::Pending {
                info!(key = %key, status = ?stored.status, "reminder no longer pending, dropping");
                return;
            }
            if stored.remind_time > reminder.remind_time {
                // Snoozed after we popped it; the watch loop owns the new one
                info!(key = %key, "reminder was rescheduled, dropping this fire");
                return;
            }

            stored.status = ReminderStatus::Completed;
            stored.revision = entry.revision;
            let payload = match serde_json::to_vec(&stored) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(key = %key, error = %err, "failed to serialize completed reminder");
                    return;
                }
            };

            match self.inner.ctx.kv.update(&key, payload, entry.revision).await {
                Ok(revision) => {
                    info!(key = %key, revision, "marked reminder completed");
                    self.publish(&key, &stored).await;
                    return;
                }
                Err(KVError::Conflict) => {
                    warn!(key = %key, "revision conflict completing reminder, re-reading");
                    continue;
                }
                Err(err) => {
                    error!(key = %key, error = %err, "failed to mark reminder completed");
                    return;
                }
            }
        }
    }

    async fn publish(&self, key: &str, reminder: &Reminder) {
        let ticket_id = ticket_id_from_key(key);
        let subject = TicketEventType::Reminder.subject(ticket_id);
        let payload = reminder.event_data.get().as_bytes().to_vec();

        match self.inner.ctx.bus.publish(&subject, payload).await {
            Ok(sequence) => {
                info!(key = %key, subject = %subject, sequence, "reminder fired");
            }
            Err(err) => {
                error!(key = %key, ticket_id = %ticket_id, error = %err, "failed to publish reminder event");
            }
        }
    }
}

enum NextAction {
    Idle,
    Sleep(Duration),
    Fire(Reminder),
}
