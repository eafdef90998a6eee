//! In-memory command queue and result store with deadline-based expiry.
//!
//! Both maps live behind one mutex so the delivered check-and-set in
//! [`CommandStore::take_pending`] is atomic with respect to concurrent
//! pollers. Expiry deadlines are kept in a min-heap drained by a single
//! periodic sweep; reads also ignore entries past their deadline, so an
//! expired entry is never observable between sweeps.

use super::types::{Command, CommandResult, EnqueueRequest, ResultSubmission};
use crate::error::BridgeError;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Commands and their results are addressable for five minutes.
pub const DEFAULT_COMMAND_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct StoredCommand {
    command: Command,
    seq: u64,
    expires_at: Instant,
}

#[derive(Debug)]
struct StoredResult {
    result: CommandResult,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct StoreInner {
    commands: HashMap<String, StoredCommand>,
    results: HashMap<String, StoredResult>,
    expiry: BinaryHeap<Reverse<(Instant, String)>>,
    next_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub queued_commands: usize,
    pub stored_results: usize,
}

#[derive(Debug)]
pub struct CommandStore {
    ttl: Duration,
    inner: Mutex<StoreInner>,
}

impl Default for CommandStore {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TTL)
    }
}

impl CommandStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, request: EnqueueRequest) -> Result<Command, BridgeError> {
        self.enqueue_at(request, Instant::now())
    }

    /// Validate and queue a command. Nothing is stored when validation fails.
    pub fn enqueue_at(&self, request: EnqueueRequest, now: Instant) -> Result<Command, BridgeError> {
        let verb = request.command.filter(|verb| !verb.trim().is_empty());
        let roblox_user_id = request.roblox_user_id.filter(|id| !id.is_blank());
        let (Some(verb), Some(roblox_user_id)) = (verb, roblox_user_id) else {
            return Err(BridgeError::Validation("Missing required fields".into()));
        };

        let mut inner = self.lock();
        let mut id = Uuid::new_v4().to_string();
        while inner.commands.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let command = Command {
            id: id.clone(),
            discord_user_id: request.discord_user_id,
            roblox_user_id,
            command: verb,
            args: request.args.unwrap_or_default(),
            server_id: request.server_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
            executed: false,
        };

        let expires_at = now + self.ttl;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.expiry.push(Reverse((expires_at, id.clone())));
        inner.commands.insert(
            id,
            StoredCommand {
                command: command.clone(),
                seq,
                expires_at,
            },
        );

        Ok(command)
    }

    pub fn take_pending(&self, server_id: Option<&str>) -> Vec<Command> {
        self.take_pending_at(server_id, Instant::now())
    }

    /// Return every undelivered, unexpired command for `server_id` (all
    /// servers when `None`) and mark each one delivered.
    pub fn take_pending_at(&self, server_id: Option<&str>, now: Instant) -> Vec<Command> {
        let mut inner = self.lock();
        let mut pending: Vec<(u64, Command)> = inner
            .commands
            .values_mut()
            .filter(|stored| stored.expires_at > now && !stored.command.executed)
            .filter(|stored| {
                server_id.is_none_or(|wanted| stored.command.server_id.as_deref() == Some(wanted))
            })
            .map(|stored| {
                stored.command.executed = true;
                (stored.seq, stored.command.clone())
            })
            .collect();
        pending.sort_by_key(|(seq, _)| *seq);
        pending.into_iter().map(|(_, command)| command).collect()
    }

    pub fn record_result(&self, submission: ResultSubmission) -> Result<(), BridgeError> {
        self.record_result_at(submission, Instant::now())
    }

    /// Store a result, replacing any earlier one for the same id.
    ///
    /// Unknown or expired command ids are accepted; such results get their
    /// own expiry window starting now.
    pub fn record_result_at(
        &self,
        submission: ResultSubmission,
        now: Instant,
    ) -> Result<(), BridgeError> {
        let Some(command_id) = submission
            .command_id
            .filter(|id| !id.trim().is_empty())
        else {
            return Err(BridgeError::Validation("Missing commandId".into()));
        };

        let mut inner = self.lock();
        let known_deadline = inner
            .commands
            .get(&command_id)
            .map(|stored| stored.expires_at)
            .filter(|deadline| *deadline > now);
        let expires_at = known_deadline.unwrap_or_else(|| {
            let deadline = now + self.ttl;
            inner.expiry.push(Reverse((deadline, command_id.clone())));
            deadline
        });

        inner.results.insert(
            command_id,
            StoredResult {
                result: CommandResult {
                    success: submission.success,
                    result: submission.result,
                    error: submission.error,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                },
                expires_at,
            },
        );
        Ok(())
    }

    pub fn result(&self, command_id: &str) -> Option<CommandResult> {
        self.result_at(command_id, Instant::now())
    }

    pub fn result_at(&self, command_id: &str, now: Instant) -> Option<CommandResult> {
        self.lock()
            .results
            .get(command_id)
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.result.clone())
    }

    pub fn command_at(&self, command_id: &str, now: Instant) -> Option<Command> {
        self.lock()
            .commands
            .get(command_id)
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.command.clone())
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Drop every command and result whose deadline has passed. Returns the
    /// number of entries removed.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut inner = self.lock();
        let mut removed = 0;

        while let Some(Reverse((deadline, _))) = inner.expiry.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((_, id))) = inner.expiry.pop() else {
                break;
            };

            // A heap entry can be stale: a result re-posted for an unknown id
            // pushes a later deadline for the same key.
            if inner
                .commands
                .get(&id)
                .is_some_and(|stored| stored.expires_at <= now)
            {
                inner.commands.remove(&id);
                removed += 1;
            }
            if inner
                .results
                .get(&id)
                .is_some_and(|stored| stored.expires_at <= now)
            {
                inner.results.remove(&id);
                removed += 1;
            }
        }

        removed
    }

    pub fn stats(&self) -> StoreStats {
        self.stats_at(Instant::now())
    }

    pub fn stats_at(&self, now: Instant) -> StoreStats {
        let inner = self.lock();
        StoreStats {
            queued_commands: inner
                .commands
                .values()
                .filter(|stored| stored.expires_at > now)
                .count(),
            stored_results: inner
                .results
                .values()
                .filter(|stored| stored.expires_at > now)
                .count(),
        }
    }
}

/// Periodically purge expired entries until the task is aborted.
pub fn spawn_expiry_sweeper(store: Arc<CommandStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(100)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = store.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "relay.expiry_sweep");
            }
        }
    })
}
