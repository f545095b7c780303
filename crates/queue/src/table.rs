//! Live job table: an arena of jobs indexed by ID, a priority heap of ready
//! jobs and a list of retries waiting out their backoff.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use studyhall_decision::PriorityLevel;
use tokio::time::Instant;

use crate::job::{Job, JobId, JobPayload, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadyEntry {
    priority: PriorityLevel,
    seq: Reverse<u64>,
    slot: usize,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A job handed to a worker slot.
#[derive(Debug, Clone)]
pub(crate) struct Claim {
    pub slot: usize,
    pub id: JobId,
    pub attempt: u32,
    pub payload: Arc<JobPayload>,
}

/// Job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
pub(crate) struct JobTable {
    slots: Vec<Option<Job>>,
    free: Vec<usize>,
    index: HashMap<JobId, usize>,
    ready: BinaryHeap<ReadyEntry>,
    delayed: Vec<(Instant, usize)>,
    next_seq: u64,
}

impl JobTable {
    pub fn insert(&mut self, mut job: Job) -> JobId {
        job.seq = self.next_seq;
        self.next_seq += 1;

        let id = job.id.clone();
        let entry = |slot| ReadyEntry {
            priority: job.priority,
            seq: Reverse(job.seq),
            slot,
        };

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.ready.push(entry(slot));
        self.slots[slot] = Some(job);
        self.index.insert(id.clone(), slot);
        id
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        let slot = *self.index.get(id)?;
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_slot_mut(&mut self, slot: usize, id: &JobId) -> Option<&mut Job> {
        self.slots
            .get_mut(slot)?
            .as_mut()
            .filter(|job| job.id == *id)
    }

    /// Pop the best ready job and mark it `processing`.
    ///
    /// Highest priority first, then oldest submission.
    pub fn claim_next(&mut self) -> Option<Claim> {
        while let Some(entry) = self.ready.pop() {
            let Some(job) = self.slots.get_mut(entry.slot).and_then(Option::as_mut) else {
                continue;
            };
            if job.status != JobStatus::Pending || job.seq != entry.seq.0 {
                continue;
            }

            job.status = JobStatus::Processing;
            job.attempts += 1;
            job.started_at = Some(Utc::now());
            return Some(Claim {
                slot: entry.slot,
                id: job.id.clone(),
                attempt: job.attempts,
                payload: Arc::clone(&job.payload),
            });
        }
        None
    }

    /// Put a failed job back to `pending`, ready again at `not_before`.
    pub fn schedule_retry(&mut self, slot: usize, not_before: Instant) {
        if let Some(job) = self.slots.get_mut(slot).and_then(Option::as_mut) {
            job.status = JobStatus::Pending;
            self.delayed.push((not_before, slot));
        }
    }

    /// Move retries whose backoff elapsed onto the ready heap.
    pub fn promote_due(&mut self, now: Instant) -> usize {
        let mut promoted = 0;
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].0 > now {
                i += 1;
                continue;
            }
            let (_, slot) = self.delayed.swap_remove(i);
            if let Some(job) = self.slots.get(slot).and_then(Option::as_ref) {
                self.ready.push(ReadyEntry {
                    priority: job.priority,
                    seq: Reverse(job.seq),
                    slot,
                });
                promoted += 1;
            }
        }
        promoted
    }

    /// Drop terminal jobs whose retention period elapsed.
    pub fn purge(&mut self, now: Instant, completed: Duration, failed: Duration) -> usize {
        let mut purged = 0;
        for slot in 0..self.slots.len() {
            let expired = match &self.slots[slot] {
                Some(job) => match (job.status, job.retired_at) {
                    (JobStatus::Completed, Some(at)) => now.duration_since(at) >= completed,
                    (JobStatus::Failed, Some(at)) => now.duration_since(at) >= failed,
                    _ => false,
                },
                None => false,
            };
            if expired {
                if let Some(job) = self.slots[slot].take() {
                    self.index.remove(&job.id);
                }
                self.free.push(slot);
                purged += 1;
            }
        }
        purged
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for job in self.slots.iter().flatten() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }
}
