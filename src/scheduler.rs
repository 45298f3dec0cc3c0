//! Timer queue for delayed work: (deadline, job) entries popped in order.
//!
//! Every entry belongs to a [`Lane`] and remembers the lane's generation at
//! the time it was scheduled. Bumping a lane's generation cancels all of
//! its pending entries at once; they are dropped when they come due.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::output::Micros;

/// Identifies a physical key (lowercased character code in terminal mode).
pub type KeyId = u32;

/// Cancellation domain for scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Script tick loop
    Script,
    /// Delayed note starts of script chords and arpeggios
    Steps,
    /// Transient releases and staggered strum notes of chug hits
    Transient,
    /// One chug loop per held key
    Chug(KeyId),
}

/// Work the performer runs when an entry comes due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    ScriptTick,
    ChugTick { key: KeyId },
    /// Start a transient note that releases itself after `duration`
    NoteOn { note: u8, velocity: u8, duration: Micros },
    /// Drop one reference to a transient note
    Release { note: u8 },
}

/// A lane generation captured at scheduling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub lane: Lane,
    pub generation: u64,
}

#[derive(Debug)]
struct Entry {
    at: Micros,
    seq: u64,
    token: Token,
    job: Job,
}

// Min-heap on (deadline, insertion order)
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Entry {}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Entry>,
    generations: HashMap<Lane, u64>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self, lane: Lane) -> u64 {
        self.generations.get(&lane).copied().unwrap_or(0)
    }

    pub fn token(&self, lane: Lane) -> Token {
        Token {
            lane,
            generation: self.generation(lane),
        }
    }

    /// Invalidate everything pending on `lane`. Returns the new generation.
    pub fn bump(&mut self, lane: Lane) -> u64 {
        let generation = self.generations.entry(lane).or_insert(0);
        *generation += 1;
        *generation
    }

    pub fn is_current(&self, token: Token) -> bool {
        self.generation(token.lane) == token.generation
    }

    pub fn schedule(&mut self, at: Micros, lane: Lane, job: Job) {
        let token = self.token(lane);
        self.queue.push(Entry {
            at,
            seq: self.next_seq,
            token,
            job,
        });
        self.next_seq += 1;
    }

    /// Pop the earliest live entry due at or before `until`. Stale entries
    /// encountered on the way are discarded.
    pub fn pop_due(&mut self, until: Micros) -> Option<(Micros, Job)> {
        while let Some(entry) = self.queue.peek() {
            if entry.at > until {
                return None;
            }
            let entry = self.queue.pop()?;
            if self.is_current(entry.token) {
                return Some((entry.at, entry.job));
            }
        }
        None
    }

    /// Deadline of the earliest live entry, purging stale ones at the front.
    pub fn next_deadline(&mut self) -> Option<Micros> {
        while let Some(entry) = self.queue.peek() {
            if self.is_current(entry.token) {
                return Some(entry.at);
            }
            self.queue.pop();
        }
        None
    }

    /// Number of live entries on a lane.
    pub fn pending(&self, lane: Lane) -> usize {
        let generation = self.generation(lane);
        self.queue
            .iter()
            .filter(|e| e.token.lane == lane && e.token.generation == generation)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(300, Lane::Transient, Job::Release { note: 3 });
        scheduler.schedule(100, Lane::Transient, Job::Release { note: 1 });
        scheduler.schedule(200, Lane::Transient, Job::Release { note: 2 });

        assert_eq!(scheduler.pop_due(1_000), Some((100, Job::Release { note: 1 })));
        assert_eq!(scheduler.pop_due(1_000), Some((200, Job::Release { note: 2 })));
        assert_eq!(scheduler.pop_due(250), None);
        assert_eq!(scheduler.pop_due(300), Some((300, Job::Release { note: 3 })));
    }

    #[test]
    fn test_same_deadline_keeps_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(50, Lane::Script, Job::ScriptTick);
        scheduler.schedule(50, Lane::Transient, Job::Release { note: 9 });
        assert_eq!(scheduler.pop_due(50), Some((50, Job::ScriptTick)));
        assert_eq!(scheduler.pop_due(50), Some((50, Job::Release { note: 9 })));
    }

    #[test]
    fn test_bump_cancels_only_its_lane() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(10, Lane::Script, Job::ScriptTick);
        scheduler.schedule(20, Lane::Chug(7), Job::ChugTick { key: 7 });
        scheduler.schedule(30, Lane::Chug(8), Job::ChugTick { key: 8 });

        scheduler.bump(Lane::Script);
        scheduler.bump(Lane::Chug(7));

        assert_eq!(scheduler.pending(Lane::Script), 0);
        assert_eq!(scheduler.next_deadline(), Some(30));
        assert_eq!(scheduler.pop_due(100), Some((30, Job::ChugTick { key: 8 })));
        assert_eq!(scheduler.pop_due(100), None);
    }

    #[test]
    fn test_work_scheduled_after_bump_is_live() {
        let mut scheduler = Scheduler::new();
        scheduler.bump(Lane::Transient);
        scheduler.schedule(5, Lane::Transient, Job::Release { note: 60 });
        assert_eq!(scheduler.pop_due(5), Some((5, Job::Release { note: 60 })));
    }
}
